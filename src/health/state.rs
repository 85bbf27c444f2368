//! Instance health state machine.
//!
//! # States
//! - Healthy: instance receives traffic
//! - Unhealthy: instance excluded from load balancing, still owned by the registry
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: probe failed (a replacement is requested)
//! Unhealthy → Healthy: probe succeeded (no pool action)
//! ```
//! There is no terminal state. An instance leaves only through removal.

/// Outcome of comparing the recorded health with a fresh probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameUnhealthy,
    Recovered,
    StayedHealthy,
    StayedUnhealthy,
}

impl Transition {
    pub fn between(was_healthy: bool, is_healthy: bool) -> Self {
        match (was_healthy, is_healthy) {
            (true, false) => Transition::BecameUnhealthy,
            (false, true) => Transition::Recovered,
            (true, true) => Transition::StayedHealthy,
            (false, false) => Transition::StayedUnhealthy,
        }
    }

    pub fn changed(self) -> bool {
        matches!(self, Transition::BecameUnhealthy | Transition::Recovered)
    }
}
