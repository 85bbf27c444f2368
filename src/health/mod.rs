//! Health checking and autoscaling.
//!
//! # Data Flow
//! ```text
//! Periodic timer (active.rs):
//!     → Probe every instance concurrently (probe.rs)
//!     → Sample CPU/memory of reachable instances
//!     → One batched registry update
//!     → Classify transitions (state.rs)
//!     → Replace instances that just failed
//!     → At most one scaling action (autoscale.rs)
//!     → Top up to the minimum pool size
//! ```
//!
//! # Design Decisions
//! - Transitions are driven by a single probe outcome, no hysteresis
//! - Unhealthy never implies removal; removal is a threshold decision
//! - Pool bounds and thresholds are read from the registry every cycle

pub mod active;
pub mod autoscale;
pub mod probe;
pub mod state;

pub use active::{CycleReport, HealthMonitor};
pub use autoscale::{evaluate, ScaleDecision};
pub use probe::{HealthProbe, TcpProbe};
pub use state::Transition;
