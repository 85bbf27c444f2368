//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forward to instance / liveness probe:
//!     → timeouts.rs (enforce a per-call deadline)
//!     → on expiry: structured FleetError surfaced to the caller
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed forward is the request's result
//! - Unhealthy instances are handled by the health loop, not by a circuit breaker

pub mod timeouts;
