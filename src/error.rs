//! Error taxonomy shared by the registry, router and health loop.

use thiserror::Error;

/// Errors produced by fleet operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FleetError {
    /// No healthy instance is available to serve a request.
    #[error("No healthy instance available")]
    Unavailable,

    /// The pool is already at its configured maximum size.
    #[error("Pool is at capacity ({max} instances)")]
    CapacityExceeded { max: usize },

    /// Removing would take the pool below its configured minimum.
    #[error("Pool is at its minimum ({min} active instances)")]
    MinimumReached { min: usize },

    /// No instance with this identity exists.
    #[error("Instance not found: {0}")]
    NotFound(String),

    /// The backend process could not be started.
    #[error("Failed to spawn backend process: {0}")]
    SpawnFailed(String),

    /// A liveness probe could not reach the instance.
    #[error("Probe failed for {id}: {reason}")]
    ProbeFailed { id: String, reason: String },

    /// Resource telemetry could not be sampled for the instance.
    #[error("Metrics unavailable for {0}")]
    MetricsUnavailable(String),

    /// Forwarding a request to the selected instance failed.
    #[error("Transport failure on {id}: {reason}")]
    Transport { id: String, reason: String },

    /// Rejected pool limits or thresholds.
    #[error("Invalid pool limits: {0}")]
    InvalidLimits(String),
}

pub type FleetResult<T> = Result<T, FleetError>;
