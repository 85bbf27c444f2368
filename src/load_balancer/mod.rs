//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → registry.rs (snapshot of active instances)
//!     → Apply selection strategy:
//!         - round_robin.rs (rotate through instances)
//!         - least_conn.rs (pick instance with fewest connections)
//!         - resource_based.rs (pick instance with lowest CPU/memory load)
//!     → instance.rs (connection guard held while forwarding)
//! ```
//!
//! # Design Decisions
//! - Strategies never filter by health; the registry hands them the active set
//! - Strategy state is internal (round-robin cursor only); candidates are read-only
//! - The active strategy lives in a `SharedStrategy` slot and can be swapped at runtime
//! - The registry owns all structural mutation; counters inside an instance are atomics

pub mod instance;
pub mod least_conn;
pub mod registry;
pub mod resource_based;
pub mod round_robin;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StrategyConfig;

pub use instance::{ConnectionGuard, Instance, InstanceInfo};
pub use least_conn::LeastConnections;
pub use registry::{FleetRegistry, HealthUpdate, PoolLimits, PoolStats};
pub use resource_based::ResourceBased;
pub use round_robin::RoundRobin;

/// Per-request instance selection policy.
pub trait Strategy: Send + Sync + fmt::Debug {
    /// Name used in logs and the admin API.
    fn name(&self) -> &'static str;

    /// Pick one of `candidates`, or `None` if the slice is empty.
    fn select(&self, candidates: &[Arc<Instance>]) -> Option<Arc<Instance>>;
}

/// The selectable strategy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    LeastConnections,
    ResourceBased,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => "round_robin",
            StrategyKind::LeastConnections => "least_connections",
            StrategyKind::ResourceBased => "resource_based",
        }
    }

    /// Build the strategy, taking resource weights from `config`.
    pub fn build(&self, config: &StrategyConfig) -> Box<dyn Strategy> {
        match self {
            StrategyKind::RoundRobin => Box::new(RoundRobin::new()),
            StrategyKind::LeastConnections => Box::new(LeastConnections::new()),
            StrategyKind::ResourceBased => Box::new(ResourceBased::new(
                config.cpu_weight,
                config.memory_weight,
                Duration::from_secs(config.metrics_max_age_secs),
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "round_robin" => Ok(StrategyKind::RoundRobin),
            "least_connections" | "least_conn" => Ok(StrategyKind::LeastConnections),
            "resource_based" => Ok(StrategyKind::ResourceBased),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// The strategy currently used for routing, replaceable without locking readers.
#[derive(Debug)]
pub struct SharedStrategy {
    current: ArcSwap<Box<dyn Strategy>>,
}

impl SharedStrategy {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self {
            current: ArcSwap::from_pointee(strategy),
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.kind.build(config))
    }

    pub fn select(&self, candidates: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        self.current.load().select(candidates)
    }

    pub fn name(&self) -> &'static str {
        self.current.load().name()
    }

    /// Swap in a new strategy. In-flight selections finish on the old one.
    pub fn replace(&self, strategy: Box<dyn Strategy>) {
        let previous = self.name();
        tracing::info!(from = previous, to = strategy.name(), "Selection strategy replaced");
        self.current.store(Arc::new(strategy));
    }
}
