//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{instance::Instance, Strategy};

/// Least connections selector.
/// Selects the instance with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for LeastConnections {
    fn name(&self) -> &'static str {
        "least_connections"
    }

    fn select(&self, candidates: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        // In case of tie, the first one is selected (min_by_key keeps the first minimum)
        candidates
            .iter()
            .min_by_key(|i| i.active_connections())
            .cloned()
    }
}
