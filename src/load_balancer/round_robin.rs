//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{instance::Instance, Strategy};

/// Round-robin selector.
/// Stores an internal counter to rotate through instances.
///
/// The cursor is taken modulo the length of each call's candidate list, so a
/// resize between calls shifts the rotation but never indexes out of range.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select(&self, candidates: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        if candidates.is_empty() {
            return None;
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[index].clone())
    }
}
