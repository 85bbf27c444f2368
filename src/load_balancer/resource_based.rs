//! Resource-based load balancing strategy.
//!
//! Scores each candidate as `cpu_weight * cpu + memory_weight * memory` from
//! the gauges the health loop last recorded, and picks the lowest score.
//! Candidates whose metrics were never recorded, or are older than
//! `max_age`, rank after every candidate with fresh metrics.

use std::sync::Arc;
use std::time::Duration;

use crate::load_balancer::{instance::Instance, Strategy};

#[derive(Debug, Clone)]
pub struct ResourceBased {
    cpu_weight: f64,
    memory_weight: f64,
    max_age: Duration,
}

impl ResourceBased {
    pub fn new(cpu_weight: f64, memory_weight: f64, max_age: Duration) -> Self {
        Self {
            cpu_weight,
            memory_weight,
            max_age,
        }
    }

    /// Load score, `None` when the metrics are missing or stale.
    fn score(&self, instance: &Instance) -> Option<f64> {
        let age = instance.metrics_age()?;
        if age > self.max_age {
            return None;
        }
        let score = self.cpu_weight * instance.cpu_usage() + self.memory_weight * instance.memory_usage();
        if score.is_nan() {
            return None;
        }
        Some(score)
    }
}

impl Default for ResourceBased {
    fn default() -> Self {
        Self::new(0.7, 0.3, Duration::from_secs(90))
    }
}

impl Strategy for ResourceBased {
    fn name(&self) -> &'static str {
        "resource_based"
    }

    fn select(&self, candidates: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        let mut best: Option<(&Arc<Instance>, Option<f64>)> = None;

        for candidate in candidates {
            let score = self.score(candidate);
            let better = match (&best, score) {
                (None, _) => true,
                (Some((_, None)), Some(_)) => true,
                (Some((_, Some(current))), Some(s)) => s < *current,
                _ => false,
            };
            if better {
                best = Some((candidate, score));
            }
        }

        best.map(|(instance, _)| instance.clone())
    }
}
