//! CPU-threshold scaling decision.

use serde::Serialize;

use crate::load_balancer::PoolLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDecision {
    ScaleUp,
    ScaleDown,
    Hold,
}

impl ScaleDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleDecision::ScaleUp => "up",
            ScaleDecision::ScaleDown => "down",
            ScaleDecision::Hold => "hold",
        }
    }
}

/// Decide from one instance's CPU and the current active count.
///
/// Thresholds are strict: CPU equal to a threshold holds.
pub fn evaluate(cpu: f64, active: usize, limits: &PoolLimits) -> ScaleDecision {
    if cpu > limits.scale_up_cpu && active < limits.max_instances {
        ScaleDecision::ScaleUp
    } else if cpu < limits.scale_down_cpu && active > limits.min_instances {
        ScaleDecision::ScaleDown
    } else {
        ScaleDecision::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> PoolLimits {
        PoolLimits {
            min_instances: 2,
            max_instances: 5,
            scale_up_cpu: 80.0,
            scale_down_cpu: 20.0,
        }
    }

    #[test]
    fn test_scale_up_below_max() {
        assert_eq!(evaluate(85.0, 3, &limits()), ScaleDecision::ScaleUp);
        assert_eq!(evaluate(85.0, 5, &limits()), ScaleDecision::Hold);
    }

    #[test]
    fn test_scale_down_above_min() {
        assert_eq!(evaluate(10.0, 3, &limits()), ScaleDecision::ScaleDown);
        assert_eq!(evaluate(10.0, 2, &limits()), ScaleDecision::Hold);
    }

    #[test]
    fn test_thresholds_are_strict() {
        assert_eq!(evaluate(80.0, 3, &limits()), ScaleDecision::Hold);
        assert_eq!(evaluate(20.0, 3, &limits()), ScaleDecision::Hold);
        assert_eq!(evaluate(50.0, 3, &limits()), ScaleDecision::Hold);
    }
}
