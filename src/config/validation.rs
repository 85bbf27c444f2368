//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, thresholds ordered)
//! - Check pool bounds are consistent
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FleetConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::FleetConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &FleetConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }

    let pool = &config.pool;
    if pool.backend_command.trim().is_empty() {
        errors.push(ValidationError::new("pool.backend_command", "must not be empty"));
    } else if !pool.backend_command.contains("{port}") {
        errors.push(ValidationError::new(
            "pool.backend_command",
            "must contain the {port} placeholder",
        ));
    }
    if pool.backend_host.trim().is_empty() {
        errors.push(ValidationError::new("pool.backend_host", "must not be empty"));
    }
    if pool.start_port == 0 {
        errors.push(ValidationError::new("pool.start_port", "must be greater than 0"));
    }
    if pool.min_instances == 0 {
        errors.push(ValidationError::new("pool.min_instances", "must be at least 1"));
    }
    if pool.min_instances > pool.max_instances {
        errors.push(ValidationError::new(
            "pool.max_instances",
            format!(
                "must be >= min_instances ({} < {})",
                pool.max_instances, pool.min_instances
            ),
        ));
    }
    if pool.start_port as usize + pool.max_instances > u16::MAX as usize + 1 {
        errors.push(ValidationError::new(
            "pool.start_port",
            "start_port + max_instances exceeds the port range",
        ));
    }

    let strategy = &config.strategy;
    if strategy.cpu_weight < 0.0 || strategy.memory_weight < 0.0 {
        errors.push(ValidationError::new("strategy", "weights must be non-negative"));
    } else if strategy.cpu_weight + strategy.memory_weight == 0.0 {
        errors.push(ValidationError::new("strategy", "weights must not both be zero"));
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::new("health_check.interval_secs", "must be greater than 0"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::new("health_check.timeout_secs", "must be greater than 0"));
    }

    let autoscale = &config.autoscale;
    if !(0.0..=100.0).contains(&autoscale.scale_down_cpu)
        || !(0.0..=100.0).contains(&autoscale.scale_up_cpu)
    {
        errors.push(ValidationError::new("autoscale", "thresholds must be within 0..=100"));
    } else if autoscale.scale_down_cpu >= autoscale.scale_up_cpu {
        errors.push(ValidationError::new(
            "autoscale",
            "scale_down_cpu must be below scale_up_cpu",
        ));
    }

    if config.timeouts.forward_secs == 0 {
        errors.push(ValidationError::new("timeouts.forward_secs", "must be greater than 0"));
    }

    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address '{}'", value)));
    }
}
