//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the control plane.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::StrategyKind;

/// Root configuration for the fleet balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    /// Inbound request listener.
    pub listener: ListenerConfig,

    /// Backend pool: command template, ports and size bounds.
    pub pool: PoolConfig,

    /// Instance selection strategy.
    pub strategy: StrategyConfig,

    /// Health loop settings.
    pub health_check: HealthCheckConfig,

    /// CPU-driven autoscaling thresholds.
    pub autoscale: AutoscaleConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Administrative API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:50050").
    pub bind_address: String,

    /// Maximum accepted request payload in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:50050".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Backend pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Command line used to start a backend; `{port}` is replaced with the allocated port.
    ///
    /// On unix the shell `exec`s it, so it must be a single command (no `&&` chains).
    pub backend_command: String,

    /// Host the spawned backends listen on.
    pub backend_host: String,

    /// First port handed out to a backend.
    pub start_port: u16,

    /// Minimum number of instances kept in the pool.
    pub min_instances: usize,

    /// Maximum number of instances the pool may grow to.
    pub max_instances: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            backend_command: "./backend_server {port}".to_string(),
            backend_host: "127.0.0.1".to_string(),
            start_port: 50051,
            min_instances: 2,
            max_instances: 5,
        }
    }
}

/// Strategy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Which selection policy routes requests.
    pub kind: StrategyKind,

    /// Weight of CPU usage in the resource-based load score.
    pub cpu_weight: f64,

    /// Weight of memory usage in the resource-based load score.
    pub memory_weight: f64,

    /// Metrics older than this are treated as missing by the resource-based strategy.
    pub metrics_max_age_secs: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kind: StrategyKind::RoundRobin,
            cpu_weight: 0.7,
            memory_weight: 0.3,
            metrics_max_age_secs: 90,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the health loop.
    pub enabled: bool,

    /// Health loop period in seconds.
    pub interval_secs: u64,

    /// Per-instance probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
        }
    }
}

/// Autoscaling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoscaleConfig {
    /// Enable CPU-driven scale up/down.
    pub enabled: bool,

    /// CPU percentage above which the pool grows.
    pub scale_up_cpu: f64,

    /// CPU percentage below which the pool shrinks.
    pub scale_down_cpu: f64,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale_up_cpu: 80.0,
            scale_down_cpu: 20.0,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Forwarded request timeout in seconds.
    pub forward_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { forward_secs: 30 }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
