//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry from configuration and a process launcher
//! - Fill the pool to its minimum before traffic is accepted
//! - Start the health/autoscaling loop
//! - Tear the fleet down in order at exit
//!
//! # Design Decisions
//! - A pool that cannot reach its minimum is logged, not fatal; the loop keeps topping up
//! - Listeners are bound by the caller after bootstrap (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::admin::AdminState;
use crate::config::FleetConfig;
use crate::health::{HealthMonitor, TcpProbe};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{FleetRegistry, SharedStrategy};
use crate::process::ProcessLauncher;

/// The running control plane core.
pub struct Fleet {
    pub registry: Arc<FleetRegistry>,
    pub strategy: Arc<SharedStrategy>,
    monitor: Option<JoinHandle<()>>,
}

/// Build the registry, start `min_instances` backends and spawn the health loop.
pub fn bootstrap(config: &FleetConfig, launcher: Arc<dyn ProcessLauncher>, shutdown: &Shutdown) -> Fleet {
    let registry = Arc::new(FleetRegistry::from_config(&config.pool, &config.autoscale, launcher));

    let started = registry.fill_to_minimum();
    let stats = registry.stats();
    if stats.total < stats.min {
        tracing::warn!(started, min = stats.min, "Pool started below its minimum");
    } else {
        tracing::info!(started, "Backend pool ready");
    }

    let strategy = Arc::new(SharedStrategy::from_config(&config.strategy));
    tracing::info!(strategy = strategy.name(), "Selection strategy configured");

    let monitor = if config.health_check.enabled {
        let monitor = HealthMonitor::new(
            registry.clone(),
            TcpProbe::new(Duration::from_secs(config.health_check.timeout_secs)),
            Duration::from_secs(config.health_check.interval_secs),
            config.autoscale.enabled,
        );
        Some(tokio::spawn(monitor.run(shutdown.subscribe())))
    } else {
        tracing::info!("Health checks disabled");
        None
    };

    Fleet {
        registry,
        strategy,
        monitor,
    }
}

impl Fleet {
    pub fn admin_state(&self, config: &FleetConfig) -> AdminState {
        AdminState {
            registry: self.registry.clone(),
            strategy: self.strategy.clone(),
            strategy_config: config.strategy.clone(),
            api_key: Arc::new(config.admin.api_key.clone()),
        }
    }

    /// Join the health loop, then terminate every backend. Call after shutdown was triggered.
    pub async fn stop(self) -> usize {
        if let Some(monitor) = self.monitor {
            if let Err(e) = monitor.await {
                tracing::error!(error = %e, "Health monitor task failed");
            }
        }
        self.registry.shutdown()
    }
}
