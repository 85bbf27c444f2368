//! Fleet registry.
//!
//! # Responsibilities
//! - Own the authoritative set of instances and their lifecycle (spawn, track, retire)
//! - Enforce pool bounds: add refused at `max_instances`, remove refused at `min_instances`
//! - Allocate ports from a monotonic cursor; identities are never reused within a run
//! - Keep the active-instance gauge consistent with the health flags
//! - Hand out snapshots that readers iterate without holding the lock
//!
//! # Design Decisions
//! - One mutex serializes add/remove/health updates and the active gauge
//! - Per-instance counters are atomics and never take the registry lock
//! - Processes are spawned under the lock (so two adds cannot both pass the
//!   capacity check) but terminated after the lock is released
//! - Spawning blocks, so async callers go through [`FleetRegistry::spawn_instance`]
//!   and [`FleetRegistry::spawn_to_minimum`], which run on the blocking pool

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{AutoscaleConfig, PoolConfig};
use crate::error::{FleetError, FleetResult};
use crate::load_balancer::instance::Instance;
use crate::observability::metrics;
use crate::process::ProcessLauncher;

/// Pool bounds and scaling thresholds, adjustable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolLimits {
    pub min_instances: usize,
    pub max_instances: usize,
    pub scale_up_cpu: f64,
    pub scale_down_cpu: f64,
}

impl PoolLimits {
    pub fn from_config(pool: &PoolConfig, autoscale: &AutoscaleConfig) -> Self {
        Self {
            min_instances: pool.min_instances,
            max_instances: pool.max_instances,
            scale_up_cpu: autoscale.scale_up_cpu,
            scale_down_cpu: autoscale.scale_down_cpu,
        }
    }

    pub fn validate(&self) -> FleetResult<()> {
        if self.min_instances == 0 {
            return Err(FleetError::InvalidLimits("min_instances must be at least 1".into()));
        }
        if self.min_instances > self.max_instances {
            return Err(FleetError::InvalidLimits(format!(
                "min_instances ({}) exceeds max_instances ({})",
                self.min_instances, self.max_instances
            )));
        }
        if self.max_instances == 0 {
            return Err(FleetError::InvalidLimits("max_instances must be at least 1".into()));
        }
        if !(0.0..=100.0).contains(&self.scale_down_cpu) || !(0.0..=100.0).contains(&self.scale_up_cpu) {
            return Err(FleetError::InvalidLimits("CPU thresholds must be within 0..=100".into()));
        }
        if self.scale_down_cpu >= self.scale_up_cpu {
            return Err(FleetError::InvalidLimits(format!(
                "scale_down_cpu ({}) must be below scale_up_cpu ({})",
                self.scale_down_cpu, self.scale_up_cpu
            )));
        }
        Ok(())
    }
}

/// Consistent view of pool size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub min: usize,
    pub max: usize,
}

/// One health/metrics observation for an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthUpdate {
    pub id: String,
    pub healthy: bool,
    #[serde(default)]
    pub cpu_usage: Option<f64>,
    #[serde(default)]
    pub memory_usage: Option<f64>,
}

struct RegistryState {
    instances: HashMap<String, Arc<Instance>>,
    /// Insertion order of `instances`, for stable iteration.
    order: Vec<String>,
    next_port: u32,
    limits: PoolLimits,
    active: usize,
}

impl RegistryState {
    fn snapshot(&self, only_healthy: bool) -> Vec<Arc<Instance>> {
        self.order
            .iter()
            .filter_map(|id| self.instances.get(id))
            .filter(|instance| !only_healthy || instance.is_healthy())
            .cloned()
            .collect()
    }

    fn stats(&self) -> PoolStats {
        let total = self.instances.len();
        PoolStats {
            total,
            active: self.active,
            inactive: total - self.active,
            min: self.limits.min_instances,
            max: self.limits.max_instances,
        }
    }

    /// Apply one update. Returns false if the id is unknown.
    fn apply(&mut self, update: &HealthUpdate) -> bool {
        let Some(instance) = self.instances.get(&update.id) else {
            return false;
        };

        let was_healthy = instance.set_health(update.healthy);
        if update.cpu_usage.is_some() || update.memory_usage.is_some() {
            instance.record_metrics(
                update.cpu_usage.unwrap_or_else(|| instance.cpu_usage()),
                update.memory_usage.unwrap_or_else(|| instance.memory_usage()),
            );
            metrics::record_instance_usage(&update.id, instance.cpu_usage(), instance.memory_usage());
        }

        if was_healthy != update.healthy {
            if update.healthy {
                self.active += 1;
            } else {
                self.active -= 1;
            }
            tracing::info!(
                instance = %update.id,
                healthy = update.healthy,
                active = self.active,
                "Instance health changed"
            );
            metrics::record_instance_health(&update.id, update.healthy);
        }
        true
    }
}

/// Owns the backend instances and their lifecycle.
pub struct FleetRegistry {
    host: String,
    launcher: Arc<dyn ProcessLauncher>,
    state: Mutex<RegistryState>,
}

impl FleetRegistry {
    /// Create an empty registry. Call [`fill_to_minimum`](Self::fill_to_minimum) to start backends.
    pub fn new(
        host: impl Into<String>,
        start_port: u16,
        limits: PoolLimits,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            host: host.into(),
            launcher,
            state: Mutex::new(RegistryState {
                instances: HashMap::new(),
                order: Vec::new(),
                next_port: start_port as u32,
                limits,
                active: 0,
            }),
        }
    }

    pub fn from_config(
        pool: &PoolConfig,
        autoscale: &AutoscaleConfig,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self::new(
            pool.backend_host.clone(),
            pool.start_port,
            PoolLimits::from_config(pool, autoscale),
            launcher,
        )
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn instances until the pool holds `min_instances`. Returns how many were added.
    ///
    /// Stops at the first failure; the health loop keeps topping up later.
    pub fn fill_to_minimum(&self) -> usize {
        let mut added = 0;
        loop {
            let stats = self.stats();
            if stats.total >= stats.min {
                break;
            }
            match self.add_instance() {
                Ok(_) => added += 1,
                Err(e) => {
                    tracing::error!(error = %e, total = stats.total, min = stats.min, "Could not reach minimum pool size");
                    break;
                }
            }
        }
        added
    }

    /// Spawn a backend on the next port and register it as healthy.
    pub fn add_instance(&self) -> FleetResult<Arc<Instance>> {
        let mut state = self.state();

        let max = state.limits.max_instances;
        if state.instances.len() >= max {
            tracing::debug!(max, "Add refused: pool at capacity");
            return Err(FleetError::CapacityExceeded { max });
        }

        let port = u16::try_from(state.next_port)
            .map_err(|_| FleetError::SpawnFailed("port range exhausted".into()))?;
        // Consumed even if the spawn fails; ports are never reused within a run.
        state.next_port += 1;

        let process = match self.launcher.launch(port) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(port, error = %e, "Backend spawn failed");
                metrics::record_spawn_failure();
                return Err(e);
            }
        };

        let instance = Arc::new(Instance::new(self.host.clone(), port, process));
        let id = instance.id().to_string();
        state.instances.insert(id.clone(), instance.clone());
        state.order.push(id.clone());
        state.active += 1;

        let stats = state.stats();
        drop(state);

        tracing::info!(instance = %id, total = stats.total, active = stats.active, "Instance added");
        metrics::record_pool(stats.total, stats.active);
        metrics::record_instance_health(&id, true);
        Ok(instance)
    }

    /// [`add_instance`](Self::add_instance) on the blocking pool.
    pub async fn spawn_instance(self: &Arc<Self>) -> FleetResult<Arc<Instance>> {
        let registry = self.clone();
        tokio::task::spawn_blocking(move || registry.add_instance())
            .await
            .map_err(|e| FleetError::SpawnFailed(e.to_string()))?
    }

    /// [`fill_to_minimum`](Self::fill_to_minimum) on the blocking pool.
    pub async fn spawn_to_minimum(self: &Arc<Self>) -> usize {
        let registry = self.clone();
        match tokio::task::spawn_blocking(move || registry.fill_to_minimum()).await {
            Ok(added) => added,
            Err(e) => {
                tracing::error!(error = %e, "Top-up task failed");
                0
            }
        }
    }

    /// Evict an instance and terminate its process.
    pub fn remove_instance(&self, id: &str) -> FleetResult<bool> {
        let mut state = self.state();

        if !state.instances.contains_key(id) {
            return Err(FleetError::NotFound(id.to_string()));
        }
        let min = state.limits.min_instances;
        if state.active <= min {
            tracing::debug!(instance = %id, active = state.active, min, "Remove refused: pool at minimum");
            return Err(FleetError::MinimumReached { min });
        }

        let Some(instance) = state.instances.remove(id) else {
            return Err(FleetError::NotFound(id.to_string()));
        };
        state.order.retain(|other| other != id);
        if instance.is_healthy() {
            state.active -= 1;
        }

        let stats = state.stats();
        drop(state);

        if let Err(e) = instance.process().terminate() {
            tracing::warn!(instance = %id, error = %e, "Failed to terminate backend process");
        }

        tracing::info!(instance = %id, total = stats.total, active = stats.active, "Instance removed");
        metrics::record_pool(stats.total, stats.active);
        metrics::record_instance_removed(id);
        Ok(true)
    }

    /// Record health and optional metrics for one instance. Unknown ids are ignored.
    ///
    /// Returns whether the instance was found.
    pub fn update_health(&self, id: &str, healthy: bool, cpu: Option<f64>, memory: Option<f64>) -> bool {
        self.apply_health_batch(&[HealthUpdate {
            id: id.to_string(),
            healthy,
            cpu_usage: cpu,
            memory_usage: memory,
        }])
        .is_empty()
    }

    /// Apply a batch of updates under one lock acquisition. Returns the unknown ids.
    pub fn apply_health_batch(&self, updates: &[HealthUpdate]) -> Vec<String> {
        let mut state = self.state();
        let unknown: Vec<String> = updates
            .iter()
            .filter(|update| !state.apply(update))
            .map(|update| update.id.clone())
            .collect();

        let stats = state.stats();
        drop(state);

        metrics::record_pool(stats.total, stats.active);
        unknown
    }

    /// Snapshot of every healthy instance.
    pub fn active_instances(&self) -> Vec<Arc<Instance>> {
        self.state().snapshot(true)
    }

    /// Snapshot of every instance regardless of health.
    pub fn all_instances(&self) -> Vec<Arc<Instance>> {
        self.state().snapshot(false)
    }

    pub fn find_by_id(&self, id: &str) -> Option<Arc<Instance>> {
        self.state().instances.get(id).cloned()
    }

    pub fn stats(&self) -> PoolStats {
        self.state().stats()
    }

    pub fn limits(&self) -> PoolLimits {
        self.state().limits
    }

    /// Replace pool bounds and thresholds. Existing instances are not touched;
    /// the health loop converges on the next tick.
    pub fn set_limits(&self, limits: PoolLimits) -> FleetResult<()> {
        limits.validate()?;
        let mut state = self.state();
        tracing::info!(
            min = limits.min_instances,
            max = limits.max_instances,
            scale_up_cpu = limits.scale_up_cpu,
            scale_down_cpu = limits.scale_down_cpu,
            "Pool limits updated"
        );
        state.limits = limits;
        Ok(())
    }

    /// Evict every instance and terminate its process. Used at process exit.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<Arc<Instance>> = {
            let mut state = self.state();
            let drained = state.snapshot(false);
            state.instances.clear();
            state.order.clear();
            state.active = 0;
            drained
        };

        for instance in &drained {
            if let Err(e) = instance.process().terminate() {
                tracing::warn!(instance = %instance.id(), error = %e, "Failed to terminate backend process");
            }
        }
        metrics::record_pool(0, 0);
        tracing::info!(terminated = drained.len(), "Fleet shut down");
        drained.len()
    }
}
