//! Active health checking and autoscaling.
//!
//! # Responsibilities
//! - Periodically probe every instance, including unhealthy ones so recovery is seen
//! - Sample CPU/memory of reachable instances
//! - Submit one batched health update per cycle
//! - Request a replacement for every instance that just became unhealthy
//! - Drive scale up/down from CPU telemetry, at most one action per cycle
//!
//! # Design Decisions
//! - Probes fan out concurrently; registry writes stay serialized through its API
//! - The first tick is one full interval after start so fresh backends can bind
//! - Shutdown is observed between cycles; an in-flight cycle runs to completion

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::error::FleetError;
use crate::health::autoscale::{evaluate, ScaleDecision};
use crate::health::probe::HealthProbe;
use crate::health::state::Transition;
use crate::load_balancer::{FleetRegistry, HealthUpdate, Instance, PoolLimits};
use crate::observability::metrics;

/// What one cycle observed and did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub probed: usize,
    pub became_unhealthy: Vec<String>,
    pub recovered: Vec<String>,
    pub replacements: usize,
    pub scale: ScaleDecision,
    /// Instance whose CPU triggered `scale`.
    pub scale_trigger: Option<String>,
    pub topped_up: usize,
}

impl Default for CycleReport {
    fn default() -> Self {
        Self {
            probed: 0,
            became_unhealthy: Vec::new(),
            recovered: Vec::new(),
            replacements: 0,
            scale: ScaleDecision::Hold,
            scale_trigger: None,
            topped_up: 0,
        }
    }
}

pub struct HealthMonitor<P> {
    registry: Arc<FleetRegistry>,
    probe: P,
    interval: Duration,
    autoscale: bool,
}

impl<P: HealthProbe> HealthMonitor<P> {
    pub fn new(registry: Arc<FleetRegistry>, probe: P, interval: Duration, autoscale: bool) -> Self {
        Self {
            registry,
            probe,
            interval,
            autoscale,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            autoscale = self.autoscale,
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one probe/reconcile/scale pass.
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();
        let mut report = CycleReport::default();

        let roster = self.registry.all_instances();
        let limits = self.registry.limits();

        let outcomes = join_all(roster.iter().map(|instance| async move {
            let result = self.probe.probe(instance).await;
            (instance, result)
        }))
        .await;
        report.probed = outcomes.len();

        let mut updates = Vec::with_capacity(outcomes.len());
        let mut observed = Vec::with_capacity(outcomes.len());
        for (instance, result) in outcomes {
            let healthy = match result {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(instance = %instance.id(), error = %e, "Health probe failed");
                    false
                }
            };

            let (cpu, memory) = if healthy {
                match instance.sample_usage() {
                    Ok((cpu, memory)) => (Some(cpu), Some(memory)),
                    Err(e) => {
                        tracing::debug!(error = %e, "Keeping previous usage gauges");
                        (None, None)
                    }
                }
            } else {
                (None, None)
            };

            observed.push((instance.clone(), Transition::between(instance.is_healthy(), healthy)));
            updates.push(HealthUpdate {
                id: instance.id().to_string(),
                healthy,
                cpu_usage: cpu,
                memory_usage: memory,
            });
        }

        // Instances removed while probes were in flight come back as unknown.
        let unknown = self.registry.apply_health_batch(&updates);
        observed.retain(|(instance, _)| !unknown.iter().any(|id| id == instance.id()));

        for (instance, transition) in observed.iter().filter(|(_, t)| t.changed()) {
            match transition {
                Transition::BecameUnhealthy => report.became_unhealthy.push(instance.id().to_string()),
                Transition::Recovered => {
                    tracing::info!(instance = %instance.id(), "Instance recovered");
                    report.recovered.push(instance.id().to_string());
                }
                Transition::StayedHealthy | Transition::StayedUnhealthy => {}
            }
        }

        for failed in &report.became_unhealthy {
            match self.registry.spawn_instance().await {
                Ok(replacement) => {
                    tracing::info!(failed = %failed, replacement = %replacement.id(), "Replacement instance started");
                    report.replacements += 1;
                }
                Err(e) => {
                    tracing::warn!(failed = %failed, error = %e, "Could not replace unhealthy instance");
                }
            }
        }

        if self.autoscale {
            let healthy: Vec<&Arc<Instance>> = observed
                .iter()
                .filter(|(instance, _)| instance.is_healthy())
                .map(|(instance, _)| instance)
                .collect();
            self.autoscale_step(&healthy, &limits, &mut report).await;
        }

        let stats = self.registry.stats();
        if stats.total < stats.min {
            report.topped_up = self.registry.spawn_to_minimum().await;
        }

        let unhealthy = updates.iter().filter(|update| !update.healthy).count();
        metrics::record_health_cycle(start, report.probed, unhealthy);
        tracing::debug!(
            probed = report.probed,
            unhealthy,
            replacements = report.replacements,
            scale = report.scale.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Health cycle complete"
        );
        report
    }

    async fn autoscale_step(&self, healthy: &[&Arc<Instance>], limits: &PoolLimits, report: &mut CycleReport) {
        let active = self.registry.stats().active;

        for instance in healthy {
            // Instances without any recorded telemetry do not vote.
            if instance.metrics_age().is_none() {
                continue;
            }
            let cpu = instance.cpu_usage();
            let decision = evaluate(cpu, active, limits);

            let result = match decision {
                ScaleDecision::Hold => continue,
                ScaleDecision::ScaleUp => self.registry.spawn_instance().await.map(|added| {
                    tracing::info!(trigger = %instance.id(), cpu, added = %added.id(), "Scaled up");
                }),
                ScaleDecision::ScaleDown => self.registry.remove_instance(instance.id()).map(|_| {
                    tracing::info!(removed = %instance.id(), cpu, "Scaled down");
                }),
            };

            match result {
                Ok(()) => {
                    metrics::record_scale_event(decision.as_str());
                    report.scale = decision;
                    report.scale_trigger = Some(instance.id().to_string());
                }
                Err(FleetError::CapacityExceeded { .. }) | Err(FleetError::MinimumReached { .. }) => {
                    tracing::debug!(instance = %instance.id(), decision = decision.as_str(), "Scaling blocked by pool bounds");
                }
                Err(e) => {
                    tracing::warn!(instance = %instance.id(), error = %e, "Scaling action failed");
                }
            }
            break;
        }
    }
}
