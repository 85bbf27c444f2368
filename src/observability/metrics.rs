//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define control plane metrics (requests, latency, pool size, health, scaling)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-instance and aggregate metrics
//!
//! # Metrics
//! - `fleet_requests_total` (counter): routed requests by instance, outcome
//! - `fleet_request_duration_seconds` (histogram): forward latency
//! - `fleet_instances_total` / `fleet_instances_active` (gauges): pool size
//! - `fleet_instance_health` (gauge): 1=healthy, 0=unhealthy
//! - `fleet_instance_cpu_percent` / `fleet_instance_memory_percent` (gauges)
//! - `fleet_scale_events_total` (counter): autoscaling actions by direction
//! - `fleet_spawn_failures_total` (counter)
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op, so tests need no setup
//! - Labels are instance ids, bounded by `max_instances` plus churn

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one routed request.
pub fn record_request(instance: &str, outcome: &'static str, start: Instant) {
    counter!("fleet_requests_total", "instance" => instance.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("fleet_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_pool(total: usize, active: usize) {
    gauge!("fleet_instances_total").set(total as f64);
    gauge!("fleet_instances_active").set(active as f64);
}

pub fn record_instance_health(instance: &str, healthy: bool) {
    gauge!("fleet_instance_health", "instance" => instance.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_instance_usage(instance: &str, cpu: f64, memory: f64) {
    gauge!("fleet_instance_cpu_percent", "instance" => instance.to_string()).set(cpu);
    gauge!("fleet_instance_memory_percent", "instance" => instance.to_string()).set(memory);
}

/// Zero the per-instance gauges of an evicted instance.
pub fn record_instance_removed(instance: &str) {
    record_instance_health(instance, false);
    record_instance_usage(instance, 0.0, 0.0);
}

pub fn record_scale_event(direction: &'static str) {
    counter!("fleet_scale_events_total", "direction" => direction).increment(1);
}

pub fn record_spawn_failure() {
    counter!("fleet_spawn_failures_total").increment(1);
}

pub fn record_health_cycle(start: Instant, probed: usize, unhealthy: usize) {
    histogram!("fleet_health_cycle_duration_seconds").record(start.elapsed().as_secs_f64());
    gauge!("fleet_health_cycle_probed").set(probed as f64);
    gauge!("fleet_health_cycle_unhealthy").set(unhealthy as f64);
}
