//! Instance abstraction.
//!
//! # Responsibilities
//! - Represent a single backend worker and its address
//! - Track active connections (for Least Connections LB) and request count
//! - Hold the last observed health flag and CPU/memory gauges
//! - Own the backing process for the instance's whole lifetime

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

use crate::error::{FleetError, FleetResult};
use crate::process::ProcessHandle;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A single backend worker.
pub struct Instance {
    /// Stable identity, `host:port`.
    id: String,
    host: String,
    port: u16,

    /// Whether the instance is eligible for routing.
    healthy: AtomicBool,
    /// Unix millis of the last health update.
    last_health_check: AtomicU64,

    /// Last observed CPU percent, stored as `f64` bits.
    cpu_usage: AtomicU64,
    /// Last observed memory percent, stored as `f64` bits.
    memory_usage: AtomicU64,
    /// Unix millis of the last metrics update (0 = never).
    metrics_updated: AtomicU64,

    /// Requests routed here. Never decremented.
    request_count: AtomicU64,
    /// Requests currently in flight.
    active_connections: AtomicUsize,

    process: Box<dyn ProcessHandle>,
}

impl Instance {
    /// Create a new, healthy instance owning `process`.
    pub fn new(host: impl Into<String>, port: u16, process: Box<dyn ProcessHandle>) -> Self {
        let host = host.into();
        Self {
            id: format!("{}:{}", host, port),
            host,
            port,
            healthy: AtomicBool::new(true),
            last_health_check: AtomicU64::new(now_millis()),
            cpu_usage: AtomicU64::new(0f64.to_bits()),
            memory_usage: AtomicU64::new(0f64.to_bits()),
            metrics_updated: AtomicU64::new(0),
            request_count: AtomicU64::new(0),
            active_connections: AtomicUsize::new(0),
            process,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL for `path` (optionally with `?query`) on this instance.
    ///
    /// The authority always comes from the instance; `path` only ever sets
    /// the path and query, so `//other-host/...` stays on this instance.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("http://{}:{}", self.host, self.port))?;
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };
        url.set_path(path);
        url.set_query(query);
        Ok(url)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn last_health_check(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.last_health_check.load(Ordering::Relaxed))
    }

    pub fn cpu_usage(&self) -> f64 {
        f64::from_bits(self.cpu_usage.load(Ordering::Relaxed))
    }

    pub fn memory_usage(&self) -> f64 {
        f64::from_bits(self.memory_usage.load(Ordering::Relaxed))
    }

    /// Time since CPU/memory were last recorded, `None` if they never were.
    pub fn metrics_age(&self) -> Option<Duration> {
        match self.metrics_updated.load(Ordering::Relaxed) {
            0 => None,
            at => Some(Duration::from_millis(now_millis().saturating_sub(at))),
        }
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Set the health flag and stamp the check time. Returns the previous flag.
    ///
    /// Only the registry calls this, under its lock, so the active gauge stays consistent.
    pub(crate) fn set_health(&self, healthy: bool) -> bool {
        self.last_health_check.store(now_millis(), Ordering::Relaxed);
        self.healthy.swap(healthy, Ordering::AcqRel)
    }

    /// Overwrite the CPU/memory gauges.
    pub(crate) fn record_metrics(&self, cpu: f64, memory: f64) {
        self.cpu_usage.store(cpu.to_bits(), Ordering::Relaxed);
        self.memory_usage.store(memory.to_bits(), Ordering::Relaxed);
        self.metrics_updated.store(now_millis(), Ordering::Relaxed);
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active connection count, saturating at zero.
    pub fn dec_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Count a routed request and hold a connection slot until the guard drops.
    pub fn begin_request(self: &Arc<Self>) -> ConnectionGuard {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.inc_connections();
        ConnectionGuard {
            instance: self.clone(),
        }
    }

    /// Sample fresh CPU/memory telemetry from the backing process.
    pub fn sample_usage(&self) -> FleetResult<(f64, f64)> {
        match (self.process.cpu_usage(), self.process.memory_usage()) {
            (Some(cpu), Some(memory)) => Ok((cpu, memory)),
            _ => Err(FleetError::MetricsUnavailable(self.id.clone())),
        }
    }

    pub fn process(&self) -> &dyn ProcessHandle {
        self.process.as_ref()
    }

    /// Point-in-time view for the admin API.
    pub fn info(&self) -> InstanceInfo {
        InstanceInfo {
            id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            healthy: self.is_healthy(),
            last_health_check_unix_secs: self.last_health_check.load(Ordering::Relaxed) / 1000,
            request_count: self.request_count(),
            active_connections: self.active_connections(),
            cpu_usage: self.cpu_usage(),
            memory_usage: self.memory_usage(),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("healthy", &self.is_healthy())
            .field("active_connections", &self.active_connections())
            .field("request_count", &self.request_count())
            .finish()
    }
}

/// Serializable instance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub healthy: bool,
    pub last_health_check_unix_secs: u64,
    pub request_count: u64,
    pub active_connections: usize,
    pub cpu_usage: f64,
    pub memory_usage: f64,
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct ConnectionGuard {
    pub instance: Arc<Instance>,
}

impl Deref for ConnectionGuard {
    type Target = Instance;
    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.instance.dec_connections();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::instance;
    use super::*;

    #[test]
    fn test_identity_from_address() {
        let inst = instance(50051);
        assert_eq!(inst.id(), "127.0.0.1:50051");
        assert!(inst.is_healthy());
        assert_eq!(inst.endpoint("/work").unwrap().as_str(), "http://127.0.0.1:50051/work");
    }

    #[test]
    fn test_endpoint_keeps_instance_authority() {
        let inst = instance(50051);

        let url = inst.endpoint("//10.0.0.9:8080/steal").unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(50051));
        assert_eq!(url.path(), "//10.0.0.9:8080/steal");

        let url = inst.endpoint("http://10.0.0.9/steal?x=1").unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(50051));
        assert_eq!(url.query(), Some("x=1"));

        let url = inst.endpoint("/jobs?id=7").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:50051/jobs?id=7");

        assert_eq!(inst.endpoint("").unwrap().as_str(), "http://127.0.0.1:50051/");
    }

    #[test]
    fn test_guard_tracks_connections() {
        let inst = instance(50051);
        {
            let _g1 = inst.begin_request();
            let _g2 = inst.begin_request();
            assert_eq!(inst.active_connections(), 2);
        }
        assert_eq!(inst.active_connections(), 0);
        assert_eq!(inst.request_count(), 2);
    }

    #[test]
    fn test_connections_never_negative() {
        let inst = instance(50051);
        inst.dec_connections();
        assert_eq!(inst.active_connections(), 0);
    }

    #[test]
    fn test_metrics_age() {
        let inst = instance(50051);
        assert!(inst.metrics_age().is_none());
        inst.record_metrics(42.5, 10.0);
        assert_eq!(inst.cpu_usage(), 42.5);
        assert_eq!(inst.memory_usage(), 10.0);
        assert!(inst.metrics_age().unwrap() < Duration::from_secs(5));
    }

    #[test]
    fn test_sample_usage_without_telemetry() {
        let inst = instance(50051);
        assert_eq!(
            inst.sample_usage(),
            Err(FleetError::MetricsUnavailable("127.0.0.1:50051".into()))
        );
    }
}
