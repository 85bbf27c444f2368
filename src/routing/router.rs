//! Request dispatch.
//!
//! # Responsibilities
//! - Take a snapshot of active instances from the registry
//! - Ask the current strategy for a target
//! - Hold a connection slot on the target while forwarding
//! - Return the reply tagged with the serving instance, or the failure
//!
//! # Design Decisions
//! - No retries and no queueing: `Unavailable` and transport failures are the result
//! - Snapshot-then-select is not atomic with removal; an instance removed
//!   mid-flight simply fails its forward
//! - No lock is held while forwarding

use axum::body::Bytes;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{FleetError, FleetResult};
use crate::load_balancer::{FleetRegistry, SharedStrategy};
use crate::observability::metrics;
use crate::routing::transport::Transport;

/// A reply and the instance that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub instance_id: String,
    pub payload: Bytes,
}

/// Routes each request to one active instance.
pub struct Router<T> {
    registry: Arc<FleetRegistry>,
    strategy: Arc<SharedStrategy>,
    transport: T,
}

impl<T: Transport> Router<T> {
    pub fn new(registry: Arc<FleetRegistry>, strategy: Arc<SharedStrategy>, transport: T) -> Self {
        Self {
            registry,
            strategy,
            transport,
        }
    }

    /// Forward `payload` to an instance chosen by the current strategy.
    pub async fn handle_request(&self, path: &str, payload: Bytes) -> FleetResult<Routed> {
        let start = Instant::now();

        let candidates = self.registry.active_instances();
        let Some(selected) = self.strategy.select(&candidates) else {
            tracing::warn!(candidates = candidates.len(), "No healthy instance to route to");
            metrics::record_request("none", "unavailable", start);
            return Err(FleetError::Unavailable);
        };

        let guard = selected.begin_request();
        tracing::debug!(
            instance = %guard.id(),
            active_connections = guard.active_connections(),
            strategy = self.strategy.name(),
            "Forwarding request"
        );

        let result = self.transport.forward(&guard, path, payload).await;
        drop(guard);

        match result {
            Ok(payload) => {
                metrics::record_request(selected.id(), "ok", start);
                Ok(Routed {
                    instance_id: selected.id().to_string(),
                    payload,
                })
            }
            Err(e) => {
                tracing::warn!(instance = %selected.id(), error = %e, "Forward failed");
                metrics::record_request(selected.id(), "error", start);
                Err(e)
            }
        }
    }

    pub fn registry(&self) -> &Arc<FleetRegistry> {
        &self.registry
    }

    pub fn strategy(&self) -> &Arc<SharedStrategy> {
        &self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::registry::testing::registry;
    use crate::load_balancer::{Instance, LeastConnections, RoundRobin};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Echoes payloads, failing for selected instances; can hold forwards open.
    #[derive(Default)]
    struct MockTransport {
        calls: AtomicUsize,
        failing: Mutex<HashSet<String>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl Transport for MockTransport {
        async fn forward(&self, instance: &Instance, _path: &str, payload: Bytes) -> FleetResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.map_err(|_| FleetError::Unavailable)?;
            }
            if self.failing.lock().unwrap().contains(instance.id()) {
                return Err(FleetError::Transport {
                    id: instance.id().to_string(),
                    reason: "connection refused".into(),
                });
            }
            Ok(payload)
        }
    }

    fn router(min: usize, transport: MockTransport) -> Router<MockTransport> {
        let (registry, _) = registry(min, 5);
        registry.fill_to_minimum();
        let strategy = Arc::new(SharedStrategy::new(Box::new(RoundRobin::new())));
        Router::new(Arc::new(registry), strategy, transport)
    }

    #[tokio::test]
    async fn test_empty_pool_unavailable() {
        let router = router(0, MockTransport::default());
        let err = router.handle_request("/", Bytes::from_static(b"hi")).await.unwrap_err();
        assert_eq!(err, FleetError::Unavailable);
        assert_eq!(router.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_unhealthy_unavailable() {
        let router = router(2, MockTransport::default());
        for instance in router.registry().all_instances() {
            router.registry().update_health(instance.id(), false, None, None);
        }
        let err = router.handle_request("/", Bytes::new()).await.unwrap_err();
        assert_eq!(err, FleetError::Unavailable);
    }

    #[tokio::test]
    async fn test_success_tags_instance_and_counts() {
        let router = router(2, MockTransport::default());

        let first = router.handle_request("/", Bytes::from_static(b"one")).await.unwrap();
        let second = router.handle_request("/", Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(first.instance_id, "127.0.0.1:50051");
        assert_eq!(first.payload, Bytes::from_static(b"one"));
        assert_eq!(second.instance_id, "127.0.0.1:50052");

        for instance in router.registry().all_instances() {
            assert_eq!(instance.request_count(), 1);
            assert_eq!(instance.active_connections(), 0);
        }
    }

    #[tokio::test]
    async fn test_failure_propagates_without_retry() {
        let transport = MockTransport::default();
        transport.failing.lock().unwrap().insert("127.0.0.1:50051".into());
        let router = router(2, transport);

        let err = router.handle_request("/", Bytes::new()).await.unwrap_err();
        assert_eq!(
            err,
            FleetError::Transport {
                id: "127.0.0.1:50051".into(),
                reason: "connection refused".into()
            }
        );
        assert_eq!(router.transport.calls.load(Ordering::SeqCst), 1);

        let failed = router.registry().find_by_id("127.0.0.1:50051").unwrap();
        assert_eq!(failed.active_connections(), 0);
        assert_eq!(failed.request_count(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_requests_steer_least_connections() {
        let gate = Arc::new(Semaphore::new(0));
        let transport = MockTransport {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let router = Arc::new(router(2, transport));
        router.strategy().replace(Box::new(LeastConnections::new()));

        let spawn = |router: Arc<Router<MockTransport>>| {
            tokio::spawn(async move { router.handle_request("/", Bytes::new()).await })
        };
        let wait_busy = |instance: Arc<Instance>| async move {
            for _ in 0..200 {
                if instance.active_connections() == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            assert_eq!(instance.active_connections(), 1);
        };

        let first = router.registry().find_by_id("127.0.0.1:50051").unwrap();
        let second = router.registry().find_by_id("127.0.0.1:50052").unwrap();

        let pending_first = spawn(router.clone());
        wait_busy(first.clone()).await;
        let pending_second = spawn(router.clone());
        wait_busy(second.clone()).await;

        gate.add_permits(2);
        assert_eq!(pending_first.await.unwrap().unwrap().instance_id, "127.0.0.1:50051");
        assert_eq!(pending_second.await.unwrap().unwrap().instance_id, "127.0.0.1:50052");
        assert_eq!(first.active_connections(), 0);
        assert_eq!(second.active_connections(), 0);
    }
}
