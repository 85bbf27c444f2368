//! Shared utilities for integration testing.
//!
//! `MockLauncher` stands in for real backend executables: every launch binds
//! the allocated port and serves an echo backend on it from the test runtime.

#![allow(dead_code)]

use axum::{body::Bytes, extract::State, http::StatusCode, Router};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use fleet_balancer::error::{FleetError, FleetResult};
use fleet_balancer::load_balancer::{FleetRegistry, PoolLimits};
use fleet_balancer::process::{ProcessHandle, ProcessLauncher};

/// One in-process backend bound to a port.
#[derive(Debug)]
pub struct MockBackend {
    pub port: u16,
    server: Mutex<Option<JoinHandle<()>>>,
    usage: Mutex<Option<(f64, f64)>>,
    /// Status returned to forwarded requests.
    status: Arc<AtomicU16>,
    terminated: AtomicBool,
}

impl MockBackend {
    fn serve(port: u16) -> io::Result<Arc<Self>> {
        let listener = std::net::TcpListener::bind(("127.0.0.1", port))?;
        listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(listener)?;

        let status = Arc::new(AtomicU16::new(200));
        let app = Router::new().fallback(echo).with_state(status.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Arc::new(Self {
            port,
            server: Mutex::new(Some(server)),
            usage: Mutex::new(None),
            status,
            terminated: AtomicBool::new(false),
        }))
    }

    pub fn set_usage(&self, cpu: f64, memory: f64) {
        *self.usage.lock().unwrap() = Some((cpu, memory));
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    /// Stop accepting connections, as if the process crashed. Waits until the port is closed.
    pub async fn crash(&self) {
        let server = self.server.lock().unwrap().take();
        if let Some(server) = server {
            server.abort();
            let _ = server.await;
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

async fn echo(State(status): State<Arc<AtomicU16>>, body: Bytes) -> (StatusCode, Bytes) {
    let status = StatusCode::from_u16(status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK);
    (status, body)
}

#[derive(Debug)]
struct MockProcess(Arc<MockBackend>);

impl ProcessHandle for MockProcess {
    fn start(&self, _command: &str) -> io::Result<()> {
        Ok(())
    }

    fn is_running(&self) -> bool {
        !self.0.is_terminated()
    }

    fn terminate(&self) -> io::Result<()> {
        self.0.terminated.store(true, Ordering::SeqCst);
        if let Some(server) = self.0.server.lock().unwrap().take() {
            server.abort();
        }
        Ok(())
    }

    fn exit_code(&self) -> Option<i32> {
        None
    }

    fn cpu_usage(&self) -> Option<f64> {
        self.0.usage.lock().unwrap().map(|(cpu, _)| cpu)
    }

    fn memory_usage(&self) -> Option<f64> {
        self.0.usage.lock().unwrap().map(|(_, memory)| memory)
    }
}

/// Launches `MockBackend`s and keeps a handle on each for the test to drive.
#[derive(Debug, Default)]
pub struct MockLauncher {
    backends: Mutex<HashMap<u16, Arc<MockBackend>>>,
}

impl MockLauncher {
    pub fn backend(&self, port: u16) -> Arc<MockBackend> {
        self.backends.lock().unwrap()[&port].clone()
    }

    pub fn launched(&self) -> usize {
        self.backends.lock().unwrap().len()
    }

    pub fn set_usage_all(&self, cpu: f64, memory: f64) {
        for backend in self.backends.lock().unwrap().values() {
            backend.set_usage(cpu, memory);
        }
    }
}

impl ProcessLauncher for MockLauncher {
    fn launch(&self, port: u16) -> FleetResult<Box<dyn ProcessHandle>> {
        let backend = MockBackend::serve(port).map_err(|e| FleetError::SpawnFailed(e.to_string()))?;
        self.backends.lock().unwrap().insert(port, backend.clone());
        Ok(Box::new(MockProcess(backend)))
    }
}

pub fn limits(min: usize, max: usize) -> PoolLimits {
    PoolLimits {
        min_instances: min,
        max_instances: max,
        scale_up_cpu: 80.0,
        scale_down_cpu: 20.0,
    }
}

/// Registry on `127.0.0.1` whose backends are served by a `MockLauncher`, filled to `min`.
pub fn mock_fleet(start_port: u16, min: usize, max: usize) -> (Arc<FleetRegistry>, Arc<MockLauncher>) {
    let launcher = Arc::new(MockLauncher::default());
    let registry = Arc::new(FleetRegistry::new(
        "127.0.0.1",
        start_port,
        limits(min, max),
        launcher.clone(),
    ));
    registry.fill_to_minimum();
    (registry, launcher)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
