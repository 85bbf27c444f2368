//! Liveness probes.
//!
//! A probe only establishes that the instance accepts connections; no
//! protocol handshake is attempted.

use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::error::{FleetError, FleetResult};
use crate::load_balancer::Instance;
use crate::resilience::timeouts::bounded;

pub trait HealthProbe: Send + Sync + 'static {
    fn probe(&self, instance: &Instance) -> impl Future<Output = FleetResult<()>> + Send;
}

/// Bounded TCP connect to the instance address.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl HealthProbe for TcpProbe {
    async fn probe(&self, instance: &Instance) -> FleetResult<()> {
        let failed = |reason: String| FleetError::ProbeFailed {
            id: instance.id().to_string(),
            reason,
        };

        let connect = async {
            TcpStream::connect((instance.host(), instance.port()))
                .await
                .map(drop)
                .map_err(|e| failed(e.to_string()))
        };

        bounded(self.timeout, connect, || {
            failed(format!("no connection within {:?}", self.timeout))
        })
        .await
    }
}
