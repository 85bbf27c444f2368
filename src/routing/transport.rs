//! Request forwarding to a selected instance.
//!
//! # Responsibilities
//! - Deliver an opaque payload to one instance and return its reply
//! - Bound every forward with a timeout
//! - Report failures as `FleetError::Transport` naming the instance
//!
//! # Design Decisions
//! - `Transport` is the seam between routing and the wire; the HTTP
//!   implementation uses a shared hyper-util client
//! - Non-2xx replies are failures; the body is not passed through

use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, Response};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::future::Future;
use std::time::Duration;

use crate::error::{FleetError, FleetResult};
use crate::load_balancer::Instance;
use crate::resilience::timeouts::bounded;

/// Delivers a payload to an instance.
pub trait Transport: Send + Sync + 'static {
    fn forward(
        &self,
        instance: &Instance,
        path: &str,
        payload: Bytes,
    ) -> impl Future<Output = FleetResult<Bytes>> + Send;
}

fn transport_error(instance: &Instance, reason: impl ToString) -> FleetError {
    FleetError::Transport {
        id: instance.id().to_string(),
        reason: reason.to_string(),
    }
}

/// Forwards payloads as HTTP `POST` requests.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    max_response_bytes: usize,
}

impl HttpTransport {
    pub fn new(timeout: Duration, max_response_bytes: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            timeout,
            max_response_bytes,
        }
    }
}

impl Transport for HttpTransport {
    async fn forward(&self, instance: &Instance, path: &str, payload: Bytes) -> FleetResult<Bytes> {
        let url = instance
            .endpoint(path)
            .map_err(|e| transport_error(instance, e))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(url.as_str())
            .header(header::USER_AGENT, "fleet-balancer")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(payload))
            .map_err(|e| transport_error(instance, e))?;

        let exchange = async {
            let response: Response<Incoming> = self
                .client
                .request(request)
                .await
                .map_err(|e| transport_error(instance, e))?;

            let status = response.status();
            let body = axum::body::to_bytes(Body::new(response.into_body()), self.max_response_bytes)
                .await
                .map_err(|e| transport_error(instance, e))?;

            if !status.is_success() {
                return Err(transport_error(instance, format!("backend returned {}", status)));
            }
            Ok(body)
        };

        bounded(self.timeout, exchange, || {
            transport_error(instance, format!("timed out after {:?}", self.timeout))
        })
        .await
    }
}
