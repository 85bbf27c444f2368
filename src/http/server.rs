//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the inbound handler
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Bind server to listener
//! - Dispatch request payloads to the routing engine
//!
//! # Design Decisions
//! - Any method on any path is routed; the path is forwarded to the instance
//! - The outer timeout sits above the forward timeout so the router reports first

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::FleetConfig;
use crate::http::request::{request_id, RequestIdGenerator, X_INSTANCE_ID, X_REQUEST_ID};
use crate::load_balancer::{FleetRegistry, SharedStrategy};
use crate::routing::{HttpTransport, Router as FleetRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<FleetRouter<HttpTransport>>,
}

/// Inbound HTTP server.
pub struct HttpServer {
    app: Router,
}

impl HttpServer {
    pub fn new(config: &FleetConfig, registry: Arc<FleetRegistry>, strategy: Arc<SharedStrategy>) -> Self {
        let transport = HttpTransport::new(
            Duration::from_secs(config.timeouts.forward_secs),
            config.listener.max_body_bytes,
        );
        let state = AppState {
            router: Arc::new(FleetRouter::new(registry, strategy, transport)),
        };

        Self {
            app: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &FleetConfig, state: AppState) -> Router {
        let request_timeout = Duration::from_secs(config.timeouts.forward_secs + 1);

        Router::new()
            .route("/", any(route_handler))
            .route("/{*path}", any(route_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(RequestIdGenerator))
    }

    /// The configured router, for serving or for driving in tests.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Serve until the shutdown signal fires. In-flight requests are allowed to finish.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

/// Forward the body to an instance; reply with its payload and identity.
async fn route_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    tracing::debug!(
        request_id = headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()).unwrap_or("unknown"),
        path,
        bytes = body.len(),
        "Routing request"
    );

    match state.router.handle_request(path, body).await {
        Ok(routed) => {
            let mut response = (StatusCode::OK, routed.payload).into_response();
            if let Ok(value) = HeaderValue::from_str(&routed.instance_id) {
                response.headers_mut().insert(X_INSTANCE_ID, value);
            }
            response
        }
        Err(e) => e.into_response(),
    }
}
