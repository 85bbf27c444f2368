//! Administrative API.
//!
//! # Responsibilities
//! - Inspect instances and pool counts
//! - Add and remove instances on demand
//! - Accept batched health/metrics reports
//! - Adjust pool bounds, thresholds and the selection strategy at runtime
//!
//! # Design Decisions
//! - Bearer-token auth on every route
//! - Registry refusals surface as explicit status codes, never retried

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, put},
    Router,
};
use std::sync::Arc;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::StrategyConfig;
use crate::load_balancer::{FleetRegistry, SharedStrategy};

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<FleetRegistry>,
    pub strategy: Arc<SharedStrategy>,
    /// Weights used when a strategy is rebuilt at runtime.
    pub strategy_config: StrategyConfig,
    pub api_key: Arc<String>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/instances", get(list_instances).post(add_instance))
        .route("/admin/instances/{id}", delete(remove_instance))
        .route("/admin/health", put(update_health))
        .route("/admin/pool", get(get_pool).put(update_pool))
        .route("/admin/strategy", put(update_strategy))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::registry::testing::registry;
    use crate::load_balancer::RoundRobin;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn state(min: usize, max: usize) -> AdminState {
        let (registry, _) = registry(min, max);
        registry.fill_to_minimum();
        AdminState {
            registry: Arc::new(registry),
            strategy: Arc::new(SharedStrategy::new(Box::new(RoundRobin::new()))),
            strategy_config: StrategyConfig::default(),
            api_key: Arc::new(KEY.to_string()),
        }
    }

    fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", KEY));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_missing_or_wrong_key() {
        let app = setup_admin_router(state(1, 5));

        let response = app
            .clone()
            .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::get("/admin/status")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_and_listing() {
        let app = setup_admin_router(state(2, 5));

        let status = json(app.clone().oneshot(request("GET", "/admin/status", None)).await.unwrap()).await;
        assert_eq!(status["strategy"], "round_robin");
        assert_eq!(status["pool"]["total"], 2);
        assert_eq!(status["pool"]["active"], 2);

        let listing = json(app.oneshot(request("GET", "/admin/instances", None)).await.unwrap()).await;
        let listing = listing.as_array().unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0]["id"], "127.0.0.1:50051");
        assert_eq!(listing[0]["healthy"], true);
    }

    #[tokio::test]
    async fn test_add_until_capacity() {
        let app = setup_admin_router(state(1, 2));

        let response = app.clone().oneshot(request("POST", "/admin/instances", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json(response).await["id"], "127.0.0.1:50052");

        let response = app.oneshot(request("POST", "/admin/instances", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_remove_outcomes() {
        let state = state(1, 5);
        state.registry.add_instance().unwrap();
        let app = setup_admin_router(state.clone());

        let response = app
            .clone()
            .oneshot(request("DELETE", "/admin/instances/127.0.0.1:50052", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.registry.find_by_id("127.0.0.1:50052").is_none());

        let response = app
            .clone()
            .oneshot(request("DELETE", "/admin/instances/127.0.0.1:50052", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request("DELETE", "/admin/instances/127.0.0.1:50051", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_health_batch_reports_unknown() {
        let state = state(2, 5);
        let app = setup_admin_router(state.clone());

        let body = serde_json::json!([
            { "id": "127.0.0.1:50051", "healthy": false },
            { "id": "127.0.0.1:50052", "healthy": true, "cpu_usage": 42.0, "memory_usage": 12.5 },
            { "id": "ghost:1", "healthy": true }
        ]);
        let result = json(app.oneshot(request("PUT", "/admin/health", Some(body))).await.unwrap()).await;

        assert_eq!(result["applied"], 2);
        assert_eq!(result["not_found"], serde_json::json!(["ghost:1"]));
        assert_eq!(state.registry.stats().active, 1);
        assert_eq!(state.registry.find_by_id("127.0.0.1:50052").unwrap().cpu_usage(), 42.0);
    }

    #[tokio::test]
    async fn test_pool_update_validated() {
        let state = state(2, 5);
        let app = setup_admin_router(state.clone());

        let body = serde_json::json!({ "max_instances": 8, "scale_up_cpu": 90.0 });
        let response = app.clone().oneshot(request("PUT", "/admin/pool", Some(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view = json(response).await;
        assert_eq!(view["max"], 8);
        assert_eq!(view["scale_up_cpu"], 90.0);
        assert_eq!(view["min"], 2);

        let body = serde_json::json!({ "min_instances": 10 });
        let response = app.clone().oneshot(request("PUT", "/admin/pool", Some(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.registry.limits().min_instances, 2);

        // A zero minimum would let the pool be drained completely.
        let body = serde_json::json!({ "min_instances": 0 });
        let response = app.oneshot(request("PUT", "/admin/pool", Some(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.registry.limits().min_instances, 2);
    }

    #[tokio::test]
    async fn test_strategy_swap() {
        let state = state(1, 5);
        let app = setup_admin_router(state.clone());

        let body = serde_json::json!({ "strategy": "least_connections" });
        let response = app.oneshot(request("PUT", "/admin/strategy", Some(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.strategy.name(), "least_connections");
    }
}
