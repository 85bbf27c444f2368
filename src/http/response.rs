//! Error responses.
//!
//! # Responsibilities
//! - Map fleet errors to HTTP status codes
//! - Render a JSON `{"error": ...}` body
//!
//! # Design Decisions
//! - Pool-bound refusals are conflicts (409), not server errors
//! - Transport failures are gateway errors (502); nothing is retried here

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::FleetError;

pub fn status_for(error: &FleetError) -> StatusCode {
    match error {
        FleetError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        FleetError::Transport { .. } => StatusCode::BAD_GATEWAY,
        FleetError::CapacityExceeded { .. } | FleetError::MinimumReached { .. } => StatusCode::CONFLICT,
        FleetError::NotFound(_) => StatusCode::NOT_FOUND,
        FleetError::InvalidLimits(_) => StatusCode::BAD_REQUEST,
        FleetError::ProbeFailed { .. } | FleetError::MetricsUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        FleetError::SpawnFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for FleetError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
