//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Expose the ID to handlers and log spans
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An ID supplied by the client is kept as is

use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Names the instance that served a routed request.
pub const X_INSTANCE_ID: &str = "x-instance-id";

/// Issues UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdGenerator;

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the request ID header, if any.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_uuids() {
        let request = Request::new(());
        let mut generator = RequestIdGenerator;

        let first = generator.make_request_id(&request).unwrap();
        let second = generator.make_request_id(&request).unwrap();
        let first = first.header_value().to_str().unwrap();

        assert!(Uuid::parse_str(first).is_ok());
        assert_ne!(first, second.header_value().to_str().unwrap());
    }

    #[test]
    fn test_request_id_fallback() {
        let request = Request::new(());
        assert_eq!(request_id(&request), "unknown");

        let request = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(())
            .unwrap();
        assert_eq!(request_id(&request), "abc-123");
    }
}
