//! Inbound HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → routing::Router (pick instance, forward payload)
//!     → response.rs (error mapping) or payload + x-instance-id
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdGenerator, X_INSTANCE_ID, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
