//! Fleet balancer library.
//!
//! A load-balancing control plane: routes opaque requests to a pool of
//! locally spawned backend processes and keeps that pool healthy and sized.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌──────────┐    ┌──────────┐    ┌────────────┐
//!     ─────────────────────▶│   http   │───▶│ routing  │───▶│  strategy  │
//!                           │  server  │    │  router  │    │ (rr/lc/rb) │
//!                           └──────────┘    └────┬─────┘    └────────────┘
//!                                                │ forward
//!                                                ▼
//!                           ┌──────────────────────────────┐
//!                           │        fleet registry        │◀──── admin API
//!                           │  instances · bounds · gauge  │
//!                           └──────────────┬───────────────┘
//!                                          │ spawn / terminate
//!                       health loop ──────▶│
//!               (probe · reconcile · scale) ▼
//!                                   backend processes
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod process;
pub mod resilience;
pub mod routing;

pub use config::FleetConfig;
pub use error::{FleetError, FleetResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{FleetRegistry, Instance, SharedStrategy};
