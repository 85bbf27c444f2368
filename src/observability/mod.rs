//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (instance, port, active, total) on every lifecycle event
//! - Request ID flows from the inbound request into the forward log lines
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
