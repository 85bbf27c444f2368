//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound payload
//!     → router.rs (active snapshot → strategy → connection guard)
//!     → transport.rs (forward to the selected instance, bounded by timeout)
//!     → Return: reply + serving instance id, or the failure as is
//! ```
//!
//! # Design Decisions
//! - Routing never holds the registry lock across I/O
//! - Deterministic for a given strategy state; no retries

pub mod router;
pub mod transport;

pub use router::{Routed, Router};
pub use transport::{HttpTransport, Transport};
