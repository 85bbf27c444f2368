//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Registry → Fill to minimum → Health loop → (caller binds listeners)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Join health loop → Terminate backends
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, finish in-flight work, then processes

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{bootstrap, Fleet};
