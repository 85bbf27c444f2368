//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + command-line overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FleetConfig (validated, immutable)
//!     → sections handed to the registry, router and health loop
//! ```
//!
//! # Design Decisions
//! - Config is an explicit value built once at startup; there is no global holder
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Pool bounds and CPU thresholds are copied into the registry at startup;
//!   the admin API changes them there, never in the config value

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AdminConfig;
pub use schema::AutoscaleConfig;
pub use schema::FleetConfig;
pub use schema::HealthCheckConfig;
pub use schema::ListenerConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::PoolConfig;
pub use schema::StrategyConfig;
pub use schema::TimeoutConfig;
