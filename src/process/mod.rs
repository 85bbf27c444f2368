//! Backend process management.
//!
//! # Data Flow
//! ```text
//! registry.add_instance()
//!     → ProcessLauncher::launch(port)
//!         → render command template with {port}
//!         → local.rs (spawn OS child process)
//!     → Box<dyn ProcessHandle> owned by the new Instance
//!
//! health loop
//!     → ProcessHandle::cpu_usage()/memory_usage()
//!         → usage.rs (sample /proc on Linux)
//! ```
//!
//! # Design Decisions
//! - The registry only sees the `ProcessHandle` / `ProcessLauncher` traits
//! - Platform specifics stay in `local.rs` and `usage.rs`
//! - One handle per instance for its whole lifetime; no process swap

pub mod local;
pub mod usage;

use std::fmt;
use std::io;

use crate::error::{FleetError, FleetResult};

pub use local::LocalProcess;

/// Control over one backend worker process.
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    /// Start the process from a full command line.
    fn start(&self, command: &str) -> io::Result<()>;

    /// Whether the process is still alive.
    fn is_running(&self) -> bool;

    /// Stop the process. Safe to call more than once.
    fn terminate(&self) -> io::Result<()>;

    /// Exit code once the process has exited, `None` while running or when killed by a signal.
    fn exit_code(&self) -> Option<i32>;

    /// CPU usage in percent of one core, `None` when it cannot be sampled.
    fn cpu_usage(&self) -> Option<f64>;

    /// Resident memory in percent of total system memory, `None` when it cannot be sampled.
    fn memory_usage(&self) -> Option<f64>;
}

/// Starts a backend process listening on a given port.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, port: u16) -> FleetResult<Box<dyn ProcessHandle>>;
}

/// Launches backends by rendering a command template and starting a [`LocalProcess`].
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    template: String,
}

impl CommandLauncher {
    /// `template` must contain `{port}`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Command line for a backend on `port`.
    pub fn render(&self, port: u16) -> String {
        self.template.replace("{port}", &port.to_string())
    }
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, port: u16) -> FleetResult<Box<dyn ProcessHandle>> {
        let command = self.render(port);
        let process = LocalProcess::new();

        process
            .start(&command)
            .map_err(|e| FleetError::SpawnFailed(format!("{}: {}", command, e)))?;

        tracing::info!(port, command = %command, pid = ?process.pid(), "Backend process started");
        Ok(Box::new(process))
    }
}
