//! OS child process backing a single instance.

use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::process::usage::UsageSampler;
use crate::process::ProcessHandle;

/// A backend started through the platform shell.
#[derive(Debug, Default)]
pub struct LocalProcess {
    child: Mutex<Option<Child>>,
    sampler: Mutex<Option<UsageSampler>>,
}

impl LocalProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// OS process id, once started.
    pub fn pid(&self) -> Option<u32> {
        self.child().as_ref().map(Child::id)
    }

    fn child(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sampler(&self) -> MutexGuard<'_, Option<UsageSampler>> {
        self.sampler.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The shell `exec`s the command, so the child pid is the backend itself.
/// Killing and sampling the child then reach the backend, not an idle shell.
#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(format!("exec {}", command));
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

impl ProcessHandle for LocalProcess {
    fn start(&self, command: &str) -> io::Result<()> {
        let mut slot = self.child();
        if slot.is_some() {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "process already started"));
        }

        let child = shell_command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        *self.sampler() = Some(UsageSampler::new(child.id()));
        *slot = Some(child);
        Ok(())
    }

    fn is_running(&self) -> bool {
        match self.child().as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn terminate(&self) -> io::Result<()> {
        let mut slot = self.child();
        let Some(child) = slot.as_mut() else {
            return Ok(());
        };

        if child.try_wait()?.is_some() {
            return Ok(());
        }
        child.kill()?;
        // Reap so the pid does not linger as a zombie.
        child.wait()?;
        Ok(())
    }

    fn exit_code(&self) -> Option<i32> {
        let mut slot = self.child();
        let child = slot.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        }
    }

    fn cpu_usage(&self) -> Option<f64> {
        if !self.is_running() {
            return None;
        }
        self.sampler().as_mut()?.cpu_percent()
    }

    fn memory_usage(&self) -> Option<f64> {
        if !self.is_running() {
            return None;
        }
        self.sampler().as_ref()?.memory_percent()
    }
}

impl Drop for LocalProcess {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            tracing::warn!(error = %e, "Failed to terminate backend process on drop");
        }
    }
}
