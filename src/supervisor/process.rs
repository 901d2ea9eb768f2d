//! nginx process lifecycle.

use std::process::ExitStatus;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::{Child, Command};

/// Errors from spawning or controlling the nginx process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    Spawn(std::io::Error),

    /// The child had no PID at spawn time.
    #[error("spawned process has no pid")]
    NoPid,

    #[error("failed to signal process {pid}: {source}")]
    Signal { pid: i32, source: nix::Error },

    #[error("failed waiting for process: {0}")]
    Wait(std::io::Error),
}

/// Signalling handle to a supervised process.
///
/// The master PID stays stable across configuration reloads, so the
/// handle can be copied out once at spawn time and used for the whole
/// serve lifetime.
#[derive(Debug, Clone, Copy)]
pub struct ProcessHandle {
    pid: Pid,
}

impl ProcessHandle {
    pub fn id(&self) -> i32 {
        self.pid.as_raw()
    }

    /// Deliver the in-place reload signal. nginx re-reads its
    /// configuration and keeps serving on the same PID.
    pub fn reload(&self) -> Result<(), ProcessError> {
        self.signal(Signal::SIGHUP)
    }

    /// Ask the process to shut down gracefully.
    pub fn terminate(&self) -> Result<(), ProcessError> {
        self.signal(Signal::SIGTERM)
    }

    fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        kill(self.pid, signal).map_err(|source| ProcessError::Signal {
            pid: self.pid.as_raw(),
            source,
        })
    }
}

/// A supervised nginx instance running in the foreground.
pub struct NginxProcess {
    child: Child,
    handle: ProcessHandle,
}

impl NginxProcess {
    /// Launch nginx in the foreground so it stays our direct child and
    /// its exit is observable.
    pub fn spawn() -> Result<Self, ProcessError> {
        let mut command = Command::new("nginx");
        command.args(["-g", "daemon off;"]);
        Self::launch(command)
    }

    /// Launch an arbitrary command under the same supervision.
    pub fn launch(mut command: Command) -> Result<Self, ProcessError> {
        command.kill_on_drop(true);
        let child = command.spawn().map_err(ProcessError::Spawn)?;
        let pid = child.id().ok_or(ProcessError::NoPid)?;

        Ok(Self {
            child,
            handle: ProcessHandle {
                pid: Pid::from_raw(pid as i32),
            },
        })
    }

    pub fn handle(&self) -> ProcessHandle {
        self.handle
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        self.child.wait().await.map_err(ProcessError::Wait)
    }

    /// Check for exit without blocking; `Ok(None)` while still running.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        self.child.try_wait().map_err(ProcessError::Wait)
    }
}
