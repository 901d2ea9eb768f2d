//! nginx supervision with live configuration reload.
//!
//! # Data Flow
//! ```text
//! serve:
//!     regenerate nginx.conf (fatal on failure)
//!     → spawn nginx in the foreground
//!     → watch the definition file
//!     → control loop:
//!         change event  → regenerate; on success SIGHUP, on failure
//!                         log and keep the previous config running
//!         nginx exits   → fatal, serve returns the exit status
//!         interrupt     → stop watching, SIGTERM nginx, await exit
//! ```
//!
//! # Design Decisions
//! - Reload cycles are serialized by the control loop; at most one
//!   regeneration is in flight per watched path
//! - A failed regeneration never touches the config file on disk, so
//!   nginx cannot observe a half-written configuration
//! - An unexpected nginx exit is not auto-restarted; restart policy
//!   belongs to the surrounding deployment

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

use crate::config::{load_config, ConfigError};
use crate::nginx::builder::{render_nginx_config, BuildError};
use crate::plugins::PluginRegistry;

pub mod process;
pub mod watcher;

pub use process::{NginxProcess, ProcessError, ProcessHandle};
pub use watcher::ConfigWatcher;

/// Where nginx expects its configuration.
pub const NGINX_CONF_PATH: &str = "/etc/nginx/nginx.conf";

/// Errors from one regenerate cycle: load, validate, compile, write.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Fatal errors ending the serve operation.
#[derive(Debug, Error)]
pub enum ServeError {
    /// nginx is never started without a valid configuration.
    #[error("initial configuration generation failed: {0}")]
    InitialConfig(GenerateError),

    #[error("failed to start file watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("nginx exited unexpectedly ({status})")]
    ProcessExited { status: ExitStatus },
}

enum Exit {
    Interrupted,
    ProcessEnded(Result<ExitStatus, ProcessError>),
}

/// Owns the serve lifecycle: config generation, the nginx process, and
/// the reload loop.
pub struct Supervisor {
    definitions: PathBuf,
    output: PathBuf,
    registry: PluginRegistry,
}

impl Supervisor {
    pub fn new(definitions: &Path, output: &Path, registry: PluginRegistry) -> Self {
        Self {
            definitions: definitions.to_path_buf(),
            output: output.to_path_buf(),
            registry,
        }
    }

    /// Regenerate the nginx configuration from the definition file.
    ///
    /// The output file is only written once the whole chain (load,
    /// validate, compile, render) has succeeded, so a bad edit leaves
    /// the previous configuration in place.
    pub fn regenerate_config(&self) -> Result<(), GenerateError> {
        let config = load_config(&self.definitions)?;
        let rendered = render_nginx_config(&config, &self.registry)?;

        fs::write(&self.output, rendered).map_err(|source| GenerateError::Write {
            path: self.output.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %self.output.display(), "Configuration written");
        Ok(())
    }

    /// One regenerate-then-signal cycle, triggered by a change event.
    /// Failures are logged and the running process is left untouched.
    pub fn reload_cycle(&self, handle: ProcessHandle) {
        match self.regenerate_config() {
            Ok(()) => {
                tracing::info!(pid = handle.id(), "Configuration regenerated, reloading nginx");
                if let Err(e) = handle.reload() {
                    tracing::error!(error = %e, "Failed to deliver reload signal");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to regenerate configuration, keeping previous");
            }
        }
    }

    /// Run nginx under supervision until it exits or the operator
    /// interrupts.
    pub async fn serve(&self) -> Result<(), ServeError> {
        self.regenerate_config().map_err(ServeError::InitialConfig)?;

        let mut process = NginxProcess::spawn()?;
        let handle = process.handle();
        tracing::info!(pid = handle.id(), "nginx started");

        let (watcher, mut changes) = ConfigWatcher::new(&self.definitions);
        let watcher_handle = watcher.run()?;

        let exit = loop {
            tokio::select! {
                status = process.wait() => {
                    break Exit::ProcessEnded(status);
                }
                change = changes.recv() => {
                    if change.is_some() {
                        self.reload_cycle(handle);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    break Exit::Interrupted;
                }
            }
        };

        // Stop watching before touching the process so a late edit
        // cannot signal a terminating server.
        drop(watcher_handle);

        match exit {
            Exit::Interrupted => {
                tracing::info!("Interrupt received, shutting down");
                if let Err(e) = handle.terminate() {
                    tracing::warn!(error = %e, "Failed to deliver termination signal");
                }
                match process.wait().await {
                    Ok(status) => tracing::info!(%status, "nginx stopped"),
                    Err(e) => tracing::warn!(error = %e, "Failed waiting for nginx to stop"),
                }
                Ok(())
            }
            Exit::ProcessEnded(Ok(status)) => {
                tracing::error!(%status, "nginx exited unexpectedly");
                Err(ServeError::ProcessExited { status })
            }
            Exit::ProcessEnded(Err(e)) => Err(e.into()),
        }
    }
}
