//! Definition file watcher for live reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches the proxy definition file and emits one event per change.
///
/// Events carry no payload; the supervisor's control loop decides what a
/// change means (reload the definitions, regenerate, signal nginx). The
/// loop must tolerate duplicate events since editors often fire several
/// notifications per save.
pub struct ConfigWatcher {
    path: PathBuf,
    event_tx: mpsc::UnboundedSender<()>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for change events.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                event_tx,
            },
            event_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive; dropping it stops
    /// watching and closes the event channel.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.event_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Definition file change detected");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
