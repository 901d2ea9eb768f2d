//! Bounded-concurrency cache warming.
//!
//! # Responsibilities
//! - Issue one warming request per tile against the local proxy
//! - Cap in-flight requests at the configured concurrency
//! - Drain each batch fully before the caller moves to the next zoom
//! - Record progress safely under concurrent task completion
//!
//! # Design Decisions
//! - Warming is best-effort: a failed tile is logged and counted, never
//!   aborts the run
//! - A request only counts as seeded when the proxy proves the bypass
//!   happened (a hit would mean nothing was warmed)

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::nginx::{BYPASS_PROOF_HEADER, PURGE_HEADER};
use crate::seed::grid::TileCoord;

/// One cache-warming request: a tile and the URL that warms it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedTask {
    pub tile: TileCoord,
    pub url: String,
}

/// Why a single warming request failed.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The proxy answered without proving a cache bypass took place.
    #[error("cache bypass not confirmed (proof header was {value:?})")]
    BypassNotConfirmed { value: Option<String> },
}

/// Shared progress counters, updated by every task completion.
#[derive(Debug, Default)]
pub struct SeedProgress {
    completed: AtomicU64,
    failed: AtomicU64,
    zoom_total: AtomicU64,
}

impl SeedProgress {
    /// Reset the per-zoom total at the start of a new batch. The
    /// completed and failed counts keep accumulating across zooms.
    pub fn begin_zoom(&self, total: u64) {
        self.zoom_total.store(total, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks finished so far, successes and failures alike.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn zoom_total(&self) -> u64 {
        self.zoom_total.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> SeedReport {
        SeedReport {
            completed: self.completed(),
            failed: self.failed(),
        }
    }
}

/// Final tally of a seeding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    pub completed: u64,
    pub failed: u64,
}

/// Executes batches of seed tasks with a hard cap on in-flight requests.
pub struct Seeder {
    client: Client,
    concurrency: usize,
}

impl Seeder {
    /// `concurrency` caps in-flight requests; values below one are
    /// raised to one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            client: Client::new(),
            concurrency: concurrency.max(1),
        }
    }

    /// Run one zoom level's batch to completion. Returns only after
    /// every task has finished, so callers can rely on zoom levels
    /// seeding strictly in order.
    pub async fn run_zoom(&self, zoom: u8, tasks: Vec<SeedTask>, progress: &SeedProgress) {
        progress.begin_zoom(tasks.len() as u64);
        tracing::info!(zoom, tiles = tasks.len(), "Seeding zoom level");

        stream::iter(tasks)
            .for_each_concurrent(self.concurrency, |task| async move {
                match self.warm_tile(&task).await {
                    Ok(()) => {
                        debug!(url = %task.url, "Seeded tile");
                        progress.record_success();
                    }
                    Err(e) => {
                        warn!(url = %task.url, error = %e, "Failed to seed tile");
                        progress.record_failure();
                    }
                }
            })
            .await;

        tracing::info!(
            zoom,
            completed = progress.completed(),
            failed = progress.failed(),
            "Zoom level drained"
        );
    }

    async fn warm_tile(&self, task: &SeedTask) -> Result<(), SeedError> {
        let response = self
            .client
            .get(&task.url)
            .header(PURGE_HEADER, "1")
            .send()
            .await?
            .error_for_status()?;

        let proof = response
            .headers()
            .get(BYPASS_PROOF_HEADER)
            .and_then(|v| v.to_str().ok());
        if proof != Some("1") {
            return Err(SeedError::BypassNotConfirmed {
                value: proof.map(str::to_string),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counts_accumulate_across_zooms() {
        let progress = SeedProgress::default();

        progress.begin_zoom(1);
        progress.record_success();
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.zoom_total(), 1);

        progress.begin_zoom(4);
        progress.record_success();
        progress.record_failure();
        assert_eq!(progress.completed(), 3);
        assert_eq!(progress.failed(), 1);
        assert_eq!(progress.zoom_total(), 4);
    }

    #[test]
    fn test_report_snapshot() {
        let progress = SeedProgress::default();
        progress.record_success();
        progress.record_failure();

        let report = progress.report();
        assert_eq!(
            report,
            SeedReport {
                completed: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn test_zero_concurrency_is_raised_to_one() {
        let seeder = Seeder::new(0);
        assert_eq!(seeder.concurrency, 1);
    }

    #[test]
    fn test_bypass_error_display() {
        let err = SeedError::BypassNotConfirmed {
            value: Some("0".to_string()),
        };
        assert!(err.to_string().contains("not confirmed"));

        let err = SeedError::BypassNotConfirmed { value: None };
        assert!(err.to_string().contains("None"));
    }
}
