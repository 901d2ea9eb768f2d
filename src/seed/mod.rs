//! Tile enumeration and cache warming.

use thiserror::Error;

use crate::config::Config;
use crate::plugins::{PluginError, PluginRegistry};

pub mod grid;
pub mod pipeline;

pub use grid::{coverage, tile_at, Bounds, TileCoord, TileRange};
pub use pipeline::{SeedProgress, SeedReport, SeedTask, Seeder};

/// Errors that abort a seeding run. Individual tile failures never do;
/// they are tallied in the [`SeedReport`].
#[derive(Debug, Error)]
pub enum SeedRunError {
    /// The requested URL matches no configured proxy.
    #[error("no configured proxy with url '{0}'")]
    UnknownProxy(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Warm every configured proxy through `target`, or only the proxy
/// whose URL equals `filter`. Returns the combined tally.
pub async fn seed_proxies(
    config: &Config,
    filter: Option<&str>,
    target: &str,
    registry: &PluginRegistry,
) -> Result<SeedReport, SeedRunError> {
    let mut matched = false;
    let mut total = SeedReport::default();

    for proxy in &config.proxies {
        if let Some(url) = filter {
            if proxy.url.as_str() != url {
                continue;
            }
        }
        matched = true;

        let plugin = registry.resolve(&proxy.cache.plugin.name)?;
        tracing::info!(url = %proxy.url, plugin = plugin.name(), "Seeding proxy");
        let report = plugin.seed(proxy, target).await?;
        tracing::info!(
            url = %proxy.url,
            completed = report.completed,
            failed = report.failed,
            "Seeding finished"
        );
        total.completed += report.completed;
        total.failed += report.failed;
    }

    if let Some(url) = filter {
        if !matched {
            return Err(SeedRunError::UnknownProxy(url.to_string()));
        }
    }
    Ok(total)
}
