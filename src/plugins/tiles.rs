//! Slippy-map tile cache plugin.
//!
//! Matches tile requests whose zoom falls inside the configured range
//! and warms the cache by walking the tile grid of a bounding box,
//! zoom level by zoom level.

use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::config::ProxyConfig;
use crate::nginx::directive::Directive;
use crate::plugins::{cache_policy, CachePlugin, PluginError};
use crate::seed::{coverage, Bounds, SeedProgress, SeedReport, SeedTask, Seeder, TileCoord};

/// Tile indices are kept in u32, which caps the usable zoom range.
const MAX_ZOOM: u8 = 30;

/// Plugin-private settings, parsed from the proxy's metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct TileMeta {
    /// Bounding box to warm, as `[west, south, east, north]` degrees.
    pub bounds: [f64; 4],

    /// Path template appended to the proxy's path prefix, with `{x}`,
    /// `{y}` and `{z}` placeholders (e.g. `{z}/{x}/{y}.png`).
    pub format: String,

    /// In-flight warming requests per zoom level.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub min_zoom: u8,

    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
}

fn default_concurrency() -> usize {
    2
}

fn default_max_zoom() -> u8 {
    14
}

impl TileMeta {
    /// Parse and validate the metadata bag of a tiled proxy.
    pub fn parse(metadata: &serde_json::Value) -> Result<Self, PluginError> {
        let invalid = |reason: String| PluginError::Metadata {
            plugin: "tiled",
            reason,
        };

        let meta: TileMeta =
            serde_json::from_value(metadata.clone()).map_err(|e| invalid(e.to_string()))?;

        if meta.min_zoom > meta.max_zoom {
            return Err(invalid(format!(
                "min_zoom {} exceeds max_zoom {}",
                meta.min_zoom, meta.max_zoom
            )));
        }
        if meta.max_zoom > MAX_ZOOM {
            return Err(invalid(format!(
                "max_zoom {} exceeds supported maximum {}",
                meta.max_zoom, MAX_ZOOM
            )));
        }
        if meta.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1".to_string()));
        }
        Ok(meta)
    }

    /// Regex alternation of every zoom level in range, e.g. `0|1|2`.
    fn zoom_pattern(&self) -> String {
        (self.min_zoom..=self.max_zoom)
            .map(|z| z.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Substitute tile coordinates into the path template.
fn tile_path(template: &str, tile: TileCoord) -> String {
    template
        .replace("{z}", &tile.z.to_string())
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
}

/// All warming tasks for one zoom level, in grid order.
fn plan_zoom(meta: &TileMeta, base: &str, zoom: u8) -> Vec<SeedTask> {
    let bounds = Bounds::from_bbox(meta.bounds);
    coverage(&bounds, zoom)
        .iter()
        .flat_map(|range| range.tiles())
        .map(|tile| SeedTask {
            url: format!("{}{}", base, tile_path(&meta.format, tile)),
            tile,
        })
        .collect()
}

#[derive(Debug)]
pub struct TiledCache;

impl CachePlugin for TiledCache {
    fn name(&self) -> &'static str {
        "tiled"
    }

    /// Matches only paths whose next segment is a zoom level in range.
    /// Proxies to the bare origin because the tile path is generated per
    /// request and must not be prefixed twice.
    fn render_location(&self, proxy: &ProxyConfig) -> Result<Directive, PluginError> {
        let meta = TileMeta::parse(&proxy.cache.plugin.metadata)?;
        let pattern = format!("^{}({})", proxy.path_prefix(), meta.zoom_pattern());

        let mut block = vec![Directive::simple("proxy_pass", &[&proxy.origin()]).into()];
        block.extend(cache_policy(proxy));
        Ok(Directive::block("location", &["~", &pattern], block))
    }

    fn seed<'a>(
        &'a self,
        proxy: &'a ProxyConfig,
        target: &'a str,
    ) -> BoxFuture<'a, Result<SeedReport, PluginError>> {
        Box::pin(async move {
            let meta = TileMeta::parse(&proxy.cache.plugin.metadata)?;
            let base = format!("{}{}", target.trim_end_matches('/'), proxy.path_prefix());

            let seeder = Seeder::new(meta.concurrency);
            let progress = SeedProgress::default();
            for zoom in meta.min_zoom..=meta.max_zoom {
                let tasks = plan_zoom(&meta, &base, zoom);
                seeder.run_zoom(zoom, tasks, &progress).await;
            }
            Ok(progress.report())
        })
    }
}
