//! Cache plugin registry.
//!
//! # Responsibilities
//! - Define the capability set every cache strategy implements
//! - Resolve plugin names from the configuration to implementations
//! - Share the cache/header policy common to all location blocks
//!
//! # Design Decisions
//! - Explicit registry instead of reflective lookup; an unknown name is
//!   a typed error raised before any config is written or any process
//!   is started
//! - Plugin metadata stays opaque to the registry; each plugin parses
//!   and validates its own settings

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::config::ProxyConfig;
use crate::nginx::directive::{Directive, DirectiveNode};
use crate::nginx::{BYPASS_PROOF_HEADER, CACHE_DATE_HEADER, CACHE_GROUP_HEADER, PURGE_URL_VAR};
use crate::seed::SeedReport;

pub mod plain;
pub mod tiles;

pub use plain::PlainCache;
pub use tiles::TiledCache;

/// Errors raised while resolving or configuring a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The configuration names a plugin nobody registered.
    #[error("unknown cache plugin '{0}'")]
    Unknown(String),

    /// The plugin rejected its metadata block.
    #[error("invalid metadata for plugin '{plugin}': {reason}")]
    Metadata { plugin: &'static str, reason: String },
}

/// A cache strategy: how a proxy's location block is rendered and how
/// its cache is warmed.
pub trait CachePlugin: Send + Sync + std::fmt::Debug {
    /// Registry name, matched against `cache.plugin.name`.
    fn name(&self) -> &'static str;

    /// Render the location block for one proxy.
    fn render_location(&self, proxy: &ProxyConfig) -> Result<Directive, PluginError>;

    /// Warm the proxy's cache by requesting content through `target`,
    /// the address of the locally supervised proxy instance.
    fn seed<'a>(
        &'a self,
        proxy: &'a ProxyConfig,
        target: &'a str,
    ) -> BoxFuture<'a, Result<SeedReport, PluginError>>;
}

/// Name-to-implementation table, populated once at startup.
pub struct PluginRegistry {
    plugins: HashMap<&'static str, Box<dyn CachePlugin>>,
}

impl PluginRegistry {
    /// Registry with no plugins. Useful for tests; production code
    /// wants [`PluginRegistry::default`].
    pub fn empty() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn CachePlugin>) {
        self.plugins.insert(plugin.name(), plugin);
    }

    pub fn resolve(&self, name: &str) -> Result<&dyn CachePlugin, PluginError> {
        self.plugins
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| PluginError::Unknown(name.to_string()))
    }
}

impl Default for PluginRegistry {
    /// Registry holding the built-in plugins.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PlainCache));
        registry.register(Box::new(TiledCache));
        registry
    }
}

/// Cache and header directives shared by every generated location block.
/// Follows the proxy_pass directive inside the block.
fn cache_policy(proxy: &ProxyConfig) -> Vec<DirectiveNode> {
    let fingerprint = proxy.fingerprint();
    vec![
        Directive::simple("proxy_cache", &[&fingerprint]).into(),
        Directive::simple("proxy_cache_key", &["$scheme$proxy_host$uri$is_args$args"]).into(),
        Directive::simple("proxy_cache_valid", &["200", &proxy.cache.ttl]).into(),
        Directive::simple(
            "proxy_cache_use_stale",
            &[
                "error",
                "timeout",
                "invalid_header",
                "updating",
                "http_500",
                "http_502",
                "http_503",
                "http_504",
            ],
        )
        .into(),
        Directive::simple("proxy_hide_header", &["Set-Cookie"]).into(),
        Directive::simple("proxy_pass_request_headers", &["off"]).into(),
        DirectiveNode::comment("Handle purging and bypass based on custom headers"),
        Directive::simple("proxy_cache_bypass", &[PURGE_URL_VAR]).into(),
        Directive::simple("add_header", &[CACHE_GROUP_HEADER, &fingerprint]).into(),
        Directive::simple("add_header", &[BYPASS_PROOF_HEADER, PURGE_URL_VAR]).into(),
        Directive::simple("add_header", &[CACHE_DATE_HEADER, "$upstream_http_date"]).into(),
    ]
}
