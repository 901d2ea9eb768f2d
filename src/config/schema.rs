//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the cache
//! manager. All types derive Serde traits for deserialization from the
//! YAML definition file.

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration: the declarative list of upstream caches.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Upstream proxy definitions, in the order they were declared.
    pub proxies: Vec<ProxyConfig>,
}

/// A single upstream proxy/cache definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Absolute URL of the upstream origin, including the path prefix
    /// that incoming requests are matched against.
    pub url: Url,

    /// Cache behaviour for this upstream.
    pub cache: CacheSettings,
}

/// Cache settings for one upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Cache entry lifetime, passed through to nginx uninterpreted
    /// (e.g. "60m", "12h").
    pub ttl: String,

    /// Size of the shared key zone, passed through to nginx uninterpreted.
    #[serde(default = "default_cache_size")]
    pub size: String,

    /// Strategy used to render this proxy's location block and to warm
    /// its cache. Defaults to the plain pass-through cache.
    #[serde(default)]
    pub plugin: PluginRef,
}

fn default_cache_size() -> String {
    "128M".to_string()
}

/// Reference to a cache plugin plus its plugin-private settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginRef {
    /// Name resolved against the plugin registry at startup.
    pub name: String,

    /// Opaque settings bag; the schema belongs to the plugin.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Default for PluginRef {
    fn default() -> Self {
        Self {
            name: "plain".to_string(),
            metadata: serde_json::Value::Null,
        }
    }
}
