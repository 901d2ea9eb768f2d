//! Pass-through cache plugin.

use futures_util::future::BoxFuture;

use crate::config::ProxyConfig;
use crate::nginx::directive::Directive;
use crate::plugins::{cache_policy, CachePlugin, PluginError};
use crate::seed::SeedReport;

/// Caches whatever the upstream serves under the configured path prefix.
/// Requests match by literal prefix and are proxied to the configured
/// URL as-is.
#[derive(Debug)]
pub struct PlainCache;

impl CachePlugin for PlainCache {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn render_location(&self, proxy: &ProxyConfig) -> Result<Directive, PluginError> {
        let mut block = vec![Directive::simple("proxy_pass", &[proxy.url.as_str()]).into()];
        block.extend(cache_policy(proxy));
        Ok(Directive::block("location", &[proxy.path_prefix()], block))
    }

    /// A plain cache fills lazily from real traffic; there is nothing to
    /// enumerate, so warming is a no-op.
    fn seed<'a>(
        &'a self,
        proxy: &'a ProxyConfig,
        _target: &'a str,
    ) -> BoxFuture<'a, Result<SeedReport, PluginError>> {
        Box::pin(async move {
            tracing::info!(url = %proxy.url, "Plain cache has no warming step, skipping");
            Ok(SeedReport::default())
        })
    }
}
