//! Compiles proxy definitions into the nginx configuration tree.
//!
//! # Responsibilities
//! - Emit the fixed process/event/log directives
//! - Declare one cache partition per proxy, keyed by fingerprint
//! - Emit the purge lookup maps consumed by location blocks
//! - Collect per-proxy location blocks from the resolved plugins
//!
//! # Design Decisions
//! - Compilation is pure: no I/O, deterministic output, input order
//!   preserved so unchanged definitions regenerate byte-identical files
//! - Every plugin is resolved and rendered before a single node is
//!   emitted; a bad proxy never yields a partial tree

use thiserror::Error;

use crate::config::Config;
use crate::nginx::directive::{Directive, DirectiveNode, NginxConf};
use crate::nginx::{header_variable, PURGE_ALLOWED_VAR, PURGE_HEADER, PURGE_URL_VAR};
use crate::plugins::{PluginError, PluginRegistry};

/// Directory holding one cache partition per proxy fingerprint.
pub const CACHE_ROOT: &str = "/cache";

/// Errors raised while compiling the configuration tree.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A proxy's plugin could not be resolved or rejected its settings.
    #[error("proxy {url}: {source}")]
    Plugin { url: String, source: PluginError },
}

/// Compile the full nginx configuration for `config`.
pub fn build_config_tree(
    config: &Config,
    registry: &PluginRegistry,
) -> Result<NginxConf, BuildError> {
    let mut locations = Vec::with_capacity(config.proxies.len());
    for proxy in &config.proxies {
        let plugin = registry
            .resolve(&proxy.cache.plugin.name)
            .map_err(|source| BuildError::Plugin {
                url: proxy.url.to_string(),
                source,
            })?;
        let location = plugin
            .render_location(proxy)
            .map_err(|source| BuildError::Plugin {
                url: proxy.url.to_string(),
                source,
            })?;
        locations.push(DirectiveNode::from(location));
    }

    let mut http_block: Vec<DirectiveNode> =
        vec![Directive::simple("access_log", &["/dev/stdout"]).into()];

    for proxy in &config.proxies {
        let fingerprint = proxy.fingerprint();
        http_block.push(
            Directive::simple(
                "proxy_cache_path",
                &[
                    &format!("{CACHE_ROOT}/{fingerprint}"),
                    &format!("keys_zone={}:{}", fingerprint, proxy.cache.size),
                    &format!("inactive={}", proxy.cache.ttl),
                ],
            )
            .into(),
        );
        // The fingerprint alone is opaque; name the URL it belongs to.
        http_block.push(DirectiveNode::comment(proxy.url.as_str()));
    }

    http_block.push(purge_allowed_map());
    http_block.push(purge_requested_map());

    let mut server_block: Vec<DirectiveNode> = vec![
        Directive::simple("listen", &["80"]).into(),
        Directive::simple("server_name", &["default"]).into(),
    ];
    server_block.extend(locations);
    http_block.push(Directive::block("server", &[], server_block).into());

    Ok(NginxConf(vec![
        Directive::simple("user", &["nginx"]).into(),
        Directive::simple("worker_processes", &["auto"]).into(),
        Directive::block(
            "events",
            &[],
            vec![Directive::simple("worker_connections", &["1024"]).into()],
        )
        .into(),
        Directive::simple("error_log", &["/dev/stdout", "info"]).into(),
        Directive::block("http", &[], http_block).into(),
    ]))
}

/// Compile and serialize in one step.
pub fn render_nginx_config(
    config: &Config,
    registry: &PluginRegistry,
) -> Result<String, BuildError> {
    Ok(build_config_tree(config, registry)?.render())
}

/// Purges are only honored from localhost.
fn purge_allowed_map() -> DirectiveNode {
    Directive::block(
        "map",
        &["$remote_addr", PURGE_ALLOWED_VAR],
        vec![
            Directive::simple("default", &["0"]).into(),
            Directive::simple("127.0.0.1", &["1"]).into(),
        ],
    )
    .into()
}

/// A purge request is the purge header set to 1, gated on the client
/// address being allowed to purge.
fn purge_requested_map() -> DirectiveNode {
    Directive::block(
        "map",
        &[&header_variable(PURGE_HEADER), PURGE_URL_VAR],
        vec![
            Directive::simple("default", &["0"]).into(),
            Directive::simple("1", &[PURGE_ALLOWED_VAR]).into(),
        ],
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn two_proxies() -> Config {
        config(
            r#"
proxies:
  - url: http://example.com/tiles/
    cache:
      ttl: 60m
  - url: http://example.com/assets/
    cache:
      ttl: 30d
      size: 2G
"#,
        )
    }

    #[test]
    fn test_output_is_byte_stable() {
        let cfg = two_proxies();
        let registry = PluginRegistry::default();

        let first = render_nginx_config(&cfg, &registry).unwrap();
        let second = render_nginx_config(&cfg, &registry).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_top_level_directives() {
        let rendered = render_nginx_config(&two_proxies(), &PluginRegistry::default()).unwrap();
        assert!(rendered.starts_with("user nginx;\nworker_processes auto;\n"));
        assert!(rendered.contains("events {\n    worker_connections 1024;\n}\n"));
        assert!(rendered.contains("error_log /dev/stdout info;\n"));
        assert!(rendered.contains("access_log /dev/stdout;\n"));
    }

    #[test]
    fn test_cache_partitions_follow_input_order() {
        let registry = PluginRegistry::default();
        let rendered = render_nginx_config(&two_proxies(), &registry).unwrap();

        let tiles = rendered
            .find("proxy_cache_path /cache/89597fdfe24f0ed3a19bc5f84e2b28e0")
            .unwrap();
        let assets = rendered
            .find("proxy_cache_path /cache/4d741f3b10eb70a5d2f6977b71db57ea")
            .unwrap();
        assert!(tiles < assets);

        // Reordering the input reorders the declarations and nothing else.
        let swapped = config(
            r#"
proxies:
  - url: http://example.com/assets/
    cache:
      ttl: 30d
      size: 2G
  - url: http://example.com/tiles/
    cache:
      ttl: 60m
"#,
        );
        let rendered = render_nginx_config(&swapped, &registry).unwrap();
        let tiles = rendered
            .find("proxy_cache_path /cache/89597fdfe24f0ed3a19bc5f84e2b28e0")
            .unwrap();
        let assets = rendered
            .find("proxy_cache_path /cache/4d741f3b10eb70a5d2f6977b71db57ea")
            .unwrap();
        assert!(assets < tiles);
    }

    #[test]
    fn test_partition_declaration_content() {
        let rendered = render_nginx_config(&two_proxies(), &PluginRegistry::default()).unwrap();
        assert!(rendered.contains(
            "proxy_cache_path /cache/4d741f3b10eb70a5d2f6977b71db57ea \
             keys_zone=4d741f3b10eb70a5d2f6977b71db57ea:2G inactive=30d;"
        ));
        assert!(rendered.contains("# http://example.com/assets/\n"));
    }

    #[test]
    fn test_purge_maps_present() {
        let rendered = render_nginx_config(&two_proxies(), &PluginRegistry::default()).unwrap();
        assert!(rendered.contains("map $remote_addr $purge_allowed {"));
        assert!(rendered.contains("map $http_x_purge_cache $purge_url {"));
        assert!(rendered.contains("1 $purge_allowed;"));
    }

    #[test]
    fn test_unknown_plugin_yields_no_tree() {
        let cfg = config(
            r#"
proxies:
  - url: http://example.com/assets/
    cache:
      ttl: 60m
      plugin:
        name: varnish
"#,
        );
        let err = build_config_tree(&cfg, &PluginRegistry::default()).unwrap_err();
        assert!(err.to_string().contains("unknown cache plugin 'varnish'"));
    }

    #[test]
    fn test_tiled_proxy_end_to_end() {
        let cfg = config(
            r#"
proxies:
  - url: http://example.com/tiles/
    cache:
      ttl: 60m
      plugin:
        name: tiled
        metadata:
          bounds: [-1.0, -1.0, 1.0, 1.0]
          format: "{z}/{x}/{y}.png"
          min_zoom: 0
          max_zoom: 1
          concurrency: 2
"#,
        );
        let rendered = render_nginx_config(&cfg, &PluginRegistry::default()).unwrap();
        assert!(rendered.contains("proxy_cache_path /cache/89597fdfe24f0ed3a19bc5f84e2b28e0"));
        assert!(rendered.contains("location ~ ^/tiles/(0|1) {"));
        assert!(rendered.contains("proxy_pass http://example.com;"));

        // Exactly one server block wrapping the location.
        assert_eq!(rendered.matches("server {").count(), 1);
        assert!(rendered.contains("listen 80;"));
        assert!(rendered.contains("server_name default;"));
    }
}
