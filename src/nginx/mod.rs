//! nginx configuration generation.
//!
//! # Data Flow
//! ```text
//! Config + PluginRegistry
//!     → builder.rs (compile to directive tree)
//!     → directive.rs (render to nginx syntax)
//!     → written to nginx.conf by the supervisor
//! ```

pub mod builder;
pub mod directive;

pub use builder::{build_config_tree, render_nginx_config, BuildError};
pub use directive::{render_config, Directive, DirectiveNode, NginxConf};

/// Request header instructing the proxy to bypass its cache and refetch.
/// The generated purge map keys on this header, and the seeder sends it.
pub const PURGE_HEADER: &str = "X-Purge-Cache";

/// Response header proving a bypass happened. Emitted by every generated
/// location block, checked by the seeder after each warming request.
pub const BYPASS_PROOF_HEADER: &str = "X-Debug-Cache-Bypass";

/// Response header naming the cache partition that served the request.
pub const CACHE_GROUP_HEADER: &str = "X-Debug-Cache-Group";

/// Response header exposing the upstream's Date at cache-fill time.
pub const CACHE_DATE_HEADER: &str = "X-Cache-Date";

/// nginx variable holding the effective bypass decision.
pub const PURGE_URL_VAR: &str = "$purge_url";

/// nginx variable gating purges on the client address.
pub const PURGE_ALLOWED_VAR: &str = "$purge_allowed";

/// nginx's view of a request header: lowercased, dashes to underscores.
pub(crate) fn header_variable(header: &str) -> String {
    let mut var = String::with_capacity(header.len() + 6);
    var.push_str("$http_");
    for c in header.chars() {
        match c {
            '-' => var.push('_'),
            c => var.push(c.to_ascii_lowercase()),
        }
    }
    var
}
