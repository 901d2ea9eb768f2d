//! Declarative nginx cache manager library.

pub mod config;
pub mod nginx;
pub mod plugins;
pub mod seed;
pub mod stats;
pub mod supervisor;

pub use config::{load_config, Config, ProxyConfig};
pub use nginx::{build_config_tree, render_nginx_config};
pub use plugins::{CachePlugin, PluginRegistry};
pub use seed::seed_proxies;
pub use supervisor::Supervisor;
