//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! definition file (YAML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Config (validated, immutable)
//!
//! On file change:
//!     supervisor::watcher detects change
//!     → loader.rs loads new definitions
//!     → validation.rs validates
//!     → nginx config regenerated and reloaded
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - Optional fields have defaults to allow minimal definitions
//! - Validation separates syntactic (serde) from semantic checks

pub mod fingerprint;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{CacheSettings, Config, PluginRef, ProxyConfig};
