//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check proxy URLs are usable as cache upstreams
//! - Detect path prefixes that would shadow each other in the server block
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;
use std::fmt;

use crate::config::schema::Config;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Proxy URL scheme is not http or https.
    UnsupportedScheme { url: String, scheme: String },
    /// Two proxies share the same path prefix.
    DuplicatePathPrefix { prefix: String, urls: Vec<String> },
    /// Empty proxy list; nothing to manage.
    NoProxies,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnsupportedScheme { url, scheme } => {
                write!(f, "proxy {} uses unsupported scheme '{}'", url, scheme)
            }
            ValidationError::DuplicatePathPrefix { prefix, urls } => {
                write!(
                    f,
                    "path prefix '{}' is claimed by multiple proxies: {}",
                    prefix,
                    urls.join(", ")
                )
            }
            ValidationError::NoProxies => write!(f, "configuration defines no proxies"),
        }
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.proxies.is_empty() {
        errors.push(ValidationError::NoProxies);
    }

    for proxy in &config.proxies {
        let scheme = proxy.url.scheme();
        if scheme != "http" && scheme != "https" {
            errors.push(ValidationError::UnsupportedScheme {
                url: proxy.url.to_string(),
                scheme: scheme.to_string(),
            });
        }
    }

    let mut by_prefix: HashMap<&str, Vec<String>> = HashMap::new();
    for proxy in &config.proxies {
        by_prefix
            .entry(proxy.path_prefix())
            .or_default()
            .push(proxy.url.to_string());
    }
    let mut duplicates: Vec<_> = by_prefix
        .into_iter()
        .filter(|(_, urls)| urls.len() > 1)
        .collect();
    duplicates.sort_by(|a, b| a.0.cmp(b.0));
    for (prefix, urls) in duplicates {
        errors.push(ValidationError::DuplicatePathPrefix {
            prefix: prefix.to_string(),
            urls,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
