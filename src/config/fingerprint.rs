//! Derived proxy identity.
//!
//! Every proxy definition yields three values used throughout the rest of
//! the system: a stable fingerprint naming its cache partition, the URL
//! path prefix used for request matching, and the origin requests are
//! forwarded to.

use sha2::{Digest, Sha256};

use crate::config::schema::ProxyConfig;

/// Number of lowercase hex characters kept from the digest. 128 bits is
/// plenty for partition names and keeps nginx zone names short.
const FINGERPRINT_LEN: usize = 32;

impl ProxyConfig {
    /// Stable fingerprint of the full proxy URL.
    ///
    /// Used as the cache partition directory name, the nginx `keys_zone`
    /// name, and the value of the debug cache-group header. Equal URLs
    /// always produce equal fingerprints across runs and hosts.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.url.as_str().as_bytes());
        let mut out = String::with_capacity(FINGERPRINT_LEN);
        for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    /// URL path prefix incoming requests are matched against.
    pub fn path_prefix(&self) -> &str {
        self.url.path()
    }

    /// Scheme plus authority of the upstream, without path or query.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }
}
