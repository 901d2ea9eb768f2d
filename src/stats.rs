//! Cache partition size reporting.
//!
//! The cache directory tree belongs to nginx; this module only reads
//! it. Each immediate subdirectory of the cache root is one partition,
//! named by a proxy fingerprint, and its size is the sum of every file
//! below it.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// On-disk footprint of one cache partition.
#[derive(Debug, Clone)]
pub struct PartitionSize {
    /// Directory name, which is the owning proxy's fingerprint.
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Measure every partition under the cache root, sorted by name.
pub fn partition_sizes(cache_root: &Path) -> io::Result<Vec<PartitionSize>> {
    let mut sizes = Vec::new();
    for entry in fs::read_dir(cache_root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let bytes = directory_bytes(&path)?;
            sizes.push(PartitionSize {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                bytes,
            });
        }
    }
    sizes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sizes)
}

fn directory_bytes(dir: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            total += directory_bytes(&path)?;
        } else {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Fingerprint-to-URL lookup for a loaded configuration, used to label
/// partitions with something an operator recognizes.
pub fn fingerprint_index(config: &Config) -> HashMap<String, String> {
    config
        .proxies
        .iter()
        .map(|p| (p.fingerprint(), p.url.to_string()))
        .collect()
}

/// Human-readable size, 1024-based.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    for unit in &UNITS[..UNITS.len() - 1] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} {}", UNITS[UNITS.len() - 1])
}

/// Render the report table. Partitions whose fingerprint is not in the
/// index (stale caches from removed proxies) are labelled `n/a`.
pub fn render_table(sizes: &[PartitionSize], index: &HashMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<80} {:<30} {:>15}\n",
        "Name", "Directory", "Size"
    ));
    out.push_str(&"-".repeat(85));
    out.push('\n');
    for entry in sizes {
        let name = index.get(&entry.name).map(String::as_str).unwrap_or("n/a");
        out.push_str(&format!(
            "{:<80} {:<30} {:>15}\n",
            name,
            entry.name,
            format_size(entry.bytes)
        ));
    }
    out
}
