//! On-disk cache of resolved design renders.
//!
//! Each key maps to two sibling files: `<key>.txt` holding the provider's
//! last-modified timestamp and `<key>.png` holding the encoded bytes. An entry
//! is only served when the stored timestamp equals the freshly reported one.
//! Every failure here is a miss, never an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, warn};
use tokio::fs;

/// Stable identity of one rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    pub document_id: String,
    pub frame_id: String,
    pub version: Option<String>,
    pub scale: Option<f64>,
}

impl CacheKey {
    /// File stem safe on every platform (node ids contain `:`).
    pub fn file_stem(&self) -> String {
        let raw = format!(
            "{} - {} - {} - {}",
            self.document_id,
            self.frame_id,
            self.version.as_deref().unwrap_or("latest"),
            self.scale
                .map(|s| s.to_string())
                .unwrap_or_else(|| "native".to_string()),
        );
        raw.chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c => c,
            })
            .collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn paths(&self, key: &CacheKey) -> (PathBuf, PathBuf) {
        let stem = key.file_stem();
        (
            self.dir.join(format!("{stem}.txt")),
            self.dir.join(format!("{stem}.png")),
        )
    }

    /// Cached bytes for `key` if they were stored under `last_modified`.
    pub async fn lookup(&self, key: &CacheKey, last_modified: &str) -> Option<Vec<u8>> {
        let (meta_path, image_path) = self.paths(key);

        let cached = match fs::read_to_string(&meta_path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("cache miss for {key}: {e}");
                return None;
            }
        };

        if !timestamps_match(cached.trim(), last_modified.trim()) {
            debug!("cache stale for {key}: cached {cached:?}, remote {last_modified:?}");
            return None;
        }

        match fs::read(&image_path).await {
            Ok(bytes) => {
                debug!("cache hit for {key}");
                Some(bytes)
            }
            Err(e) => {
                debug!("cache miss for {key}: {e}");
                None
            }
        }
    }

    /// Best-effort write; failures are logged and otherwise ignored.
    pub async fn store(&self, key: &CacheKey, last_modified: &str, bytes: &[u8]) {
        if let Err(e) = self.try_store(key, last_modified, bytes).await {
            warn!("failed to write cache entry {key} in {}: {e}", self.dir.display());
        }
    }

    async fn try_store(&self, key: &CacheKey, last_modified: &str, bytes: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let (meta_path, image_path) = self.paths(key);
        fs::write(&meta_path, last_modified).await?;
        fs::write(&image_path, bytes).await
    }
}

/// Compares two timestamps as instants when both parse as RFC 3339, and as
/// exact strings when neither does. One parsing and one not is a mismatch.
fn timestamps_match(cached: &str, remote: &str) -> bool {
    match (parse_timestamp(cached), parse_timestamp(remote)) {
        (Some(a), Some(b)) => a == b,
        (None, None) => !cached.is_empty() && cached == remote,
        _ => false,
    }
}

fn parse_timestamp(value: &str) -> Option<SystemTime> {
    humantime::parse_rfc3339_weak(value.trim_end_matches('Z'))
        .ok()
        .or_else(|| humantime::parse_rfc3339(value).ok())
}
