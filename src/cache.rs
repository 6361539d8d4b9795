//! Content-digest cache for emitted query files
//!
//! A file is rewritten only when the sha256 of its new content differs from
//! the digest of what is already on disk, so an interrupted run can be
//! restarted without touching finished components.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;
use tracing::trace;

/// Outcome of [`DigestCache::store`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Cache manager keyed by content digest
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestCache;

impl DigestCache {
    pub fn new() -> Self {
        DigestCache
    }

    /// Hex sha256 of `content`
    pub fn digest(content: &str) -> String {
        format!("{:x}", Sha256::digest(content.as_bytes()))
    }

    /// Digest of the file at `path`, if it exists and is readable
    pub fn load(&self, path: &Path) -> Option<String> {
        fs::read_to_string(path).ok().map(|content| Self::digest(&content))
    }

    /// Whether the file at `path` already holds content with `digest`
    pub fn is_current(&self, path: &Path, digest: &str) -> bool {
        self.load(path).as_deref() == Some(digest)
    }

    /// Write `content` to `path` unless it is already there
    pub fn store(&self, path: &Path, content: &str) -> io::Result<WriteOutcome> {
        if self.is_current(path, &Self::digest(content)) {
            trace!(path = %path.display(), "unchanged, skipping write");
            return Ok(WriteOutcome::Unchanged);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(WriteOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest() {
        let key = DigestCache::digest("solve 1");
        assert_eq!(key.len(), 64);
        assert_eq!(key, DigestCache::digest("solve 1"));
        assert_ne!(key, DigestCache::digest("solve 0"));
    }

    #[test]
    fn test_store_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("add").join("add_nibble_0.tau");
        let cache = DigestCache::new();

        assert_eq!(cache.store(&path, "solve 1\n").unwrap(), WriteOutcome::Written);
        assert_eq!(cache.store(&path, "solve 1\n").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(cache.store(&path, "solve 0\n").unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "solve 0\n");
        assert!(cache.is_current(&path, &DigestCache::digest("solve 0\n")));
    }

    #[test]
    fn test_missing_file_has_no_digest() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(DigestCache::new().load(&dir.path().join("absent.tau")), None);
    }
}
