//! Cached `path -> hash` index over a share directory.
//!
//! Rehashing a whole directory on every lookup is O(files * fileSize). This index
//! keeps the last-known `(hash, len, mtime)` per path and only rehashes when the
//! file's size or modification time has changed, or the entry is missing entirely.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::error::Result;
use crate::{hash_file, list_files};

#[derive(Clone, Debug)]
struct CacheEntry {
    hash: String,
    len: u64,
    mtime: Option<SystemTime>,
}

fn fingerprint(meta: &Metadata) -> (u64, Option<SystemTime>) {
    (meta.len(), meta.modified().ok())
}

/// Maps hash -> absolute path, inverted internally to `path -> cached hash` since
/// paths, not hashes, are what we can cheaply detect staleness for.
pub struct FileIndex {
    dir: PathBuf,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl FileIndex {
    pub fn new<P: Into<PathBuf>>(dir: P) -> FileIndex {
        FileIndex {
            dir: dir.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn share_dir(&self) -> &Path {
        &self.dir
    }

    /// Re-enumerates the share directory. New files are not hashed here (lazy,
    /// on first lookup); files that no longer exist are dropped from the cache.
    pub fn rescan(&self) -> Result<()> {
        let present = list_files(&self.dir, true)?;
        let present: std::collections::HashSet<PathBuf> = present.into_iter().collect();

        let mut entries = self.entries.lock().unwrap();
        entries.retain(|path, _| present.contains(path));
        Ok(())
    }

    /// Hash of `path`, using the cache when the file is unchanged since last hash.
    pub fn hash_of(&self, path: &Path) -> Result<String> {
        let meta = std::fs::metadata(path)?;
        let (len, mtime) = fingerprint(&meta);

        {
            let entries = self.entries.lock().unwrap();
            if let Some(cached) = entries.get(path) {
                if cached.len == len && cached.mtime == mtime {
                    return Ok(cached.hash.clone());
                }
            }
        }

        let hash = hash_file(path)?;
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            path.to_path_buf(),
            CacheEntry { hash: hash.clone(), len, mtime },
        );
        Ok(hash)
    }

    /// FileDigest.findByHash generalized with caching: first file under the share
    /// directory whose content hash equals `hash`.
    pub fn find_by_hash(&self, hash: &str) -> Result<Option<PathBuf>> {
        for path in list_files(&self.dir, true)? {
            if let Ok(h) = self.hash_of(&path) {
                if h.eq_ignore_ascii_case(hash) {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }

    /// FileDigest.findByName: match by final path component.
    pub fn find_by_name(&self, name: &str) -> Result<Option<PathBuf>> {
        for path in list_files(&self.dir, true)? {
            if path.file_name().and_then(|n| n.to_str()) == Some(name) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}
