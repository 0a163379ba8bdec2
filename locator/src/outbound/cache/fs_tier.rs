//! Capability-scoped filesystem cache tier.
//!
//! Each entry is one JSON file `{"t": <epoch ms>, "v": <payload>}` named
//! after the SHA-256 of its cache key. Writes go to a hidden temporary file
//! that is renamed over the target, so readers never see partial entries.

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use cap_std::ambient_authority;
use cap_std::fs::{Dir, OpenOptions};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::ports::{CachedPayload, DurableCacheError, DurableCacheTier, QueryCacheKey};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntryDto {
    t: i64,
    v: Value,
}

/// Durable cache tier rooted in one directory.
#[derive(Debug)]
pub struct FsCacheTier {
    dir: Dir,
}

impl FsCacheTier {
    /// Open (creating if needed) the cache directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the directory cannot be created or opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        Dir::create_ambient_dir_all(path, ambient_authority())?;
        let dir = Dir::open_ambient_dir(path, ambient_authority())?;
        Ok(Self { dir })
    }

    fn file_name(key: &QueryCacheKey) -> String {
        let digest = Sha256::digest(key.as_str().as_bytes());
        format!("{}.json", hex::encode(digest))
    }
}

impl DurableCacheTier for FsCacheTier {
    fn load(&self, key: &QueryCacheKey) -> Result<Option<CachedPayload>, DurableCacheError> {
        let bytes = match self.dir.read(Self::file_name(key)) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(DurableCacheError::storage(error.to_string())),
        };
        let stored: StoredEntryDto = serde_json::from_slice(&bytes)
            .map_err(|error| DurableCacheError::serialization(error.to_string()))?;
        let stored_at = DateTime::from_timestamp_millis(stored.t).ok_or_else(|| {
            DurableCacheError::serialization(format!("timestamp {} out of range", stored.t))
        })?;
        Ok(Some(CachedPayload {
            stored_at,
            value: stored.v,
        }))
    }

    fn store(&self, key: &QueryCacheKey, entry: &CachedPayload) -> Result<(), DurableCacheError> {
        let contents = serde_json::to_vec(&StoredEntryDto {
            t: entry.stored_at.timestamp_millis(),
            v: entry.value.clone(),
        })
        .map_err(|error| DurableCacheError::serialization(error.to_string()))?;
        write_atomic(&self.dir, &Self::file_name(key), &contents)
            .map_err(|error| DurableCacheError::storage(error.to_string()))
    }

    fn evict(&self, key: &QueryCacheKey) -> Result<(), DurableCacheError> {
        match self.dir.remove_file(Self::file_name(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(DurableCacheError::storage(error.to_string())),
        }
    }
}

fn write_atomic(dir: &Dir, file_name: &str, contents: &[u8]) -> io::Result<()> {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(".{file_name}.tmp.{}.{counter}", std::process::id());

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    let written = dir.open_with(&tmp_name, &options).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(error) = written.and_then(|()| rename_over(dir, &tmp_name, file_name)) {
        // Best-effort cleanup; the original error is what matters.
        drop(dir.remove_file(&tmp_name));
        return Err(error);
    }
    Ok(())
}

#[cfg(windows)]
fn rename_over(dir: &Dir, tmp_name: &str, target_name: &str) -> io::Result<()> {
    // Windows rename fails if the target exists, so remove it first.
    match dir.remove_file(target_name) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    dir.rename(tmp_name, dir, target_name)
}

#[cfg(not(windows))]
fn rename_over(dir: &Dir, tmp_name: &str, target_name: &str) -> io::Result<()> {
    dir.rename(tmp_name, dir, target_name)
}
