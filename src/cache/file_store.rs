//! One-file-per-entry disk store.
//!
//! Each entry lives in `<dir>/<sha256(key)>.cache` as a JSON record
//! `{"expires": <unix seconds>, "content": "<base64>"}`. Writes land in a
//! temporary file in the same directory and are renamed over the target, so
//! concurrent readers see either the old record or the new one.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::keys::CacheKey;
use super::store::{CacheStore, StoreError, expiry_after};

/// Marker that tells the web server not to expose the cache directory.
pub const MARKER_FILE: &str = ".htaccess";
const MARKER_CONTENT: &str = "Order deny,allow\nDeny from all";
const ENTRY_EXTENSION: &str = "cache";

#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    expires: i64,
    content: String,
}

pub struct FileStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Open the store, creating the directory and its access marker when missing.
    pub fn open(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(StoreError::Init)?;

        let marker = dir.join(MARKER_FILE);
        if !marker.exists() {
            fs::write(&marker, MARKER_CONTENT).map_err(StoreError::Init)?;
            info!(
                op = "file_store::open",
                cache_dir = %dir.display(),
                "Created cache directory access marker"
            );
        }

        Ok(Self { dir, clock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{ENTRY_EXTENSION}", key.digest()))
    }

    /// Read and decode a record; any failure reads as "no entry".
    fn read_record(&self, key: &CacheKey, path: &Path) -> Option<EntryRecord> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(
                    op = "file_store::read",
                    result = "read_error",
                    cache_key = %key,
                    cache_path = %path.display(),
                    error = %err,
                    "Failed to read cache entry; treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_slice::<EntryRecord>(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!(
                    op = "file_store::read",
                    result = "malformed",
                    cache_key = %key,
                    cache_path = %path.display(),
                    error = %err,
                    "Ignoring malformed cache entry"
                );
                None
            }
        }
    }

    fn remove_file(&self, key: &CacheKey, path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Delete {
                key: key.clone(),
                source,
            }),
        }
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let path = self.entry_path(key);
        let record = self.read_record(key, &path)?;

        if record.expires <= self.clock.now().unix_timestamp() {
            if let Err(err) = self.remove_file(key, &path) {
                warn!(
                    op = "file_store::get",
                    result = "expire_error",
                    cache_key = %key,
                    error = %err,
                    "Failed to remove expired cache entry"
                );
            }
            return None;
        }

        match STANDARD.decode(record.content.as_bytes()) {
            Ok(content) => Some(Bytes::from(content)),
            Err(err) => {
                debug!(
                    op = "file_store::get",
                    result = "malformed",
                    cache_key = %key,
                    error = %err,
                    "Ignoring cache entry with undecodable content"
                );
                None
            }
        }
    }

    fn set(&self, key: &CacheKey, content: &[u8], ttl_seconds: u32) -> Result<(), StoreError> {
        let record = EntryRecord {
            expires: expiry_after(self.clock.now(), ttl_seconds).unix_timestamp(),
            content: STANDARD.encode(content),
        };
        let encoded = serde_json::to_vec(&record).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        let write_error = |source: io::Error| StoreError::Write {
            key: key.clone(),
            source,
        };

        let mut staged = NamedTempFile::new_in(&self.dir).map_err(write_error)?;
        staged.write_all(&encoded).map_err(write_error)?;
        staged.flush().map_err(write_error)?;
        staged
            .persist(self.entry_path(key))
            .map_err(|err| write_error(err.error))?;
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.remove_file(key, &self.entry_path(key))
    }

    fn clear_all(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        let mut failed = 0;

        for entry in fs::read_dir(&self.dir).map_err(StoreError::List)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        op = "file_store::clear_all",
                        error = %err,
                        "Failed to read cache directory entry"
                    );
                    failed += 1;
                    continue;
                }
            };
            if entry.file_name() == MARKER_FILE {
                continue;
            }
            if !entry.file_type().is_ok_and(|kind| kind.is_file()) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(
                        op = "file_store::clear_all",
                        cache_path = %entry.path().display(),
                        error = %err,
                        "Failed to remove cache file"
                    );
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(StoreError::Incomplete { removed, failed });
        }
        Ok(removed)
    }

    fn expiration_of(&self, key: &CacheKey) -> Option<OffsetDateTime> {
        let record = self.read_record(key, &self.entry_path(key))?;
        OffsetDateTime::from_unix_timestamp(record.expires).ok()
    }
}
