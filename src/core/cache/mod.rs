// ─── Artifact Cache ───
// One directory per source key under the cache root, each holding the
// downloaded artifact plus a JSON marker recording when it was fetched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::core::error::{AssemblerError, AssemblerResult};

/// Sidecar file colocated with each cached artifact.
pub const MARKER_FILE: &str = ".cache-entry.json";

/// Default freshness window.
pub const DEFAULT_FRESHNESS_HOURS: i64 = 24;

/// A valid cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_key: String,
    pub local_file_path: PathBuf,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheMarker {
    /// Milliseconds since the Unix epoch.
    fetched_at_ms: i64,
    file_name: String,
}

/// Process-wide artifact cache with per-key fetch serialization.
pub struct ArtifactCache {
    root: PathBuf,
    freshness: Duration,
    /// One async lock per source key, held across check + download + mark.
    fetch_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ArtifactCache {
    pub fn new(root: PathBuf) -> Self {
        Self::with_freshness(root, Duration::hours(DEFAULT_FRESHNESS_HOURS))
    }

    pub fn with_freshness(root: PathBuf, freshness: Duration) -> Self {
        Self {
            root,
            freshness,
            fetch_locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_dir(&self, source_key: &str) -> PathBuf {
        self.root.join(source_key)
    }

    /// Whether an entry fetched at `fetched_at` is still usable at `now`.
    /// Valid up to, but not including, `fetched_at + freshness`.
    pub fn is_fresh(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(fetched_at) < self.freshness
    }

    /// Acquire the fetch lock for `source_key`.
    pub async fn lock(&self, source_key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .fetch_locks
            .entry(source_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub async fn get(&self, source_key: &str) -> Option<CacheEntry> {
        self.get_at(source_key, Utc::now()).await
    }

    /// Look up a valid entry as of `now`. Missing, unreadable, stale, or
    /// dangling markers all count as a miss.
    pub async fn get_at(&self, source_key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let dir = self.entry_dir(source_key);
        let marker_path = dir.join(MARKER_FILE);

        let bytes = match tokio::fs::read(&marker_path).await {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };
        let marker: CacheMarker = match serde_json::from_slice(&bytes) {
            Ok(marker) => marker,
            Err(e) => {
                warn!("Ignoring corrupt cache marker {:?}: {}", marker_path, e);
                return None;
            }
        };

        let fetched_at = Utc.timestamp_millis_opt(marker.fetched_at_ms).single()?;
        if !self.is_fresh(fetched_at, now) {
            debug!("Cache entry for {} is stale (fetched {})", source_key, fetched_at);
            return None;
        }

        let local_file_path = dir.join(&marker.file_name);
        if !tokio::fs::try_exists(&local_file_path).await.unwrap_or(false) {
            warn!("Cache marker for {} points at missing {:?}", source_key, local_file_path);
            return None;
        }

        Some(CacheEntry {
            source_key: source_key.to_string(),
            local_file_path,
            fetched_at,
        })
    }

    pub async fn put(&self, source_key: &str, file_path: &Path) -> AssemblerResult<CacheEntry> {
        self.put_at(source_key, file_path, Utc::now()).await
    }

    /// Record `file_path` as the artifact for `source_key`, fetched at `now`.
    /// Files outside the entry directory are copied in first.
    pub async fn put_at(
        &self,
        source_key: &str,
        file_path: &Path,
        now: DateTime<Utc>,
    ) -> AssemblerResult<CacheEntry> {
        let dir = self.entry_dir(source_key);
        create_dir(&dir).await?;

        let file_name = file_path
            .file_name()
            .ok_or_else(|| AssemblerError::Other(format!("No file name in {:?}", file_path)))?
            .to_os_string();
        let local_file_path = dir.join(&file_name);

        if file_path != local_file_path {
            tokio::fs::copy(file_path, &local_file_path)
                .await
                .map_err(|e| AssemblerError::Io {
                    path: local_file_path.clone(),
                    source: e,
                })?;
        }

        let marker = CacheMarker {
            fetched_at_ms: now.timestamp_millis(),
            file_name: file_name.to_string_lossy().to_string(),
        };
        let marker_path = dir.join(MARKER_FILE);
        tokio::fs::write(&marker_path, serde_json::to_vec(&marker)?)
            .await
            .map_err(|e| AssemblerError::Io {
                path: marker_path,
                source: e,
            })?;

        Ok(CacheEntry {
            source_key: source_key.to_string(),
            local_file_path,
            fetched_at: now,
        })
    }

    /// Drop everything cached under `source_key` and recreate the empty
    /// directory, so a re-fetch never leaves an older artifact beside the new.
    pub async fn reset(&self, source_key: &str) -> AssemblerResult<PathBuf> {
        let dir = self.entry_dir(source_key);
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| AssemblerError::Io {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        create_dir(&dir).await?;
        Ok(dir)
    }

    /// Every file in the entry directory ending in `.{extension}`, by name.
    pub async fn artifact_files(
        &self,
        source_key: &str,
        extension: &str,
    ) -> AssemblerResult<Vec<PathBuf>> {
        let dir = self.entry_dir(source_key);
        let suffix = format!(".{}", extension.trim_start_matches('.'));

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| AssemblerError::Io {
                path: dir.clone(),
                source: e,
            })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| AssemblerError::Io {
            path: dir.clone(),
            source: e,
        })? {
            let path = entry.path();
            let matches = path
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(&suffix))
                .unwrap_or(false);
            if matches && path.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

async fn create_dir(path: &Path) -> AssemblerResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| AssemblerError::Io {
            path: path.to_path_buf(),
            source,
        })
}
