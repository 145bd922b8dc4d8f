//! Content-addressed cache of extracted document text.
//!
//! Entries are keyed by an MD5 fingerprint of the PDF bytes, so the same
//! document hits the cache whatever path it is opened from, and two documents
//! never share or evict each other's entry. An entry is fresh while
//! `now - created_at < ttl`. Stale entries are not evicted; the next
//! successful extraction of that document overwrites them.
//!
//! The TTL is supplied per lookup rather than stored in the cache, so a new
//! configuration with a different TTL applies to existing entries at once.

use crate::error::PdfChatError;
use crate::output::PageTextMap;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Fingerprint raw document bytes.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Fingerprint the document at `path` by content.
pub async fn fingerprint_file(path: &Path) -> Result<String, PdfChatError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            PdfChatError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            PdfChatError::FileNotFound {
                path: path.to_path_buf(),
            }
        }
    })?;
    Ok(fingerprint_bytes(&bytes))
}

/// One cached extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub pages: PageTextMap,
    #[serde(default)]
    pub unresolved: Vec<usize>,
    pub total_pages: usize,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(pages: PageTextMap, unresolved: Vec<usize>, total_pages: usize) -> Self {
        Self {
            pages,
            unresolved,
            total_pages,
            created_at: Utc::now(),
        }
    }

    /// Whether the entry is still valid at `now`.
    pub fn is_fresh_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at) < ttl
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

const SNAPSHOT_VERSION: u32 = 1;

/// Fingerprint → extraction map, safe to share across tasks.
#[derive(Debug, Default)]
pub struct DocumentCache {
    entries: DashMap<String, CacheEntry>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh entry for `fingerprint`, if any.
    pub fn get_fresh(&self, fingerprint: &str, ttl: Duration) -> Option<CacheEntry> {
        self.get_fresh_at(fingerprint, ttl, Utc::now())
    }

    /// Fresh entry for `fingerprint` as of `now`.
    pub fn get_fresh_at(
        &self,
        fingerprint: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        let entry = self.entries.get(fingerprint)?;
        if entry.is_fresh_at(ttl, now) {
            Some(entry.clone())
        } else {
            debug!("Cache entry {} is stale (created {})", fingerprint, entry.created_at);
            None
        }
    }

    /// Store `entry`, replacing any previous entry for the same fingerprint.
    pub fn insert(&self, fingerprint: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(fingerprint.into(), entry);
    }

    pub fn remove(&self, fingerprint: &str) -> Option<CacheEntry> {
        self.entries.remove(fingerprint).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a snapshot written by [`DocumentCache::persist`].
    ///
    /// A missing file yields an empty cache.
    pub fn load(path: &Path) -> Result<Self, PdfChatError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(PdfChatError::CacheIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let snapshot: Snapshot =
            serde_json::from_str(&raw).map_err(|e| PdfChatError::CacheCorrupt {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PdfChatError::CacheCorrupt {
                path: path.to_path_buf(),
                detail: format!("unsupported snapshot version {}", snapshot.version),
            });
        }
        info!("Loaded {} cache entries from {}", snapshot.entries.len(), path.display());
        Ok(Self {
            entries: snapshot.entries.into_iter().collect(),
        })
    }

    /// Write every entry (stale ones included) to `path`.
    ///
    /// Uses atomic write (temp file + rename) so a crash never leaves a
    /// truncated snapshot behind.
    pub fn persist(&self, path: &Path) -> Result<(), PdfChatError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries: self
                .entries
                .iter()
                .map(|kv| (kv.key().clone(), kv.value().clone()))
                .collect(),
        };
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| PdfChatError::Internal(format!("cache serialisation: {e}")))?;

        let io_err = |source| PdfChatError::CacheIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(io_err)?;
        std::fs::rename(&tmp_path, path).map_err(io_err)?;
        debug!("Persisted {} cache entries to {}", snapshot.entries.len(), path.display());
        Ok(())
    }
}
