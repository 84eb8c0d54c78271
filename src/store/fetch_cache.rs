// src/store/fetch_cache.rs
//! Per-source HTTP validators for conditional feed fetching.
//!
//! At most one validator per source. A validator is replaced only after a
//! successful fetch + parse; fetch failures and not-modified responses leave
//! it untouched, so a transiently broken source keeps its validators for the
//! next cycle. Writes are staged in memory and flushed once per fetch batch.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;

use crate::store::JsonFileStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheValidator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Hash of the last successfully parsed body. Fallback identity check
    /// for servers that send neither ETag nor Last-Modified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_digest: Option<String>,
}

pub struct ConditionalFetchCache {
    store: JsonFileStore<CacheValidator>,
    dirty: bool,
}

impl ConditionalFetchCache {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonFileStore::load(path),
            dirty: false,
        }
    }

    pub fn get_validator(&self, source_id: &str) -> Option<&CacheValidator> {
        self.store.get(source_id)
    }

    /// Replace the stored validator for a source. Safe to call after every
    /// successful fetch regardless of whether the body changed; the file is
    /// not touched until `persist_if_dirty`.
    pub fn record_success(
        &mut self,
        source_id: &str,
        etag: Option<String>,
        last_modified: Option<String>,
        content_digest: Option<String>,
    ) {
        self.store.put(
            source_id.to_string(),
            CacheValidator {
                etag,
                last_modified,
                content_digest,
            },
        );
        self.dirty = true;
    }

    /// Whole-file rewrite, called once after all fetches of a batch have
    /// completed. No-op when nothing was recorded.
    pub fn persist_if_dirty(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.store.persist()?;
        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
