// src/store/history.rs
//! Durable record of already-reported articles.
//!
//! Keyed by the canonical-link fingerprint; an entry's `first_seen_at` is
//! never overwritten, so re-recording a known article is a no-op. Entries
//! older than the retention window are evicted once per invocation to keep
//! the file bounded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;

use crate::fingerprint;
use crate::ingest::types::Article;
use crate::store::JsonFileStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FingerprintEntry {
    pub first_seen_at: DateTime<Utc>,
    pub source_id: String,
}

pub struct ArticleHistoryStore {
    store: JsonFileStore<FingerprintEntry>,
    tracking_params: Vec<String>,
}

impl ArticleHistoryStore {
    pub fn load(path: impl Into<PathBuf>, tracking_params: Vec<String>) -> Self {
        Self {
            store: JsonFileStore::load(path),
            tracking_params,
        }
    }

    fn fingerprint_of(&self, article: &Article) -> Option<String> {
        let link = article.link.as_deref()?.trim();
        if link.is_empty() {
            return None;
        }
        Some(fingerprint::fingerprint(link, &self.tracking_params))
    }

    pub fn is_known(&self, article: &Article) -> bool {
        match self.fingerprint_of(article) {
            Some(fp) => self.store.contains(&fp),
            // An unfingerprintable item is treated as never seen.
            None => false,
        }
    }

    /// Partition a batch into (new, already reported). Articles without a
    /// derivable fingerprint always land in `new`; `record` later skips them.
    pub fn filter_new(&self, articles: Vec<Article>) -> (Vec<Article>, Vec<Article>) {
        let mut fresh = Vec::with_capacity(articles.len());
        let mut known = Vec::new();
        for article in articles {
            if self.is_known(&article) {
                known.push(article);
            } else {
                fresh.push(article);
            }
        }
        (fresh, known)
    }

    /// Insert fingerprints for every article that has one and is not already
    /// present. Idempotent: existing entries keep their `first_seen_at`.
    /// Rewrites the file only when something actually changed.
    pub fn record(&mut self, articles: &[Article], now: DateTime<Utc>) -> io::Result<usize> {
        let mut inserted = 0usize;
        for article in articles {
            let Some(fp) = self.fingerprint_of(article) else {
                continue;
            };
            if self.store.contains(&fp) {
                continue;
            }
            self.store.put(
                fp,
                FingerprintEntry {
                    first_seen_at: now,
                    source_id: article.source_id.clone(),
                },
            );
            inserted += 1;
        }
        if inserted > 0 {
            self.store.persist()?;
        }
        Ok(inserted)
    }

    /// Drop every entry older than `retention`. Returns the evicted count.
    pub fn evict_expired(&mut self, retention: Duration, now: DateTime<Utc>) -> io::Result<usize> {
        let before = self.store.len();
        self.store
            .retain(|_, entry| now.signed_duration_since(entry.first_seen_at) <= retention);
        let evicted = before - self.store.len();
        if evicted > 0 {
            self.store.persist()?;
            tracing::info!(evicted, retained = self.store.len(), "history eviction");
        }
        Ok(evicted)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Oldest retained entry, for diagnostics.
    pub fn oldest_entry(&self) -> Option<DateTime<Utc>> {
        self.store.iter().map(|(_, e)| e.first_seen_at).min()
    }
}
