// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::store::CacheValidator;

/// One syndicated item, normalized from an RSS or Atom document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    /// Canonical URL; the identity surface for deduplication. An item
    /// without a link still flows through the pipeline but is never stored.
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Source-provided excerpt, normalized.
    pub summary: Option<String>,
    pub source_id: String,
}

/// A configured feed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub id: String,
    pub url: String,
}

/// Per-source outcome of one fetch batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    FetchedNew,
    NotModified,
    Failed,
}

/// What one conditional GET produced.
#[derive(Debug, Clone)]
pub enum FetchResponse {
    /// Server answered 304; there is no body.
    NotModified,
    Body {
        body: String,
        etag: Option<String>,
        last_modified: Option<String>,
    },
}

/// Transport seam for the fetch stage. The production implementation does
/// conditional HTTP GETs; tests substitute scripted responses.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn get(
        &self,
        source: &FeedSource,
        validator: Option<&CacheValidator>,
    ) -> Result<FetchResponse, SourceError>;
}
