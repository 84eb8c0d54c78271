// src/ingest/mod.rs
pub mod parser;
pub mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::error::SourceError;
use crate::fingerprint;
use crate::store::{CacheValidator, ConditionalFetchCache};
use types::{Article, FeedSource, FeedTransport, FetchResponse, SourceStatus};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_articles_total", "Articles parsed from feed bodies.");
        describe_counter!(
            "fetch_not_modified_total",
            "Sources answering not-modified (304 or digest match)."
        );
        describe_counter!("fetch_failed_total", "Per-source fetch/parse failures.");
    });
}

/// Result of one fetch batch: every parsed article plus the per-source
/// status map. The batch itself never fails; a fully broken cycle is all
/// sources `Failed` with zero articles.
#[derive(Debug)]
pub struct FetchBatch {
    pub articles: Vec<Article>,
    pub status: BTreeMap<String, SourceStatus>,
}

impl FetchBatch {
    pub fn status_of(&self, source_id: &str) -> Option<SourceStatus> {
        self.status.get(source_id).copied()
    }

    pub fn failed_count(&self) -> usize {
        self.status
            .values()
            .filter(|s| **s == SourceStatus::Failed)
            .count()
    }
}

/// Retrieves raw feed documents and parses them into articles, using the
/// conditional fetch cache to avoid re-downloading unchanged sources.
pub struct FeedFetcher {
    transport: Box<dyn FeedTransport>,
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            transport: Box::new(HttpTransport::new(timeout)),
        }
    }

    /// Substitute the transport seam (tests, fixtures).
    pub fn with_transport(transport: Box<dyn FeedTransport>) -> Self {
        Self { transport }
    }

    /// Fetch every source sequentially. Per-source failures are logged and
    /// absorbed; validators are staged on success and persisted once after
    /// the whole batch (single writer, one rewrite per cycle).
    pub async fn fetch_all(
        &self,
        sources: &[FeedSource],
        cache: &mut ConditionalFetchCache,
    ) -> FetchBatch {
        ensure_metrics_described();

        let mut articles = Vec::new();
        let mut status = BTreeMap::new();

        for source in sources {
            let (outcome, mut items) = self.fetch_one(source, cache).await;
            match outcome {
                SourceStatus::FetchedNew => {
                    counter!("fetch_articles_total").increment(items.len() as u64);
                }
                SourceStatus::NotModified => {
                    counter!("fetch_not_modified_total").increment(1);
                }
                SourceStatus::Failed => {
                    counter!("fetch_failed_total").increment(1);
                }
            }
            articles.append(&mut items);
            status.insert(source.id.clone(), outcome);
        }

        if let Err(e) = cache.persist_if_dirty() {
            tracing::error!(error = %e, "persisting fetch cache failed; validators stay in memory");
        }

        FetchBatch { articles, status }
    }

    async fn fetch_one(
        &self,
        source: &FeedSource,
        cache: &mut ConditionalFetchCache,
    ) -> (SourceStatus, Vec<Article>) {
        let validator = cache.get_validator(&source.id).cloned();

        let response = match self.transport.get(source, validator.as_ref()).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(source = %source.id, error = %e, "feed fetch failed");
                return (SourceStatus::Failed, Vec::new());
            }
        };

        let (body, etag, last_modified) = match response {
            FetchResponse::NotModified => {
                tracing::debug!(source = %source.id, "not modified (304)");
                return (SourceStatus::NotModified, Vec::new());
            }
            FetchResponse::Body {
                body,
                etag,
                last_modified,
            } => (body, etag, last_modified),
        };

        // Digest fallback: an unchanged body from a server without
        // validators counts as not-modified and leaves the validator alone.
        let digest = fingerprint::hex_digest(body.as_bytes());
        if let Some(v) = &validator {
            if v.content_digest.as_deref() == Some(digest.as_str()) {
                tracing::debug!(source = %source.id, "not modified (body digest)");
                return (SourceStatus::NotModified, Vec::new());
            }
        }

        match parser::parse_feed(&source.id, &body) {
            Ok(items) => {
                tracing::info!(source = %source.id, count = items.len(), "feed fetched");
                cache.record_success(&source.id, etag, last_modified, Some(digest));
                (SourceStatus::FetchedNew, items)
            }
            Err(e) => {
                // Old validator survives so the next cycle retries cleanly.
                tracing::warn!(source = %source.id, error = %e, "feed body unparsable");
                (SourceStatus::Failed, Vec::new())
            }
        }
    }
}

/// Conditional HTTP GET transport backed by reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rss-feed-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self { client }
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn get(
        &self,
        source: &FeedSource,
        validator: Option<&CacheValidator>,
    ) -> Result<FetchResponse, SourceError> {
        let mut req = self.client.get(&source.url);
        if let Some(v) = validator {
            if let Some(etag) = &v.etag {
                req = req.header(reqwest::header::IF_NONE_MATCH, etag);
            }
            if let Some(lm) = &v.last_modified {
                req = req.header(reqwest::header::IF_MODIFIED_SINCE, lm);
            }
        }

        let resp = req.send().await?;
        if resp.status() == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(FetchResponse::NotModified);
        }
        if !resp.status().is_success() {
            return Err(SourceError::Status(resp.status().as_u16()));
        }

        let etag = header_string(&resp, reqwest::header::ETAG);
        let last_modified = header_string(&resp, reqwest::header::LAST_MODIFIED);
        let body = resp.text().await?;
        Ok(FetchResponse::Body {
            body,
            etag,
            last_modified,
        })
    }
}

fn header_string(resp: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
