// tests/common/mod.rs
//! Shared scripted doubles for the pipeline seams.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rss_feed_monitor::classify::{ArticleClassifier, Verdict};
use rss_feed_monitor::error::{ClassifyError, SourceError, SynthesisError};
use rss_feed_monitor::ingest::types::{Article, FeedSource, FeedTransport, FetchResponse};
use rss_feed_monitor::publish::{Publisher, Report};
use rss_feed_monitor::store::CacheValidator;
use rss_feed_monitor::synthesize::{Synthesizer, TopicGroup};
use rss_feed_monitor::AppConfig;

pub fn source(id: &str) -> FeedSource {
    FeedSource {
        id: id.to_string(),
        url: format!("https://{id}.example.com/rss"),
    }
}

/// Minimal RSS body with (title, link) items.
pub fn rss_body(items: &[(&str, &str)]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>t</title>",
    );
    for (title, link) in items {
        body.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link></item>"
        ));
    }
    body.push_str("</channel></rss>");
    body
}

pub fn test_config(dir: &std::path::Path, feeds: Vec<FeedSource>) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.feeds = feeds;
    cfg.filter_prompt = "anything newsworthy".into();
    cfg.history_path = dir.join("history.json");
    cfg.cache_path = dir.join("cache.json");
    cfg.latest_report_path = dir.join("latest_report.json");
    cfg
}

// --- transport -----------------------------------------------------------

pub enum Canned {
    Body {
        body: String,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    NotModified,
    NetworkError,
}

impl Canned {
    pub fn plain(body: &str) -> Self {
        Canned::Body {
            body: body.to_string(),
            etag: None,
            last_modified: None,
        }
    }

    pub fn with_etag(body: &str, etag: &str) -> Self {
        Canned::Body {
            body: body.to_string(),
            etag: Some(etag.to_string()),
            last_modified: None,
        }
    }
}

/// Per-source queues of canned responses; records the validator each call
/// carried so conditional-request behavior can be asserted.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<HashMap<String, VecDeque<Canned>>>>,
    pub seen_validators: Arc<Mutex<Vec<(String, Option<CacheValidator>)>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, source_id: &str, canned: Canned) {
        self.script
            .lock()
            .unwrap()
            .entry(source_id.to_string())
            .or_default()
            .push_back(canned);
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn get(
        &self,
        source: &FeedSource,
        validator: Option<&CacheValidator>,
    ) -> Result<FetchResponse, SourceError> {
        self.seen_validators
            .lock()
            .unwrap()
            .push((source.id.clone(), validator.cloned()));

        let canned = self
            .script
            .lock()
            .unwrap()
            .get_mut(&source.id)
            .and_then(|q| q.pop_front());
        match canned {
            Some(Canned::Body {
                body,
                etag,
                last_modified,
            }) => Ok(FetchResponse::Body {
                body,
                etag,
                last_modified,
            }),
            Some(Canned::NotModified) => Ok(FetchResponse::NotModified),
            Some(Canned::NetworkError) => Err(SourceError::Status(503)),
            // script exhausted: behave like an unreachable source
            None => Err(SourceError::Status(404)),
        }
    }
}

/// Emits one fresh single-item feed per call (unique link every time) and
/// tracks how many fetches ran concurrently.
#[derive(Clone, Default)]
pub struct GeneratingTransport {
    pub calls: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    pub delay: std::time::Duration,
}

impl GeneratingTransport {
    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl FeedTransport for GeneratingTransport {
    async fn get(
        &self,
        _source: &FeedSource,
        _validator: Option<&CacheValidator>,
    ) -> Result<FetchResponse, SourceError> {
        let live = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(live, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let title = format!("story {n}");
        let link = format!("https://gen.example.com/story-{n}");
        Ok(FetchResponse::Body {
            body: rss_body(&[(title.as_str(), link.as_str())]),
            etag: None,
            last_modified: None,
        })
    }
}

// --- classifier ----------------------------------------------------------

#[derive(Clone, Default)]
pub struct ScriptedClassifier {
    pub reject_titles: Arc<Mutex<HashSet<String>>>,
    pub error_titles: Arc<Mutex<HashSet<String>>>,
    pub fail_all: Arc<AtomicBool>,
}

impl ScriptedClassifier {
    pub fn rejecting(titles: &[&str]) -> Self {
        let s = Self::default();
        s.reject_titles
            .lock()
            .unwrap()
            .extend(titles.iter().map(|t| t.to_string()));
        s
    }
}

#[async_trait]
impl ArticleClassifier for ScriptedClassifier {
    async fn classify(&self, article: &Article, _criteria: &str) -> Result<Verdict, ClassifyError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ClassifyError::Unavailable("scripted outage".into()));
        }
        if self.error_titles.lock().unwrap().contains(&article.title) {
            return Err(ClassifyError::Unavailable("scripted per-article error".into()));
        }
        if self.reject_titles.lock().unwrap().contains(&article.title) {
            return Ok(Verdict {
                accept: false,
                reason: "scripted reject".into(),
            });
        }
        Ok(Verdict {
            accept: true,
            reason: "scripted accept".into(),
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// --- synthesizer ---------------------------------------------------------

#[derive(Clone, Default)]
pub struct ScriptedSynthesizer {
    pub fail: Arc<AtomicBool>,
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, articles: &[Article]) -> Result<Vec<TopicGroup>, SynthesisError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SynthesisError::Unavailable("scripted outage".into()));
        }
        if articles.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![TopicGroup {
            topic: "Scripted topic".into(),
            summary: "One scripted summary.".into(),
            articles: articles
                .iter()
                .map(|a| rss_feed_monitor::synthesize::TopicArticle {
                    title: a.title.clone(),
                    link: a.link.clone().unwrap_or_default(),
                })
                .collect(),
        }])
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// --- publisher -----------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub published: Arc<Mutex<Vec<Report>>>,
    pub fail: Arc<AtomicBool>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, report: &Report) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("scripted publish failure");
        }
        self.published.lock().unwrap().push(report.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
