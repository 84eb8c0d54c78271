// src/pipeline.rs
//! One pipeline invocation: FETCH → DEDUPE → CLASSIFY → SYNTHESIZE →
//! PUBLISH → RECORD_HISTORY.
//!
//! The controller owns the durable stores for the lifetime of the process
//! and the transient run record for one invocation. The overriding policy:
//! never lose already-published history, never double-count a retry, and
//! prefer an empty or skipped run over a corrupted or duplicated one.
//! History commits strictly after a successful publish, which gives
//! at-most-once delivery on the happy path and at-least-once under failure.

use std::fmt;

use chrono::Utc;
use metrics::counter;

use crate::classify::ArticleClassifier;
use crate::config::AppConfig;
use crate::ingest::types::{Article, FeedSource, SourceStatus};
use crate::ingest::FeedFetcher;
use crate::publish::{LatestReportStore, Publisher, Report};
use crate::store::{ArticleHistoryStore, ConditionalFetchCache};
use crate::synthesize::Synthesizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Dedupe,
    Classify,
    Synthesize,
    Publish,
    RecordHistory,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetch => "fetch",
            Stage::Dedupe => "dedupe",
            Stage::Classify => "classify",
            Stage::Synthesize => "synthesize",
            Stage::Publish => "publish",
            Stage::RecordHistory => "record-history",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of one invocation, consumed by the interval runner and
/// the binary.
#[derive(Debug)]
pub enum RunOutcome {
    /// Nothing new survived dedup/classification. A successful no-op.
    Empty,
    /// Report published and history committed.
    Success { topics: usize, articles: usize },
    /// A run-level stage failed. History was not mutated beyond what had
    /// already committed.
    Failed {
        stage: Stage,
        error: anyhow::Error,
    },
}

impl RunOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

pub struct PipelineController {
    sources: Vec<FeedSource>,
    criteria: String,
    retention: chrono::Duration,
    ignore_history: bool,
    fetcher: FeedFetcher,
    cache: ConditionalFetchCache,
    history: ArticleHistoryStore,
    classifier: Box<dyn ArticleClassifier>,
    synthesizer: Box<dyn Synthesizer>,
    publisher: Box<dyn Publisher>,
    latest: Option<LatestReportStore>,
}

impl PipelineController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: &AppConfig,
        fetcher: FeedFetcher,
        cache: ConditionalFetchCache,
        history: ArticleHistoryStore,
        classifier: Box<dyn ArticleClassifier>,
        synthesizer: Box<dyn Synthesizer>,
        publisher: Box<dyn Publisher>,
        latest: Option<LatestReportStore>,
    ) -> Self {
        Self {
            sources: cfg.feeds.clone(),
            criteria: cfg.filter_prompt.clone(),
            retention: cfg.retention(),
            ignore_history: cfg.ignore_history,
            fetcher,
            cache,
            history,
            classifier,
            synthesizer,
            publisher,
            latest,
        }
    }

    pub fn history(&self) -> &ArticleHistoryStore {
        &self.history
    }

    /// Run one complete invocation. Never panics, never returns an
    /// unhandled error: every failure mode maps to a terminal outcome.
    pub async fn run_once(&mut self) -> RunOutcome {
        let now = Utc::now();

        // Bounded storage: evict before the run so the in-memory snapshot
        // used for dedup is already trimmed. Eviction and dedup touch
        // disjoint fingerprints, so ordering does not affect correctness.
        if let Err(e) = self.history.evict_expired(self.retention, now) {
            tracing::warn!(error = %e, "history eviction failed, continuing with full store");
        }

        // FETCH — per-source failures are absorbed inside the fetcher.
        let batch = self.fetcher.fetch_all(&self.sources, &mut self.cache).await;
        let failed = batch.failed_count();
        if failed > 0 {
            tracing::warn!(
                failed,
                total = self.sources.len(),
                "degraded fetch batch"
            );
        }
        let not_modified = batch
            .status
            .values()
            .filter(|s| **s == SourceStatus::NotModified)
            .count();
        tracing::info!(
            articles = batch.articles.len(),
            not_modified,
            failed,
            "fetch stage complete"
        );

        // DEDUPE — ignore-history mode bypasses the read path only; the
        // record path after publish still runs so later normal runs see
        // these articles as known.
        let (new_articles, known) = if self.ignore_history {
            (batch.articles, Vec::new())
        } else {
            self.history.filter_new(batch.articles)
        };
        counter!("pipeline_deduped_total").increment(known.len() as u64);
        if !known.is_empty() {
            tracing::debug!(known = known.len(), "already-reported articles dropped");
        }

        if new_articles.is_empty() {
            tracing::info!("no new articles this run");
            return RunOutcome::Empty;
        }

        // CLASSIFY — rejected articles are dropped (but still recorded
        // after a successful publish); service errors exclude the article
        // from this run entirely so it is re-evaluated next cycle.
        let mut accepted: Vec<Article> = Vec::new();
        let mut rejected: Vec<Article> = Vec::new();
        let mut errored = 0usize;
        for article in &new_articles {
            match self.classifier.classify(article, &self.criteria).await {
                Ok(v) if v.accept => accepted.push(article.clone()),
                Ok(v) => {
                    tracing::debug!(title = %article.title, reason = %v.reason, "rejected");
                    rejected.push(article.clone());
                }
                Err(e) => {
                    tracing::warn!(title = %article.title, error = %e, "classification error, article excluded from run");
                    errored += 1;
                }
            }
        }
        counter!("pipeline_classify_errors_total").increment(errored as u64);
        tracing::info!(
            accepted = accepted.len(),
            rejected = rejected.len(),
            errored,
            "classification complete"
        );

        if accepted.is_empty() {
            // A full rejection or a classification outage degrades to an
            // empty run; nothing is recorded, everything retries next cycle.
            tracing::info!("no articles accepted this run");
            return RunOutcome::Empty;
        }

        // SYNTHESIZE
        let topics = match self.synthesizer.synthesize(&accepted).await {
            Ok(t) => t,
            Err(e) => {
                return RunOutcome::Failed {
                    stage: Stage::Synthesize,
                    error: e.into(),
                }
            }
        };

        // PUBLISH — failure leaves history untouched so the same batch is
        // retried (and re-evaluated) next cycle.
        let report = Report {
            generated_at: now,
            topics,
        };
        if let Err(error) = self.publisher.publish(&report).await {
            return RunOutcome::Failed {
                stage: Stage::Publish,
                error,
            };
        }
        if let Some(latest) = &self.latest {
            if let Err(e) = latest.save(&report) {
                tracing::warn!(error = %e, "latest-report artifact not written");
            }
        }

        // RECORD_HISTORY — everything considered this run except the
        // classify-errored articles; rejection is a decision worth
        // remembering, an error is not.
        let mut committed = accepted;
        committed.extend(rejected);
        if let Err(e) = self.history.record(&committed, now) {
            // The report is already out; losing this write only risks a
            // duplicate next cycle, which the policy prefers over a crash.
            tracing::error!(error = %e, "history write failed after publish");
        }

        counter!("pipeline_published_total").increment(1);
        RunOutcome::Success {
            topics: report.topics.len(),
            articles: report.article_count(),
        }
    }
}
