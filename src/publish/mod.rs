// src/publish/mod.rs
pub mod console;
pub mod email;
pub mod latest;
pub mod slack;

pub use console::ConsolePublisher;
pub use email::EmailPublisher;
pub use latest::LatestReportStore;
pub use slack::SlackPublisher;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::synthesize::TopicGroup;

/// The publishable artifact of one successful run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub topics: Vec<TopicGroup>,
}

impl Report {
    pub fn article_count(&self) -> usize {
        self.topics.iter().map(|t| t.articles.len()).sum()
    }
}

/// Publication sink. Failure is run-level: the pipeline reports the
/// invocation as failed and leaves history untouched so the same articles
/// are retried next cycle.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, report: &Report) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Absent-sink variant: logs and discards. Selected via `output = "none"`.
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, report: &Report) -> Result<()> {
        tracing::info!(
            topics = report.topics.len(),
            articles = report.article_count(),
            "publisher disabled, report discarded"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Select the sink from configuration. Unknown names fall back to console
/// with a warning rather than refusing to run.
pub fn from_config(cfg: &AppConfig) -> Box<dyn Publisher> {
    match cfg.output.as_str() {
        "console" => Box::new(ConsolePublisher),
        "slack" => Box::new(SlackPublisher::from_env()),
        "email" => Box::new(EmailPublisher::from_env()),
        "none" => Box::new(NoopPublisher),
        other => {
            tracing::warn!(output = %other, "unknown output sink, using console");
            Box::new(ConsolePublisher)
        }
    }
}
