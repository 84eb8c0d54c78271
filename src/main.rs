//! RSS Feed Monitor — Binary Entrypoint
//! Wires configuration, durable stores, the external services and the
//! pipeline, then runs once or on an interval.

use anyhow::{bail, Result};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rss_feed_monitor::classify::{AcceptAllClassifier, ArticleClassifier, OpenAiClassifier};
use rss_feed_monitor::pipeline::PipelineController;
use rss_feed_monitor::publish::{self, LatestReportStore};
use rss_feed_monitor::scheduler::{log_outcome, IntervalRunner};
use rss_feed_monitor::store::{ArticleHistoryStore, ConditionalFetchCache};
use rss_feed_monitor::synthesize::{OpenAiSynthesizer, SingleTopicSynthesizer, Synthesizer};
use rss_feed_monitor::{AppConfig, FeedFetcher, RunOutcome};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    if cfg.feeds.is_empty() {
        bail!("no feeds configured (set RSS_FEEDS or [[feeds]] in config/monitor.toml)");
    }
    tracing::info!(
        feeds = cfg.feeds.len(),
        output = %cfg.output,
        interval_minutes = cfg.interval_minutes,
        "starting rss feed monitor"
    );

    let cache = ConditionalFetchCache::load(&cfg.cache_path);
    let history = ArticleHistoryStore::load(&cfg.history_path, cfg.tracking_params.clone());
    let fetcher = FeedFetcher::new(Duration::from_secs(cfg.fetch_timeout_secs));

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    let llm_timeout = Duration::from_secs(cfg.llm_timeout_secs);
    let classifier: Box<dyn ArticleClassifier> = if api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY unset; article filtering disabled");
        Box::new(AcceptAllClassifier)
    } else {
        Box::new(OpenAiClassifier::new(
            api_key.clone(),
            cfg.filter_model.clone(),
            llm_timeout,
        ))
    };
    let synthesizer: Box<dyn Synthesizer> = if api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY unset; topic synthesis reduced to a headline digest");
        Box::new(SingleTopicSynthesizer)
    } else {
        Box::new(OpenAiSynthesizer::new(
            api_key,
            cfg.group_model.clone(),
            cfg.summarize_model.clone(),
            llm_timeout,
        ))
    };

    let publisher = publish::from_config(&cfg);
    let latest = LatestReportStore::new(&cfg.latest_report_path);

    let mut pipeline = PipelineController::new(
        &cfg,
        fetcher,
        cache,
        history,
        classifier,
        synthesizer,
        publisher,
        Some(latest),
    );

    match cfg.interval() {
        None => {
            let outcome = pipeline.run_once().await;
            log_outcome(&outcome);
            if let RunOutcome::Failed { stage, error } = outcome {
                bail!("run failed at {stage}: {error:#}");
            }
        }
        Some(period) => {
            IntervalRunner::new(period).run(&mut pipeline).await;
        }
    }

    Ok(())
}
