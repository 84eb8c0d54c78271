// tests/scheduler_overlap.rs
//! Non-overlap and skip-not-queue behavior of the interval runner, under a
//! paused tokio clock.
mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{source, test_config, GeneratingTransport, RecordingPublisher, ScriptedClassifier, ScriptedSynthesizer};
use rss_feed_monitor::pipeline::PipelineController;
use rss_feed_monitor::scheduler::IntervalRunner;
use rss_feed_monitor::store::{ArticleHistoryStore, ConditionalFetchCache};
use rss_feed_monitor::FeedFetcher;

fn controller(
    dir: &tempfile::TempDir,
    transport: GeneratingTransport,
    publisher: RecordingPublisher,
) -> PipelineController {
    let cfg = test_config(dir.path(), vec![source("gen")]);
    PipelineController::new(
        &cfg,
        FeedFetcher::with_transport(Box::new(transport)),
        ConditionalFetchCache::load(&cfg.cache_path),
        ArticleHistoryStore::load(&cfg.history_path, cfg.tracking_params.clone()),
        Box::new(ScriptedClassifier::default()),
        Box::new(ScriptedSynthesizer::default()),
        Box::new(publisher),
        None,
    )
}

#[tokio::test(start_paused = true)]
async fn slow_runs_never_overlap_and_ticks_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    // each invocation takes ~150s against a 60s period
    let transport = GeneratingTransport::with_delay(Duration::from_secs(150));
    let publisher = RecordingPublisher::default();
    let mut pipeline = controller(&dir, transport.clone(), publisher.clone());

    let handle = tokio::spawn(async move {
        IntervalRunner::new(Duration::from_secs(60))
            .run(&mut pipeline)
            .await;
    });

    tokio::time::sleep(Duration::from_secs(600)).await;
    handle.abort();

    // Runs back-to-back at ~150s each plus skipped-tick alignment: three
    // completed invocations fit into 600s. A queueing scheduler would have
    // accumulated ten.
    let completed = transport.calls.load(Ordering::SeqCst);
    assert!(
        (2..=4).contains(&completed),
        "completed invocations = {completed}"
    );
    assert_eq!(
        transport.max_in_flight.load(Ordering::SeqCst),
        1,
        "two invocations ran concurrently"
    );
}

#[tokio::test(start_paused = true)]
async fn failed_invocations_do_not_stop_the_timer() {
    let dir = tempfile::tempdir().unwrap();
    let transport = GeneratingTransport::default();
    let publisher = RecordingPublisher::default();
    publisher.fail.store(true, Ordering::SeqCst);
    let mut pipeline = controller(&dir, transport.clone(), publisher.clone());

    let handle = tokio::spawn(async move {
        IntervalRunner::new(Duration::from_secs(60))
            .run(&mut pipeline)
            .await;
    });

    tokio::time::sleep(Duration::from_secs(310)).await;
    handle.abort();

    // every invocation failed at publish, yet the schedule kept going
    let attempts = transport.calls.load(Ordering::SeqCst);
    assert!(attempts >= 5, "attempts = {attempts}");
    assert!(publisher.published.lock().unwrap().is_empty());
}
