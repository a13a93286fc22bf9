//! End-to-end coordinator sessions driven by scripted feeds and classifiers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use siren_ml_client::{ClassifierResult, FrameClassifier, ScriptedClassifier};
use siren_models::{
    AlertEvent, ClassificationResult, FeedStatus, Frame, LocationId, SignalPhase, SourceId, SourceSpec,
};
use siren_store::{AlertSink, DispatchConfig, DispatchSimulator, MemoryAlertSink, StoreResult};
use siren_worker::{Coordinator, CoordinatorConfig, ScriptedFeed, TokioClock, WorkerError};

fn config() -> CoordinatorConfig {
    CoordinatorConfig::default()
}

fn coordinator(config: CoordinatorConfig, sink: Arc<dyn AlertSink>) -> Coordinator {
    Coordinator::new(config, sink)
        .unwrap()
        .with_clock(Arc::new(TokioClock::new(Utc::now())))
}

/// Feed delivering `count` frames one second apart.
fn paced_frames(source: &str, count: usize) -> ScriptedFeed {
    let mut feed = ScriptedFeed::new(source);
    for _ in 0..count {
        feed = feed.pause(Duration::from_secs(1)).frames(1);
    }
    feed
}

fn emergencies(confidences: &[f64]) -> Arc<ScriptedClassifier> {
    Arc::new(ScriptedClassifier::new(
        confidences.iter().map(|c| ClassificationResult::emergency(*c)),
    ))
}

#[tokio::test(start_paused = true)]
async fn five_qualifying_frames_raise_one_alert() {
    let sink = Arc::new(MemoryAlertSink::new());
    let mut coordinator = coordinator(config(), sink.clone());
    coordinator
        .add_source(
            SourceSpec::new("s1", "main-st", "Main Street"),
            Box::new(paced_frames("s1", 5)),
            emergencies(&[92.0, 88.0, 91.0, 95.0, 90.0]),
        )
        .unwrap();

    let session = coordinator.start();
    let handle = session.handle();

    // Four frames in: not armed yet
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    assert!(handle.active_emergencies().await.is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(handle.active_emergencies().await.contains(&SourceId::from("s1")));

    let signal = handle.signal_state(&LocationId::from("main-st")).await.unwrap();
    assert_eq!(signal.phase, SignalPhase::Green);
    assert!(signal.priority_override_active);
    assert_eq!(signal.current_phase_duration, 45.0);

    let report = session.shutdown().await.unwrap();
    assert_eq!(report.consumer.delivered, 1);
    assert_eq!(report.pipeline.dropped, 0);

    let alerts = sink.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].confidence, 90.0);
    assert_eq!(alerts[0].payload.sequence, 4);
}

#[tokio::test(start_paused = true)]
async fn detections_at_two_sources_form_a_transition() {
    let sink = Arc::new(MemoryAlertSink::new());
    let mut config = config();
    config.monitor.required_hits = 1;
    let mut coordinator = coordinator(config, sink.clone());

    coordinator
        .add_source(
            SourceSpec::new("s1", "main-st", "Main Street"),
            Box::new(ScriptedFeed::new("s1").frames(1)),
            emergencies(&[92.0]),
        )
        .unwrap();
    coordinator
        .add_source(
            SourceSpec::new("s2", "hospital", "City Hospital"),
            Box::new(ScriptedFeed::new("s2").pause(Duration::from_secs(3)).frames(1)),
            emergencies(&[88.0]),
        )
        .unwrap();

    let session = coordinator.start();
    let handle = session.handle();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let transitions = handle.recent_transitions().await;
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].from_source.as_str(), "s1");
    assert_eq!(transitions[0].to_source.as_str(), "s2");
    assert_eq!(transitions[0].to_location, "City Hospital");
    assert!(transitions[0].elapsed_secs() >= 3.0);

    assert_eq!(handle.location_ids().len(), 2);
    session.shutdown().await.unwrap();
    assert_eq!(sink.len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn alerts_from_one_source_respect_cooldown() {
    let sink = Arc::new(MemoryAlertSink::new());
    let mut coordinator = coordinator(config(), sink.clone());

    let mut script = vec![ClassificationResult::emergency(90.0); 5];
    script.extend(vec![ClassificationResult::normal(90.0); 5]);
    script.extend(vec![ClassificationResult::emergency(90.0); 5]);

    coordinator
        .add_source(
            SourceSpec::new("s1", "main-st", "Main Street"),
            Box::new(paced_frames("s1", 15)),
            Arc::new(ScriptedClassifier::new(script)),
        )
        .unwrap();

    let session = coordinator.start();
    tokio::time::sleep(Duration::from_secs(17)).await;
    session.shutdown().await.unwrap();

    let alerts: Vec<AlertEvent> = sink.alerts().await;
    assert_eq!(alerts.len(), 2);
    let gap = alerts[1].timestamp - alerts[0].timestamp;
    assert!(gap >= chrono::Duration::seconds(5), "alerts only {:?} apart", gap);
}

#[tokio::test(start_paused = true)]
async fn reconnect_keeps_debounce_progress() {
    let sink = Arc::new(MemoryAlertSink::new());
    let mut coordinator = coordinator(config(), sink.clone());

    let feed = ScriptedFeed::new("s1")
        .frames(3)
        .fail("camera rebooted")
        .frames(2);
    coordinator
        .add_source(
            SourceSpec::new("s1", "main-st", "Main Street"),
            Box::new(feed),
            emergencies(&[90.0; 5]),
        )
        .unwrap();

    let session = coordinator.start();
    let handle = session.handle();
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Three hits before the dropout plus two after it arm the latch
    assert!(handle.active_emergencies().await.contains(&SourceId::from("s1")));

    let health = handle.source_health().await;
    let s1 = &health[&SourceId::from("s1")];
    assert_eq!(s1.status, FeedStatus::Online);
    assert_eq!(s1.reconnects, 1);
    assert_eq!(s1.consecutive_failures, 0);

    session.shutdown().await.unwrap();
    assert_eq!(sink.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_mark_source_degraded() {
    let sink = Arc::new(MemoryAlertSink::new());
    let mut config = config();
    config.feed.degraded_after = 3;
    let mut coordinator = coordinator(config, sink);

    let feed = ScriptedFeed::new("s1").end().end().failing_reconnects(5);
    coordinator
        .add_source(
            SourceSpec::new("s1", "main-st", "Main Street"),
            Box::new(feed),
            emergencies(&[]),
        )
        .unwrap();

    let session = coordinator.start();
    let handle = session.handle();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let degraded = handle.degraded_sources().await;
    assert!(degraded.contains(&SourceId::from("s1")));
    // Degraded sources stay registered
    assert!(handle.source_health().await.contains_key(&SourceId::from("s1")));

    session.shutdown().await.unwrap();
}

/// Takes a long time per alert so the queue backs up.
struct SlowSink;

#[async_trait]
impl AlertSink for SlowSink {
    async fn record(&self, _alert: &AlertEvent) -> StoreResult<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test(start_paused = true)]
async fn full_queue_drops_instead_of_blocking_sources() {
    let mut config = config();
    config.monitor.required_hits = 1;
    config.pipeline.capacity = 1;
    let mut coordinator = coordinator(config, Arc::new(SlowSink));

    for id in ["s1", "s2", "s3"] {
        coordinator
            .add_source(
                SourceSpec::new(id, "main-st", "Main Street"),
                Box::new(ScriptedFeed::new(id).frames(1)),
                emergencies(&[95.0]),
            )
            .unwrap();
    }

    let session = coordinator.start();
    let handle = session.handle();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Every source armed even though alerts could not all be queued
    assert_eq!(handle.active_emergencies().await.len(), 3);
    let stats = handle.pipeline_stats();
    assert!(handle.dropped_alerts() >= 1);
    assert_eq!(stats.published + stats.dropped, 3);

    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn alerts_reach_dispatch_and_shutdown_cancels_it() {
    let sink = Arc::new(MemoryAlertSink::new());
    let dispatch = Arc::new(DispatchSimulator::new(DispatchConfig::default()));
    let mut config = config();
    config.monitor.required_hits = 1;
    let mut coordinator = coordinator(config, sink.clone()).with_dispatch(Arc::clone(&dispatch));

    coordinator
        .add_source(
            SourceSpec::new("s1", "main-st", "Main Street"),
            Box::new(ScriptedFeed::new("s1").frames(1)),
            emergencies(&[91.0]),
        )
        .unwrap();

    let session = coordinator.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(dispatch.active_responses().await.len(), 1);

    session.shutdown().await.unwrap();

    let responses = dispatch.all_responses().await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].location_name, "Main Street");
    assert!(!responses[0].completed);
    assert_eq!(sink.len().await, 1);
}

/// Spends half a second on every frame.
struct SlowClassifier;

#[async_trait]
impl FrameClassifier for SlowClassifier {
    async fn try_classify(&self, _frame: &Frame) -> ClassifierResult<ClassificationResult> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(ClassificationResult::emergency(93.0))
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_delivers_alert_from_frame_in_progress() {
    let sink = Arc::new(MemoryAlertSink::new());
    let mut config = config();
    config.monitor.required_hits = 1;
    let mut coordinator = coordinator(config, sink.clone());

    coordinator
        .add_source(
            SourceSpec::new("s1", "main-st", "Main Street"),
            Box::new(ScriptedFeed::new("s1").frames(1)),
            Arc::new(SlowClassifier),
        )
        .unwrap();

    let session = coordinator.start();
    // Stop while the only frame is still being classified
    tokio::time::sleep(Duration::from_millis(100)).await;
    let report = session.shutdown().await.unwrap();

    assert_eq!(report.pipeline.dropped, 0);
    assert_eq!(report.consumer.delivered, 1);
    assert_eq!(sink.len().await, 1);
    assert_eq!(sink.alerts().await[0].confidence, 93.0);
}

#[tokio::test(start_paused = true)]
async fn signal_cycles_without_frames() {
    let mut coordinator = coordinator(config(), Arc::new(MemoryAlertSink::new()));
    coordinator
        .add_source(
            SourceSpec::new("s1", "main-st", "Main Street"),
            Box::new(ScriptedFeed::new("s1")),
            emergencies(&[]),
        )
        .unwrap();

    let session = coordinator.start();
    let handle = session.handle();
    let location = LocationId::from("main-st");

    assert_eq!(handle.signal_state(&location).await.unwrap().phase, SignalPhase::Red);
    tokio::time::sleep(Duration::from_millis(20_500)).await;
    assert_eq!(handle.signal_state(&location).await.unwrap().phase, SignalPhase::Green);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(handle.signal_state(&location).await.unwrap().phase, SignalPhase::Red);

    assert!(handle.signal_state(&LocationId::from("nowhere")).await.is_none());
    session.shutdown().await.unwrap();
}

#[test]
fn invalid_registration_is_rejected() {
    let mut bad = config();
    bad.monitor.required_hits = 0;
    assert!(Coordinator::new(bad, Arc::new(MemoryAlertSink::new())).is_err());

    let mut coordinator = Coordinator::new(config(), Arc::new(MemoryAlertSink::new())).unwrap();
    let spec = SourceSpec::new("s1", "main-st", "Main Street");
    coordinator
        .add_source(spec.clone(), Box::new(ScriptedFeed::new("s1")), emergencies(&[]))
        .unwrap();
    let duplicate = coordinator.add_source(spec, Box::new(ScriptedFeed::new("s1")), emergencies(&[]));
    assert!(matches!(duplicate, Err(WorkerError::DuplicateSource(_))));
}
