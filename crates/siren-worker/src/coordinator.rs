//! Multi-source monitoring coordinator.
//!
//! The coordinator owns one worker task per registered source, the alert
//! pipeline consumer, the movement tracker, and one signal controller per
//! location. Each source worker pulls frames, debounces them through its
//! [`SourceMonitor`], and fans the result out:
//!
//! - rising edge: tracker entry, then an alert if the cooldown allows
//! - every frame: the location's signal controller hears the latch state
//!
//! Feed failures never remove a source. The worker backs off for a fixed
//! interval and reconnects, leaving the monitor's debounce state untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn, Instrument};

use siren_ml_client::FrameClassifier;
use siren_models::{
    AlertEvent, Frame, LocationId, SignalState, SourceHealth, SourceId, SourceSpec, TrackerEntry,
    Transition,
};
use siren_queue::{alert_pipeline, AlertPublisher, ConsumerReport, PipelineSnapshot, PublishOutcome};
use siren_store::{AlertSink, DispatchSimulator, FanoutSink};

use crate::clock::{Clock, SystemClock};
use crate::config::CoordinatorConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::feed::FrameSource;
use crate::logging::SourceLogger;
use crate::metrics;
use crate::monitor::{Edge, SourceMonitor};
use crate::retry::{backoff_or_shutdown, FailureTracker};
use crate::signal::SignalController;
use crate::tracker::{CorrelationStrategy, MovementTracker};

/// Feed failures logged in full before suppression kicks in.
const MAX_LOGGED_FEED_FAILURES: u32 = 3;

struct RegisteredSource {
    spec: SourceSpec,
    feed: Box<dyn FrameSource>,
    classifier: Arc<dyn FrameClassifier>,
}

/// Builder for a monitoring session.
pub struct Coordinator {
    config: CoordinatorConfig,
    sink: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    dispatch: Option<Arc<DispatchSimulator>>,
    strategy: Option<Box<dyn CorrelationStrategy>>,
    sources: Vec<RegisteredSource>,
}

impl Coordinator {
    /// Create a coordinator delivering alerts to `sink`.
    pub fn new(config: CoordinatorConfig, sink: Arc<dyn AlertSink>) -> WorkerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            clock: Arc::new(SystemClock),
            dispatch: None,
            strategy: None,
            sources: Vec::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Also route every alert through the dispatch simulator.
    pub fn with_dispatch(mut self, dispatch: Arc<DispatchSimulator>) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn with_correlation(mut self, strategy: Box<dyn CorrelationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Register a source with its feed and classifier.
    pub fn add_source(
        &mut self,
        spec: SourceSpec,
        feed: Box<dyn FrameSource>,
        classifier: Arc<dyn FrameClassifier>,
    ) -> WorkerResult<()> {
        if self.sources.iter().any(|s| s.spec.source_id == spec.source_id) {
            return Err(WorkerError::duplicate_source(spec.source_id.as_str()));
        }
        info!(
            source_id = %spec.source_id,
            location = %spec.location_id,
            "Registered source"
        );
        self.sources.push(RegisteredSource {
            spec,
            feed,
            classifier,
        });
        Ok(())
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Spawn every worker and return the running session.
    pub fn start(self) -> MonitoringSession {
        let now = self.clock.now();
        let (shutdown, _) = watch::channel(false);
        // The consumer stops on its own signal, raised once every worker has exited
        let (drain, drain_rx) = watch::channel(false);
        let (publisher, consumer) = alert_pipeline(self.config.pipeline.clone());

        let mut signals = HashMap::new();
        let mut health = BTreeMap::new();
        for source in &self.sources {
            signals.entry(source.spec.location_id.clone()).or_insert_with(|| {
                Mutex::new(SignalController::new(
                    source.spec.location_id.clone(),
                    self.config.signal.clone(),
                    now,
                ))
            });
            health.insert(source.spec.source_id.clone(), SourceHealth::default());
        }

        let tracker = match self.strategy {
            Some(strategy) => MovementTracker::with_strategy(&self.config.tracker, strategy),
            None => MovementTracker::new(&self.config.tracker),
        };

        let shared = Arc::new(Shared {
            config: self.config,
            clock: self.clock,
            signals,
            tracker: Mutex::new(tracker),
            active: RwLock::new(BTreeSet::new()),
            health: RwLock::new(health),
            publisher,
        });

        let sink: Arc<dyn AlertSink> = match &self.dispatch {
            Some(dispatch) => Arc::new(FanoutSink::new(vec![
                self.sink,
                Arc::clone(dispatch) as Arc<dyn AlertSink>,
            ])),
            None => self.sink,
        };
        let consumer = tokio::spawn(consumer.run(sink, drain_rx));
        let ticker = tokio::spawn(run_signal_ticker(Arc::clone(&shared), shutdown.subscribe()));

        let mut workers = JoinSet::new();
        for source in self.sources {
            let monitor = SourceMonitor::new(&source.spec, &shared.config.monitor, source.classifier);
            let logger = SourceLogger::new(&source.spec);
            let span = logger.create_span();
            workers.spawn(
                run_source(
                    Arc::clone(&shared),
                    source.spec,
                    source.feed,
                    monitor,
                    logger,
                    shutdown.subscribe(),
                )
                .instrument(span),
            );
        }

        info!(
            sources = workers.len(),
            locations = shared.signals.len(),
            "Monitoring session started"
        );

        MonitoringSession {
            handle: SessionHandle { shared },
            shutdown,
            drain,
            workers,
            ticker,
            consumer,
            dispatch: self.dispatch,
        }
    }
}

/// State shared by every worker of one session.
struct Shared {
    config: CoordinatorConfig,
    clock: Arc<dyn Clock>,
    signals: HashMap<LocationId, Mutex<SignalController>>,
    tracker: Mutex<MovementTracker>,
    active: RwLock<BTreeSet<SourceId>>,
    health: RwLock<BTreeMap<SourceId, SourceHealth>>,
    publisher: AlertPublisher,
}

impl Shared {
    /// Debounce one frame and fan the outcome out.
    async fn handle_frame(&self, spec: &SourceSpec, monitor: &mut SourceMonitor, frame: &Frame) {
        let now = self.clock.now();
        let outcome = monitor.process(frame, now).await;
        metrics::record_frame(spec.source_id.as_str());

        if let Some(health) = self.health.write().await.get_mut(&spec.source_id) {
            health.record_frame(now);
        }

        match outcome.edge {
            Edge::Rising => {
                metrics::record_edge(spec.source_id.as_str(), outcome.edge.as_str());
                info!(
                    source_id = %spec.source_id,
                    location = %spec.location_name,
                    confidence = outcome.confidence,
                    "Emergency vehicle detected"
                );
                self.set_active(&spec.source_id, true).await;

                let entry = TrackerEntry::new(
                    now,
                    spec.source_id.clone(),
                    spec.location_name.clone(),
                    outcome.confidence,
                );
                self.tracker.lock().await.record(entry);

                if monitor.try_claim_alert(now) {
                    let alert = AlertEvent::new(
                        spec.source_id.clone(),
                        spec.location_id.clone(),
                        spec.location_name.clone(),
                        outcome.confidence,
                        now,
                        frame.reference(),
                    );
                    if let PublishOutcome::Dropped(reason) = self.publisher.publish(alert) {
                        debug!(source_id = %spec.source_id, "Alert not queued: {}", reason);
                    }
                } else {
                    metrics::record_alert_suppressed(spec.source_id.as_str());
                    debug!(source_id = %spec.source_id, "Alert suppressed by cooldown");
                }
            }
            Edge::Falling => {
                metrics::record_edge(spec.source_id.as_str(), outcome.edge.as_str());
                info!(source_id = %spec.source_id, "Emergency cleared");
                self.set_active(&spec.source_id, false).await;
            }
            Edge::Steady => {}
        }

        if let Some(signal) = self.signals.get(&spec.location_id) {
            signal
                .lock()
                .await
                .on_detection(&spec.source_id, outcome.emergency_active, now);
        }
    }

    async fn set_active(&self, source_id: &SourceId, active: bool) {
        let mut set = self.active.write().await;
        if active {
            set.insert(source_id.clone());
        } else {
            set.remove(source_id);
        }
        metrics::set_active_emergencies(set.len());
    }

    /// Record a feed failure. Returns true when the source just became degraded.
    async fn record_feed_failure(&self, source_id: &SourceId) -> bool {
        let mut health = self.health.write().await;
        let newly_degraded = match health.get_mut(source_id) {
            Some(h) => h.record_failure(self.config.feed.degraded_after),
            None => false,
        };
        metrics::record_reconnect(source_id.as_str());
        if newly_degraded {
            metrics::set_degraded_sources(health.values().filter(|h| h.is_degraded()).count());
        }
        newly_degraded
    }

    async fn refresh_degraded_gauge(&self) {
        let health = self.health.read().await;
        metrics::set_degraded_sources(health.values().filter(|h| h.is_degraded()).count());
    }
}

/// Ingest loop for one source.
async fn run_source(
    shared: Arc<Shared>,
    spec: SourceSpec,
    mut feed: Box<dyn FrameSource>,
    mut monitor: SourceMonitor,
    logger: SourceLogger,
    mut shutdown: watch::Receiver<bool>,
) {
    logger.log_start("waiting for frames");
    let backoff = shared.config.feed.reconnect_backoff;
    let mut failures = FailureTracker::new(MAX_LOGGED_FEED_FAILURES);
    let mut frames: u64 = 0;

    'session: loop {
        if *shutdown.borrow() {
            break;
        }

        let next = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            next = feed.next_frame() => next,
        };

        let reason = match next {
            Ok(Some(frame)) => {
                let recovered_after = failures.failure_count();
                failures.record_success();
                shared.handle_frame(&spec, &mut monitor, &frame).await;
                frames += 1;

                if recovered_after > 0 {
                    logger.log_progress(&format!("feed recovered after {} failures", recovered_after));
                    shared.refresh_degraded_gauge().await;
                }
                continue;
            }
            Ok(None) => "end of stream".to_string(),
            Err(e) => e.to_string(),
        };

        // Reconnect until it works or the session stops
        let mut reason = reason;
        loop {
            if failures.record_failure() {
                logger.log_warning(&format!("{}; reconnecting in {:?}", reason, backoff));
            }
            if shared.record_feed_failure(&spec.source_id).await {
                logger.log_error(&format!(
                    "marked degraded after {} consecutive failures",
                    shared.config.feed.degraded_after
                ));
            }

            if !backoff_or_shutdown(backoff, &mut shutdown).await {
                break 'session;
            }

            match feed.reconnect().await {
                Ok(()) => {
                    debug!(source_id = %spec.source_id, "Feed reconnected");
                    break;
                }
                Err(e) => reason = e.to_string(),
            }
        }
    }

    logger.log_completion(&format!("{} frames processed", frames));
}

/// Timer driving normal signal cycling.
async fn run_signal_ticker(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(shared.config.signal.tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                let now = shared.clock.now();
                for signal in shared.signals.values() {
                    signal.lock().await.tick(now);
                }
            }
        }
    }
    debug!("Signal ticker stopped");
}

/// Cloneable read-only view of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Signal state for a location, if it is monitored.
    pub async fn signal_state(&self, location_id: &LocationId) -> Option<SignalState> {
        match self.shared.signals.get(location_id) {
            Some(signal) => Some(signal.lock().await.state()),
            None => None,
        }
    }

    /// Sources whose latch is currently armed.
    pub async fn active_emergencies(&self) -> BTreeSet<SourceId> {
        self.shared.active.read().await.clone()
    }

    /// Inferred movements, oldest first.
    pub async fn recent_transitions(&self) -> Vec<Transition> {
        self.shared.tracker.lock().await.recent_transitions()
    }

    /// Alerts dropped because the queue was full or closed.
    pub fn dropped_alerts(&self) -> u64 {
        self.shared.publisher.dropped()
    }

    pub fn pipeline_stats(&self) -> PipelineSnapshot {
        self.shared.publisher.snapshot()
    }

    pub async fn source_health(&self) -> BTreeMap<SourceId, SourceHealth> {
        self.shared.health.read().await.clone()
    }

    pub async fn degraded_sources(&self) -> BTreeSet<SourceId> {
        self.shared
            .health
            .read()
            .await
            .iter()
            .filter(|(_, h)| h.is_degraded())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn location_ids(&self) -> Vec<LocationId> {
        let mut ids: Vec<LocationId> = self.shared.signals.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Summary returned when a session stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub consumer: ConsumerReport,
    pub pipeline: PipelineSnapshot,
}

/// A running monitoring session.
pub struct MonitoringSession {
    handle: SessionHandle,
    shutdown: watch::Sender<bool>,
    drain: watch::Sender<bool>,
    workers: JoinSet<()>,
    ticker: JoinHandle<()>,
    consumer: JoinHandle<ConsumerReport>,
    dispatch: Option<Arc<DispatchSimulator>>,
}

impl MonitoringSession {
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn dispatch(&self) -> Option<&Arc<DispatchSimulator>> {
        self.dispatch.as_ref()
    }

    /// Stop the session.
    ///
    /// Source workers finish the frame in hand, then the alert consumer
    /// drains the queue until its deadline, then dispatch simulations are
    /// cancelled. Alerts raised by a worker's last frame are still queued.
    pub async fn shutdown(mut self) -> WorkerResult<SessionReport> {
        info!("Stopping monitoring session");
        self.shutdown.send_replace(true);

        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!("Source worker panicked: {}", e);
            }
        }

        if let Err(e) = self.ticker.await {
            warn!("Signal ticker ended abnormally: {}", e);
        }

        self.drain.send_replace(true);

        let consumer = self
            .consumer
            .await
            .map_err(|e| WorkerError::task_failed(format!("alert consumer: {}", e)))?;

        if let Some(dispatch) = &self.dispatch {
            dispatch.shutdown().await;
        }

        let report = SessionReport {
            consumer,
            pipeline: self.handle.pipeline_stats(),
        };
        info!(
            delivered = report.consumer.delivered,
            failed = report.consumer.failed,
            dropped = report.pipeline.dropped,
            discarded = report.consumer.discarded,
            "Monitoring session stopped"
        );
        Ok(report)
    }
}
