//! Periodic status reporting for a running session.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::info;

use siren_models::{LocationId, SignalState, SourceId};
use siren_queue::PipelineSnapshot;

use crate::coordinator::SessionHandle;

/// Point-in-time view of the query surface.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub signals: Vec<(LocationId, SignalState)>,
    pub active: BTreeSet<SourceId>,
    pub degraded: BTreeSet<SourceId>,
    pub transitions: usize,
    pub pipeline: PipelineSnapshot,
}

impl SessionHandle {
    /// Collect every query into one snapshot.
    pub async fn status(&self) -> StatusSnapshot {
        let mut signals = Vec::new();
        for location in self.location_ids() {
            if let Some(state) = self.signal_state(&location).await {
                signals.push((location, state));
            }
        }

        StatusSnapshot {
            signals,
            active: self.active_emergencies().await,
            degraded: self.degraded_sources().await,
            transitions: self.recent_transitions().await.len(),
            pipeline: self.pipeline_stats(),
        }
    }
}

/// Log a status snapshot every `every` until the task is aborted.
pub async fn log_status(handle: SessionHandle, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        interval.tick().await;
        let status = handle.status().await;

        for (location, state) in &status.signals {
            info!(
                location = %location,
                phase = %state.phase,
                override_active = state.priority_override_active,
                "Signal status"
            );
        }
        info!(
            active = ?status.active,
            degraded = ?status.degraded,
            transitions = status.transitions,
            published = status.pipeline.published,
            dropped = status.pipeline.dropped,
            delivered = status.pipeline.delivered,
            "Monitoring status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use siren_ml_client::ScriptedClassifier;
    use siren_models::{SignalPhase, SourceSpec};
    use siren_store::MemoryAlertSink;

    use crate::clock::TokioClock;
    use crate::config::CoordinatorConfig;
    use crate::coordinator::Coordinator;
    use crate::feed::ScriptedFeed;

    fn session() -> crate::coordinator::MonitoringSession {
        let mut coordinator = Coordinator::new(CoordinatorConfig::default(), Arc::new(MemoryAlertSink::new()))
            .unwrap()
            .with_clock(Arc::new(TokioClock::new(Utc::now())));
        coordinator
            .add_source(
                SourceSpec::new("s1", "main-st", "Main Street"),
                Box::new(ScriptedFeed::new("s1")),
                Arc::new(ScriptedClassifier::new(Vec::new())),
            )
            .unwrap();
        coordinator.start()
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_snapshot_covers_every_location() {
        let session = session();
        let status = session.handle().status().await;

        assert_eq!(status.signals.len(), 1);
        assert_eq!(status.signals[0].0.as_str(), "main-st");
        assert_eq!(status.signals[0].1.phase, SignalPhase::Red);
        assert!(status.active.is_empty());
        assert_eq!(status.transitions, 0);

        session.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_logger_runs_on_spawned_task() {
        let session = session();

        // tokio::spawn requires the reporting future to be Send
        let reporter = tokio::spawn(log_status(session.handle(), Duration::from_secs(1)));
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert!(!reporter.is_finished());

        reporter.abort();
        assert!(reporter.await.unwrap_err().is_cancelled());
        session.shutdown().await.unwrap();
    }
}
