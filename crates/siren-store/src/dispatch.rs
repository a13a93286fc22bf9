//! Emergency dispatch simulator.
//!
//! Each alert is answered by a simulated emergency service: a service kind
//! and responding unit are picked deterministically from the alert id, an ETA
//! is estimated, and the response is advanced through its stages by a
//! scheduled task. All scheduled tasks stop when [`DispatchSimulator::shutdown`]
//! is called.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info};

use siren_models::{AlertEvent, AlertId, DispatchRecord, DispatchStage, ServiceKind};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_dispatch;
use crate::sink::AlertSink;

/// Dispatch simulator configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Wall-clock seconds per simulated minute; 60.0 runs in real time
    pub seconds_per_minute: f64,
    /// How long an arrived response stays queryable before it is evicted
    pub completed_retention: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            seconds_per_minute: 60.0,
            completed_retention: Duration::from_secs(600),
        }
    }
}

impl DispatchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            seconds_per_minute: std::env::var("SIREN_DISPATCH_SECONDS_PER_MINUTE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v: &f64| v.is_finite() && *v > 0.0)
                .unwrap_or(60.0),
            completed_retention: Duration::from_secs(
                std::env::var("SIREN_DISPATCH_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}

/// Service kind, unit and ETA chosen for one alert.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    pub service: ServiceKind,
    pub responding_unit: String,
    pub eta_minutes: f64,
}

/// Pick a plan for an alert. The same alert id always yields the same plan.
pub fn plan_dispatch(alert_id: &AlertId) -> DispatchPlan {
    let h = fnv1a(alert_id.as_str().as_bytes());

    let roll = (h % 100) as u32;
    let mut cumulative = 0;
    let mut service = ServiceKind::Fire;
    for kind in ServiceKind::ALL {
        cumulative += kind.weight();
        if roll < cumulative {
            service = kind;
            break;
        }
    }

    let centres = service.centres();
    let responding_unit = centres[((h >> 8) % centres.len() as u64) as usize].to_string();

    let (min, max) = service.eta_range_minutes();
    let fraction = ((h >> 16) % 1000) as f64 / 1000.0;
    let eta_minutes = ((min + (max - min) * fraction) * 10.0).round() / 10.0;

    DispatchPlan {
        service,
        responding_unit,
        eta_minutes,
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

type Responses = Arc<RwLock<HashMap<AlertId, DispatchRecord>>>;

/// Alert sink that simulates dispatching emergency services.
pub struct DispatchSimulator {
    config: DispatchConfig,
    responses: Responses,
    cancel: watch::Sender<bool>,
    tasks: Mutex<JoinSet<()>>,
}

impl DispatchSimulator {
    pub fn new(config: DispatchConfig) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            config,
            responses: Arc::new(RwLock::new(HashMap::new())),
            cancel,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Current status of the response to an alert.
    pub async fn response_status(&self, alert_id: &AlertId) -> Option<DispatchRecord> {
        self.responses.read().await.get(alert_id).cloned()
    }

    /// Responses that have not yet arrived, oldest first.
    pub async fn active_responses(&self) -> Vec<DispatchRecord> {
        let mut active: Vec<DispatchRecord> = self
            .responses
            .read()
            .await
            .values()
            .filter(|r| !r.completed)
            .cloned()
            .collect();
        active.sort_by_key(|r| r.dispatched_at);
        active
    }

    /// Every response still held: in progress or recently arrived.
    pub async fn all_responses(&self) -> Vec<DispatchRecord> {
        let mut all: Vec<DispatchRecord> = self.responses.read().await.values().cloned().collect();
        all.sort_by_key(|r| r.dispatched_at);
        all
    }

    /// Stop every scheduled stage update and wait for the tasks to exit.
    pub async fn shutdown(&self) {
        self.cancel.send_replace(true);
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
        info!("Dispatch simulator stopped");
    }

    fn stage_interval(&self, eta_minutes: f64) -> Duration {
        let stages = (DispatchStage::SEQUENCE.len() - 1) as f64;
        Duration::from_secs_f64((eta_minutes * self.config.seconds_per_minute / stages).max(0.0))
    }
}

/// Advance one response through its remaining stages, then evict it once
/// the retention period has passed.
async fn simulate_response(
    responses: Responses,
    alert_id: AlertId,
    interval: Duration,
    retention: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut stage = DispatchStage::Dispatched;

    while let Some(next) = stage.next() {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.changed() => {
                debug!(alert_id = %alert_id, stage = %stage, "Dispatch simulation cancelled");
                return;
            }
        }

        stage = next;
        if let Some(record) = responses.write().await.get_mut(&alert_id) {
            record.advance_to(stage, Utc::now());
        }
        info!(alert_id = %alert_id, stage = %stage, "Emergency response update");
    }

    info!(alert_id = %alert_id, "Emergency response completed");

    tokio::select! {
        _ = tokio::time::sleep(retention) => {
            responses.write().await.remove(&alert_id);
            debug!(alert_id = %alert_id, "Completed response evicted");
        }
        _ = cancel.changed() => {}
    }
}

#[async_trait]
impl AlertSink for DispatchSimulator {
    async fn record(&self, alert: &AlertEvent) -> StoreResult<()> {
        if *self.cancel.borrow() {
            return Err(StoreError::unavailable("dispatch simulator is shut down"));
        }

        let plan = plan_dispatch(&alert.alert_id);
        let now = Utc::now();
        let record = DispatchRecord {
            alert_id: alert.alert_id.clone(),
            source_id: alert.source_id.clone(),
            location_name: alert.location_name.clone(),
            service: plan.service,
            responding_unit: plan.responding_unit.clone(),
            eta_minutes: plan.eta_minutes,
            stage: DispatchStage::Dispatched,
            dispatched_at: now,
            updated_at: now,
            completed: false,
        };

        info!(
            alert_id = %alert.alert_id,
            service = %plan.service,
            unit = %plan.responding_unit,
            eta_minutes = plan.eta_minutes,
            location = %alert.location_name,
            "Dispatched emergency service"
        );
        record_dispatch(plan.service.as_str());

        self.responses
            .write()
            .await
            .insert(alert.alert_id.clone(), record);

        let interval = self.stage_interval(plan.eta_minutes);
        let mut tasks = self.tasks.lock().await;
        // Reap finished simulations so the set stays small over long sessions
        while tasks.try_join_next().is_some() {}
        tasks.spawn(simulate_response(
            Arc::clone(&self.responses),
            alert.alert_id.clone(),
            interval,
            self.config.completed_retention,
            self.cancel.subscribe(),
        ));

        Ok(())
    }

    fn name(&self) -> &'static str {
        "dispatch"
    }
}
