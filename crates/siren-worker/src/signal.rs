//! Hysteretic traffic signal controller with priority override.
//!
//! One controller exists per location. Normal cycling flips Red/Green when
//! the current phase has run its duration. An active detection preempts Red
//! immediately with an extended Green and holds Green until every source
//! that asked for the override has gone inactive.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::info;

use siren_models::{LocationId, SignalPhase, SignalState, SourceId};

use crate::config::SignalConfig;
use crate::metrics;

/// What a controller call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Unchanged,
    /// Timer flipped the phase
    Cycled(SignalPhase),
    /// Detection cut a Red phase short
    Preempted,
    /// Detection arrived during Green; Green is now held
    Held,
    /// Last overriding source went inactive
    Released,
}

pub struct SignalController {
    location_id: LocationId,
    config: SignalConfig,
    state: SignalState,
    overriding: BTreeSet<SourceId>,
}

impl SignalController {
    /// New controller, starting in Red at `now`.
    pub fn new(location_id: LocationId, config: SignalConfig, now: DateTime<Utc>) -> Self {
        let state = SignalState {
            phase: SignalPhase::Red,
            phase_started_at: now,
            current_phase_duration: config.red_secs,
            priority_override_active: false,
        };
        Self {
            location_id,
            config,
            state,
            overriding: BTreeSet::new(),
        }
    }

    /// Evaluate the phase timer.
    pub fn tick(&mut self, now: DateTime<Utc>) -> SignalEvent {
        if self.state.priority_override_active {
            return SignalEvent::Unchanged;
        }
        if self.state.elapsed_secs(now) < self.state.current_phase_duration {
            return SignalEvent::Unchanged;
        }

        let next = self.state.phase.flipped();
        let duration = self.default_duration(next);
        self.enter(next, duration, now);
        metrics::record_phase_change(self.location_id.as_str(), next.as_str());
        info!(
            location = %self.location_id,
            phase = %next,
            duration_secs = duration,
            "Signal phase changed"
        );
        SignalEvent::Cycled(next)
    }

    /// Report a source's debounced state.
    ///
    /// Repeated active reports from the same or other sources never restart
    /// or extend an override already in force.
    pub fn on_detection(&mut self, source_id: &SourceId, active: bool, now: DateTime<Utc>) -> SignalEvent {
        if !active {
            return self.release(source_id);
        }

        self.overriding.insert(source_id.clone());

        match self.state.phase {
            SignalPhase::Red => {
                self.enter(SignalPhase::Green, self.config.override_green_secs, now);
                self.state.priority_override_active = true;
                metrics::record_override(self.location_id.as_str());
                info!(
                    location = %self.location_id,
                    source_id = %source_id,
                    duration_secs = self.config.override_green_secs,
                    "Priority override: switching to green"
                );
                SignalEvent::Preempted
            }
            SignalPhase::Green if !self.state.priority_override_active => {
                self.state.priority_override_active = true;
                metrics::record_override(self.location_id.as_str());
                info!(
                    location = %self.location_id,
                    source_id = %source_id,
                    "Priority override: holding green"
                );
                SignalEvent::Held
            }
            SignalPhase::Green => SignalEvent::Unchanged,
        }
    }

    fn release(&mut self, source_id: &SourceId) -> SignalEvent {
        if !self.overriding.remove(source_id) || !self.overriding.is_empty() {
            return SignalEvent::Unchanged;
        }
        if !self.state.priority_override_active {
            return SignalEvent::Unchanged;
        }

        self.state.priority_override_active = false;
        info!(
            location = %self.location_id,
            source_id = %source_id,
            "Priority override cleared, resuming normal cycle"
        );
        SignalEvent::Released
    }

    fn enter(&mut self, phase: SignalPhase, duration: f64, now: DateTime<Utc>) {
        self.state.phase = phase;
        self.state.phase_started_at = now;
        self.state.current_phase_duration = duration;
    }

    fn default_duration(&self, phase: SignalPhase) -> f64 {
        match phase {
            SignalPhase::Green => self.config.green_secs,
            SignalPhase::Red => self.config.red_secs,
        }
    }

    pub fn location_id(&self) -> &LocationId {
        &self.location_id
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SignalState {
        self.state.clone()
    }

    /// Sources currently holding the override.
    pub fn overriding_sources(&self) -> impl Iterator<Item = &SourceId> {
        self.overriding.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn controller(t0: DateTime<Utc>) -> SignalController {
        SignalController::new(LocationId::from("main-st"), SignalConfig::default(), t0)
    }

    fn secs(t0: DateTime<Utc>, s: i64) -> DateTime<Utc> {
        t0 + Duration::seconds(s)
    }

    #[test]
    fn test_normal_cycle() {
        let t0 = Utc::now();
        let mut c = controller(t0);
        assert_eq!(c.state().phase, SignalPhase::Red);
        assert_eq!(c.state().current_phase_duration, 20.0);

        assert_eq!(c.tick(secs(t0, 19)), SignalEvent::Unchanged);
        assert_eq!(c.tick(secs(t0, 20)), SignalEvent::Cycled(SignalPhase::Green));
        assert_eq!(c.state().current_phase_duration, 30.0);

        assert_eq!(c.tick(secs(t0, 49)), SignalEvent::Unchanged);
        assert_eq!(c.tick(secs(t0, 50)), SignalEvent::Cycled(SignalPhase::Red));
        assert_eq!(c.state().phase_started_at, secs(t0, 50));
    }

    #[test]
    fn test_override_preempts_red() {
        let t0 = Utc::now();
        let mut c = controller(t0);
        let source = SourceId::from("cam-1");

        // Ten seconds into a twenty second Red phase
        assert_eq!(c.tick(secs(t0, 10)), SignalEvent::Unchanged);
        assert_eq!(c.on_detection(&source, true, secs(t0, 10)), SignalEvent::Preempted);

        let state = c.state();
        assert_eq!(state.phase, SignalPhase::Green);
        assert_eq!(state.current_phase_duration, 45.0);
        assert_eq!(state.phase_started_at, secs(t0, 10));
        assert!(state.priority_override_active);
    }

    #[test]
    fn test_override_holds_green_past_duration() {
        let t0 = Utc::now();
        let mut c = controller(t0);
        let source = SourceId::from("cam-1");
        c.on_detection(&source, true, t0);

        assert_eq!(c.tick(secs(t0, 300)), SignalEvent::Unchanged);
        assert_eq!(c.state().phase, SignalPhase::Green);

        assert_eq!(c.on_detection(&source, false, secs(t0, 300)), SignalEvent::Released);
        assert_eq!(c.tick(secs(t0, 300)), SignalEvent::Cycled(SignalPhase::Red));
    }

    #[test]
    fn test_repeated_detection_is_idempotent() {
        let t0 = Utc::now();
        let mut c = controller(t0);
        let source = SourceId::from("cam-1");
        c.on_detection(&source, true, t0);
        let before = c.state();

        for s in 1..10 {
            assert_eq!(c.on_detection(&source, true, secs(t0, s)), SignalEvent::Unchanged);
        }
        assert_eq!(c.state(), before);
    }

    #[test]
    fn test_detection_during_green_keeps_duration() {
        let t0 = Utc::now();
        let mut c = controller(t0);
        c.tick(secs(t0, 20));
        let source = SourceId::from("cam-1");

        assert_eq!(c.on_detection(&source, true, secs(t0, 25)), SignalEvent::Held);
        let state = c.state();
        assert_eq!(state.current_phase_duration, 30.0);
        assert_eq!(state.phase_started_at, secs(t0, 20));
        assert!(state.priority_override_active);
    }

    #[test]
    fn test_override_waits_for_last_source() {
        let t0 = Utc::now();
        let mut c = controller(t0);
        let a = SourceId::from("cam-1");
        let b = SourceId::from("cam-2");

        c.on_detection(&a, true, t0);
        c.on_detection(&b, true, secs(t0, 1));
        assert_eq!(c.overriding_sources().count(), 2);

        assert_eq!(c.on_detection(&a, false, secs(t0, 2)), SignalEvent::Unchanged);
        assert!(c.state().priority_override_active);

        assert_eq!(c.on_detection(&b, false, secs(t0, 3)), SignalEvent::Released);
        assert!(!c.state().priority_override_active);
    }

    #[test]
    fn test_inactive_report_without_override_is_noop() {
        let t0 = Utc::now();
        let mut c = controller(t0);
        assert_eq!(
            c.on_detection(&SourceId::from("cam-1"), false, secs(t0, 5)),
            SignalEvent::Unchanged
        );
        assert_eq!(c.state().phase, SignalPhase::Red);
    }
}
