//! Sliding-window movement tracker.
//!
//! Rising-edge detections from every source are kept for a fixed retention
//! window, keyed by timestamp. After each insert a [`CorrelationStrategy`]
//! looks at the surviving entries and may report that a vehicle moved from
//! one source to another.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use siren_models::{TrackerEntry, Transition};

use crate::config::TrackerConfig;
use crate::metrics;

/// Decides whether the newest entry continues a movement.
pub trait CorrelationStrategy: Send + Sync {
    /// `window` holds every surviving entry, oldest first; the last one is
    /// the entry just recorded.
    fn infer(&self, window: &[&TrackerEntry]) -> Option<Transition>;

    fn name(&self) -> &'static str;
}

/// Pairs the two most recent detections when they come from different sources.
///
/// Has no notion of vehicle identity: two vehicles seen close together at
/// different sources are reported as one movement.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestInTime;

impl CorrelationStrategy for NearestInTime {
    fn infer(&self, window: &[&TrackerEntry]) -> Option<Transition> {
        match window {
            [.., previous, latest] if previous.source_id != latest.source_id => {
                Some(Transition::between(previous, latest))
            }
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        "nearest_in_time"
    }
}

pub struct MovementTracker {
    entries: BTreeMap<(DateTime<Utc>, u64), TrackerEntry>,
    next_seq: u64,
    retention: Duration,
    transitions: VecDeque<Transition>,
    history_limit: usize,
    strategy: Box<dyn CorrelationStrategy>,
}

impl MovementTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_strategy(config, Box::new(NearestInTime))
    }

    pub fn with_strategy(config: &TrackerConfig, strategy: Box<dyn CorrelationStrategy>) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
            retention: Duration::milliseconds((config.retention_secs * 1000.0) as i64),
            transitions: VecDeque::new(),
            history_limit: config.history,
            strategy,
        }
    }

    /// Insert a detection, evict expired entries, and infer a transition.
    ///
    /// Entries arriving out of order are retained but never trigger
    /// inference, so an old detection cannot replay an earlier movement.
    pub fn record(&mut self, entry: TrackerEntry) -> Option<Transition> {
        let key = (entry.timestamp, self.next_seq);
        self.next_seq += 1;
        self.entries.insert(key, entry);

        self.evict();

        let newest = self.entries.keys().next_back().copied();
        if newest != Some(key) {
            return None;
        }

        let window: Vec<&TrackerEntry> = self.entries.values().collect();
        let transition = self.strategy.infer(&window)?;

        metrics::record_transition();
        info!(
            from = %transition.from_location,
            to = %transition.to_location,
            elapsed_secs = transition.elapsed_secs(),
            strategy = self.strategy.name(),
            "Emergency vehicle movement inferred"
        );

        self.transitions.push_back(transition.clone());
        while self.transitions.len() > self.history_limit {
            self.transitions.pop_front();
        }
        Some(transition)
    }

    /// Drop entries at least one retention window older than the newest entry.
    fn evict(&mut self) {
        let Some(&(latest, _)) = self.entries.keys().next_back() else {
            return;
        };
        let retention = self.retention;
        self.entries.retain(|(timestamp, _), _| latest - *timestamp < retention);
    }

    /// Observed transitions, oldest first.
    pub fn recent_transitions(&self) -> Vec<Transition> {
        self.transitions.iter().cloned().collect()
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> Vec<TrackerEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
