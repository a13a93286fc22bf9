//! Worker configuration.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use siren_models::SourceSpec;
use siren_queue::PipelineConfig;

use crate::error::{WorkerError, WorkerResult};

const DEFAULT_SOURCES: &str = "cam-1@main-st:Main Street";

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Debounce and cooldown settings shared by every source monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Minimum Emergency confidence (percent) for a frame to count as a hit
    pub confidence_threshold: f64,
    /// Consecutive hits needed to arm the latch
    pub required_hits: u32,
    /// Hold window after the last hit, and minimum spacing between alerts
    pub cooldown_secs: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 75.0,
            required_hits: 5,
            cooldown_secs: 5.0,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        Self {
            confidence_threshold: env_parse("SIREN_CONFIDENCE_THRESHOLD", 75.0),
            required_hits: env_parse("SIREN_REQUIRED_HITS", 5),
            cooldown_secs: env_parse("SIREN_COOLDOWN_SECS", 5.0),
        }
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if !(0.0..=100.0).contains(&self.confidence_threshold) {
            return Err(WorkerError::config_error(format!(
                "confidence threshold must be within 0..=100, got {}",
                self.confidence_threshold
            )));
        }
        if self.required_hits == 0 {
            return Err(WorkerError::config_error("required hits must be at least 1"));
        }
        if !self.cooldown_secs.is_finite() || self.cooldown_secs < 0.0 {
            return Err(WorkerError::config_error("cooldown must be a non-negative number of seconds"));
        }
        Ok(())
    }
}

/// Signal timing per location.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub green_secs: f64,
    pub red_secs: f64,
    /// Green duration granted by a priority override
    pub override_green_secs: f64,
    /// Period of the timer that drives normal cycling
    pub tick_interval: Duration,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            green_secs: 30.0,
            red_secs: 20.0,
            override_green_secs: 45.0,
            tick_interval: Duration::from_millis(250),
        }
    }
}

impl SignalConfig {
    pub fn from_env() -> Self {
        Self {
            green_secs: env_parse("SIREN_GREEN_SECS", 30.0),
            red_secs: env_parse("SIREN_RED_SECS", 20.0),
            override_green_secs: env_parse("SIREN_OVERRIDE_GREEN_SECS", 45.0),
            tick_interval: Duration::from_millis(env_parse("SIREN_SIGNAL_TICK_MS", 250)),
        }
    }

    pub fn validate(&self) -> WorkerResult<()> {
        for (name, value) in [
            ("green", self.green_secs),
            ("red", self.red_secs),
            ("override green", self.override_green_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(WorkerError::config_error(format!(
                    "{} duration must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.tick_interval.is_zero() {
            return Err(WorkerError::config_error("signal tick interval must be non-zero"));
        }
        Ok(())
    }
}

/// Movement tracker window.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub retention_secs: f64,
    /// Transitions kept for queries
    pub history: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            retention_secs: 120.0,
            history: 50,
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Self {
        Self {
            retention_secs: env_parse("SIREN_TRACKER_RETENTION_SECS", 120.0),
            history: env_parse("SIREN_TRACKER_HISTORY", 50),
        }
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if !self.retention_secs.is_finite() || self.retention_secs <= 0.0 {
            return Err(WorkerError::config_error("tracker retention must be positive"));
        }
        Ok(())
    }
}

/// Feed reconnect behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub reconnect_backoff: Duration,
    /// Consecutive failures before a source is reported degraded
    pub degraded_after: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_millis(1000),
            degraded_after: 5,
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        Self {
            reconnect_backoff: Duration::from_millis(env_parse("SIREN_RECONNECT_BACKOFF_MS", 1000)),
            degraded_after: env_parse("SIREN_DEGRADED_AFTER", 5),
        }
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.degraded_after == 0 {
            return Err(WorkerError::config_error("degraded threshold must be at least 1"));
        }
        Ok(())
    }
}

/// Top-level coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub monitor: MonitorConfig,
    pub signal: SignalConfig,
    pub tracker: TrackerConfig,
    pub feed: FeedConfig,
    pub pipeline: PipelineConfig,
    /// Sources to register at startup (binary only)
    pub sources: Vec<SourceSpec>,
    /// Route alerts through the dispatch simulator as well as the sink
    pub dispatch_enabled: bool,
    /// How often the binary logs a status snapshot
    pub status_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            signal: SignalConfig::default(),
            tracker: TrackerConfig::default(),
            feed: FeedConfig::default(),
            pipeline: PipelineConfig::default(),
            sources: Vec::new(),
            dispatch_enabled: true,
            status_interval: Duration::from_secs(10),
        }
    }
}

impl CoordinatorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let sources = std::env::var("SIREN_SOURCES").unwrap_or_else(|_| DEFAULT_SOURCES.to_string());

        Ok(Self {
            monitor: MonitorConfig::from_env(),
            signal: SignalConfig::from_env(),
            tracker: TrackerConfig::from_env(),
            feed: FeedConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
            sources: parse_sources(&sources)?,
            dispatch_enabled: env_parse("SIREN_DISPATCH_ENABLED", true),
            status_interval: Duration::from_secs(env_parse("SIREN_STATUS_INTERVAL_SECS", 10)),
        })
    }

    pub fn validate(&self) -> WorkerResult<()> {
        self.monitor.validate()?;
        self.signal.validate()?;
        self.tracker.validate()?;
        self.feed.validate()?;

        if self.pipeline.capacity == 0 {
            return Err(WorkerError::config_error("alert queue capacity must be at least 1"));
        }

        let mut seen = HashSet::new();
        for spec in &self.sources {
            if !seen.insert(&spec.source_id) {
                return Err(WorkerError::duplicate_source(spec.source_id.as_str()));
            }
        }
        Ok(())
    }
}

/// Parse a comma separated `id@location:name` list.
///
/// The `:name` part is optional; the location id is used when it is absent.
pub fn parse_sources(raw: &str) -> WorkerResult<Vec<SourceSpec>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, rest) = entry.split_once('@').ok_or_else(|| {
                WorkerError::config_error(format!("source '{}' is missing '@location'", entry))
            })?;
            let (location, name) = match rest.split_once(':') {
                Some((location, name)) => (location.trim(), name.trim()),
                None => (rest.trim(), rest.trim()),
            };

            let id = id.trim();
            if id.is_empty() || location.is_empty() {
                return Err(WorkerError::config_error(format!(
                    "source '{}' needs both an id and a location",
                    entry
                )));
            }
            let name = if name.is_empty() { location } else { name };
            Ok(SourceSpec::new(id, location, name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoordinatorConfig::default();
        tokio_test::assert_ok!(config.validate());
        assert_eq!(config.monitor.required_hits, 5);
        assert_eq!(config.signal.override_green_secs, 45.0);
        assert_eq!(config.tracker.retention_secs, 120.0);
    }

    #[test]
    fn test_parse_sources() {
        let specs = parse_sources("cam-1@main-st:Main Street, cam-2@hospital:City Hospital,cam-3@depot").unwrap();

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].location_name, "Main Street");
        assert_eq!(specs[1].source_id.as_str(), "cam-2");
        assert_eq!(specs[1].location_id.as_str(), "hospital");
        assert_eq!(specs[2].location_name, "depot");
    }

    #[test]
    fn test_parse_sources_rejects_missing_location() {
        tokio_test::assert_err!(parse_sources("cam-1"));
        tokio_test::assert_err!(parse_sources("@main-st"));
        assert!(parse_sources("").unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CoordinatorConfig::default();
        config.monitor.required_hits = 0;
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.monitor.confidence_threshold = 120.0;
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.signal.red_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.sources = parse_sources("a@x,a@y").unwrap();
        assert!(matches!(config.validate(), Err(WorkerError::DuplicateSource(_))));
    }
}
