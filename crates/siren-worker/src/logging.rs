//! Structured source logging utilities.
//!
//! Provides consistent, structured logging for one source worker with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use siren_models::SourceSpec;

use crate::error::{WorkerError, WorkerResult};

const DEFAULT_DIRECTIVES: [&str; 4] = [
    "siren_worker=info",
    "siren_queue=info",
    "siren_store=info",
    "siren_ml_client=info",
];

/// Install the global subscriber: JSON when `LOG_FORMAT=json`, coloured text otherwise.
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn init_tracing() -> WorkerResult<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in DEFAULT_DIRECTIVES {
        let directive: Directive = directive
            .parse()
            .map_err(|e| WorkerError::config_error(format!("log directive {}: {}", directive, e)))?;
        env_filter = env_filter.add_directive(directive);
    }

    let installed = if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()
    };
    installed.map_err(|e| WorkerError::config_error(format!("tracing subscriber: {}", e)))
}

/// Source logger for structured logging with consistent formatting.
///
/// Every line carries the source id and the location it feeds.
#[derive(Debug, Clone)]
pub struct SourceLogger {
    source_id: String,
    location: String,
}

impl SourceLogger {
    pub fn new(spec: &SourceSpec) -> Self {
        Self {
            source_id: spec.source_id.to_string(),
            location: spec.location_id.to_string(),
        }
    }

    /// Create a new source logger from string ids.
    pub fn from_string(source_id: &str, location: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            location: location.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            source_id = %self.source_id,
            location = %self.location,
            "Source started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            source_id = %self.source_id,
            location = %self.location,
            "Source update: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            source_id = %self.source_id,
            location = %self.location,
            "Source warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            source_id = %self.source_id,
            location = %self.location,
            "Source error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            source_id = %self.source_id,
            location = %self.location,
            "Source stopped: {}", message
        );
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Create a tracing span for this source's worker task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "source",
            source_id = %self.source_id,
            location = %self.location
        )
    }
}
