//! Alert persistence and notification collaborators.
//!
//! This crate provides:
//! - The `AlertSink` trait consumed by the alert pipeline
//! - An in-memory sink and an HTTP webhook sink with a per-alert delivery budget
//! - A fan-out sink for routing one alert to several targets
//! - A simulated emergency dispatch service
//! - Observability (tracing spans, metrics)

pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod sink;
pub mod webhook;

pub use delivery::{deliver_within, DeliveryPolicy};
pub use dispatch::{plan_dispatch, DispatchConfig, DispatchPlan, DispatchSimulator};
pub use error::{StoreError, StoreResult};
pub use sink::{record_timed, AlertSink, FanoutSink, MemoryAlertSink};
pub use webhook::{WebhookAlertSink, WebhookConfig};
