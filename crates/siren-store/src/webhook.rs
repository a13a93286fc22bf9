//! HTTP webhook sink: forwards alerts to an external persistence/notification service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use siren_models::AlertEvent;

use crate::error::{StoreError, StoreResult};
use crate::delivery::{deliver_within, DeliveryPolicy};
use crate::sink::AlertSink;

/// Webhook sink configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Endpoint receiving `POST` requests with the alert as JSON
    pub url: String,
    /// Optional bearer token
    pub auth_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Attempts and time allowed per alert
    pub delivery: DeliveryPolicy,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            delivery: DeliveryPolicy::default(),
        }
    }

    /// Create config from environment variables. Returns None when no webhook is configured.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SIREN_ALERT_WEBHOOK_URL").ok()?;
        Some(Self {
            auth_token: std::env::var("SIREN_ALERT_WEBHOOK_TOKEN").ok(),
            timeout: Duration::from_secs(
                std::env::var("SIREN_ALERT_WEBHOOK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            delivery: DeliveryPolicy::from_env(),
            ..Self::new(url)
        })
    }
}

/// Sink posting each alert to a webhook.
pub struct WebhookAlertSink {
    http: Client,
    config: WebhookConfig,
}

impl WebhookAlertSink {
    pub fn new(config: WebhookConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("siren-store/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    async fn post_once(&self, alert: &AlertEvent) -> StoreResult<()> {
        let mut request = self
            .http
            .post(&self.config.url)
            .header("idempotency-key", alert.alert_id.as_str())
            .json(alert);

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(alert_id = %alert.alert_id, status = status.as_u16(), "Alert delivered to webhook");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::from_http_status(status.as_u16(), body))
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn record(&self, alert: &AlertEvent) -> StoreResult<()> {
        deliver_within(&self.config.delivery, self.name(), || self.post_once(alert)).await
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
