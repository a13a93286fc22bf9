//! Emergency vehicle monitoring worker binary.

use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};

use siren_ml_client::{FrameClassifier, HttpClassifier, HttpClassifierConfig};
use siren_store::{
    AlertSink, DispatchConfig, DispatchSimulator, MemoryAlertSink, WebhookAlertSink, WebhookConfig,
};
use siren_worker::{
    init_tracing, log_status, Coordinator, CoordinatorConfig, MarkerClassifier, SyntheticConfig, SyntheticFeed,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Logging comes first so startup failures are reported
    if let Err(e) = init_tracing() {
        eprintln!("siren-worker: failed to initialise logging: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run().await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    info!("Starting siren-worker");

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: std::net::SocketAddr = addr.parse().context("invalid METRICS_ADDR")?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics listening on {}", addr);
    }

    let config = CoordinatorConfig::from_env()?;
    info!("Coordinator config: {:?}", config);

    let sink: Arc<dyn AlertSink> = match WebhookConfig::from_env() {
        Some(webhook) => {
            info!(url = %webhook.url, "Delivering alerts to webhook");
            Arc::new(WebhookAlertSink::new(webhook)?)
        }
        None => {
            let memory = MemoryAlertSink::from_env();
            info!(capacity = memory.capacity(), "No webhook configured, keeping recent alerts in memory");
            Arc::new(memory)
        }
    };

    let classifier: Arc<dyn FrameClassifier> = match HttpClassifierConfig::from_env() {
        Some(http) => {
            info!(url = %http.base_url, "Using remote classifier");
            Arc::new(HttpClassifier::new(http)?)
        }
        None => {
            info!("No classifier URL configured, using synthetic marker classifier");
            Arc::new(MarkerClassifier)
        }
    };

    let status_interval = config.status_interval;
    let dispatch_enabled = config.dispatch_enabled;
    let sources = config.sources.clone();

    let mut coordinator = Coordinator::new(config, sink)?;
    if dispatch_enabled {
        coordinator = coordinator.with_dispatch(Arc::new(DispatchSimulator::new(DispatchConfig::from_env())));
    }

    let synthetic = SyntheticConfig::from_env();
    for (i, spec) in sources.into_iter().enumerate() {
        // Stagger bursts so sources along a route fire one after another
        let offset = (i as u64) * 15;
        let feed = SyntheticFeed::new(spec.source_id.clone(), synthetic.clone(), offset);
        coordinator.add_source(spec, Box::new(feed), Arc::clone(&classifier))?;
    }

    if coordinator.source_count() == 0 {
        warn!("No sources configured; only the signal timer will run");
    }

    let session = coordinator.start();
    let handle = session.handle();

    let status = tokio::spawn(log_status(handle, status_interval));

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Received shutdown signal");

    status.abort();
    let report = session.shutdown().await?;
    info!(
        delivered = report.consumer.delivered,
        dropped = report.pipeline.dropped,
        "Worker shutdown complete"
    );
    Ok(())
}
