//! Backup Result Ingestion Service
//!
//! Drains backup result notifications from a Redpanda topic:
//! - Sizes a pool of queue workers from the queue depth every poll
//! - Verifies the sending client against ClickHouse
//! - Parses the stored report into metrics and persists them
//! - Archives ingested report content

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseStore};
use ingest_core::WorkerConfig;
use redpanda::{RedpandaConfig, RedpandaQueue};
use storage::{LocalContentStorage, StorageConfig};
use telemetry::init_tracing_from_env;
use worker::{
    ConsumerScheduler, EmailMetaExtractor, HttpPostMetaExtractor, InProcessInvoker,
    IngestContext, IngestionPipeline, JsonPayloadExtractor, MetadataExtractorChain,
    QueueConsumer, QueueWorker, ReportParser,
};

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    worker: WorkerConfig,

    #[serde(default)]
    redpanda: RedpandaConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    storage: StorageConfig,

    /// Only accept email deliveries addressed to this domain
    #[serde(default)]
    email_domain: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ requires explicit crypto provider selection
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting backup result ingestion v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config
        .worker
        .validate()
        .context("Invalid worker configuration")?;

    info!(
        brokers = ?config.redpanda.brokers,
        topic = %config.redpanda.topic,
        sasl_username = config.redpanda.sasl_username.as_deref().unwrap_or("none"),
        "Loaded Redpanda config"
    );
    info!(
        max_workers = config.worker.max_workers,
        max_worker_time_seconds = config.worker.max_worker_time_seconds,
        poll_interval_secs = config.worker.poll_interval_secs,
        items_per_worker = config.worker.max_items_per_worker(),
        "Loaded worker config"
    );

    let clickhouse = ClickHouseClient::new(config.clickhouse.clone());

    if config.clickhouse.init_schema {
        if let Err(e) = clickhouse_client::schema::init_schema(&clickhouse).await {
            // Schema might already exist
            error!("Failed to initialize ClickHouse schema: {}", e);
        }
    }

    check_health(&config, &clickhouse).await;

    let queue = Arc::new(RedpandaQueue::new(config.redpanda.clone()));
    let ctx = IngestContext::new(
        queue.clone(),
        Arc::new(ClickHouseStore::new(clickhouse)),
        Arc::new(LocalContentStorage::from_config(&config.storage)),
        Arc::new(ReportParser::new()),
        config.worker.clone(),
    );

    let email = match config.email_domain {
        Some(ref domain) => EmailMetaExtractor::with_domain(domain.clone()),
        None => EmailMetaExtractor::new(),
    };
    let meta_chain = MetadataExtractorChain::new(vec![
        Box::new(email),
        Box::new(HttpPostMetaExtractor::new()),
    ]);

    let pipeline = IngestionPipeline::new(
        ctx,
        Arc::new(JsonPayloadExtractor::new()),
        Arc::new(meta_chain),
    );
    let invoker = Arc::new(InProcessInvoker::new(QueueWorker::new(pipeline)));
    let consumer = Arc::new(QueueConsumer::new(queue, invoker, config.worker.clone()));

    let scheduler = ConsumerScheduler::new(
        consumer,
        Duration::from_secs(config.worker.poll_interval_secs),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    shutdown_signal().await;

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    // Let the running cycle finish
    if let Err(e) = scheduler_handle.await {
        error!("Consumer scheduler task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. BACKUP_INGEST__WORKER__MAX_WORKERS
        .add_source(
            config::Environment::with_prefix("BACKUP_INGEST")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("redpanda.brokers")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Check component health on startup.
async fn check_health(config: &Config, clickhouse: &ClickHouseClient) {
    if redpanda::health::check_connection(&config.redpanda).await {
        info!("Redpanda connection: healthy");
        if !redpanda::health::topic_exists(&config.redpanda).await {
            warn!(topic = %config.redpanda.topic, "Backup result topic does not exist yet");
        }
    } else {
        error!("Redpanda connection: unhealthy");
    }

    if clickhouse_client::health::check_connection(clickhouse).await {
        info!("ClickHouse connection: healthy");
    } else {
        error!("ClickHouse connection: unhealthy");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
