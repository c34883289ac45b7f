use anyhow::{Context, Result};
use crawl_service::{
    AutoMlClassifier, Config, Crawler, DynamoStore, HttpMediaDownloader, QueueEvent,
    TwitterTimelineClient,
};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Runs one batch. The event is read from the path given as the first
/// argument, or from stdin.
#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting Nier Crawl Service"
    );

    if let Some(port) = config.service.metrics_port {
        init_metrics(port)?;
    }

    let event = read_event(std::env::args().nth(1)).await?;

    // Initialize components
    let store = Arc::new(DynamoStore::new(&config.dynamodb).await);
    let timeline = TwitterTimelineClient::new(&config.twitter)
        .context("Failed to initialize timeline client")?;
    let downloader = HttpMediaDownloader::new(&config.scratch.dir, config.twitter_timeout())
        .context("Failed to initialize media downloader")?;
    let classifier = AutoMlClassifier::new(&config.prediction)
        .context("Failed to initialize prediction client")?;

    info!(
        scratch_dir = %downloader.scratch_dir().display(),
        model = %config.prediction.model_name(),
        "Components initialized"
    );

    let crawler = Crawler::new(
        store.clone(),
        store,
        Arc::new(timeline),
        Arc::new(downloader),
        Arc::new(classifier),
    );

    let summary = crawler
        .process_batch(&event)
        .await
        .context("Batch aborted")?;

    info!(
        users_processed = summary.users_processed,
        users_failed = summary.users_failed,
        malformed_records = summary.malformed_records,
        photos_classified = summary.photos_classified,
        photos_skipped = summary.photos_skipped,
        photos_download_failed = summary.photos_download_failed,
        "Batch complete"
    );

    Ok(())
}

async fn read_event(path: Option<String>) -> Result<QueueEvent> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read event file {path}"))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read event from stdin")?;
            raw
        }
    };

    serde_json::from_str(&raw).context("Failed to deserialize queue event")
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_event_from_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/sample_event.json");

        let event = read_event(Some(path.to_string())).await.unwrap();

        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].user_id().unwrap(), 183230661);
    }

    #[tokio::test]
    async fn test_read_event_missing_file() {
        assert!(read_event(Some("/nonexistent/event.json".to_string()))
            .await
            .is_err());
    }
}
