use sgpr_backend::config;
use sgpr_backend::module::delivery::{DeliveryTracker, DestinationRegistry};
use sgpr_backend::module::handler::AdminHandler;
use sgpr_backend::module::listing::{HttpFetcher, ListingUpdater};
use sgpr_backend::module::publisher::Publisher;
use sgpr_backend::module::scheduled::{ScheduledTaskConfig, ScheduledTaskManager};
use sgpr_backend::module::telegram::TelegramClient;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let config = config::read_config(&config_path)?;

    // Initialize logging
    let _logging_guard = sgpr_backend::logging::init_logging(&config.log_dir, "sgpr-backend", &config.log_level)?;

    tracing::info!("sgprapp bot starting...");

    let registry_path = config.registry_path();
    let registry = DestinationRegistry::load(&registry_path)
        .await
        .with_context(|| format!("Failed to load destination registry {:?}", registry_path))?;
    let registry = Arc::new(RwLock::new(registry));

    let request_timeout = Duration::from_secs(config.request_timeout_seconds);
    let fetcher = Arc::new(HttpFetcher::new(request_timeout)?);
    let updater = ListingUpdater::new(fetcher, config.sources(), config.fetch_cap);
    for (category, url) in updater.sources() {
        tracing::info!("Source {}: {}", category, url);
    }

    let tracker = DeliveryTracker::new(
        chrono::Duration::hours(config.lookback_hours),
        request_timeout,
        config.signature.clone(),
    );

    let telegram = Arc::new(TelegramClient::new(&config.telegram, request_timeout)?);
    let publisher = Arc::new(Publisher::new(
        registry.clone(),
        updater,
        tracker,
        telegram.clone(),
        config.utc_offset()?,
    ));

    // Configure and start scheduled tasks
    let task_config = ScheduledTaskConfig {
        publish_interval_seconds: config.interval_seconds,
        first_delay_seconds: config.first_delay_seconds,
    };
    let mut task_manager = ScheduledTaskManager::new(task_config, publisher);
    task_manager.start_all();

    let handler = Arc::new(AdminHandler::new(config.admins.iter().copied(), registry));
    let polling = telegram.start_polling(handler);

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    polling.abort();
    task_manager.shutdown().await;

    Ok(())
}
