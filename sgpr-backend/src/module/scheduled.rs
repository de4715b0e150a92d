//! Scheduled task manager
//!
//! Runs the publish cycle on a fixed interval. Cycles never overlap: the
//! loop awaits each cycle before sleeping until the next one.

use super::publisher::Publisher;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Configuration for scheduled tasks
#[derive(Debug, Clone)]
pub struct ScheduledTaskConfig {
    /// Interval between publish cycles (in seconds)
    pub publish_interval_seconds: u64,

    /// Delay before the first publish cycle (in seconds)
    pub first_delay_seconds: u64,
}

impl Default for ScheduledTaskConfig {
    fn default() -> Self {
        Self {
            publish_interval_seconds: 3600,
            first_delay_seconds: 60,
        }
    }
}

/// Scheduled task manager
pub struct ScheduledTaskManager {
    config: ScheduledTaskConfig,
    publisher: Arc<Publisher>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    pub fn new(config: ScheduledTaskConfig, publisher: Arc<Publisher>) -> Self {
        Self {
            config,
            publisher,
            task_handles: Vec::new(),
        }
    }

    /// Start all scheduled tasks
    pub fn start_all(&mut self) {
        tracing::info!("Starting scheduled task manager...");

        let publish_handle = self.start_publish_task();
        self.task_handles.push(publish_handle);

        tracing::info!(
            "Started {} scheduled tasks (publishing every {} s, first run in {} s)",
            self.task_handles.len(),
            self.config.publish_interval_seconds,
            self.config.first_delay_seconds
        );
    }

    fn start_publish_task(&self) -> JoinHandle<()> {
        let publisher = self.publisher.clone();
        let interval = Duration::from_secs(self.config.publish_interval_seconds);
        let first_delay = Duration::from_secs(self.config.first_delay_seconds);

        tokio::spawn(async move {
            tokio::time::sleep(first_delay).await;
            Self::publish_loop(publisher, interval).await;
        })
    }

    async fn publish_loop(publisher: Arc<Publisher>, interval: Duration) {
        loop {
            Self::run_publish(&publisher).await;

            tracing::info!("Next publish cycle in {:.1} min", interval.as_secs_f64() / 60.0);
            tokio::time::sleep(interval).await;
        }
    }

    /// Run one publish cycle; failures are logged and the schedule goes on.
    async fn run_publish(publisher: &Publisher) {
        match publisher.run_once().await {
            Ok(report) if report.failed > 0 => {
                tracing::warn!("Publish cycle finished with {} failed deliveries", report.failed);
            }
            Ok(_) => tracing::debug!("Publish cycle finished"),
            Err(e) => tracing::error!("Publish cycle failed: {:#}", e),
        }
    }

    /// Gracefully shutdown all tasks
    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in self.task_handles {
            handle.abort();
        }

        tracing::info!("All scheduled tasks stopped");
    }
}
