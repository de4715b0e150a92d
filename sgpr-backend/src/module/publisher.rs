//! One fetch-and-deliver cycle.
//!
//! Deliveries run on a snapshot of the registry so admin commands are not
//! blocked while messages go out; the advanced watermarks are merged back
//! and persisted at the end of the cycle.

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDateTime};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::Instrument;

use super::delivery::{CycleReport, DeliveryChannel, DeliveryTracker, DestinationRegistry};
use super::listing::ListingUpdater;
use crate::config::local_now;

pub struct Publisher {
    registry: Arc<RwLock<DestinationRegistry>>,
    updater: ListingUpdater,
    tracker: DeliveryTracker,
    channel: Arc<dyn DeliveryChannel>,
    utc_offset: FixedOffset,
}

impl Publisher {
    pub fn new(
        registry: Arc<RwLock<DestinationRegistry>>,
        updater: ListingUpdater,
        tracker: DeliveryTracker,
        channel: Arc<dyn DeliveryChannel>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            registry,
            updater,
            tracker,
            channel,
            utc_offset,
        }
    }

    /// Run one cycle at the current listing-local time
    pub async fn run_once(&self) -> Result<CycleReport> {
        self.run_at(local_now(self.utc_offset)).await
    }

    pub async fn run_at(&self, now: NaiveDateTime) -> Result<CycleReport> {
        let cycle_id = uuid::Uuid::now_v7();
        self.cycle(now)
            .instrument(tracing::info_span!("publish", cycle = %cycle_id))
            .await
    }

    async fn cycle(&self, now: NaiveDateTime) -> Result<CycleReport> {
        let mut snapshot = self.registry.read().await.snapshot();
        if snapshot.progress.is_empty() {
            tracing::info!("No destinations registered, skip this publishing");
            return Ok(CycleReport::default());
        }

        let listings = self.updater.fetch_all().await;
        if listings.is_empty() {
            tracing::warn!("No category could be fetched this cycle");
            return Ok(CycleReport::default());
        }

        let report = self
            .tracker
            .publish_to_all(self.channel.as_ref(), &mut snapshot.progress, &listings, now)
            .await;

        let mut registry = self.registry.write().await;
        registry.merge_snapshot(snapshot);
        registry
            .save()
            .await
            .with_context(|| format!("Failed to save destination registry to {:?}", registry.path()))?;

        tracing::info!(
            "Publish cycle: {} destinations, {} sent, {} failed",
            report.destinations,
            report.sent,
            report.failed
        );
        Ok(report)
    }
}
