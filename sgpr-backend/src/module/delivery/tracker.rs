//! Per-destination incremental delivery
//!
//! A destination's watermark for a category is the `last_update` of the
//! newest record it has successfully received. Each cycle sends the
//! records newer than the watermark, oldest first, and moves the
//! watermark after every successful send.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use futures::future::join_all;
use sgpr_common::{Category, DestinationId};
use std::collections::BTreeMap;
use std::time::Duration;

use super::channel::DeliveryChannel;
use crate::module::listing::{ApplicationRecord, Listings, DEFAULT_SIGNATURE};

/// Delivered position per category
pub type Watermarks = BTreeMap<Category, NaiveDateTime>;

/// Watermarks of every destination
pub type Progress = BTreeMap<DestinationId, Watermarks>;

pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

/// Outcome of one destination's delivery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    /// Categories whose batch stopped on a failed send
    pub failed: Vec<Category>,
}

/// Outcome of one cycle over all destinations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub destinations: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Records of `entries` (newest first) that are strictly newer than
/// `cutoff`, returned oldest first with their `last_update`.
///
/// The walk stops at the first record at or before the cutoff. Records
/// without a timestamp cannot be placed in time and are passed over.
pub fn select_pending(
    entries: &[ApplicationRecord],
    cutoff: NaiveDateTime,
) -> Vec<(NaiveDateTime, &ApplicationRecord)> {
    let mut pending = Vec::new();
    for entry in entries {
        match entry.last_update() {
            Some(ts) if ts > cutoff => pending.push((ts, entry)),
            Some(_) => break,
            None => continue,
        }
    }
    pending.reverse();
    pending
}

#[derive(Debug, Clone)]
pub struct DeliveryTracker {
    lookback: ChronoDuration,
    send_timeout: Duration,
    signature: String,
}

impl Default for DeliveryTracker {
    fn default() -> Self {
        Self {
            lookback: ChronoDuration::hours(DEFAULT_LOOKBACK_HOURS),
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            signature: DEFAULT_SIGNATURE.to_string(),
        }
    }
}

impl DeliveryTracker {
    pub fn new(lookback: ChronoDuration, send_timeout: Duration, signature: impl Into<String>) -> Self {
        Self {
            lookback,
            send_timeout,
            signature: signature.into(),
        }
    }

    /// Cutoff for categories a destination has never received. A lookback
    /// reaching past the representable range means "everything".
    pub fn default_cutoff(&self, now: NaiveDateTime) -> NaiveDateTime {
        now.checked_sub_signed(self.lookback).unwrap_or(NaiveDateTime::MIN)
    }

    /// Deliver everything new in `listings` to one destination, moving
    /// `watermarks` forward after each successful send.
    pub async fn deliver(
        &self,
        channel: &dyn DeliveryChannel,
        destination: &DestinationId,
        watermarks: &mut Watermarks,
        listings: &Listings,
        now: NaiveDateTime,
    ) -> DeliveryReport {
        let default_cutoff = self.default_cutoff(now);
        let mut report = DeliveryReport::default();

        for (&category, entries) in listings {
            if entries.is_empty() {
                continue;
            }

            let cutoff = watermarks.get(&category).copied().unwrap_or(default_cutoff);
            let pending = select_pending(entries, cutoff);
            if pending.is_empty() {
                continue;
            }

            tracing::debug!(
                "{} new {} records for {} (cutoff {})",
                pending.len(),
                category,
                destination,
                cutoff
            );

            for (last_update, entry) in pending {
                tracing::info!("Sending {} record {:?} to {}", category, entry.id(), destination);

                match self.send(channel, destination, entry).await {
                    Ok(()) => {
                        let mark = watermarks.entry(category).or_insert(last_update);
                        if *mark < last_update {
                            *mark = last_update;
                        }
                        report.sent += 1;
                    }
                    Err(e) => {
                        // Later records wait for the next cycle so order is kept.
                        tracing::warn!(
                            "Failed to send {} record {:?} to {}: {:#}",
                            category,
                            entry.id(),
                            destination,
                            e
                        );
                        report.failed.push(category);
                        break;
                    }
                }
            }
        }

        report
    }

    /// Run [`deliver`](Self::deliver) for every destination concurrently.
    pub async fn publish_to_all(
        &self,
        channel: &dyn DeliveryChannel,
        progress: &mut Progress,
        listings: &Listings,
        now: NaiveDateTime,
    ) -> CycleReport {
        let jobs = progress.iter_mut().map(|(destination, watermarks)| async move {
            self.deliver(channel, destination, watermarks, listings, now).await
        });

        let reports = join_all(jobs).await;

        CycleReport {
            destinations: reports.len(),
            sent: reports.iter().map(|r| r.sent).sum(),
            failed: reports.iter().map(|r| r.failed.len()).sum(),
        }
    }

    async fn send(
        &self,
        channel: &dyn DeliveryChannel,
        destination: &DestinationId,
        entry: &ApplicationRecord,
    ) -> anyhow::Result<()> {
        let text = entry.render(&self.signature);
        match tokio::time::timeout(self.send_timeout, channel.send(destination, &text)).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("send timed out after {} seconds", self.send_timeout.as_secs_f64()),
        }
    }
}
