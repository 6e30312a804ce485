//! One full pass over every configured channel
//!
//! Results are buffered for the whole run so the operator gets at most one
//! email per run, however many channels produced something.

use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::jobs::channel_sync::ChannelSync;
use crate::services::notifications::Notifier;

/// New items captured for one channel during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub channel: String,
    pub items: Vec<String>,
}

/// Everything a run captured, in configured channel order.
///
/// Channels that produced nothing are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub channels: Vec<ChannelReport>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.channels.iter().map(|c| c.items.len()).sum()
    }

    /// New items for a channel, if it produced any
    pub fn items_for(&self, channel: &str) -> Option<&[String]> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| c.items.as_slice())
    }

    fn record(&mut self, channel: &str, items: Vec<String>) {
        if !items.is_empty() {
            self.channels.push(ChannelReport {
                channel: channel.to_string(),
                items,
            });
        }
    }
}

/// Drives channel syncs sequentially and sends the run digest
pub struct SyncRunner {
    channels: Vec<String>,
    channel_sync: ChannelSync,
    notifier: Notifier,
}

impl SyncRunner {
    pub fn new(channels: Vec<String>, channel_sync: ChannelSync, notifier: Notifier) -> Self {
        Self {
            channels,
            channel_sync,
            notifier,
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Sync every channel in order, then notify if anything new was captured.
    pub async fn run_once(&self) -> RunReport {
        let started = Instant::now();
        info!(job = "sync", channels = self.channels.len(), "Starting VOD sync run");

        let mut report = RunReport::default();
        for channel in &self.channels {
            let items = self.channel_sync.sync(channel).await;
            if items.is_empty() {
                info!(job = "sync", channel = %channel, "No new VODs");
            } else {
                info!(
                    job = "sync",
                    channel = %channel,
                    new_items = items.len(),
                    "Captured new VODs"
                );
            }
            report.record(channel, items);
        }

        if report.is_empty() {
            info!(job = "sync", "No new VODs this run; no email sent");
        } else {
            self.notifier.notify(&report).await;
        }

        info!(
            job = "sync",
            new_items = report.total_items(),
            elapsed_secs = started.elapsed().as_secs(),
            summary = %serde_json::to_string(&report).unwrap_or_default(),
            "VOD sync run complete"
        );

        report
    }
}
