//! Single-channel sync: snapshot, fetch, snapshot, diff

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::services::downloader::{FetchRequest, Fetcher};
use crate::services::ledger::{self, LEDGER_FILE_NAME};

/// Mirrors one channel at a time into `<data_dir>/<channel>`
#[derive(Clone)]
pub struct ChannelSync {
    data_dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
}

impl ChannelSync {
    pub fn new(data_dir: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            data_dir: data_dir.into(),
            fetcher,
        }
    }

    pub fn channel_dir(&self, channel: &str) -> PathBuf {
        self.data_dir.join(channel)
    }

    pub fn ledger_path(&self, channel: &str) -> PathBuf {
        self.channel_dir(channel).join(LEDGER_FILE_NAME)
    }

    /// Fetch a channel and return the ids its ledger gained, sorted.
    ///
    /// Never fails. A failed fetch still diffs the ledger because the
    /// downloader may have recorded some items before it gave up.
    pub async fn sync(&self, channel: &str) -> Vec<String> {
        let request = FetchRequest {
            channel: channel.to_string(),
            channel_dir: self.channel_dir(channel),
            ledger_path: self.ledger_path(channel),
        };

        ensure_dir(&request.channel_dir).await;

        let before = ledger::read_snapshot(&request.ledger_path).await;
        let status = self.fetcher.fetch(&request).await;
        let after = ledger::read_snapshot(&request.ledger_path).await;

        let mut ids: Vec<String> = ledger::new_entries(&before, &after)
            .iter()
            .map(|entry| ledger::extract_identifier(entry).to_string())
            .collect();
        ids.sort();

        debug!(
            channel = %channel,
            fetch_ok = status.is_success(),
            fetch_status = ?status,
            before = before.len(),
            after = after.len(),
            new_items = ids.len(),
            "Channel sync finished"
        );

        ids
    }
}

async fn ensure_dir(dir: &Path) {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(
            path = %dir.display(),
            error = %e,
            "Failed to create channel directory"
        );
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::services::downloader::FetchStatus;

    /// Appends fixed lines to the ledger, then reports `status`
    struct AppendingFetcher {
        lines: Vec<&'static str>,
        status: FetchStatus,
    }

    #[async_trait]
    impl Fetcher for AppendingFetcher {
        async fn fetch(&self, request: &FetchRequest) -> FetchStatus {
            let mut contents = std::fs::read_to_string(&request.ledger_path).unwrap_or_default();
            for line in &self.lines {
                contents.push_str(line);
                contents.push('\n');
            }
            std::fs::write(&request.ledger_path, contents).unwrap();
            self.status.clone()
        }
    }

    #[tokio::test]
    async fn test_sync_reports_new_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let sync = ChannelSync::new(
            tmp.path(),
            Arc::new(AppendingFetcher {
                lines: vec!["twitch v300", "twitch v100"],
                status: FetchStatus::Completed,
            }),
        );

        std::fs::create_dir_all(sync.channel_dir("alice")).unwrap();
        std::fs::write(sync.ledger_path("alice"), "twitch v050\n").unwrap();

        assert_eq!(sync.sync("alice").await, vec!["v100", "v300"]);
    }

    #[tokio::test]
    async fn test_sync_creates_channel_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let sync = ChannelSync::new(
            tmp.path(),
            Arc::new(AppendingFetcher {
                lines: vec![],
                status: FetchStatus::Completed,
            }),
        );

        assert!(sync.sync("bob").await.is_empty());
        assert!(tmp.path().join("bob").is_dir());
        assert_eq!(sync.ledger_path("bob"), tmp.path().join("bob").join("archive.txt"));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_partial_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let sync = ChannelSync::new(
            tmp.path(),
            Arc::new(AppendingFetcher {
                lines: vec!["twitch v1"],
                status: FetchStatus::Failed { code: Some(1) },
            }),
        );

        assert_eq!(sync.sync("alice").await, vec!["v1"]);
    }
}
