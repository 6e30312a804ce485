//! Integration tests for full sync runs
//!
//! A scripted fetcher stands in for yt-dlp: it appends lines to the real
//! ledger file in a temp directory, the same way the downloader would.
//! A recording transport captures mail instead of sending it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveTime;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use vod_mirror::jobs::{ChannelReport, ChannelSync, RunReport, Scheduler, SyncRunner};
use vod_mirror::services::downloader::{FetchRequest, FetchStatus, Fetcher};
use vod_mirror::services::notifications::{DIGEST_SUBJECT, MailTransport, Notifier};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct ScriptedFetcher {
    /// Lines appended to a channel's ledger on its next fetch
    pending: Mutex<HashMap<String, Vec<String>>>,
    /// Channels whose fetch reports failure (after appending)
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
    /// Cancelled after every fetch when set
    cancel_on_fetch: Option<CancellationToken>,
}

impl ScriptedFetcher {
    fn queue(&self, channel: &str, lines: &[&str]) {
        self.pending
            .lock()
            .entry(channel.to_string())
            .or_default()
            .extend(lines.iter().map(|l| l.to_string()));
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchStatus {
        self.calls.lock().push(request.channel.clone());

        let lines = self
            .pending
            .lock()
            .remove(&request.channel)
            .unwrap_or_default();
        if !lines.is_empty() {
            append_lines(&request.ledger_path, &lines);
        }

        if let Some(token) = &self.cancel_on_fetch {
            token.cancel();
        }

        if self.failing.contains(&request.channel) {
            FetchStatus::Failed { code: Some(1) }
        } else {
            FetchStatus::Completed
        }
    }
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        self.sent.lock().push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

fn append_lines(path: &Path, lines: &[String]) {
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    std::fs::write(path, contents).unwrap();
}

struct Harness {
    dir: TempDir,
    fetcher: Arc<ScriptedFetcher>,
    transport: Arc<RecordingTransport>,
}

impl Harness {
    fn new(fetcher: ScriptedFetcher) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            fetcher: Arc::new(fetcher),
            transport: Arc::new(RecordingTransport::default()),
        }
    }

    fn runner(&self, channels: &[&str]) -> SyncRunner {
        SyncRunner::new(
            channels.iter().map(|c| c.to_string()).collect(),
            ChannelSync::new(self.dir.path(), self.fetcher.clone()),
            Notifier::new(self.transport.clone()),
        )
    }

    fn seed_ledger(&self, channel: &str, contents: &str) {
        let dir = self.dir.path().join(channel);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("archive.txt"), contents).unwrap();
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.transport.sent.lock().clone()
    }
}

fn items(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Run orchestration
// ============================================================================

#[tokio::test]
async fn test_new_items_in_one_channel_send_one_digest() {
    let harness = Harness::new(ScriptedFetcher::default());
    harness.seed_ledger("bob", "twitch v7\n");
    harness.fetcher.queue("alice", &["vod 111", "222"]);

    let report = harness.runner(&["alice", "bob"]).run_once().await;

    assert_eq!(
        report,
        RunReport {
            channels: vec![ChannelReport {
                channel: "alice".to_string(),
                items: items(&["111", "222"]),
            }],
        }
    );

    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, DIGEST_SUBJECT);
    assert!(sent[0].1.contains("alice: 2 new item(s): 111, 222"));
    assert!(!sent[0].1.contains("bob"));
}

#[tokio::test]
async fn test_quiet_run_sends_nothing() {
    let harness = Harness::new(ScriptedFetcher::default());
    harness.seed_ledger("alice", "twitch v1\ntwitch v2\n");

    let report = harness.runner(&["alice", "bob"]).run_once().await;

    assert!(report.is_empty());
    assert!(harness.sent().is_empty());
    assert_eq!(harness.fetcher.calls(), vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_digest_follows_configured_channel_order() {
    let harness = Harness::new(ScriptedFetcher::default());
    harness.fetcher.queue("zed", &["twitch v9"]);
    harness.fetcher.queue("amy", &["twitch v2", "twitch v1"]);

    let report = harness.runner(&["zed", "mid", "amy"]).run_once().await;

    assert_eq!(
        report.channels.iter().map(|c| c.channel.as_str()).collect::<Vec<_>>(),
        vec!["zed", "amy"]
    );

    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    let lines: Vec<&str> = sent[0].1.lines().skip(2).collect();
    assert_eq!(
        lines,
        vec!["zed: 1 new item(s): v9", "amy: 2 new item(s): v1, v2"]
    );
}

#[tokio::test]
async fn test_failed_channel_does_not_stop_the_run() {
    let harness = Harness::new(ScriptedFetcher {
        failing: vec!["alice".to_string()],
        ..Default::default()
    });
    harness.fetcher.queue("alice", &["twitch v1"]);
    harness.fetcher.queue("bob", &["twitch v2"]);

    let report = harness.runner(&["alice", "bob"]).run_once().await;

    assert_eq!(harness.fetcher.calls(), vec!["alice", "bob"]);
    assert_eq!(report.items_for("alice"), Some(&items(&["v1"])[..]));
    assert_eq!(report.items_for("bob"), Some(&items(&["v2"])[..]));
    assert_eq!(harness.sent().len(), 1);
}

#[tokio::test]
async fn test_second_run_only_reports_fresh_items() {
    let harness = Harness::new(ScriptedFetcher::default());
    let runner = harness.runner(&["alice"]);

    harness.fetcher.queue("alice", &["twitch v1"]);
    assert_eq!(runner.run_once().await.total_items(), 1);

    assert!(runner.run_once().await.is_empty());

    harness.fetcher.queue("alice", &["twitch v2"]);
    let third = runner.run_once().await;
    assert_eq!(third.items_for("alice"), Some(&items(&["v2"])[..]));

    assert_eq!(harness.sent().len(), 2);
}

#[tokio::test]
async fn test_unconfigured_mail_still_reports() {
    let harness = Harness::new(ScriptedFetcher::default());
    harness.fetcher.queue("alice", &["twitch v1"]);

    let runner = SyncRunner::new(
        vec!["alice".to_string()],
        ChannelSync::new(harness.dir.path(), harness.fetcher.clone()),
        Notifier::from_config(None),
    );

    let report = runner.run_once().await;
    assert_eq!(report.total_items(), 1);
    assert!(harness.sent().is_empty());
}

// ============================================================================
// Scheduler
// ============================================================================

#[tokio::test]
async fn test_scheduler_single_run_returns_after_startup_sync() {
    let harness = Harness::new(ScriptedFetcher::default());
    harness.fetcher.queue("alice", &["twitch v1"]);

    let scheduler = Scheduler::new(
        harness.runner(&["alice"]),
        NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
    )
    .with_single_run(true);

    tokio::time::timeout(Duration::from_secs(5), scheduler.run(CancellationToken::new()))
        .await
        .expect("single-run scheduler should return");

    assert_eq!(harness.fetcher.calls(), vec!["alice"]);
    assert_eq!(harness.sent().len(), 1);
}

#[tokio::test]
async fn test_scheduler_stops_at_state_boundary_after_run() {
    let token = CancellationToken::new();
    let harness = Harness::new(ScriptedFetcher {
        cancel_on_fetch: Some(token.clone()),
        ..Default::default()
    });

    let scheduler = Scheduler::new(
        harness.runner(&["alice", "bob"]),
        NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
    );

    tokio::time::timeout(Duration::from_secs(5), scheduler.run(token))
        .await
        .expect("scheduler should stop once cancelled");

    // Cancellation during the run lets the run finish, then stops.
    assert_eq!(harness.fetcher.calls(), vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_scheduler_stops_while_waiting() {
    let token = CancellationToken::new();
    let harness = Harness::new(ScriptedFetcher::default());
    let fetcher = harness.fetcher.clone();

    let scheduler = Scheduler::new(
        harness.runner(&["alice"]),
        NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
    );
    let handle = tokio::spawn(scheduler.run(token.clone()));

    tokio::time::timeout(Duration::from_secs(5), async {
        while fetcher.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("startup run should happen immediately");

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop while waiting")
        .unwrap();

    assert_eq!(fetcher.calls(), vec!["alice"]);
}
