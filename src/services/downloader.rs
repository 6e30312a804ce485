//! External downloader invocation
//!
//! Fetching is delegated to yt-dlp. The contract we rely on is small: it
//! appends `<extractor> <id>` to the `--download-archive` file for every item
//! it completes, skips items already listed there, and exits non-zero when
//! anything went wrong. Failures are logged here and never returned, so one
//! channel's network blip or rate limit can't stop the rest of the run.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::{Config, DEFAULT_CHANNEL_URL_TEMPLATE, DEFAULT_OUTPUT_TEMPLATE};

/// Everything a fetcher needs to mirror one channel
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub channel: String,
    /// Where downloaded files land
    pub channel_dir: PathBuf,
    /// Ledger the downloader appends completed ids to
    pub ledger_path: PathBuf,
}

/// How a fetch attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Exited 0. Says nothing about whether new items were found.
    Completed,
    /// Exited non-zero, or was killed by a signal (`None`)
    Failed { code: Option<i32> },
    /// The process could not be started at all
    NotStarted { reason: String },
}

impl FetchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchStatus::Completed)
    }

    fn from_exit(status: ExitStatus) -> Self {
        if status.success() {
            FetchStatus::Completed
        } else {
            FetchStatus::Failed {
                code: status.code(),
            }
        }
    }
}

/// Capability to mirror a single channel into its directory and ledger.
///
/// Implementations must not return errors; they report how the attempt ended
/// and log the details themselves.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> FetchStatus;
}

/// yt-dlp invocation settings
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    pub binary: String,
    /// `{channel}` is replaced with the channel id
    pub url_template: String,
    pub output_template: String,
    pub retries: u32,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            url_template: DEFAULT_CHANNEL_URL_TEMPLATE.to_string(),
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            retries: 10,
        }
    }
}

impl From<&Config> for YtDlpConfig {
    fn from(config: &Config) -> Self {
        Self {
            binary: config.ytdlp_path.clone(),
            url_template: config.channel_url_template.clone(),
            output_template: config.output_template.clone(),
            retries: config.ytdlp_retries,
        }
    }
}

/// Fetcher backed by the yt-dlp command-line tool
pub struct YtDlpFetcher {
    config: YtDlpConfig,
}

impl YtDlpFetcher {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Locator for a channel's full video listing
    pub fn channel_url(&self, channel: &str) -> String {
        self.config.url_template.replace("{channel}", channel)
    }

    /// Arguments passed to yt-dlp for one channel
    fn build_args(&self, request: &FetchRequest) -> Vec<String> {
        vec![
            self.channel_url(&request.channel),
            "--download-archive".to_string(),
            path_arg(&request.ledger_path),
            "--paths".to_string(),
            path_arg(&request.channel_dir),
            "--output".to_string(),
            self.config.output_template.clone(),
            "--restrict-filenames".to_string(),
            "--retries".to_string(),
            self.config.retries.to_string(),
            "--no-overwrites".to_string(),
        ]
    }

    async fn run(&self, request: &FetchRequest) -> Result<ExitStatus> {
        let args = self.build_args(request);
        debug!(binary = %self.config.binary, args = ?args, "Spawning downloader");

        // Inherit stdio so download progress shows up in the container log.
        let status = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .with_context(|| format!("Failed to run {}. Is it installed?", self.config.binary))?;

        Ok(status)
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchStatus {
        info!(
            channel = %request.channel,
            url = %self.channel_url(&request.channel),
            "Checking channel"
        );

        match self.run(request).await {
            Ok(exit) => {
                let status = FetchStatus::from_exit(exit);
                if let FetchStatus::Failed { code } = &status {
                    warn!(
                        channel = %request.channel,
                        exit_code = ?code,
                        "Downloader exited with failure"
                    );
                }
                status
            }
            Err(e) => {
                error!(
                    channel = %request.channel,
                    error = %format!("{:#}", e),
                    "Failed to start downloader"
                );
                FetchStatus::NotStarted {
                    reason: format!("{:#}", e),
                }
            }
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
