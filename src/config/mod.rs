//! Application configuration management

use std::env;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use tracing::warn;

use crate::error::StartupError;

const DEFAULT_DATA_DIR: &str = "/data";
const DEFAULT_SYNC_TIME: &str = "03:00";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_RETRIES: u32 = 10;
const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
pub const DEFAULT_CHANNEL_URL_TEMPLATE: &str = "https://www.twitch.tv/{channel}/videos/all";
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(upload_date>%Y-%m-%d)s_%(id)s_%(title)s.%(ext)s";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Channels to mirror, in notification/log order
    pub channels: Vec<String>,

    /// Base storage directory; each channel gets `<data_dir>/<channel>`
    pub data_dir: PathBuf,

    /// Local wall-clock time of the daily run
    pub sync_time: NaiveTime,

    /// Downloader executable
    pub ytdlp_path: String,

    /// Retry bound handed to the downloader
    pub ytdlp_retries: u32,

    /// Channel locator template, `{channel}` is substituted
    pub channel_url_template: String,

    /// Output file naming template handed to the downloader
    pub output_template: String,

    /// Mail relay settings; `None` disables notifications
    pub smtp: Option<SmtpConfig>,
}

/// SMTP relay settings. Only constructed when every field is known.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"...")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let channels = parse_channels(&lookup("CHANNELS").unwrap_or_default());
        if channels.is_empty() {
            return Err(StartupError::NoChannels);
        }
        if let Some(bad) = channels.iter().find(|c| !is_valid_channel(c)) {
            return Err(StartupError::InvalidChannel(bad.clone()));
        }

        let raw_time =
            non_empty(lookup("SYNC_TIME")).unwrap_or_else(|| DEFAULT_SYNC_TIME.to_string());
        let sync_time = NaiveTime::parse_from_str(raw_time.trim(), "%H:%M")
            .map_err(|_| StartupError::InvalidSyncTime(raw_time.clone()))?;

        let ytdlp_retries = match non_empty(lookup("YTDLP_RETRIES")) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid YTDLP_RETRIES, using default");
                DEFAULT_RETRIES
            }),
            None => DEFAULT_RETRIES,
        };

        Ok(Self {
            channels,

            data_dir: PathBuf::from(
                non_empty(lookup("DATA_DIR")).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ),

            sync_time,

            ytdlp_path: non_empty(lookup("YTDLP_PATH"))
                .unwrap_or_else(|| DEFAULT_YTDLP_PATH.to_string()),

            ytdlp_retries,

            channel_url_template: non_empty(lookup("CHANNEL_URL_TEMPLATE"))
                .unwrap_or_else(|| DEFAULT_CHANNEL_URL_TEMPLATE.to_string()),

            output_template: non_empty(lookup("OUTPUT_TEMPLATE"))
                .unwrap_or_else(|| DEFAULT_OUTPUT_TEMPLATE.to_string()),

            smtp: SmtpConfig::from_lookup(&lookup),
        })
    }

    /// Create the data directory if needed and confirm it accepts writes.
    ///
    /// Returns the canonical path, which replaces `data_dir` for the rest of the process.
    pub fn ensure_data_dir(&mut self) -> Result<&Path, StartupError> {
        let wrap = |path: &Path, source| StartupError::DataDir {
            path: path.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(&self.data_dir).map_err(|e| wrap(&self.data_dir, e))?;
        let resolved = self
            .data_dir
            .canonicalize()
            .map_err(|e| wrap(&self.data_dir, e))?;

        let probe = resolved.join(".vod-mirror-write-test");
        std::fs::write(&probe, b"").map_err(|e| wrap(&resolved, e))?;
        let _ = std::fs::remove_file(&probe);

        self.data_dir = resolved;
        Ok(self.data_dir.as_path())
    }
}

impl SmtpConfig {
    fn from_lookup<F>(lookup: &F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = non_empty(lookup("SMTP_HOST"))?;
        let port = match non_empty(lookup("SMTP_PORT")) {
            Some(raw) => match raw.trim().parse() {
                Ok(port) => port,
                Err(_) => {
                    warn!(value = %raw, "Invalid SMTP_PORT, email notifications disabled");
                    return None;
                }
            },
            None => DEFAULT_SMTP_PORT,
        };
        let username = non_empty(lookup("SMTP_USERNAME"))?;
        let password = non_empty(lookup("SMTP_PASSWORD"))?;
        let from = non_empty(lookup("SMTP_FROM")).unwrap_or_else(|| username.clone());
        let to = non_empty(lookup("SMTP_TO")).unwrap_or_else(|| username.clone());

        Some(Self {
            host,
            port,
            username,
            password,
            from,
            to,
        })
    }
}

/// Split a comma-separated channel list, trimming entries and dropping
/// blanks and repeats. First occurrence wins so configured order is kept.
pub fn parse_channels(raw: &str) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for channel in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if !channels.iter().any(|c| c == channel) {
            channels.push(channel.to_string());
        }
    }
    channels
}

/// Channel names become directories under the data dir, so they must not
/// contain separators or name the current or parent directory.
fn is_valid_channel(channel: &str) -> bool {
    channel != "." && channel != ".." && !channel.contains(['/', '\\'])
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
