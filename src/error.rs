//! Fatal startup errors
//!
//! Everything past startup degrades to log lines instead of returning errors,
//! so this is the only error type that reaches `main`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no channels configured; set CHANNELS to a comma-separated list")]
    NoChannels,

    #[error("invalid channel name '{0}': must be a single path component")]
    InvalidChannel(String),

    #[error("invalid SYNC_TIME '{0}', expected HH:MM")]
    InvalidSyncTime(String),

    #[error("data directory {path} is not usable: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
