//! vod-mirror: keeps a local mirror of streaming channel VOD catalogs.
//!
//! Each day the scheduler walks the configured channels, lets yt-dlp fetch
//! anything missing, diffs each channel's download ledger to see what
//! arrived, and mails the operator a single digest when something did.

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod services;

pub use config::{Config, SmtpConfig};
pub use error::StartupError;
