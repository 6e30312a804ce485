//! External collaborators: ledger files, the downloader, mail, logging

pub mod downloader;
pub mod ledger;
pub mod logging;
pub mod notifications;

pub use downloader::{FetchRequest, FetchStatus, Fetcher, YtDlpConfig, YtDlpFetcher};
pub use logging::{LogFormat, init_tracing};
pub use notifications::{MailTransport, Notifier, SmtpMailer, format_report};
