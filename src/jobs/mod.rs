//! Sync jobs and the daily scheduler

pub mod channel_sync;
pub mod scheduler;
pub mod sync_run;

use std::sync::Arc;

use crate::config::Config;
use crate::services::downloader::{Fetcher, YtDlpConfig, YtDlpFetcher};
use crate::services::notifications::Notifier;

pub use channel_sync::ChannelSync;
pub use scheduler::{Scheduler, SchedulerState, next_run_after};
pub use sync_run::{ChannelReport, RunReport, SyncRunner};

/// Wire the production fetcher and notifier into a scheduler
pub fn build_scheduler(config: &Config) -> Scheduler {
    let fetcher: Arc<dyn Fetcher> = Arc::new(YtDlpFetcher::new(YtDlpConfig::from(config)));
    let notifier = Notifier::from_config(config.smtp.as_ref());
    let runner = SyncRunner::new(
        config.channels.clone(),
        ChannelSync::new(&config.data_dir, fetcher),
        notifier,
    );
    Scheduler::new(runner, config.sync_time)
}
