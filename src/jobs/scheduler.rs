//! Daily run scheduler
//!
//! Runs once immediately at startup, then every day at a fixed local time.
//! The next target is recomputed from the wall clock after each run, so a
//! long run never causes a skipped or doubled day. Waits are sliced and the
//! wall clock re-checked after each slice, which keeps the schedule honest
//! across clock adjustments and host suspend.

use std::time::Duration;

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::jobs::sync_run::SyncRunner;

/// Longest single sleep before the wall clock is consulted again
const MAX_SLEEP_SLICE: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    /// Sleeping until `target`; `None` means run immediately
    Waiting { target: Option<DateTime<Local>> },
    Running,
    Stopped,
}

pub struct Scheduler {
    runner: SyncRunner,
    sync_time: NaiveTime,
    single_run: bool,
}

impl Scheduler {
    pub fn new(runner: SyncRunner, sync_time: NaiveTime) -> Self {
        Self {
            runner,
            sync_time,
            single_run: false,
        }
    }

    /// Stop after the startup run instead of scheduling daily runs
    pub fn with_single_run(mut self, single_run: bool) -> Self {
        self.single_run = single_run;
        self
    }

    /// Drive runs until `shutdown` is cancelled.
    ///
    /// Cancellation is observed at every state change and during waits. A run
    /// in progress is always allowed to finish.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            sync_time = %self.sync_time.format("%H:%M"),
            channels = ?self.runner.channels(),
            "Scheduler started; running initial sync"
        );

        let mut state = SchedulerState::Waiting { target: None };
        loop {
            if shutdown.is_cancelled() && state != SchedulerState::Stopped {
                state = SchedulerState::Stopped;
            }

            state = match state {
                SchedulerState::Waiting { target: None } => SchedulerState::Running,
                SchedulerState::Waiting {
                    target: Some(target),
                } => self.wait_until(target, &shutdown).await,
                SchedulerState::Running => {
                    self.runner.run_once().await;
                    if self.single_run {
                        SchedulerState::Stopped
                    } else {
                        let target = next_run_after(&Local::now(), self.sync_time);
                        info!(
                            next_run = %target.to_rfc3339(),
                            sleep_secs = (target - Local::now()).num_seconds().max(0),
                            "Sleeping until next daily sync"
                        );
                        SchedulerState::Waiting {
                            target: Some(target),
                        }
                    }
                }
                SchedulerState::Stopped => break,
            };
        }

        info!("Scheduler stopped");
    }

    /// Sleep one slice toward `target` and decide the next state
    async fn wait_until(
        &self,
        target: DateTime<Local>,
        shutdown: &CancellationToken,
    ) -> SchedulerState {
        let remaining = (target - Local::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            info!("Starting scheduled daily sync");
            return SchedulerState::Running;
        }

        let slice = remaining.min(MAX_SLEEP_SLICE);
        debug!(slice_secs = slice.as_secs(), "Waiting for next sync");

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested while waiting");
                SchedulerState::Stopped
            }
            _ = tokio::time::sleep(slice) => SchedulerState::Waiting { target: Some(target) },
        }
    }
}

/// Next occurrence of `at` strictly after `now`: today if still ahead,
/// otherwise tomorrow.
///
/// A time that falls in a DST gap moves forward to the first valid instant;
/// an ambiguous time takes the earlier instant.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();

    for _ in 0..3 {
        if let Some(candidate) = resolve_local(&tz, date.and_time(at))
            && candidate > *now
        {
            return candidate;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    now.clone() + chrono::Duration::days(1)
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    (0..=4)
        .map(|step| naive + chrono::Duration::minutes(30 * step))
        .find_map(|shifted| match tz.from_local_datetime(&shifted) {
            LocalResult::Single(t) => Some(t),
            // Zones are free to list the later instant first
            LocalResult::Ambiguous(a, b) => Some(a.min(b)),
            LocalResult::None => None,
        })
}
