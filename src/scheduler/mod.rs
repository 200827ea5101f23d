//! Periodic auto-refresh with an explicit lifecycle

use std::time::Duration;

use anyhow::{Result, ensure};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::tracker::PriceTracker;

const SECS_PER_HOUR: u64 = 60 * 60;

/// Longest accepted refresh interval, one year.
pub const MAX_INTERVAL_HOURS: u64 = 366 * 24;

/// Owns the scheduler that refreshes every tracked item on an interval.
///
/// `start` replaces any running schedule; `stop` shuts it down. Dropping a
/// running `AutoRefresh` without calling `stop` leaves the scheduler's
/// tasks to end with the runtime.
pub struct AutoRefresh {
    tracker: PriceTracker,
    scheduler: Option<JobScheduler>,
    interval_hours: Option<u64>,
}

impl AutoRefresh {
    pub fn new(tracker: PriceTracker) -> Self {
        Self {
            tracker,
            scheduler: None,
            interval_hours: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn interval_hours(&self) -> Option<u64> {
        self.interval_hours
    }

    /// Refreshes every `interval_hours`, first run one interval from now.
    ///
    /// An interval of 0 only stops the current schedule. Intervals above
    /// [`MAX_INTERVAL_HOURS`] are an error and leave nothing running.
    pub async fn start(&mut self, interval_hours: u64) -> Result<()> {
        self.stop().await?;
        if interval_hours == 0 {
            return Ok(());
        }
        ensure!(
            interval_hours <= MAX_INTERVAL_HOURS,
            "refresh interval of {} hours exceeds the maximum of {}",
            interval_hours,
            MAX_INTERVAL_HOURS
        );
        let period = Duration::from_secs(interval_hours * SECS_PER_HOUR);

        let sched = JobScheduler::new().await?;

        let job_tracker = self.tracker.clone();
        sched
            .add(Job::new_repeated_async(
                period,
                move |_uuid, _l| {
                    let tracker = job_tracker.clone();
                    Box::pin(async move {
                        if let Err(e) = run_scheduled_refresh(&tracker).await {
                            error!("Scheduled refresh failed: {}", e);
                        }
                    })
                },
            )?)
            .await?;

        sched.start().await?;
        info!("Auto refresh started - every {} hours", interval_hours);

        self.scheduler = Some(sched);
        self.interval_hours = Some(interval_hours);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(mut sched) = self.scheduler.take() {
            sched.shutdown().await?;
            info!("Auto refresh stopped");
        }
        self.interval_hours = None;
        Ok(())
    }
}

/// One scheduled tick: refresh everything, then post a summary.
pub async fn run_scheduled_refresh(tracker: &PriceTracker) -> Result<()> {
    info!("Running scheduled price refresh");
    let summary = tracker.refresh_all().await?;

    if summary.attempted() > 0 {
        tracker.notifier().send_refresh_summary(&summary).await?;
    }

    Ok(())
}
