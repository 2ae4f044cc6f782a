//! Per-minute tick loop: due-job evaluation, clock-anomaly detection, drain.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, TimeDelta, TimeZone, Timelike};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::job::{Job, OnJobExit};
use crate::metrics;

/// Fixed cushion past the minute boundary. Ticks land mid-minute so small
/// clock adjustments in either direction cannot skip or double-fire a minute.
const TICK_OVERSHOOT: Duration = Duration::from_secs(30);

/// Delay from `now` until the next tick, which lands at the midpoint of the
/// next minute.
pub fn delay_till_next_check<T: Timelike>(now: &T) -> Duration {
    TICK_OVERSHOOT + Duration::from_secs(u64::from(60 - now.second()))
        - Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000))
}

/// A detected discontinuity between the expected and actual elapsed wall
/// time across one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAnomaly {
    /// Time moved forward; jobs may have been skipped.
    Forward,
    /// Time moved backward; jobs may run again.
    Backward,
}

/// Compare the previous-tick reference recorded last iteration against the
/// one recomputed this iteration, at one-second granularity. No correction
/// is attempted; the caller only counts and logs.
pub fn check_anomaly<Tz: TimeZone>(
    expected_prev: &DateTime<Tz>,
    actual_prev: &DateTime<Tz>,
) -> Option<ClockAnomaly> {
    if actual_prev.timestamp() == expected_prev.timestamp() {
        None
    } else if actual_prev > expected_prev {
        Some(ClockAnomaly::Forward)
    } else {
        Some(ClockAnomaly::Backward)
    }
}

/// Drives the whole job table: one control task, one spawned task per
/// running job.
pub struct Scheduler {
    jobs: Vec<Arc<Job>>,
    on_exit: OnJobExit,
}

impl Scheduler {
    pub fn new(jobs: Vec<Arc<Job>>, on_exit: OnJobExit) -> Self {
        Self { jobs, on_exit }
    }

    /// Evaluate one tick in table order: start due idle jobs, mark due
    /// still-running jobs overdue. Overdue jobs are not queued or retried.
    pub async fn run_due_jobs<T: Datelike + Timelike>(&self, now: &T) {
        for job in &self.jobs {
            if !job.should_run_at(now) {
                continue;
            }
            if job.is_running() {
                warn!(job = %job.name, "Job is overdue");
                metrics::JOB_OVERDUE.with_label_values(&[&job.name]).inc();
                continue;
            }
            info!(job = %job.name, "Starting job");
            metrics::JOB_RUNNING.with_label_values(&[&job.name]).set(1.0);
            Arc::clone(job).start(self.on_exit.clone()).await;
        }
    }

    /// Run until `shutdown` is cancelled, then drain running jobs.
    ///
    /// Each iteration sleeps to the middle of the next minute and then
    /// evaluates the timestamp captured before the sleep, so every minute is
    /// evaluated exactly once. The previous-tick reference (`next_check`
    /// minus 60s) is recomputed each iteration and compared against the recorded
    /// one; any disagreement means the clock jumped between ticks.
    pub async fn run(&self, shutdown: CancellationToken) {
        let now = Local::now();
        let mut prev_check = now + delay_till_next_check(&now) - TimeDelta::seconds(60);

        loop {
            let now = Local::now();
            let delay = delay_till_next_check(&now);
            let next_check = now + delay;
            let actual_prev = next_check - TimeDelta::seconds(60);

            match check_anomaly(&prev_check, &actual_prev) {
                Some(ClockAnomaly::Forward) => {
                    warn!("Forward time jump detected, jobs may have been skipped");
                    metrics::FORWARD_TIME_SKIPS.inc();
                }
                Some(ClockAnomaly::Backward) => {
                    warn!("Backward time jump detected, jobs may be run multiple times");
                    metrics::BACKWARD_TIME_SKIPS.inc();
                }
                None => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }

            self.run_due_jobs(&now).await;
            prev_check = next_check;
        }

        self.drain().await;
    }

    /// Wait, in table order, for every still-running job to finish. Jobs are
    /// never killed; shutdown only stops issuing new starts.
    async fn drain(&self) {
        for job in &self.jobs {
            if job.is_running() {
                info!(job = %job.name, "Waiting for job");
                job.wait().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn delay_lands_mid_next_minute() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 4).unwrap();
        // 30s cushion + 56s to the boundary.
        assert_eq!(delay_till_next_check(&now), Duration::from_secs(86));

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(delay_till_next_check(&now), Duration::from_secs(90));
    }

    #[test]
    fn delay_subtracts_subsecond_remainder() {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 4)
            .unwrap()
            .checked_add_signed(TimeDelta::milliseconds(250))
            .unwrap();
        assert_eq!(delay_till_next_check(&now), Duration::from_millis(85_750));
    }

    #[test]
    fn matching_references_are_no_anomaly() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        assert_eq!(check_anomaly(&t, &t), None);
        // Sub-second drift is invisible at one-second granularity.
        let drifted = t.checked_add_signed(TimeDelta::milliseconds(400)).unwrap();
        assert_eq!(check_anomaly(&t, &drifted), None);
    }

    #[test]
    fn forward_jump_is_classified_forward() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        let actual = expected + TimeDelta::seconds(120);
        assert_eq!(
            check_anomaly(&expected, &actual),
            Some(ClockAnomaly::Forward)
        );
    }

    #[test]
    fn backward_jump_is_classified_backward() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        let actual = expected - TimeDelta::seconds(45);
        assert_eq!(
            check_anomaly(&expected, &actual),
            Some(ClockAnomaly::Backward)
        );
    }
}
