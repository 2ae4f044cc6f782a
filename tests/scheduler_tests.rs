use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc};
use promcron::cron::parse_table;
use promcron::job::{Job, OnJobExit};
use promcron::metrics;
use promcron::scheduler::{check_anomaly, delay_till_next_check, ClockAnomaly, Scheduler};

fn jobs(table: &str) -> Vec<Arc<Job>> {
    parse_table("test", table)
        .unwrap()
        .into_iter()
        .map(Arc::new)
        .collect()
}

fn counting_exit(counter: Arc<AtomicUsize>) -> OnJobExit {
    Arc::new(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

#[tokio::test]
async fn due_running_job_is_marked_overdue_not_restarted() {
    let jobs = jobs("overlap-probe * * * * * sleep 1");
    let job = jobs[0].clone();
    let exits = Arc::new(AtomicUsize::new(0));
    let scheduler = Scheduler::new(jobs, counting_exit(exits.clone()));

    let now = at(12, 0);
    let overdue = || {
        metrics::JOB_OVERDUE
            .with_label_values(&["overlap-probe"])
            .get()
    };
    let before = overdue();

    scheduler.run_due_jobs(&now).await;
    assert!(job.is_running(), "first tick should start the job");

    // Still running on the next tick: one overdue mark, no second start.
    scheduler.run_due_jobs(&now).await;
    assert_eq!(overdue() - before, 1.0);

    job.wait().await;
    assert!(!job.is_running());
    assert_eq!(exits.load(Ordering::SeqCst), 1, "exactly one execution");
}

#[tokio::test]
async fn job_not_due_is_not_started() {
    let jobs = jobs("quiet-probe 5 * * * * true");
    let job = jobs[0].clone();
    let exits = Arc::new(AtomicUsize::new(0));
    let scheduler = Scheduler::new(jobs, counting_exit(exits.clone()));

    scheduler.run_due_jobs(&at(12, 4)).await;
    assert!(!job.is_running());
    job.wait().await;
    assert_eq!(exits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn jobs_start_in_table_order() {
    let jobs = jobs("order-a * * * * * sleep 1\norder-b * * * * * sleep 1");
    let a = jobs[0].clone();
    let b = jobs[1].clone();
    let exits = Arc::new(AtomicUsize::new(0));
    let scheduler = Scheduler::new(jobs, counting_exit(exits.clone()));

    scheduler.run_due_jobs(&at(12, 0)).await;
    assert!(a.is_running());
    assert!(b.is_running());

    a.wait().await;
    b.wait().await;
    assert_eq!(exits.load(Ordering::SeqCst), 2);
}

/// Drive the tick bookkeeping the way the live loop does, over a scripted
/// sequence of wall-clock readings, and count each classified anomaly.
fn replay_ticks(nows: &[DateTime<Utc>]) -> (usize, usize) {
    let mut forward = 0;
    let mut backward = 0;

    let first = nows[0];
    let mut prev_check = first + delay_till_next_check(&first) - TimeDelta::seconds(60);

    for now in nows {
        let next_check = *now + delay_till_next_check(now);
        let actual_prev = next_check - TimeDelta::seconds(60);
        match check_anomaly(&prev_check, &actual_prev) {
            Some(ClockAnomaly::Forward) => forward += 1,
            Some(ClockAnomaly::Backward) => backward += 1,
            None => {}
        }
        prev_check = next_check;
    }

    (forward, backward)
}

#[test]
fn steady_ticks_detect_no_anomaly() {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
    let nows: Vec<_> = (0..5).map(|i| base + TimeDelta::seconds(60 * i)).collect();
    assert_eq!(replay_ticks(&nows), (0, 0));
}

#[test]
fn forward_gap_increments_forward_exactly_once() {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
    let nows = [
        base,
        base + TimeDelta::seconds(60),
        // The clock jumped: two minutes elapsed across one tick.
        base + TimeDelta::seconds(60 + 180),
        base + TimeDelta::seconds(60 + 180 + 60),
    ];
    assert_eq!(replay_ticks(&nows), (1, 0));
}

#[test]
fn backward_gap_increments_backward_exactly_once() {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
    let nows = [
        base,
        base + TimeDelta::seconds(60),
        // The clock stepped back by 45 seconds across this tick.
        base + TimeDelta::seconds(120 - 45),
        base + TimeDelta::seconds(120 - 45 + 60),
    ];
    assert_eq!(replay_ticks(&nows), (0, 1));
}

#[test]
fn replayed_ticks_land_mid_minute() {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
    let next = base + delay_till_next_check(&base);
    assert_eq!(next.second(), 30);
    assert_eq!(next.minute(), 1);
}
