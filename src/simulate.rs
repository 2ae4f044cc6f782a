//! Print-schedule mode: walk a synthetic clock over a horizon and report
//! every (timestamp, job) match without executing anything.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone};

use crate::job::Job;
use crate::scheduler::delay_till_next_check;

/// Advance a simulated clock from `from` with the same tick computation the
/// live loop uses, collecting each job due at each tick. Jobs within one
/// tick appear in table order.
pub fn simulate_schedule<Tz: TimeZone>(
    jobs: &[Arc<Job>],
    from: DateTime<Tz>,
    horizon: Duration,
) -> Vec<(DateTime<Tz>, String)> {
    let end = from.clone() + horizon;
    let mut t = from;
    let mut matches = Vec::new();

    while t < end {
        t = t.clone() + delay_till_next_check(&t);
        for job in jobs {
            if job.should_run_at(&t) {
                matches.push((t.clone(), job.name.clone()));
            }
        }
    }

    matches
}
