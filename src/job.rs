//! A scheduled job: compiled time fields plus execution lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Datelike, Timelike};
use tokio::sync::Mutex;

use crate::cron::FieldSet;
use crate::executor::{self, ProcessResult};

/// The five compiled time fields of one table line.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub minute: FieldSet,
    pub hour: FieldSet,
    pub day_of_month: FieldSet,
    pub month: FieldSet,
    pub day_of_week: FieldSet,
}

/// Completion callback: job name, wall duration, process outcome.
/// Invoked exactly once per execution.
pub type OnJobExit = Arc<dyn Fn(&str, Duration, &ProcessResult) + Send + Sync>;

#[derive(Debug)]
pub struct Job {
    pub name: String,
    pub command: String,
    pub schedule: Schedule,
    /// The single piece of shared state between the tick loop and the
    /// completion path. The scheduler writes it on start, the execution task
    /// clears it on exit; nothing else touches it.
    running: AtomicBool,
    /// Held by the execution task for its whole lifetime; `wait` and the
    /// serial-start guarantee both come from locking it.
    gate: Arc<Mutex<()>>,
}

impl Job {
    pub fn new(name: String, command: String, schedule: Schedule) -> Self {
        Self {
            name,
            command,
            schedule,
            running: AtomicBool::new(false),
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Whether this job is due at time `t`.
    ///
    /// Minute, hour and month must all match. Day-of-month and day-of-week
    /// are ANDed when either field is a wildcard and ORed when both are
    /// explicitly restricted, per classical cron convention.
    pub fn should_run_at<T: Datelike + Timelike>(&self, t: &T) -> bool {
        let s = &self.schedule;
        if !s.minute.contains(t.minute()) {
            return false;
        }
        if !s.hour.contains(t.hour()) {
            return false;
        }
        if !s.month.contains(t.month()) {
            return false;
        }

        let dom_match = s.day_of_month.contains(t.day());
        let dow_match = s.day_of_week.contains(t.weekday().num_days_from_sunday());
        if s.day_of_month.is_wildcard() || s.day_of_week.is_wildcard() {
            dom_match && dow_match
        } else {
            dom_match || dow_match
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Launch the command as an independent process and return without
    /// waiting for it. Any still-draining previous execution is awaited
    /// first; the scheduler never starts a running job, so this only guards
    /// the window between flag clear and task exit.
    pub async fn start(self: Arc<Self>, on_exit: OnJobExit) {
        let gate = self.gate.clone().lock_owned().await;
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let _gate = gate;
            let started = Instant::now();
            let result = executor::run_command(&self.command).await;
            let duration = started.elapsed();
            self.running.store(false, Ordering::SeqCst);
            on_exit(&self.name, duration, &result);
        });
    }

    /// Block until the current execution, if any, has completed. Only used
    /// while draining at shutdown.
    pub async fn wait(&self) {
        let _ = self.gate.lock().await;
    }
}
