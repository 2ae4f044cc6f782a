//! Shell process execution with exit-status and resource-usage capture.
//!
//! Commands run under `/bin/sh -c`. The child is reaped with wait4(2) so the
//! rusage counters (max RSS, user/system CPU time) come back together with
//! the exit status; std's portable wait discards them.

use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::warn;

/// Exit status reported when the real status cannot be determined: the
/// process failed to launch, died on a signal, or could not be reaped.
pub const EXIT_STATUS_UNKNOWN: i32 = 127;

/// Outcome of one job execution.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub exit_status: i32,
    pub max_rss_bytes: Option<u64>,
    pub user_time: Option<Duration>,
    pub system_time: Option<Duration>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    fn launch_failed() -> Self {
        Self {
            exit_status: EXIT_STATUS_UNKNOWN,
            max_rss_bytes: None,
            user_time: None,
            system_time: None,
        }
    }
}

/// Run `command` to completion. Launch failures are not errors: they come
/// back as a result with [`EXIT_STATUS_UNKNOWN`], and the caller reports
/// them like any other failed run.
pub async fn run_command(command: &str) -> ProcessResult {
    let command = command.to_string();
    match tokio::task::spawn_blocking(move || run_blocking(&command)).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Job execution task failed");
            ProcessResult::launch_failed()
        }
    }
}

fn run_blocking(command: &str) -> ProcessResult {
    let child = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            warn!(command, error = %e, "Failed to launch job process");
            return ProcessResult::launch_failed();
        }
    };

    wait_with_rusage(child)
}

/// Reap the child with wait4(2), collecting rusage alongside the status.
/// Falls back to the portable wait (no resource counters) if wait4 fails.
fn wait_with_rusage(mut child: std::process::Child) -> ProcessResult {
    let pid = child.id() as libc::pid_t;
    let mut status: libc::c_int = 0;
    let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };

    let reaped = unsafe { libc::wait4(pid, &mut status, 0, &mut rusage) };
    if reaped != pid {
        warn!(pid, "wait4 failed, resource usage unavailable");
        return match child.wait() {
            Ok(st) => ProcessResult {
                exit_status: st.code().unwrap_or(EXIT_STATUS_UNKNOWN),
                max_rss_bytes: None,
                user_time: None,
                system_time: None,
            },
            Err(e) => {
                warn!(pid, error = %e, "Failed to reap job process");
                ProcessResult::launch_failed()
            }
        };
    }

    let exit_status = if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else {
        EXIT_STATUS_UNKNOWN
    };

    ProcessResult {
        exit_status,
        // ru_maxrss is in kilobytes on Linux.
        max_rss_bytes: Some(rusage.ru_maxrss as u64 * 1024),
        user_time: Some(timeval_duration(rusage.ru_utime)),
        system_time: Some(timeval_duration(rusage.ru_stime)),
    }
}

fn timeval_duration(tv: libc::timeval) -> Duration {
    Duration::new(tv.tv_sec.max(0) as u64, (tv.tv_usec.max(0) as u32) * 1_000)
}
