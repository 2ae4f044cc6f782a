use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use promcron::config::{DaemonConfig, DEFAULT_PREVIEW_HORIZON, DEFAULT_TABLE_PATH};
use promcron::cron::parse_table;
use promcron::error::PromcronError;
use promcron::executor::ProcessResult;
use promcron::job::Job;
use promcron::metrics;
use promcron::scheduler::Scheduler;
use promcron::shutdown::install_shutdown_handler;
use promcron::simulate::simulate_schedule;

#[derive(Parser, Debug)]
#[command(name = "promcron")]
#[command(version)]
#[command(about = "A cron-style job scheduler that exports per-job prometheus metrics")]
struct Args {
    /// Job table to load and run
    #[arg(short = 'f', long = "file", default_value = DEFAULT_TABLE_PATH)]
    file: PathBuf,

    /// Print the schedule for the next 24 hours then exit
    #[arg(long)]
    print_schedule: bool,

    /// Print the schedule for the specified duration (e.g. "90m") then exit
    #[arg(long, value_parser = humantime::parse_duration)]
    print_schedule_for: Option<Duration>,

    /// address:port to serve job prometheus metrics on
    #[arg(long)]
    prometheus_metrics: Option<SocketAddr>,
}

impl Args {
    fn into_config(self) -> DaemonConfig {
        let preview_horizon = self
            .print_schedule_for
            .or(self.print_schedule.then_some(DEFAULT_PREVIEW_HORIZON));
        DaemonConfig {
            table_path: self.file,
            metrics_addr: self.prometheus_metrics,
            preview_horizon,
        }
    }
}

/// Completion callback wired into every job: log the outcome and publish it
/// to the per-job metric series.
fn on_job_exit(name: &str, duration: Duration, result: &ProcessResult) {
    tracing::info!(
        job = %name,
        duration = ?duration,
        exit_status = result.exit_status,
        "Job finished"
    );

    metrics::JOB_RUNNING.with_label_values(&[name]).set(0.0);

    if result.success() {
        metrics::JOB_SUCCESS.with_label_values(&[name]).inc();
    } else {
        metrics::JOB_FAILURE.with_label_values(&[name]).inc();
    }

    metrics::JOB_DURATION_SECONDS
        .with_label_values(&[name])
        .set(duration.as_secs_f64());

    if let Some(rss) = result.max_rss_bytes {
        metrics::JOB_MAXRSS_BYTES
            .with_label_values(&[name])
            .set(rss as f64);
    }
    if let Some(utime) = result.user_time {
        metrics::JOB_UTIME_SECONDS
            .with_label_values(&[name])
            .set(utime.as_secs_f64());
    }
    if let Some(stime) = result.system_time {
        metrics::JOB_STIME_SECONDS
            .with_label_values(&[name])
            .set(stime.as_secs_f64());
    }
}

async fn run_daemon(config: DaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let table = tokio::fs::read_to_string(&config.table_path)
        .await
        .map_err(|e| PromcronError::TableRead {
            path: config.table_path.clone(),
            source: e,
        })?;

    let source_name = config.table_path.display().to_string();
    let jobs: Vec<Arc<Job>> = parse_table(&source_name, &table)?
        .into_iter()
        .map(Arc::new)
        .collect();

    if let Some(horizon) = config.preview_horizon {
        for (t, name) in simulate_schedule(&jobs, Local::now(), horizon) {
            println!("{} - {}", t.format("%Y/%m/%d %H:%M"), name);
        }
        return Ok(());
    }

    metrics::init_metrics(jobs.iter().map(|j| j.name.as_str()));
    if let Some(addr) = config.metrics_addr {
        tokio::spawn(metrics::serve(addr));
    }

    tracing::info!(jobs = jobs.len(), table = %source_name, "Scheduling jobs");

    let shutdown = install_shutdown_handler();
    let scheduler = Scheduler::new(jobs, Arc::new(on_job_exit));
    scheduler.run(shutdown).await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    run_daemon(args.into_config()).await
}
