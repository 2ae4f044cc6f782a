//! Prometheus metrics for the scheduler and every job in the table, served
//! as text over HTTP when `--metrics-address` is set.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref FORWARD_TIME_SKIPS: Counter = Counter::new(
        "promcron_forward_time_skips",
        "Detected time anomalies where time moved forward causing potential job skips."
    )
    .expect("failed to create forward_time_skips metric");

    pub static ref BACKWARD_TIME_SKIPS: Counter = Counter::new(
        "promcron_backward_time_skips",
        "Detected anomalies where time moved backward causing potential job duplicates."
    )
    .expect("failed to create backward_time_skips metric");

    pub static ref JOB_OVERDUE: CounterVec = CounterVec::new(
        Opts::new(
            "promcron_job_overdue_count",
            "Times a job did not finish before the next rescheduling."
        ),
        &["job"]
    )
    .expect("failed to create job_overdue_count metric");

    pub static ref JOB_FAILURE: CounterVec = CounterVec::new(
        Opts::new("promcron_job_failure_count", "Times a job has failed."),
        &["job"]
    )
    .expect("failed to create job_failure_count metric");

    pub static ref JOB_SUCCESS: CounterVec = CounterVec::new(
        Opts::new("promcron_job_success_count", "Times a job has succeeded."),
        &["job"]
    )
    .expect("failed to create job_success_count metric");

    pub static ref JOB_DURATION_SECONDS: GaugeVec = GaugeVec::new(
        Opts::new(
            "promcron_job_duration_seconds",
            "Time taken for the last job execution."
        ),
        &["job"]
    )
    .expect("failed to create job_duration_seconds metric");

    pub static ref JOB_MAXRSS_BYTES: GaugeVec = GaugeVec::new(
        Opts::new(
            "promcron_job_maxrss_bytes",
            "Max rss of the last job execution."
        ),
        &["job"]
    )
    .expect("failed to create job_maxrss_bytes metric");

    pub static ref JOB_UTIME_SECONDS: GaugeVec = GaugeVec::new(
        Opts::new(
            "promcron_job_utime_seconds",
            "User cpu time used for the last job execution."
        ),
        &["job"]
    )
    .expect("failed to create job_utime_seconds metric");

    pub static ref JOB_STIME_SECONDS: GaugeVec = GaugeVec::new(
        Opts::new(
            "promcron_job_stime_seconds",
            "System cpu time used for the last job execution."
        ),
        &["job"]
    )
    .expect("failed to create job_stime_seconds metric");

    pub static ref JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(
            "promcron_job_running",
            "Whether or not the job is currently running."
        ),
        &["job"]
    )
    .expect("failed to create job_running metric");
}

/// Register every metric and pre-initialize the per-job series with all job
/// names, so every series is visible from the first scrape. Re-registration
/// errors are ignored for tests.
pub fn init_metrics<'a>(job_names: impl IntoIterator<Item = &'a str>) {
    let _ = REGISTRY.register(Box::new(FORWARD_TIME_SKIPS.clone()));
    let _ = REGISTRY.register(Box::new(BACKWARD_TIME_SKIPS.clone()));
    let _ = REGISTRY.register(Box::new(JOB_OVERDUE.clone()));
    let _ = REGISTRY.register(Box::new(JOB_FAILURE.clone()));
    let _ = REGISTRY.register(Box::new(JOB_SUCCESS.clone()));
    let _ = REGISTRY.register(Box::new(JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(JOB_MAXRSS_BYTES.clone()));
    let _ = REGISTRY.register(Box::new(JOB_UTIME_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(JOB_STIME_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(JOB_RUNNING.clone()));

    for name in job_names {
        JOB_OVERDUE.with_label_values(&[name]);
        JOB_FAILURE.with_label_values(&[name]);
        JOB_SUCCESS.with_label_values(&[name]);
        JOB_DURATION_SECONDS.with_label_values(&[name]);
        JOB_MAXRSS_BYTES.with_label_values(&[name]);
        JOB_UTIME_SECONDS.with_label_values(&[name]);
        JOB_STIME_SECONDS.with_label_values(&[name]);
        JOB_RUNNING.with_label_values(&[name]).set(0.0);
    }
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    match String::from_utf8(buffer) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!(error = %e, "Metrics output was not valid UTF-8");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

/// Serve `GET /metrics` on `addr` until the process exits. Bind or serve
/// failures are logged, not fatal: the scheduler keeps running without
/// metrics exposition.
pub async fn serve(addr: SocketAddr) {
    let app = Router::new().route("/metrics", get(metrics_handler));

    tracing::info!(addr = %addr, "Serving prometheus metrics");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind metrics server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Metrics server error");
    }
}
