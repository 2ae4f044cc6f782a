use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the job table.
pub const DEFAULT_TABLE_PATH: &str = "/etc/promcron";

/// Horizon used by `--print-schedule` when no explicit duration is given.
pub const DEFAULT_PREVIEW_HORIZON: Duration = Duration::from_secs(24 * 60 * 60);

/// Runtime configuration assembled from the command line.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Path of the job table to load.
    pub table_path: PathBuf,

    /// Serve prometheus metrics on this address when set.
    pub metrics_addr: Option<SocketAddr>,

    /// When set, print the schedule over this horizon and exit instead of
    /// running jobs.
    pub preview_horizon: Option<Duration>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            table_path: PathBuf::from(DEFAULT_TABLE_PATH),
            metrics_addr: None,
            preview_horizon: None,
        }
    }
}

impl DaemonConfig {
    pub fn new(table_path: PathBuf) -> Self {
        Self {
            table_path,
            ..Default::default()
        }
    }
}
