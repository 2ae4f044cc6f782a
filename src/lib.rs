pub mod config;
pub mod cron;
pub mod error;
pub mod executor;
pub mod job;
pub mod metrics;
pub mod scheduler;
pub mod shutdown;
pub mod simulate;
