//! Local load measurement.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::BoxFuture;
use crate::command::run_command;
use crate::error::{ProviderError, ProviderResult};

/// Supplies the local node's measurements.
pub trait MetricsSource: Send + Sync {
    /// Current 1-minute load average.
    fn current_load(&self) -> BoxFuture<'_, ProviderResult<f64>>;
}

/// Reads the 1-minute load average from `/proc/loadavg`, falling back to
/// parsing `uptime` output on hosts without procfs.
#[derive(Debug, Clone)]
pub struct LoadAverage {
    proc_path: PathBuf,
    uptime: Vec<String>,
    timeout: Duration,
}

impl LoadAverage {
    pub fn new(timeout: Duration) -> Self {
        Self {
            proc_path: PathBuf::from("/proc/loadavg"),
            uptime: vec!["uptime".to_string()],
            timeout,
        }
    }

    /// Override the procfs path (for testing).
    pub fn with_proc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_path = path.into();
        self
    }

    /// Override the fallback command (for testing).
    pub fn with_uptime_command(mut self, argv: Vec<String>) -> Self {
        self.uptime = argv;
        self
    }

    async fn read_uptime(&self) -> ProviderResult<f64> {
        let out = run_command(&self.uptime, self.timeout)
            .await
            .map_err(|e| ProviderError::MetricUnavailable(e.to_string()))?;
        if !out.success {
            return Err(ProviderError::MetricUnavailable(format!(
                "uptime exited with {:?}",
                out.code
            )));
        }
        parse_uptime(&out.stdout).ok_or_else(|| {
            ProviderError::MetricUnavailable(format!("unrecognised uptime output {:?}", out.stdout.trim()))
        })
    }
}

impl MetricsSource for LoadAverage {
    fn current_load(&self) -> BoxFuture<'_, ProviderResult<f64>> {
        Box::pin(async move {
            match tokio::fs::read_to_string(&self.proc_path).await {
                Ok(content) => {
                    if let Some(load) = parse_proc_loadavg(&content) {
                        return Ok(load);
                    }
                    debug!(path = ?self.proc_path, "unparsable loadavg, falling back to uptime");
                }
                Err(e) => {
                    debug!(path = ?self.proc_path, error = %e, "loadavg unreadable, falling back to uptime");
                }
            }
            self.read_uptime().await
        })
    }
}

/// `0.52 0.58 0.59 1/123 4567` → 0.52
fn parse_proc_loadavg(content: &str) -> Option<f64> {
    content.split_whitespace().next()?.parse().ok()
}

/// The 1-minute figure is the third field from the end of `uptime`:
/// `... load average: 0.52, 0.58, 0.59` (Linux) or
/// `... load averages: 1.52 1.58 1.59` (BSD).
fn parse_uptime(output: &str) -> Option<f64> {
    let fields: Vec<&str> = output.split_whitespace().collect();
    let field = fields.len().checked_sub(3).map(|i| fields[i])?;
    field.trim_end_matches(',').parse().ok()
}
