//! Running/idle status reporting for external monitoring.
//!
//! Nothing in the loop depends on what a sink does with a report; sinks must
//! not fail the cycle, so write errors are logged and swallowed.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use spark_core::{Activity, ActivityReport};
use tokio::sync::watch;
use tracing::{debug, warn};

pub trait StatusSink: Send + Sync {
    fn report(&self, activity: Activity, detail: Option<&str>);
}

/// Logs each transition at debug level.
#[derive(Debug, Default)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn report(&self, activity: Activity, detail: Option<&str>) {
        debug!(%activity, detail = detail.unwrap_or(""), "activity");
    }
}

/// Publishes the latest report on a watch channel.
#[derive(Debug)]
pub struct WatchStatus {
    tx: watch::Sender<ActivityReport>,
}

impl WatchStatus {
    pub fn new() -> (Self, watch::Receiver<ActivityReport>) {
        let (tx, rx) = watch::channel(ActivityReport::default());
        (Self { tx }, rx)
    }
}

impl StatusSink for WatchStatus {
    fn report(&self, activity: Activity, detail: Option<&str>) {
        // send_replace keeps the value current even with no receivers left
        self.tx.send_replace(ActivityReport::now(activity, detail));
    }
}

#[derive(Serialize)]
struct StatusFileRecord<'a> {
    pid: u32,
    #[serde(flatten)]
    report: &'a ActivityReport,
}

/// Rewrites a JSON status file on every report.
#[derive(Debug)]
pub struct FileStatus {
    path: PathBuf,
}

impl FileStatus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write(&self, report: &ActivityReport) -> spark_core::Result<()> {
        let record = StatusFileRecord {
            pid: std::process::id(),
            report,
        };
        let json = serde_json::to_string_pretty(&record)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StatusSink for FileStatus {
    fn report(&self, activity: Activity, detail: Option<&str>) {
        if let Err(e) = self.write(&ActivityReport::now(activity, detail)) {
            warn!(path = %self.path.display(), error = %e, "status file write failed");
        }
    }
}

/// Fans a report out to several sinks.
#[derive(Default)]
pub struct StatusFanout {
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl StatusFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatusSink for StatusFanout {
    fn report(&self, activity: Activity, detail: Option<&str>) {
        for sink in &self.sinks {
            sink.report(activity, detail);
        }
    }
}
