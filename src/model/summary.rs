//! Aggregated outcome of a full conversion run.

use std::path::PathBuf;
use std::time::Duration;

/// Counters and paths accumulated over one pass through the archive.
///
/// Invariant: `succeeded + failed == total` once the run completes.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Path of the input archive.
    pub input: PathBuf,

    /// Size of the input archive in bytes.
    pub archive_size: u64,

    /// Number of messages processed.
    pub total: u64,

    /// Messages successfully converted to a document.
    pub succeeded: u64,

    /// Messages that failed anywhere in the per-message pipeline.
    pub failed: u64,

    /// Qualifying attachment parts encountered (even if not saved).
    pub attachments_found: u64,

    /// Attachments actually written to disk.
    pub attachments_saved: u64,

    /// Wall-clock duration of the conversion pass.
    pub elapsed: Duration,

    /// Directory the documents were written to.
    pub output_dir: PathBuf,

    /// Attachments directory, `None` when extraction was disabled.
    pub attachments_dir: Option<PathBuf>,

    /// Path of the detailed log file.
    pub log_path: PathBuf,
}

impl RunSummary {
    /// Percentage of messages converted successfully (0.0 for an empty run).
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }

    /// Average seconds spent per message (0.0 for an empty run).
    pub fn seconds_per_message(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.elapsed.as_secs_f64() / self.total as f64
        }
    }

    /// A run is acceptable when strictly more than 90% of messages converted.
    pub fn meets_threshold(&self) -> bool {
        self.succeeded as f64 > self.total as f64 * 0.9
    }
}

/// Format a duration for the summary: `"12.3s"`, `"4m 07s"`, `"1h 02m"`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        format!("{}m {:02}s", (secs / 60.0) as u64, (secs % 60.0) as u64)
    } else {
        format!(
            "{}h {:02}m",
            (secs / 3600.0) as u64,
            ((secs % 3600.0) / 60.0) as u64
        )
    }
}
