//! Upload throughput accounting for a run.

use std::time::Duration;

/// Totals of the volumes uploaded during one run
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    /// Volumes uploaded and verified
    pub files: usize,

    /// Bytes of the uploaded volumes
    pub bytes: u64,

    /// Upload attempts, including retried ones
    pub attempts: u32,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one verified upload
    pub fn record_upload(&mut self, bytes: u64, attempts: u32) {
        self.files += 1;
        self.bytes += bytes;
        self.attempts += attempts;
    }

    /// Record attempts spent on an upload that failed
    pub fn record_failure(&mut self, attempts: u32) {
        self.attempts += attempts;
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format speed as human-readable string
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Format a duration as `Xs`, `Xm Ys` or `Xh Ym`
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
