//! Logging configuration using tracing.
//!
//! Logs go to stdout and, when configured, are appended to a log file that
//! is rolled over at start-up once it outgrows its size limit.

use super::{MirrorError, Result};
use crate::config::LogConfig;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the specified level
pub fn init(level: &str, log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &log.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            rotate_if_oversized(path, log.max_size_mb * 1024 * 1024, log.backup_count)?;
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| MirrorError::Logging(e.to_string()))?;

    Ok(())
}

fn generation(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// Roll `path` over to `path.1` (shifting older generations up) when it is
/// larger than `max_bytes`. The oldest generation beyond `backup_count` is
/// dropped. Returns whether a rollover happened.
pub fn rotate_if_oversized(path: &Path, max_bytes: u64, backup_count: usize) -> io::Result<bool> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if size <= max_bytes {
        return Ok(false);
    }

    if backup_count == 0 {
        fs::remove_file(path)?;
        return Ok(true);
    }

    let oldest = generation(path, backup_count);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..backup_count).rev() {
        let from = generation(path, n);
        if from.exists() {
            fs::rename(&from, generation(path, n + 1))?;
        }
    }
    fs::rename(path, generation(path, 1))?;
    Ok(true)
}

/// Result of pruning a log directory
#[derive(Debug, Default)]
pub struct LogPruneSummary {
    pub kept: usize,
    pub removed: Vec<PathBuf>,
}

/// Keep the newest `keep` `*.log` / `*.log.gz` files in `dir`, by modification time.
pub fn prune_log_files(dir: &Path, keep: usize) -> io::Result<LogPruneSummary> {
    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.ends_with(".log") || name.ends_with(".log.gz")) {
            continue;
        }
        let meta = entry.metadata()?;
        if meta.is_file() {
            logs.push((meta.modified()?, entry.path()));
        }
    }
    logs.sort();

    let mut summary = LogPruneSummary::default();
    let excess = logs.len().saturating_sub(keep);
    for (_, path) in logs.drain(..excess) {
        fs::remove_file(&path)?;
        summary.removed.push(path);
    }
    summary.kept = logs.len();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_small_file_not_rotated() -> io::Result<()> {
        let dir = TempDir::new()?;
        let log = dir.path().join("backup.log");
        fs::write(&log, b"short")?;

        assert!(!rotate_if_oversized(&log, 1024, 3)?);
        assert!(log.exists());
        Ok(())
    }

    #[test]
    fn test_missing_file_not_rotated() -> io::Result<()> {
        let dir = TempDir::new()?;
        assert!(!rotate_if_oversized(&dir.path().join("backup.log"), 0, 3)?);
        Ok(())
    }

    #[test]
    fn test_rotation_shifts_generations() -> io::Result<()> {
        let dir = TempDir::new()?;
        let log = dir.path().join("backup.log");
        fs::write(&log, b"current log content")?;
        fs::write(dir.path().join("backup.log.1"), b"first")?;
        fs::write(dir.path().join("backup.log.2"), b"second")?;

        assert!(rotate_if_oversized(&log, 4, 2)?);

        assert!(!log.exists());
        assert_eq!(fs::read(dir.path().join("backup.log.1"))?, b"current log content");
        assert_eq!(fs::read(dir.path().join("backup.log.2"))?, b"first");
        assert!(!dir.path().join("backup.log.3").exists());
        Ok(())
    }

    #[test]
    fn test_prune_log_files_keeps_newest() -> io::Result<()> {
        let dir = TempDir::new()?;
        for name in ["a.log", "b.log.gz", "c.log"] {
            fs::write(dir.path().join(name), b"log")?;
            std::thread::sleep(Duration::from_millis(20));
        }
        fs::write(dir.path().join("notes.txt"), b"keep me")?;

        let summary = prune_log_files(dir.path(), 2)?;

        assert_eq!(summary.kept, 2);
        assert_eq!(summary.removed, vec![dir.path().join("a.log")]);
        assert!(dir.path().join("notes.txt").exists());
        Ok(())
    }
}
