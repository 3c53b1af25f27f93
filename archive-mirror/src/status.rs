//! Operator status report: recent log output and local archive inventory.

use crate::archive::{base_name, is_archive_name, parse_volume, Volume};
use crate::config::Config;
use crate::transfer::stats::format_bytes;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const LOG_TAIL_LINES: usize = 20;
const RECENT_SETS: usize = 5;

#[derive(Debug, Clone)]
pub struct LogFileStatus {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub tail: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSummary {
    pub base_name: String,
    pub files: usize,
    pub bytes: u64,
    pub newest: SystemTime,
}

#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub path: PathBuf,
    /// `*.tar` files
    pub first_volumes: usize,
    /// `*.tar.N` files
    pub volume_parts: usize,
    /// Most recently modified sets, newest first
    pub recent_sets: Vec<SetSummary>,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub log_path: Option<PathBuf>,
    pub log: Option<LogFileStatus>,
    pub source_path: PathBuf,
    pub source: Option<SourceStatus>,
}

impl StatusReport {
    pub fn collect(config: &Config) -> std::io::Result<Self> {
        let log_path = config.log.file.clone();
        let log = match &log_path {
            Some(path) if path.exists() => Some(log_status(path)?),
            _ => None,
        };

        let source_path = config.local.source_dir.clone();
        let source = if source_path.is_dir() {
            Some(source_status(&source_path)?)
        } else {
            None
        };

        Ok(Self {
            log_path,
            log,
            source_path,
            source,
        })
    }
}

fn log_status(path: &Path) -> std::io::Result<LogFileStatus> {
    let meta = fs::metadata(path)?;
    let content = fs::read(path)?;
    let content = String::from_utf8_lossy(&content);
    let lines: Vec<&str> = content.lines().collect();
    let tail = lines[lines.len().saturating_sub(LOG_TAIL_LINES)..]
        .iter()
        .map(|l| l.to_string())
        .collect();

    Ok(LogFileStatus {
        path: path.to_path_buf(),
        size: meta.len(),
        modified: meta.modified()?,
        tail,
    })
}

/// Inventory of the source directory, grouped the same way a run groups it.
pub fn source_status(dir: &Path) -> std::io::Result<SourceStatus> {
    let mut first_volumes = 0;
    let mut volume_parts = 0;
    let mut sets: BTreeMap<String, SetSummary> = BTreeMap::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_archive_name(name) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }

        match parse_volume(name) {
            Volume::First => first_volumes += 1,
            Volume::Numbered(_) | Volume::Unparseable => volume_parts += 1,
        }

        let Some(base) = base_name(name) else { continue };
        let modified = meta.modified()?;
        let summary = sets.entry(base.to_string()).or_insert_with(|| SetSummary {
            base_name: base.to_string(),
            files: 0,
            bytes: 0,
            newest: SystemTime::UNIX_EPOCH,
        });
        summary.files += 1;
        summary.bytes += meta.len();
        summary.newest = summary.newest.max(modified);
    }

    let mut recent_sets: Vec<SetSummary> = sets.into_values().collect();
    recent_sets.sort_by(|a, b| b.newest.cmp(&a.newest).then_with(|| a.base_name.cmp(&b.base_name)));
    recent_sets.truncate(RECENT_SETS);

    Ok(SourceStatus {
        path: dir.to_path_buf(),
        first_volumes,
        volume_parts,
        recent_sets,
    })
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M:%S").to_string()
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(70);
        writeln!(f, "{}", rule)?;
        writeln!(f, "BACKUP STATUS CHECK")?;
        writeln!(f, "{}", rule)?;

        match (&self.log_path, &self.log) {
            (Some(_), Some(log)) => {
                writeln!(f, "Log file: {}", log.path.display())?;
                writeln!(f, "  Size: {}", format_bytes(log.size))?;
                writeln!(f, "  Last modified: {}", format_time(log.modified))?;
                writeln!(f)?;
                writeln!(f, "Last {} lines of log:", LOG_TAIL_LINES)?;
                writeln!(f, "{}", "-".repeat(70))?;
                for line in &log.tail {
                    writeln!(f, "{}", line)?;
                }
            }
            (Some(path), None) => writeln!(f, "Log file not found: {}", path.display())?,
            (None, _) => writeln!(f, "Log file: not configured (stdout only)")?,
        }

        writeln!(f)?;
        writeln!(f, "{}", rule)?;

        match &self.source {
            Some(source) => {
                writeln!(f, "Source directory: {}", source.path.display())?;
                writeln!(f, "  Archive files: {}", source.first_volumes + source.volume_parts)?;
                writeln!(f, "    - Complete .tar files: {}", source.first_volumes)?;
                writeln!(f, "    - Volume parts (.tar.N): {}", source.volume_parts)?;
                if !source.recent_sets.is_empty() {
                    writeln!(f)?;
                    writeln!(f, "  Recent archive sets:")?;
                    for set in &source.recent_sets {
                        writeln!(f, "    {}", set.base_name)?;
                        writeln!(
                            f,
                            "      Files: {}, Size: {}, Newest: {}",
                            set.files,
                            format_bytes(set.bytes),
                            format_time(set.newest)
                        )?;
                    }
                }
            }
            None => writeln!(f, "Source directory not found: {}", self.source_path.display())?,
        }

        write!(f, "{}", rule)
    }
}
