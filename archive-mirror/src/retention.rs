//! Retention of confirmed backups.
//!
//! Both prunes only ever consider sets uploaded successfully in the current
//! run, and only sets whose base name carries a timestamp:
//!
//! - remote: the newest `max_copies` sets stay, older ones are deleted file
//!   by file from a fresh listing
//! - local: only the newest set stays; failed sets are never candidates
//!
//! Deletions are best-effort: a failed delete is logged and the remaining
//! files are still processed.

use crate::archive::{group_names, parse_timestamp, ArchiveSet, SetStatus};
use crate::remote::{RemoteIndex, RemoteSession};
use crate::transfer::stats::format_bytes;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info, warn};

/// What the remote prune did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemotePruneSummary {
    /// Sets left in place
    pub kept: Vec<String>,
    /// Sets selected for removal
    pub removed: Vec<String>,
    /// Files deleted
    pub deleted_files: usize,
    /// Files whose deletion failed
    pub failed_files: Vec<String>,
}

/// What the local prune did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPruneSummary {
    /// Newest successful set, always kept
    pub kept: Option<String>,
    /// Sets whose files were removed
    pub removed: Vec<String>,
    pub deleted_files: usize,
    pub deleted_bytes: u64,
    pub failed_files: Vec<String>,
}

/// Delete all but the newest `max_copies` successful sets from the remote directory.
///
/// Sets are grouped from a fresh listing. Returns `None` when the listing
/// itself fails, in which case nothing is deleted.
pub async fn prune_remote(
    session: &mut dyn RemoteSession,
    remote_dir: &str,
    successful: &BTreeSet<String>,
    max_copies: usize,
) -> Option<RemotePruneSummary> {
    if successful.is_empty() {
        return Some(RemotePruneSummary::default());
    }

    let index = match RemoteIndex::fetch(session, remote_dir).await {
        Ok(index) => index,
        Err(e) => {
            error!("Error cleaning up old remote backups: {}", e);
            return None;
        }
    };

    let mut dated: Vec<(NaiveDateTime, String, Vec<String>)> = group_names(index.names())
        .into_iter()
        .filter(|(base, _)| successful.contains(base))
        .filter_map(|(base, files)| parse_timestamp(&base).map(|ts| (ts, base, files)))
        .collect();
    dated.sort();

    let split = dated.len().saturating_sub(max_copies);
    let (old, recent) = dated.split_at(split);

    let mut summary = RemotePruneSummary {
        kept: recent.iter().map(|(_, base, _)| base.clone()).collect(),
        ..Default::default()
    };

    for (timestamp, base, files) in old {
        info!(base_name = %base, %timestamp, "Removing old remote backup set");
        for file in files {
            match session.delete(file).await {
                Ok(()) => {
                    info!("  Removed: {}", file);
                    summary.deleted_files += 1;
                }
                Err(e) => {
                    error!("  Failed to remove {}: {}", file, e);
                    summary.failed_files.push(file.clone());
                }
            }
        }
        summary.removed.push(base.clone());
    }

    info!("Kept {} backup set(s) remotely", summary.kept.len());
    Some(summary)
}

/// Remove the local files of every successful set except the newest one.
///
/// Nothing is deleted unless at least two successful sets have a timestamp.
pub async fn prune_local(sets: &BTreeMap<String, ArchiveSet>) -> LocalPruneSummary {
    let mut dated: Vec<(NaiveDateTime, &ArchiveSet)> = sets
        .values()
        .filter(|set| set.status == SetStatus::Uploaded)
        .filter_map(|set| set.timestamp.map(|ts| (ts, set)))
        .collect();
    dated.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.base_name.cmp(&b.1.base_name)));

    let mut summary = LocalPruneSummary::default();

    let Some((newest_ts, newest)) = dated.pop() else {
        warn!("No successful archive set with a timestamp, nothing to clean up locally");
        return summary;
    };
    summary.kept = Some(newest.base_name.clone());

    if dated.is_empty() {
        info!("Only one successful archive set found locally, nothing to clean up");
        return summary;
    }

    for (timestamp, set) in dated {
        info!(base_name = %set.base_name, %timestamp, "Removing local successful archive set");
        for volume in &set.volumes {
            match tokio::fs::remove_file(&volume.path).await {
                Ok(()) => {
                    info!("  Removed: {} ({})", volume.name, format_bytes(volume.size));
                    summary.deleted_files += 1;
                    summary.deleted_bytes += volume.size;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!("  Failed to remove {}: {}", volume.path.display(), e);
                    summary.failed_files.push(volume.name.clone());
                }
            }
        }
        summary.removed.push(set.base_name.clone());
    }

    info!(
        base_name = %newest.base_name,
        timestamp = %newest_ts,
        "Kept local successful archive set; removed {} file(s) from old sets",
        summary.deleted_files
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::VolumeFile;
    use std::fs;
    use tempfile::TempDir;

    fn local_set(dir: &TempDir, base: &str, volumes: u32, status: SetStatus) -> ArchiveSet {
        let mut set = ArchiveSet::new(base);
        for volume in 0..volumes {
            let name = if volume == 0 {
                base.to_string()
            } else {
                format!("{}.{}", base, volume)
            };
            let path = dir.path().join(&name);
            fs::write(&path, b"volume").unwrap();
            set.push(VolumeFile {
                path,
                name,
                size: 6,
                volume,
            });
        }
        set.status = status;
        set
    }

    #[tokio::test]
    async fn test_local_prune_keeps_newest_and_failed() {
        let dir = TempDir::new().unwrap();
        let mut sets = BTreeMap::new();
        for (base, status) in [
            ("db_20260101_000000_full.tar", SetStatus::Uploaded),
            ("db_20260102_000000_full.tar", SetStatus::Uploaded),
            ("db_20251231_000000_full.tar", SetStatus::Failed),
        ] {
            sets.insert(base.to_string(), local_set(&dir, base, 2, status));
        }

        let summary = prune_local(&sets).await;

        assert_eq!(summary.kept.as_deref(), Some("db_20260102_000000_full.tar"));
        assert_eq!(summary.removed, vec!["db_20260101_000000_full.tar"]);
        assert_eq!(summary.deleted_files, 2);
        assert_eq!(summary.deleted_bytes, 12);
        assert!(!dir.path().join("db_20260101_000000_full.tar").exists());
        assert!(!dir.path().join("db_20260101_000000_full.tar.1").exists());
        assert!(dir.path().join("db_20260102_000000_full.tar.1").exists());
        assert!(dir.path().join("db_20251231_000000_full.tar").exists());
        assert!(dir.path().join("db_20251231_000000_full.tar.1").exists());
    }

    #[tokio::test]
    async fn test_local_prune_single_set_untouched() {
        let dir = TempDir::new().unwrap();
        let mut sets = BTreeMap::new();
        sets.insert(
            "db_20260101_000000_full.tar".to_string(),
            local_set(&dir, "db_20260101_000000_full.tar", 1, SetStatus::Uploaded),
        );
        sets.insert(
            "manual.tar".to_string(),
            local_set(&dir, "manual.tar", 1, SetStatus::Uploaded),
        );

        let summary = prune_local(&sets).await;

        assert!(summary.removed.is_empty());
        assert!(dir.path().join("db_20260101_000000_full.tar").exists());
        assert!(dir.path().join("manual.tar").exists());
    }

    #[tokio::test]
    async fn test_local_prune_without_successes() {
        let dir = TempDir::new().unwrap();
        let mut sets = BTreeMap::new();
        sets.insert(
            "db_20260101_000000_full.tar".to_string(),
            local_set(&dir, "db_20260101_000000_full.tar", 1, SetStatus::Failed),
        );

        let summary = prune_local(&sets).await;

        assert!(summary.kept.is_none());
        assert_eq!(summary.deleted_files, 0);
    }
}
