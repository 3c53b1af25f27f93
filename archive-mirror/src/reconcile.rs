//! Local/remote reconciliation of archive sets.
//!
//! A set exists remotely when remote file names start with its base name.
//! If as many remote files match as there are local volumes, nothing is
//! sent. If only some match, the local volumes whose names are missing
//! remotely are sent. If none match, every volume is sent in volume order.
//! The first volume that cannot be uploaded fails the whole set.

use crate::archive::{ArchiveSet, SetStatus, VolumeFile};
use crate::remote::RemoteIndex;
use crate::transfer::stats::format_bytes;
use crate::transfer::TransferExecutor;
use tracing::{error, info, warn};

/// What has to be sent for one set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// Remote already holds as many matching files as there are local volumes
    Complete { remote: usize },
    /// Some volumes are present; the listed ones are missing
    Partial { remote: usize, missing: Vec<VolumeFile> },
    /// Nothing of the set exists remotely
    Absent,
}

impl ReconcilePlan {
    /// Volumes to upload, in volume order.
    pub fn uploads<'a>(&'a self, set: &'a ArchiveSet) -> &'a [VolumeFile] {
        match self {
            ReconcilePlan::Complete { .. } => &[],
            ReconcilePlan::Partial { missing, .. } => missing,
            ReconcilePlan::Absent => &set.volumes,
        }
    }
}

/// Decide what to upload for `set` given a remote listing.
pub fn plan(set: &ArchiveSet, index: &RemoteIndex) -> ReconcilePlan {
    let remote = index.with_prefix(&set.base_name).count();

    if remote == 0 {
        return ReconcilePlan::Absent;
    }
    if remote == set.len() {
        return ReconcilePlan::Complete { remote };
    }

    let missing = set
        .volumes
        .iter()
        .filter(|v| !index.contains(&v.name))
        .cloned()
        .collect();
    ReconcilePlan::Partial { remote, missing }
}

/// Bring one set up to date remotely and record its status.
///
/// The remote directory is listed afresh for every set. A listing that
/// fails is treated as empty, so the set is sent in full and the executor's
/// reconnect handling gets a chance to recover the session.
pub async fn reconcile_set(
    executor: &mut TransferExecutor,
    set: &mut ArchiveSet,
    remote_dir: &str,
) -> SetStatus {
    info!(
        base_name = %set.base_name,
        volumes = set.len(),
        "Processing archive set ({})",
        format_bytes(set.total_bytes())
    );

    let index = match RemoteIndex::fetch(executor.session(), remote_dir).await {
        Ok(index) => index,
        Err(e) => {
            error!(base_name = %set.base_name, "Error checking remote for archive set: {}", e);
            RemoteIndex::default()
        }
    };

    let plan = plan(set, &index);
    match &plan {
        ReconcilePlan::Complete { remote } => {
            info!(base_name = %set.base_name, remote, "All volumes present remotely, skipping upload");
        }
        ReconcilePlan::Partial { remote, missing } => {
            warn!(
                base_name = %set.base_name,
                "Volume count mismatch: remote={}, local={}; uploading {} missing volume(s)",
                remote,
                set.len(),
                missing.len()
            );
        }
        ReconcilePlan::Absent => {
            info!(base_name = %set.base_name, "Archive set not found remotely, uploading all volumes");
        }
    }

    let mut status = SetStatus::Uploaded;
    for volume in plan.uploads(set) {
        let outcome = executor.upload(volume, &volume.name, remote_dir).await;
        if !outcome.is_success() {
            error!(base_name = %set.base_name, "Failed to upload volume: {}", volume.name);
            status = SetStatus::Failed;
            break;
        }
    }

    if status == SetStatus::Uploaded {
        info!(base_name = %set.base_name, "Archive set processed successfully");
    }
    set.status = status;
    status
}
