//! Run orchestration.
//!
//! connect → ensure remote directory → locate local sets → reconcile each
//! set → prune (only if something was uploaded) → summary.
//!
//! A failing set is recorded and the run moves on to the next one. Errors
//! before the per-set loop (configuration, connection, remote directory,
//! unreadable source directory) abort the run.

use crate::archive::{locate_archive_sets, SetStatus};
use crate::config::Config;
use crate::reconcile::reconcile_set;
use crate::remote::{connect_with_retry, ensure_remote_directory, ConnectPolicy, Connector};
use crate::retention::{prune_local, prune_remote, LocalPruneSummary, RemotePruneSummary};
use crate::transfer::stats::{format_bytes, format_duration};
use crate::transfer::verify::UploadVerifier;
use crate::transfer::{RetryPolicy, TransferExecutor};
use crate::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Process exit status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Every set is confirmed remotely
    Success,
    /// The run completed but at least one set failed
    PartialFailure,
    /// The run was aborted
    Fatal,
    /// The process was interrupted
    Interrupted,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::PartialFailure => 1,
            ExitStatus::Fatal => 2,
            ExitStatus::Interrupted => 130,
        }
    }
}

/// Outcome of one completed run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub uploaded: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub remote_prune: Option<RemotePruneSummary>,
    pub local_prune: Option<LocalPruneSummary>,
    pub uploaded_files: usize,
    pub uploaded_bytes: u64,
    /// Upload attempts across all volumes, retries included
    pub upload_attempts: u32,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn record(&mut self, base_name: &str, status: SetStatus) {
        match status {
            SetStatus::Uploaded => {
                self.uploaded.insert(base_name.to_string());
            }
            SetStatus::Failed | SetStatus::Unknown => {
                self.failed.insert(base_name.to_string());
            }
        }
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.failed.is_empty() {
            ExitStatus::Success
        } else {
            ExitStatus::PartialFailure
        }
    }

    pub fn log_summary(&self) {
        info!("{}", "=".repeat(70));
        info!("BACKUP SUMMARY");
        info!("Successful uploads: {} set(s)", self.uploaded.len());
        info!("Failed uploads: {} set(s)", self.failed.len());
        info!(
            "Transferred: {} volume(s), {}",
            self.uploaded_files,
            format_bytes(self.uploaded_bytes)
        );
        info!("Upload attempts: {}", self.upload_attempts);

        if !self.uploaded.is_empty() {
            info!("Successfully processed sets:");
            for base_name in &self.uploaded {
                info!("  ✓ {}", base_name);
            }
        }

        if !self.failed.is_empty() {
            warn!("Failed sets (require manual attention):");
            for base_name in &self.failed {
                warn!("  ✗ {}", base_name);
            }
        }

        info!("Total execution time: {}", format_duration(self.elapsed));
        info!("{}", "=".repeat(70));
    }
}

/// Drives one mirror run.
pub struct Runner {
    config: Config,
    connector: Arc<dyn Connector>,
    verifier: Option<Box<dyn UploadVerifier>>,
}

impl Runner {
    pub fn new(config: Config, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            verifier: None,
        }
    }

    /// Verify uploads with something other than the size check.
    pub fn with_verifier(mut self, verifier: Box<dyn UploadVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    fn connect_policy(&self) -> ConnectPolicy {
        ConnectPolicy {
            attempts: self.config.remote.connect_retries,
            delay: self.config.remote.connect_retry_delay(),
        }
    }

    /// Run to completion. `Err` means the run was aborted.
    pub async fn run(self) -> Result<RunReport> {
        let start_time = Instant::now();
        let ignore = self.config.local.load_ignore_list()?;
        if !ignore.is_empty() {
            info!("Loaded {} ignore pattern(s)", ignore.len());
        }

        let connect_policy = self.connect_policy();
        let session = connect_with_retry(self.connector.as_ref(), connect_policy).await?;

        let mut executor = TransferExecutor::new(
            session,
            self.connector.clone(),
            connect_policy,
            RetryPolicy::new(self.config.transfer.max_attempts),
        );
        if let Some(verifier) = self.verifier {
            executor = executor.with_verifier(verifier);
        }

        let result = Self::run_sets(&self.config, &ignore, &mut executor).await;
        executor.close().await;

        let mut report = result?;
        report.uploaded_files = executor.stats().files;
        report.uploaded_bytes = executor.stats().bytes;
        report.upload_attempts = executor.stats().attempts;
        report.elapsed = start_time.elapsed();
        report.log_summary();

        match report.exit_status() {
            ExitStatus::Success => info!("Backup completed successfully"),
            _ => warn!("Backup completed with errors - check failed sets above"),
        }
        Ok(report)
    }

    async fn run_sets(
        config: &Config,
        ignore: &crate::archive::IgnoreList,
        executor: &mut TransferExecutor,
    ) -> Result<RunReport> {
        let remote_dir = ensure_remote_directory(executor.session(), &config.remote.directory).await?;

        let mut sets = locate_archive_sets(&config.local.source_dir, ignore)?;
        let mut report = RunReport::default();

        if sets.is_empty() {
            warn!("No archive files found in {}", config.local.source_dir.display());
            return Ok(report);
        }
        info!("Found {} archive set(s) locally", sets.len());

        let total = sets.len();
        for (index, set) in sets.values_mut().enumerate() {
            info!("Processing set {}/{}", index + 1, total);
            let status = reconcile_set(executor, set, &remote_dir).await;
            report.record(&set.base_name, status);

            match status {
                SetStatus::Uploaded => info!("Set {}/{}: SUCCESS", index + 1, total),
                _ => warn!(
                    base_name = %set.base_name,
                    "Set {}/{}: FAILED - set will not be removed locally",
                    index + 1,
                    total
                ),
            }
        }

        if report.uploaded.is_empty() {
            warn!("No successful uploads - skipping cleanup operations");
            return Ok(report);
        }

        report.remote_prune = prune_remote(
            executor.session(),
            &remote_dir,
            &report.uploaded,
            config.retention.max_copies,
        )
        .await;
        report.local_prune = Some(prune_local(&sets).await);

        Ok(report)
    }
}
