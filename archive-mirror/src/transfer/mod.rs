//! Verified single-file uploads with bounded retry.
//!
//! The executor owns the run's remote session. Every attempt re-selects the
//! destination directory, sends the whole file and verifies it:
//!
//! - transient transport errors sleep `base_delay * 2^attempt`, then the
//!   session is replaced with a fresh one before the next attempt
//! - verification mismatches are retried immediately on the same session
//! - permanent errors end the upload at once
//!
//! An upload never returns an error; the caller inspects [`UploadOutcome`].

pub mod stats;
pub mod verify;

use crate::archive::VolumeFile;
use crate::remote::{connect_with_retry, ConnectPolicy, Connector, RemoteSession, TransportError};
use stats::{format_bytes, format_speed, TransferStats};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use verify::{SizeVerifier, UploadVerifier, Verification};

/// Attempt budget and backoff base for uploads
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay after the failed attempt `attempt` (0-based): 1s, 2s, 4s, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Final result of an upload
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { attempts: u32 },
    Failed { attempts: u32, reason: String },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            UploadOutcome::Uploaded { attempts } | UploadOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Result of a single upload attempt
enum Attempt {
    Success,
    Transient(TransportError),
    Permanent(TransportError),
    Mismatch(Verification),
}

impl From<TransportError> for Attempt {
    fn from(err: TransportError) -> Self {
        if err.is_transient() {
            Attempt::Transient(err)
        } else {
            Attempt::Permanent(err)
        }
    }
}

/// Uploads volumes over a session it can re-establish.
pub struct TransferExecutor {
    session: Box<dyn RemoteSession>,
    connector: Arc<dyn Connector>,
    connect_policy: ConnectPolicy,
    retry: RetryPolicy,
    verifier: Box<dyn UploadVerifier>,
    stats: TransferStats,
}

impl TransferExecutor {
    pub fn new(
        session: Box<dyn RemoteSession>,
        connector: Arc<dyn Connector>,
        connect_policy: ConnectPolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            session,
            connector,
            connect_policy,
            retry,
            verifier: Box::new(SizeVerifier),
            stats: TransferStats::new(),
        }
    }

    /// Replace the size check with another verification.
    pub fn with_verifier(mut self, verifier: Box<dyn UploadVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// The current session, for listings, directory changes and deletes.
    pub fn session(&mut self) -> &mut dyn RemoteSession {
        self.session.as_mut()
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// Upload `volume` as `remote_name` into `remote_dir` and verify it.
    pub async fn upload(
        &mut self,
        volume: &VolumeFile,
        remote_name: &str,
        remote_dir: &str,
    ) -> UploadOutcome {
        let max_attempts = self.retry.max_attempts;
        let mut last_failure = String::new();

        for attempt in 0..max_attempts {
            info!(
                "Uploading [{}/{}]: {} ({})",
                attempt + 1,
                max_attempts,
                volume.name,
                format_bytes(volume.size)
            );

            let started = Instant::now();
            match self.attempt(volume, remote_name, remote_dir).await {
                Attempt::Success => {
                    let elapsed = started.elapsed().as_secs_f64();
                    let speed = if elapsed > 0.0 {
                        (volume.size as f64 / elapsed) as u64
                    } else {
                        0
                    };
                    info!("Upload successful: {} ({})", remote_name, format_speed(speed));
                    self.stats.record_upload(volume.size, attempt + 1);
                    return UploadOutcome::Uploaded {
                        attempts: attempt + 1,
                    };
                }
                Attempt::Mismatch(verification) => {
                    warn!(attempt = attempt + 1, ?verification, "Upload verification failed for {}", remote_name);
                    last_failure = format!("verification failed: {:?}", verification);
                }
                Attempt::Transient(e) => {
                    warn!(attempt = attempt + 1, "Temporary transfer error for {}: {}", remote_name, e);
                    last_failure = e.to_string();

                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                        if let Err(e) = self.reconnect().await {
                            error!("Reconnect failed: {}", e);
                            self.stats.record_failure(attempt + 1);
                            return UploadOutcome::Failed {
                                attempts: attempt + 1,
                                reason: format!("reconnect failed: {}", e),
                            };
                        }
                    }
                }
                Attempt::Permanent(e) => {
                    error!(attempt = attempt + 1, "Upload of {} failed: {}", remote_name, e);
                    self.stats.record_failure(attempt + 1);
                    return UploadOutcome::Failed {
                        attempts: attempt + 1,
                        reason: e.to_string(),
                    };
                }
            }
        }

        error!("Failed to upload {} after {} attempts", remote_name, max_attempts);
        self.stats.record_failure(max_attempts);
        UploadOutcome::Failed {
            attempts: max_attempts,
            reason: last_failure,
        }
    }

    async fn attempt(&mut self, volume: &VolumeFile, remote_name: &str, remote_dir: &str) -> Attempt {
        // A reconnect lands in the login directory.
        if let Err(e) = self.session.change_dir(remote_dir).await {
            return e.into();
        }

        if let Err(e) = self.session.store(remote_name, &volume.path).await {
            return e.into();
        }

        match self
            .verifier
            .verify(self.session.as_mut(), volume, remote_name)
            .await
        {
            Ok(Verification::Verified) => Attempt::Success,
            Ok(mismatch) => Attempt::Mismatch(mismatch),
            Err(e) => e.into(),
        }
    }

    async fn reconnect(&mut self) -> crate::Result<()> {
        if let Err(e) = self.session.quit().await {
            warn!("Closing stale session failed: {}", e);
        }
        self.session = connect_with_retry(self.connector.as_ref(), self.connect_policy).await?;
        Ok(())
    }

    /// Close the session. Errors are logged, not returned.
    pub async fn close(&mut self) {
        match self.session.quit().await {
            Ok(()) => info!("Remote connection closed"),
            Err(e) => warn!("Closing remote connection failed: {}", e),
        }
    }
}
