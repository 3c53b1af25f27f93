//! Post-upload verification.
//!
//! The size check is the baseline; stronger checks (e.g. a content hash
//! where the server supports one) implement the same trait.

use crate::archive::VolumeFile;
use crate::remote::{RemoteSession, TransportError};
use async_trait::async_trait;
use tracing::{error, info};

/// Result of checking an uploaded file against its local source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    /// `remote` is `None` when the remote file does not exist
    Mismatch { local: u64, remote: Option<u64> },
}

#[async_trait]
pub trait UploadVerifier: Send + Sync {
    /// Compare the uploaded `remote_name` with `volume`.
    ///
    /// Errors are transport or local I/O failures; a file that is present but
    /// wrong is reported as [`Verification::Mismatch`].
    async fn verify(
        &self,
        session: &mut dyn RemoteSession,
        volume: &VolumeFile,
        remote_name: &str,
    ) -> Result<Verification, TransportError>;
}

/// Compares the remote size with the local file length, byte for byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeVerifier;

#[async_trait]
impl UploadVerifier for SizeVerifier {
    async fn verify(
        &self,
        session: &mut dyn RemoteSession,
        volume: &VolumeFile,
        remote_name: &str,
    ) -> Result<Verification, TransportError> {
        let local = tokio::fs::metadata(&volume.path).await?.len();

        let remote = match session.size(remote_name).await {
            Ok(size) => size,
            Err(TransportError::NotFound(_)) => {
                error!("Could not get size for {}: file not found", remote_name);
                return Ok(Verification::Mismatch { local, remote: None });
            }
            Err(e) => return Err(e),
        };

        if local != remote {
            error!(
                "Size mismatch for {}: local={} bytes, remote={} bytes",
                remote_name, local, remote
            );
            return Ok(Verification::Mismatch {
                local,
                remote: Some(remote),
            });
        }

        info!("Size verified: {} ({} bytes)", remote_name, remote);
        Ok(Verification::Verified)
    }
}
