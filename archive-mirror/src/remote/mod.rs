//! Remote file store access.
//!
//! The run talks to the remote side only through [`RemoteSession`], an
//! object-safe async interface modelled on an FTP control connection, and
//! obtains sessions from a [`Connector`]. The FTP binding lives in [`ftp`].

pub mod ftp;

use crate::utils::{MirrorError, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by a remote session, classified for the retry policy.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Network failure, timeout or a 4xx reply. Worth retrying on a fresh session.
    #[error("transient transfer error: {0}")]
    Transient(String),

    /// Structural failure (5xx reply, permission). Retrying the same call will not help.
    #[error("permanent transfer error: {0}")]
    Permanent(String),

    /// The remote path does not exist.
    #[error("remote path not found: {0}")]
    NotFound(String),

    /// The local file could not be read.
    #[error("local file error: {0}")]
    Local(#[from] std::io::Error),

    /// The session was lost and must be re-established.
    #[error("session closed")]
    Closed,
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_) | TransportError::Closed)
    }
}

/// One open session with the remote file store.
///
/// Name-based operations are relative to the session's current directory.
#[async_trait]
pub trait RemoteSession: Send {
    async fn change_dir(&mut self, path: &str) -> std::result::Result<(), TransportError>;

    async fn make_dir(&mut self, path: &str) -> std::result::Result<(), TransportError>;

    /// Absolute path of the current directory.
    async fn current_dir(&mut self) -> std::result::Result<String, TransportError>;

    /// Bare file names in the current directory.
    async fn list_names(&mut self) -> std::result::Result<Vec<String>, TransportError>;

    /// Upload `local` as `remote_name`, replacing any existing file.
    async fn store(&mut self, remote_name: &str, local: &Path) -> std::result::Result<u64, TransportError>;

    async fn size(&mut self, remote_name: &str) -> std::result::Result<u64, TransportError>;

    async fn delete(&mut self, remote_name: &str) -> std::result::Result<(), TransportError>;

    async fn quit(&mut self) -> std::result::Result<(), TransportError>;
}

/// Opens sessions against one remote endpoint with fixed credentials.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> std::result::Result<Box<dyn RemoteSession>, TransportError>;

    /// Human-readable endpoint for log lines.
    fn endpoint(&self) -> String;
}

/// How many times, and how far apart, session establishment is attempted.
#[derive(Debug, Clone, Copy)]
pub struct ConnectPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Open a session, retrying with a fixed delay.
pub async fn connect_with_retry(
    connector: &dyn Connector,
    policy: ConnectPolicy,
) -> Result<Box<dyn RemoteSession>> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connector.connect().await {
            Ok(session) => {
                info!("Connected to remote store: {}", connector.endpoint());
                return Ok(session);
            }
            Err(e) if attempt < attempts => {
                warn!(attempt, "Connection attempt to {} failed: {}", connector.endpoint(), e);
                tokio::time::sleep(policy.delay).await;
            }
            Err(source) => {
                return Err(MirrorError::Connect { attempts, source });
            }
        }
    }
}

/// Point-in-time listing of a remote directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIndex {
    names: BTreeSet<String>,
}

impl RemoteIndex {
    /// List `dir`. Every call issues a fresh listing.
    pub async fn fetch(
        session: &mut dyn RemoteSession,
        dir: &str,
    ) -> std::result::Result<Self, TransportError> {
        session.change_dir(dir).await?;
        let names = session.list_names().await?;
        debug!(dir, files = names.len(), "Fetched remote listing");
        Ok(Self::from_names(names))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Names starting with `prefix`.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.names
            .iter()
            .map(String::as_str)
            .filter(move |name| name.starts_with(prefix))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Make sure `path` exists remotely and enter it.
///
/// When the directory cannot be entered it is created segment by segment.
/// Returns the absolute path of the directory, which later directory
/// selections use so they do not depend on the session's starting point.
pub async fn ensure_remote_directory(session: &mut dyn RemoteSession, path: &str) -> Result<String> {
    match session.change_dir(path).await {
        Ok(()) => {}
        Err(e) if e.is_transient() => return Err(e.into()),
        Err(e) => {
            debug!("Cannot enter {}: {}, creating it", path, e);
            create_path(session, path).await?;
        }
    }

    let resolved = session.current_dir().await?;
    info!("Using remote directory: {}", resolved);
    Ok(resolved)
}

async fn create_path(session: &mut dyn RemoteSession, path: &str) -> Result<()> {
    let dir_error = |prefix: &str, source: TransportError| MirrorError::RemoteDirectory {
        path: prefix.to_string(),
        source,
    };

    let mut prefix = String::new();
    if path.starts_with('/') {
        prefix.push('/');
        session.change_dir("/").await.map_err(|e| dir_error("/", e))?;
    }

    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        prefix.push_str(segment);

        if session.change_dir(segment).await.is_ok() {
            continue;
        }

        session
            .make_dir(segment)
            .await
            .map_err(|e| dir_error(&prefix, e))?;
        info!("Created remote directory: {}", prefix);

        session
            .change_dir(segment)
            .await
            .map_err(|e| dir_error(&prefix, e))?;
    }

    Ok(())
}
