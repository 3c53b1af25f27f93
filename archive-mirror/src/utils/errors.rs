//! Custom error types for the archive mirror.

use crate::remote::TransportError;
use thiserror::Error;

/// Errors that abort a run before or outside per-set processing.
///
/// Per-set failures never travel through this type; they are recorded
/// in the run report instead.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transfer error: {0}")]
    Transport(#[from] TransportError),

    #[error("Could not create remote directory {path}: {source}")]
    RemoteDirectory {
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to connect after {attempts} attempts: {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, MirrorError>;
