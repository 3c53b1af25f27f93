//! Archive Mirror Library
//!
//! Mirrors locally produced multi-volume backup archives to a remote FTP
//! store, repairs partially uploaded sets and prunes old backups on both
//! sides without ever touching a set whose upload was not confirmed.

pub mod archive;
pub mod config;
pub mod reconcile;
pub mod remote;
pub mod retention;
pub mod runner;
pub mod signal;
pub mod status;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use runner::{ExitStatus, RunReport, Runner};
pub use utils::errors::MirrorError;
pub type Result<T> = std::result::Result<T, MirrorError>;
