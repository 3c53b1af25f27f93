//! Utility modules for the archive mirror.

pub mod errors;
pub mod logger;

pub use errors::{MirrorError, Result};
