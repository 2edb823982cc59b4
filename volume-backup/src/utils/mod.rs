//! Utility modules for volume backups.

pub mod errors;
pub mod logger;

pub use errors::{BackupError, IoResultExt, Result};
