//! Volume Backup Library
//!
//! Snapshots the data volumes of a container, together with its descriptor,
//! into one archive and restores them into a newly created container.

pub mod archive;
pub mod config;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod metrics;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use daemon::{ContainerDaemon, DaemonClient};
pub use executor::{BackupEngine, RestoreEngine};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
