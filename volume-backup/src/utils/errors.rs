//! Error taxonomy for store and restore operations.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] io::Error),

    #[error("Daemon error: HTTP {status}: {body}")]
    Daemon { status: String, body: String },

    #[error("Not found: {resource} (HTTP {status}: {body})")]
    NotFound {
        resource: String,
        status: String,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Couldn't find data container for {0}")]
    NoDataContainer(String),

    #[error("Container {container} uses {count} volume containers, only one is supported")]
    UnsupportedTopology { container: String, count: usize },

    #[error("Couldn't find volume container in backup")]
    MissingDescriptor,

    #[error("Couldn't find matching volume for {root} in new container")]
    UnresolvedVolume { root: String },

    #[error("Volume root {0} is used by more than one volume")]
    DuplicateVolumeRoot(String),

    #[error("Invalid archive entry: {0}")]
    InvalidEntry(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;

/// Attaches the offending path to filesystem failures.
pub trait IoResultExt<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| BackupError::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}
