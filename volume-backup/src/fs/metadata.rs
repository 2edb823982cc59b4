//! File metadata handling for volume backups.
//!
//! This module captures ownership and permission bits at store time and
//! applies them back to restored paths.

use crate::utils::{IoResultExt, Result};
use nix::unistd::{chown, Gid, Uid};
use std::fs::{self, Metadata};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use std::time::SystemTime;

/// Permission bits kept in archive headers (rwx for all classes plus setuid/setgid/sticky)
pub const MODE_MASK: u32 = 0o7777;

/// Ownership, permissions and size of one walked entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Content size in bytes (0 for directories)
    pub size: u64,

    /// Owner user id
    pub uid: u32,

    /// Owner group id
    pub gid: u32,

    /// Unix permission bits
    pub mode: u32,

    /// Last modified time (seconds since Unix epoch)
    pub modified: u64,

    /// Is this a directory?
    pub is_dir: bool,
}

impl EntryMetadata {
    /// Extract metadata from a file path, following symlinks
    #[cfg(test)]
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).at_path(path)?;
        Ok(Self::from_metadata(&metadata))
    }

    pub fn from_metadata(metadata: &Metadata) -> Self {
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .unwrap_or_default()
            .as_secs();

        let is_dir = metadata.is_dir();

        Self {
            size: if is_dir { 0 } else { metadata.len() },
            uid: metadata.uid(),
            gid: metadata.gid(),
            mode: metadata.mode() & MODE_MASK,
            modified,
            is_dir,
        }
    }
}

/// Change the owner of `path` to `uid`/`gid`
pub fn apply_ownership(path: &Path, uid: u32, gid: u32) -> Result<()> {
    chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
        .map_err(std::io::Error::from)
        .at_path(path)
}

/// Set the permission bits of `path`
pub fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode & MODE_MASK)).at_path(path)
}
