//! Volume directory traversal.
//!
//! Walks one host-side volume directory depth-first, parents before children,
//! and yields every directory and regular file with the metadata needed for an
//! archive header. Entry names are relative to the *parent* of the volume
//! directory, so the volume's leaf name is the first segment of every entry.

use crate::fs::metadata::EntryMetadata;
use crate::utils::{BackupError, IoResultExt, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// One directory or file found under a volume
#[derive(Debug, Clone)]
pub struct VolumeEntry {
    /// Full path on the host
    pub path: PathBuf,

    /// Path relative to the volume's parent directory (starts with the volume root name)
    pub relative_path: PathBuf,

    /// Ownership, permissions and size
    pub metadata: EntryMetadata,
}

impl VolumeEntry {
    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir
    }

    /// Open the entry's content. Directories have none.
    pub fn open(&self) -> Result<Option<File>> {
        if self.is_dir() {
            return Ok(None);
        }
        File::open(&self.path).at_path(&self.path).map(Some)
    }

    /// Slash-delimited archive name
    pub fn archive_name(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Lazy walk over a single volume directory
pub struct VolumeWalker {
    root: PathBuf,
    base: PathBuf,
    inner: walkdir::IntoIter,
}

impl VolumeWalker {
    /// Start a walk over `root`.
    ///
    /// Fails when `root` has no parent (the filesystem root cannot be a volume).
    pub fn new(root: &Path) -> Result<Self> {
        let base = root
            .parent()
            .filter(|_| root.file_name().is_some())
            .ok_or_else(|| BackupError::Filesystem {
                path: root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "volume path has no leaf directory",
                ),
            })?
            .to_path_buf();

        let inner = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Ok(Self {
            root: root.to_path_buf(),
            base,
            inner,
        })
    }

    /// Build a VolumeEntry from a DirEntry.
    /// Symlinks to files are resolved to their target; symlinks to directories,
    /// broken symlinks and special files yield None.
    fn entry(&self, entry: &DirEntry) -> Result<Option<VolumeEntry>> {
        let path = entry.path();
        let file_type = entry.file_type();

        let metadata = if file_type.is_symlink() {
            match std::fs::metadata(path) {
                Ok(resolved) if resolved.is_file() => EntryMetadata::from_metadata(&resolved),
                Ok(_) => {
                    debug!("Skipping symlink to non-file: {}", path.display());
                    return Ok(None);
                }
                Err(_) => {
                    warn!("Skipping broken symlink: {}", path.display());
                    return Ok(None);
                }
            }
        } else if file_type.is_dir() || file_type.is_file() {
            let raw = entry
                .metadata()
                .map_err(std::io::Error::from)
                .at_path(path)?;
            EntryMetadata::from_metadata(&raw)
        } else {
            warn!("Skipping special file: {}", path.display());
            return Ok(None);
        };

        let relative_path = path
            .strip_prefix(&self.base)
            .map_err(|_| BackupError::InvalidEntry(path.display().to_string()))?
            .to_path_buf();

        Ok(Some(VolumeEntry {
            path: path.to_path_buf(),
            relative_path,
            metadata,
        }))
    }
}

impl Iterator for VolumeWalker {
    type Item = Result<VolumeEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(BackupError::Filesystem {
                        path,
                        source: e.into(),
                    }));
                }
            };

            match self.entry(&entry) {
                Ok(Some(volume_entry)) => return Some(Ok(volume_entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
