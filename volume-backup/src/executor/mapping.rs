//! Old volume root -> new host path translation used during restore.

use crate::archive::EntryHeader;
use crate::daemon::ContainerDescriptor;
use crate::utils::{BackupError, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Leaf directory name of a volume's host path; archive entries are
/// namespaced by it.
pub fn volume_root(host_path: &Path) -> Result<String> {
    host_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| BackupError::InvalidEntry(format!("volume path {}", host_path.display())))
}

#[derive(Debug, Default)]
pub struct PathTranslationTable {
    roots: HashMap<String, PathBuf>,
}

impl PathTranslationTable {
    /// Match each old volume to the new container's volume with the same
    /// mount path.
    pub fn build(old: &ContainerDescriptor, new: &ContainerDescriptor) -> Result<Self> {
        let mut roots = HashMap::new();

        for (mount_path, old_host_path) in &old.volumes {
            let root = volume_root(old_host_path)?;
            let Some(new_host_path) = new.host_path(mount_path) else {
                warn!(
                    "No volume at {} in new container (old root {})",
                    mount_path, root
                );
                return Err(BackupError::UnresolvedVolume { root });
            };

            debug!("{}: {} -> {}", mount_path, root, new_host_path.display());
            if roots.insert(root.clone(), new_host_path.to_path_buf()).is_some() {
                return Err(BackupError::DuplicateVolumeRoot(root));
            }
        }

        Ok(Self { roots })
    }

    pub fn resolve(&self, root: &str) -> Option<&Path> {
        self.roots.get(root).map(PathBuf::as_path)
    }

    /// Absolute destination for an archive entry.
    ///
    /// Non-directory entries directly at the archive root (the descriptor,
    /// stray files) have no destination and yield `None`.
    pub fn destination(&self, header: &EntryHeader) -> Result<Option<PathBuf>> {
        let mut segments = Vec::new();
        for component in Path::new(&header.name).components() {
            match component {
                Component::Normal(segment) => segments.push(segment),
                Component::CurDir => {}
                _ => return Err(BackupError::InvalidEntry(header.name.clone())),
            }
        }

        let Some((root, rest)) = segments.split_first() else {
            return Err(BackupError::InvalidEntry(header.name.clone()));
        };
        if rest.is_empty() && !header.is_dir() {
            return Ok(None);
        }

        let root = root.to_string_lossy();
        let base = self
            .resolve(&root)
            .ok_or_else(|| BackupError::UnresolvedVolume {
                root: root.to_string(),
            })?;

        let mut destination = base.to_path_buf();
        destination.extend(rest);
        Ok(Some(destination))
    }
}
