//! Backup engine: resolves the data container and writes its archive.

use crate::archive::{ArchiveWriter, EntryHeader, VOLUME_CONTAINER_FILENAME};
use crate::daemon::{ContainerDaemon, ContainerDescriptor};
use crate::fs::walker::{VolumeEntry, VolumeWalker};
use super::mapping::volume_root;
use crate::utils::{BackupError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};

/// Mode of the descriptor entry
const DESCRIPTOR_MODE: u32 = 0o644;

/// Store execution result
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    /// Container whose volumes were archived
    pub data_container: String,
    pub volumes: usize,
    pub directories: usize,
    pub files: usize,
    /// File content bytes written (headers and padding excluded)
    pub bytes: u64,
}

/// Backup engine, constructed once per store operation
pub struct BackupEngine<D> {
    daemon: D,
    started_at: DateTime<Utc>,
}

impl<D: ContainerDaemon> BackupEngine<D> {
    pub fn new(daemon: D) -> Self {
        Self::with_start_time(daemon, Utc::now())
    }

    /// Use a fixed start time; it becomes every header timestamp.
    pub fn with_start_time(daemon: D, started_at: DateTime<Utc>) -> Self {
        Self { daemon, started_at }
    }

    /// Find the container that owns the data of `container_id`.
    ///
    /// A container with volumes owns them. Otherwise it must mount the
    /// volumes of exactly one other container, which is used instead.
    /// The volumes' leaf names must be distinct, since they name the
    /// archive roots.
    pub fn resolve(&self, container_id: &str) -> Result<ContainerDescriptor> {
        let container = self.daemon.inspect(container_id)?;
        let (data_container, mut container) = if container.has_volumes() {
            (container_id.to_string(), container)
        } else {
            match container.volumes_from() {
                [] => return Err(BackupError::NoDataContainer(container_id.to_string())),
                [data_container] => {
                    info!(
                        "{} has no volumes, using volumes of {}",
                        container_id, data_container
                    );
                    (data_container.clone(), self.daemon.inspect(data_container)?)
                }
                many => {
                    return Err(BackupError::UnsupportedTopology {
                        container: container_id.to_string(),
                        count: many.len(),
                    })
                }
            }
        };

        if container.id.is_empty() {
            container.id = data_container;
        }

        let mut roots = HashSet::new();
        for host_path in container.volumes.values() {
            let root = volume_root(host_path)?;
            if !roots.insert(root.clone()) {
                return Err(BackupError::DuplicateVolumeRoot(root));
            }
        }

        Ok(container)
    }

    /// Archive the descriptor and every volume of `container_id`'s data
    /// container into `out`.
    ///
    /// Nothing is written unless the data container resolves. On a later
    /// failure the partial output is left as is.
    pub fn store<W: Write>(&self, container_id: &str, out: W) -> Result<StoreSummary> {
        let container = self.resolve(container_id)?;
        self.store_resolved(&container, out)
    }

    /// Archive a container returned by [`BackupEngine::resolve`].
    pub fn store_resolved<W: Write>(
        &self,
        container: &ContainerDescriptor,
        out: W,
    ) -> Result<StoreSummary> {
        let timestamp = u64::try_from(self.started_at.timestamp()).unwrap_or_default();
        let mut writer = ArchiveWriter::new(out, timestamp);

        let raw = container.raw_json();
        writer.append(
            &EntryHeader::file(VOLUME_CONTAINER_FILENAME, raw.len() as u64, DESCRIPTOR_MODE),
            raw,
        )?;

        let mut summary = StoreSummary {
            data_container: container.id.clone(),
            ..Default::default()
        };

        for (mount_path, host_path) in &container.volumes {
            info!("Storing volume {} from {}", mount_path, host_path.display());
            let before = (summary.files, summary.bytes);
            store_volume(&mut writer, host_path, &mut summary)?;
            summary.volumes += 1;
            info!(
                "Stored volume {}: {} files, {} bytes",
                mount_path,
                summary.files - before.0,
                summary.bytes - before.1
            );
        }

        writer.finish()?;

        info!(
            "Store completed: {} volumes, {} directories, {} files, {} bytes",
            summary.volumes, summary.directories, summary.files, summary.bytes
        );
        Ok(summary)
    }
}

fn store_volume<W: Write>(
    writer: &mut ArchiveWriter<W>,
    host_path: &Path,
    summary: &mut StoreSummary,
) -> Result<()> {
    for entry in VolumeWalker::new(host_path)? {
        let entry = entry?;
        let header = entry_header(&entry);
        debug!("Adding {}", header.name);

        match entry.open()? {
            Some(file) => {
                writer
                    .append(&header, file)
                    .map_err(|e| shrunk_file(&entry.path, e))?;
                summary.files += 1;
                summary.bytes += header.size;
            }
            None => {
                writer.append(&header, io::empty())?;
                summary.directories += 1;
            }
        }
    }

    Ok(())
}

/// A file that got shorter after it was measured is reported against its path.
fn shrunk_file(path: &Path, err: BackupError) -> BackupError {
    match err {
        BackupError::Archive(source) if source.kind() == io::ErrorKind::UnexpectedEof => {
            BackupError::Filesystem {
                path: path.to_path_buf(),
                source,
            }
        }
        other => other,
    }
}

fn entry_header(entry: &VolumeEntry) -> EntryHeader {
    let metadata = &entry.metadata;
    let header = if metadata.is_dir {
        EntryHeader::directory(entry.archive_name(), metadata.mode)
    } else {
        EntryHeader::file(entry.archive_name(), metadata.size, metadata.mode)
    };
    header.with_owner(u64::from(metadata.uid), u64::from(metadata.gid))
}
