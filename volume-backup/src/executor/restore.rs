//! Restore engine: recreates the data container and replays its volumes.

use super::mapping::PathTranslationTable;
use crate::archive::{ArchiveReader, VOLUME_CONTAINER_FILENAME};
use crate::daemon::{ContainerDaemon, ContainerDescriptor};
use crate::fs::metadata::{apply_mode, apply_ownership};
use crate::utils::{BackupError, IoResultExt, Result};
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Progress of one restore, strictly linear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Init,
    DescriptorLoaded,
    ContainerCreated,
    ContainerStarted,
    MappingBuilt,
    Replaying,
    Done,
    Failed,
}

/// Restore execution result
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Id of the newly created container
    pub container_id: String,
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
    /// Entries at the archive root that belong to no volume
    pub skipped: usize,
}

/// Restore engine, constructed once per restore operation
pub struct RestoreEngine<D> {
    daemon: D,
    preserve_ownership: bool,
    state: RestoreState,
}

impl<D: ContainerDaemon> RestoreEngine<D> {
    pub fn new(daemon: D) -> Self {
        Self {
            daemon,
            preserve_ownership: true,
            state: RestoreState::Init,
        }
    }

    /// Whether recorded uid/gid are applied to restored paths
    pub fn preserve_ownership(mut self, preserve: bool) -> Self {
        self.preserve_ownership = preserve;
        self
    }

    pub fn state(&self) -> RestoreState {
        self.state
    }

    /// Restore the archive into a newly created container.
    ///
    /// The archive is read twice: once to find the descriptor, once to
    /// replay the volume entries. Any failure aborts; whatever was restored
    /// so far stays on disk.
    pub fn restore<R: Read + Seek>(&mut self, archive: R) -> Result<RestoreSummary> {
        let mut reader = ArchiveReader::new(archive);
        match self.run(&mut reader) {
            Ok(summary) => {
                self.transition(RestoreState::Done);
                info!(
                    "Restore completed into {}: {} directories, {} files, {} bytes",
                    summary.container_id, summary.directories, summary.files, summary.bytes
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Restore failed while {:?}: {}", self.state, e);
                self.state = RestoreState::Failed;
                Err(e)
            }
        }
    }

    fn run<R: Read + Seek>(&mut self, reader: &mut ArchiveReader<R>) -> Result<RestoreSummary> {
        let old = load_descriptor(reader)?;
        self.transition(RestoreState::DescriptorLoaded);

        let name = old.display_name();
        info!("Creating container {} ({} volumes)", name, old.volumes.len());
        let container_id = self.daemon.create(&old.config_json()?, name)?;
        self.transition(RestoreState::ContainerCreated);

        self.daemon.start(&container_id)?;
        self.transition(RestoreState::ContainerStarted);

        let new = self.daemon.inspect(&container_id)?;
        let table = PathTranslationTable::build(&old, &new)?;
        self.transition(RestoreState::MappingBuilt);

        self.transition(RestoreState::Replaying);
        let mut summary = self.replay(reader, &table)?;
        summary.container_id = container_id;
        Ok(summary)
    }

    fn replay<R: Read + Seek>(
        &self,
        reader: &mut ArchiveReader<R>,
        table: &PathTranslationTable,
    ) -> Result<RestoreSummary> {
        let mut summary = RestoreSummary::default();
        let mut directory_modes: Vec<(PathBuf, u32)> = Vec::new();

        let mut pass = reader.rewind()?;
        for entry in pass.entries()? {
            let mut entry = entry?;
            let header = entry.header().clone();

            let Some(destination) = table.destination(&header)? else {
                debug!("Skipping {}", header.name);
                summary.skipped += 1;
                continue;
            };

            if header.is_dir() {
                fs::create_dir_all(&destination).at_path(&destination)?;
                summary.directories += 1;
            } else {
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent).at_path(parent)?;
                }
                let mut file = File::create(&destination).at_path(&destination)?;
                summary.bytes += io::copy(&mut entry, &mut file).at_path(&destination)?;
                summary.files += 1;
            }
            debug!("Restored {} to {}", header.name, destination.display());

            if self.preserve_ownership {
                let uid = u32::try_from(header.uid)
                    .map_err(|_| BackupError::InvalidEntry(format!("{}: uid", header.name)))?;
                let gid = u32::try_from(header.gid)
                    .map_err(|_| BackupError::InvalidEntry(format!("{}: gid", header.name)))?;
                apply_ownership(&destination, uid, gid)?;
            }

            if header.is_dir() {
                directory_modes.push((destination, header.mode));
            } else {
                apply_mode(&destination, header.mode)?;
            }
        }

        // Children first, so restrictive directory modes don't block the pass.
        for (path, mode) in directory_modes.iter().rev() {
            apply_mode(path, *mode)?;
        }

        Ok(summary)
    }

    fn transition(&mut self, next: RestoreState) {
        debug!("Restore state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// First pass: find and decode the descriptor entry.
fn load_descriptor<R: Read + Seek>(reader: &mut ArchiveReader<R>) -> Result<ContainerDescriptor> {
    let mut raw: Option<Vec<u8>> = None;

    let mut pass = reader.rewind()?;
    for entry in pass.entries()? {
        let mut entry = entry?;
        if entry.header().name != VOLUME_CONTAINER_FILENAME {
            continue;
        }
        if raw.is_some() {
            return Err(BackupError::InvalidEntry(format!(
                "{} appears more than once",
                VOLUME_CONTAINER_FILENAME
            )));
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        raw = Some(content);
    }

    let raw = raw.ok_or(BackupError::MissingDescriptor)?;
    ContainerDescriptor::from_json(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveWriter, EntryHeader};
    use crate::executor::store::BackupEngine;
    use crate::executor::testing::FakeDaemon;
    use nix::unistd::{Gid, Uid};
    use serde_json::json;
    use std::io::Cursor;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};
    use std::path::Path;
    use tempfile::TempDir;

    fn owner() -> (u64, u64) {
        (
            u64::from(Uid::current().as_raw()),
            u64::from(Gid::current().as_raw()),
        )
    }

    fn descriptor_json(volume: &Path) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "Id": "c1",
            "Name": "/store",
            "Config": {"Image": "busybox"},
            "Volumes": {"/data": volume}
        }))
        .unwrap()
    }

    fn archive(entries: &[(EntryHeader, &[u8])]) -> Cursor<Vec<u8>> {
        let mut writer = ArchiveWriter::new(Vec::new(), 0);
        for (header, content) in entries {
            writer.append(header, *content).unwrap();
        }
        Cursor::new(writer.finish().unwrap())
    }

    #[test]
    fn test_round_trip_into_new_volume() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let old_volume = temp_dir.path().join("vfs/abc123");
        fs::create_dir_all(old_volume.join("sub")).unwrap();
        fs::write(old_volume.join("a.txt"), b"alpha").unwrap();
        fs::set_permissions(old_volume.join("a.txt"), fs::Permissions::from_mode(0o640)).unwrap();
        fs::write(old_volume.join("sub/b.txt"), b"beta").unwrap();

        let source = FakeDaemon::new().with_container(
            "c1",
            json!({"Id": "c1", "Name": "/store", "Config": {"Image": "busybox"}, "Volumes": {"/data": old_volume}}),
        );
        let mut archive = Cursor::new(Vec::new());
        BackupEngine::new(&source).store("c1", &mut archive)?;

        let new_volume = temp_dir.path().join("vfs/xyz789");
        let target = FakeDaemon::new().with_start_volume("/data", new_volume.clone());
        let mut engine = RestoreEngine::new(&target);
        let summary = engine.restore(archive)?;

        assert_eq!(engine.state(), RestoreState::Done);
        assert_eq!(summary.container_id, "restored-1");
        assert_eq!(summary.files, 2);
        assert_eq!(summary.directories, 2);
        assert_eq!(summary.bytes, 9);
        assert_eq!(summary.skipped, 1);

        assert_eq!(fs::read(new_volume.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(new_volume.join("sub/b.txt")).unwrap(), b"beta");
        let meta = fs::metadata(new_volume.join("a.txt")).unwrap();
        assert_eq!(meta.mode() & 0o7777, 0o640);
        assert_eq!(u64::from(meta.uid()), owner().0);

        assert_eq!(
            target.calls(),
            vec!["create store", "start restored-1", "inspect restored-1"]
        );
        let created = target.created();
        assert_eq!(created[0].0, json!({"Image": "busybox"}));
        assert_eq!(created[0].1, "store");
        Ok(())
    }

    #[test]
    fn test_missing_descriptor_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let new_volume = temp_dir.path().join("xyz789");
        let target = FakeDaemon::new().with_start_volume("/data", new_volume.clone());
        let (uid, gid) = owner();

        let archive = archive(&[(
            EntryHeader::file("abc123/a.txt", 1, 0o644).with_owner(uid, gid),
            &b"a"[..],
        )]);
        let mut engine = RestoreEngine::new(&target);
        let err = engine.restore(archive).unwrap_err();

        assert!(matches!(err, BackupError::MissingDescriptor));
        assert_eq!(engine.state(), RestoreState::Failed);
        assert!(target.calls().is_empty());
        assert!(!new_volume.exists());
    }

    #[test]
    fn test_descriptor_position_does_not_matter() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let new_volume = temp_dir.path().join("xyz789");
        let target = FakeDaemon::new().with_start_volume("/data", new_volume.clone());
        let (uid, gid) = owner();
        let descriptor = descriptor_json(Path::new("/old/abc123"));

        let archive = archive(&[
            (EntryHeader::directory("abc123", 0o755).with_owner(uid, gid), &b""[..]),
            (
                EntryHeader::file("abc123/a.txt", 3, 0o600).with_owner(uid, gid),
                &b"abc"[..],
            ),
            (
                EntryHeader::file(VOLUME_CONTAINER_FILENAME, descriptor.len() as u64, 0o644),
                &descriptor[..],
            ),
        ]);
        let summary = RestoreEngine::new(&target).restore(archive)?;

        assert_eq!(summary.files, 1);
        assert_eq!(fs::read(new_volume.join("a.txt")).unwrap(), b"abc");
        Ok(())
    }

    #[test]
    fn test_unmatched_mount_path_fails_before_replay() {
        let temp_dir = TempDir::new().unwrap();
        let new_volume = temp_dir.path().join("xyz789");
        let target = FakeDaemon::new().with_start_volume("/elsewhere", new_volume.clone());
        let (uid, gid) = owner();
        let descriptor = descriptor_json(Path::new("/old/abc123"));

        let archive = archive(&[
            (
                EntryHeader::file(VOLUME_CONTAINER_FILENAME, descriptor.len() as u64, 0o644),
                &descriptor[..],
            ),
            (
                EntryHeader::file("abc123/a.txt", 1, 0o644).with_owner(uid, gid),
                &b"a"[..],
            ),
        ]);
        let mut engine = RestoreEngine::new(&target);
        let err = engine.restore(archive).unwrap_err();

        assert!(matches!(err, BackupError::UnresolvedVolume { ref root } if root == "abc123"));
        assert_eq!(engine.state(), RestoreState::Failed);
        assert!(!new_volume.join("a.txt").exists());
    }

    #[test]
    fn test_loose_root_files_are_skipped() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let new_volume = temp_dir.path().join("xyz789");
        let target = FakeDaemon::new().with_start_volume("/data", new_volume.clone());
        let descriptor = descriptor_json(Path::new("/old/abc123"));

        let archive = archive(&[
            (
                EntryHeader::file(VOLUME_CONTAINER_FILENAME, descriptor.len() as u64, 0o644),
                &descriptor[..],
            ),
            (EntryHeader::file("README", 2, 0o644), &b"hi"[..]),
        ]);
        let summary = RestoreEngine::new(&target)
            .preserve_ownership(false)
            .restore(archive)?;

        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.files, 0);
        assert!(!temp_dir.path().join("README").exists());
        Ok(())
    }

    #[test]
    fn test_read_only_directory_gets_its_mode_last() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let new_volume = temp_dir.path().join("xyz789");
        let target = FakeDaemon::new().with_start_volume("/data", new_volume.clone());
        let (uid, gid) = owner();
        let descriptor = descriptor_json(Path::new("/old/abc123"));

        let archive = archive(&[
            (
                EntryHeader::file(VOLUME_CONTAINER_FILENAME, descriptor.len() as u64, 0o644),
                &descriptor[..],
            ),
            (EntryHeader::directory("abc123", 0o755).with_owner(uid, gid), &b""[..]),
            (EntryHeader::directory("abc123/ro", 0o555).with_owner(uid, gid), &b""[..]),
            (
                EntryHeader::file("abc123/ro/f", 1, 0o444).with_owner(uid, gid),
                &b"f"[..],
            ),
        ]);
        RestoreEngine::new(&target).restore(archive)?;

        let ro = new_volume.join("ro");
        assert_eq!(fs::read(ro.join("f")).unwrap(), b"f");
        assert_eq!(fs::metadata(&ro).unwrap().mode() & 0o7777, 0o555);

        fs::set_permissions(&ro, fs::Permissions::from_mode(0o755)).unwrap();
        Ok(())
    }

    #[test]
    fn test_duplicate_descriptor_is_rejected() {
        let target = FakeDaemon::new();
        let descriptor = descriptor_json(Path::new("/old/abc123"));
        let header = EntryHeader::file(VOLUME_CONTAINER_FILENAME, descriptor.len() as u64, 0o644);

        let archive = archive(&[(header.clone(), &descriptor[..]), (header, &descriptor[..])]);
        let err = RestoreEngine::new(&target).restore(archive).unwrap_err();

        assert!(matches!(err, BackupError::InvalidEntry(_)));
        assert!(target.calls().is_empty());
    }

    #[test]
    fn test_filesystem_failure_aborts_and_keeps_earlier_entries() {
        let temp_dir = TempDir::new().unwrap();
        let new_volume = temp_dir.path().join("xyz789");
        let target = FakeDaemon::new().with_start_volume("/data", new_volume.clone());
        let (uid, gid) = owner();
        let descriptor = descriptor_json(Path::new("/old/abc123"));

        let archive = archive(&[
            (
                EntryHeader::file(VOLUME_CONTAINER_FILENAME, descriptor.len() as u64, 0o644),
                &descriptor[..],
            ),
            (EntryHeader::directory("abc123", 0o755).with_owner(uid, gid), &b""[..]),
            (
                EntryHeader::file("abc123/a.txt", 1, 0o644).with_owner(uid, gid),
                &b"a"[..],
            ),
            (
                EntryHeader::file("abc123/blocker", 1, 0o644).with_owner(uid, gid),
                &b"b"[..],
            ),
            (
                EntryHeader::directory("abc123/blocker/sub", 0o755).with_owner(uid, gid),
                &b""[..],
            ),
            (
                EntryHeader::file("abc123/z.txt", 1, 0o644).with_owner(uid, gid),
                &b"z"[..],
            ),
        ]);
        let mut engine = RestoreEngine::new(&target);
        let err = engine.restore(archive).unwrap_err();

        let blocked = new_volume.join("blocker/sub");
        assert!(matches!(err, BackupError::Filesystem { ref path, .. } if *path == blocked));
        assert_eq!(engine.state(), RestoreState::Failed);
        assert_eq!(fs::read(new_volume.join("a.txt")).unwrap(), b"a");
        assert_eq!(fs::read(new_volume.join("blocker")).unwrap(), b"b");
        assert!(!new_volume.join("z.txt").exists());
    }
}
