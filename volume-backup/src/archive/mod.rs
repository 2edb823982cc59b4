//! Archive stream of named entries.
//!
//! An archive is an uncompressed tar stream: one descriptor entry holding the
//! container's JSON plus one directory or file entry per walked volume path.

pub mod reader;
pub mod writer;

pub use reader::{ArchiveEntry, ArchivePass, ArchiveReader};
pub use writer::ArchiveWriter;

/// Name of the entry carrying the data container's descriptor
pub const VOLUME_CONTAINER_FILENAME: &str = "volume-container.json";

/// Kind of an archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    fn from_tar(entry_type: tar::EntryType) -> Option<Self> {
        match entry_type {
            tar::EntryType::Regular | tar::EntryType::Continuous => Some(EntryKind::File),
            tar::EntryType::Directory => Some(EntryKind::Directory),
            _ => None,
        }
    }

    fn to_tar(self) -> tar::EntryType {
        match self {
            EntryKind::File => tar::EntryType::Regular,
            EntryKind::Directory => tar::EntryType::Directory,
        }
    }
}

/// Header fields of one entry. Timestamps are owned by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Slash-delimited entry name
    pub name: String,
    pub kind: EntryKind,
    /// Content length in bytes (0 for directories)
    pub size: u64,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
}

impl EntryHeader {
    pub fn file(name: impl Into<String>, size: u64, mode: u32) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
            mode,
            uid: 0,
            gid: 0,
        }
    }

    pub fn directory(name: impl Into<String>, mode: u32) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
            mode,
            uid: 0,
            gid: 0,
        }
    }

    pub fn with_owner(mut self, uid: u64, gid: u64) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}
