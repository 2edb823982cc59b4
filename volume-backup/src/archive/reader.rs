//! Archive reader with rewindable passes.

use super::{EntryHeader, EntryKind};
use crate::utils::Result;
use std::io::{self, Read, Seek, SeekFrom};
use tar::Archive;
use tracing::warn;

/// Reads entries from a seekable archive stream.
///
/// Each call to [`ArchiveReader::rewind`] seeks back to the start and begins
/// a fresh forward pass.
pub struct ArchiveReader<R> {
    inner: R,
}

impl<R: Read + Seek> ArchiveReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn rewind(&mut self) -> Result<ArchivePass<'_, R>> {
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(ArchivePass {
            archive: Archive::new(&mut self.inner),
        })
    }
}

/// One forward pass over the archive
pub struct ArchivePass<'a, R: Read> {
    archive: Archive<&'a mut R>,
}

impl<'a, R: Read> ArchivePass<'a, R> {
    /// Entries in write order. Each entry's content must be read or dropped
    /// before the next one is requested.
    pub fn entries(&mut self) -> Result<Entries<'_, &'a mut R>> {
        Ok(Entries {
            inner: self.archive.entries()?,
        })
    }
}

pub struct Entries<'b, R: 'b + Read> {
    inner: tar::Entries<'b, R>,
}

impl<'b, R: Read> Iterator for Entries<'b, R> {
    type Item = Result<ArchiveEntry<'b, R>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };

            match ArchiveEntry::new(entry) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// A decoded header plus a reader over the entry's content
pub struct ArchiveEntry<'b, R: 'b + Read> {
    header: EntryHeader,
    modified: u64,
    inner: tar::Entry<'b, R>,
}

impl<'b, R: Read> ArchiveEntry<'b, R> {
    fn new(inner: tar::Entry<'b, R>) -> io::Result<Option<Self>> {
        let name = {
            let path = inner.path()?;
            path.to_string_lossy().trim_end_matches('/').to_string()
        };

        let th = inner.header();
        let Some(kind) = EntryKind::from_tar(th.entry_type()) else {
            warn!("Skipping unsupported archive entry: {}", name);
            return Ok(None);
        };

        let header = EntryHeader {
            name,
            kind,
            size: th.size()?,
            mode: th.mode()?,
            uid: th.uid()?,
            gid: th.gid()?,
        };
        let modified = th.mtime()?;

        Ok(Some(Self {
            header,
            modified,
            inner,
        }))
    }

    pub fn header(&self) -> &EntryHeader {
        &self.header
    }

    /// Modification time recorded in the header
    pub fn modified(&self) -> u64 {
        self.modified
    }
}

impl<'b, R: Read> Read for ArchiveEntry<'b, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}
