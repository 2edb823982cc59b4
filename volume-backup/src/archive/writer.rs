//! Sequential archive writer.

use super::EntryHeader;
use crate::utils::Result;
use std::io::{self, Read, Take, Write};
use tar::{Builder, Header};

/// Appends entries to a tar stream.
///
/// Every header is stamped with the same timestamp (the start time of the
/// store operation) for mtime, atime and ctime, so repeated stores of
/// unchanged data differ at most in that value.
pub struct ArchiveWriter<W: Write> {
    builder: Builder<W>,
    timestamp: u64,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(inner: W, timestamp: u64) -> Self {
        Self {
            builder: Builder::new(inner),
            timestamp,
        }
    }

    /// Append one entry. Content past `header.size` is ignored; content
    /// shorter than `header.size` fails with `UnexpectedEof` before any
    /// padding is written.
    pub fn append<R: Read>(&mut self, header: &EntryHeader, content: R) -> Result<()> {
        let mut th = Header::new_gnu();
        th.set_entry_type(header.kind.to_tar());
        th.set_size(header.size);
        th.set_mode(header.mode);
        th.set_uid(header.uid);
        th.set_gid(header.gid);
        th.set_mtime(self.timestamp);
        if let Some(gnu) = th.as_gnu_mut() {
            gnu.set_atime(self.timestamp);
            gnu.set_ctime(self.timestamp);
        }

        let content = ExactLength {
            inner: content.take(header.size),
            remaining: header.size,
        };
        self.builder.append_data(&mut th, &header.name, content)?;
        Ok(())
    }

    /// Write the end-of-archive marker and return the underlying stream.
    pub fn finish(self) -> Result<W> {
        let mut inner = self.builder.into_inner()?;
        inner.flush()?;
        Ok(inner)
    }
}

/// Yields exactly `remaining` bytes or fails.
struct ExactLength<R> {
    inner: Take<R>,
    remaining: u64,
}

impl<R: Read> Read for ExactLength<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && self.remaining > 0 && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("content is {} bytes shorter than its header", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
