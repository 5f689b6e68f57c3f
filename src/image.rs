//! Random-access read/write over the target binary.
//!
//! [`BinaryImage`] owns the one file handle a patch session uses. Every
//! read and write seeks to an absolute offset first; nothing here assumes
//! a cursor position left over from an earlier call. Writes are
//! bounds-checked against the file size captured at open time, so a patch
//! can overwrite bytes but never grow the file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// An exclusive read-write handle to the binary being patched.
///
/// The handle is released exactly once: either by [`BinaryImage::close`]
/// (which also flushes to disk) or by `Drop` on an early-error path.
#[derive(Debug)]
pub struct BinaryImage {
    file: File,
    size: u64,
}

impl BinaryImage {
    /// Open an existing binary read-write. Never creates or truncates.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.display().to_string(),
                source,
            })?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }

    /// Size of the underlying file in bytes, as captured at open time.
    pub fn len(&self) -> u64 {
        self.size
    }

    /// Whether the underlying file is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Read exactly 4 bytes at an absolute offset.
    pub fn read_word(&mut self, offset: u64) -> Result<[u8; 4]> {
        let mut word = [0u8; 4];
        self.read_bytes(offset, &mut word)?;
        Ok(word)
    }

    /// Fill `buf` from an absolute offset.
    pub fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Overwrite exactly `bytes.len()` bytes at an absolute offset.
    ///
    /// Rejected with [`Error::OutOfBounds`] if the span would extend past
    /// the end of the file; a patch must never change the file's length.
    pub fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .ok_or(Error::OutOfBounds {
                offset,
                len: bytes.len(),
                size: self.size,
            })?;
        if end > self.size {
            return Err(Error::OutOfBounds {
                offset,
                len: bytes.len(),
                size: self.size,
            });
        }

        debug!("writing {} bytes at 0x{:X}", bytes.len(), offset);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Flush all writes to disk and release the handle.
    pub fn close(self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
