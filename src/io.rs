//! Block-addressed I/O against the image file
//!
//! Dictionary payloads live in fixed 4 KiB blocks of the final image. Writes
//! are padded to the block boundary so a partially filled tail block never
//! exposes stale bytes.

use crate::dict::BlockAddr;
use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Fixed storage block size in bytes
pub const BLOCK_SIZE: u64 = 4096;

/// Byte offset of a block address
pub fn blk_to_addr(blk: BlockAddr) -> u64 {
    blk * BLOCK_SIZE
}

/// Round a byte count up to a whole number of blocks
pub fn round_up_to_block(bytes: u64) -> u64 {
    (bytes + BLOCK_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE
}

/// Disk-backed image storage for dictionary payloads
pub struct ImageFile {
    file: File,
    path: PathBuf,
}

impl ImageFile {
    /// Create a new image file, truncating any existing one
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(ImageFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open an existing image file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        Ok(ImageFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Write `data` starting at block `blk`, zero-padded to the block boundary
    pub fn write_block_data(&mut self, blk: BlockAddr, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(blk_to_addr(blk)))?;
        self.file.write_all(data)?;

        let padded = round_up_to_block(data.len() as u64);
        let pad = padded - data.len() as u64;
        if pad > 0 {
            self.file.write_all(&vec![0u8; pad as usize])?;
        }
        Ok(())
    }

    /// Read `len` bytes starting at block `blk`
    pub fn read_block_data(&mut self, blk: BlockAddr, len: usize) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(blk_to_addr(blk)))?;
        let mut buffer = vec![0u8; len];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Fill `buf` from `reader`, tolerating short reads; returns bytes filled
///
/// Stops early only at end of input.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
