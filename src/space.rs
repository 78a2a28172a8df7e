//! Block space reservation for dictionary payloads
//!
//! Dictionary bytes are written before the final image layout is fixed, so
//! the generator works against a reservation handle: reserve a zero-length
//! extent, learn its materialized tail address, write, then grow the extent
//! by the rounded payload size. The image builder's allocator ultimately owns
//! placement; [`ImageSpace`] is the bump-at-tail implementation used here.
//!
//! A handle is exclusively owned by the generation call that requested it and
//! must not be reused across calls.

use crate::dict::BlockAddr;
use crate::error::{DictError, Result};
use crate::io::{ImageFile, BLOCK_SIZE};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// What a reservation holds; mirrors the image builder's block accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    /// Dictionary payload blocks interleaved with file data
    Data,
    /// Builder metadata blocks
    Meta,
}

struct SpaceInner {
    file: ImageFile,
    next_block: BlockAddr,
}

/// Bump allocator over the tail of the image file
pub struct ImageSpace {
    inner: Arc<Mutex<SpaceInner>>,
}

impl ImageSpace {
    /// Create a fresh image at `path`, allocating from block 0
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(ImageSpace::with_file(ImageFile::create(path)?))
    }

    /// Wrap an already-open image file
    pub fn with_file(file: ImageFile) -> Self {
        ImageSpace {
            inner: Arc::new(Mutex::new(SpaceInner {
                file,
                next_block: 0,
            })),
        }
    }

    /// Reserve a zero-length extent of the given kind
    ///
    /// The extent's base address is unknown until first materialized.
    pub fn reserve(&self, kind: SpaceKind) -> Extent {
        Extent {
            inner: Arc::clone(&self.inner),
            kind,
            base: None,
            blocks: 0,
        }
    }

    /// First block not yet handed out
    pub fn next_block(&self) -> BlockAddr {
        self.inner.lock().next_block
    }

    /// Sync the underlying image file
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().file.sync()
    }

    /// Read back `len` bytes from block `blk`
    pub fn read_block_data(&self, blk: BlockAddr, len: usize) -> Result<Vec<u8>> {
        self.inner.lock().file.read_block_data(blk, len)
    }
}

/// Reserved-but-unmaterialized block range in the eventual image
///
/// The analog of a buffer head: writes land at the current tail, then
/// [`grow`](Extent::grow) commits the rounded size so the next write (or the
/// next allocation) starts on a fresh block.
pub struct Extent {
    inner: Arc<Mutex<SpaceInner>>,
    kind: SpaceKind,
    base: Option<BlockAddr>,
    blocks: u64,
}

impl Extent {
    /// Block address of the extent's current tail, materializing the base on
    /// first use
    pub fn tail_block(&mut self) -> Result<BlockAddr> {
        let inner = self.inner.lock();
        let base = match self.base {
            Some(base) => base,
            None => {
                let base = inner.next_block;
                self.base = Some(base);
                base
            }
        };
        Ok(base + self.blocks)
    }

    /// Extend the extent by `extra` bytes, rounded up to whole blocks
    ///
    /// Returns the number of bytes actually granted.
    ///
    /// # Errors
    ///
    /// Returns [`DictError::StaleReservation`] if another reservation has
    /// allocated past this extent's tail; handles must not be interleaved.
    pub fn grow(&mut self, extra: u64) -> Result<u64> {
        let mut inner = self.inner.lock();
        let base = match self.base {
            Some(base) => base,
            None => {
                let base = inner.next_block;
                self.base = Some(base);
                base
            }
        };
        if inner.next_block != base + self.blocks {
            return Err(DictError::StaleReservation);
        }

        let grown = (extra + BLOCK_SIZE - 1) / BLOCK_SIZE;
        inner.next_block += grown;
        self.blocks += grown;
        Ok(grown * BLOCK_SIZE)
    }

    /// Write `data` at `addr` through the underlying image file
    pub fn write_at(&mut self, addr: BlockAddr, data: &[u8]) -> Result<()> {
        self.inner.lock().file.write_block_data(addr, data)
    }

    /// Reservation kind
    pub fn kind(&self) -> SpaceKind {
        self.kind
    }

    /// Blocks committed so far
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Final byte range [start, end) covered by this extent, if materialized
    pub fn byte_range(&self) -> Option<(u64, u64)> {
        self.base
            .map(|base| (base * BLOCK_SIZE, (base + self.blocks) * BLOCK_SIZE))
    }
}
