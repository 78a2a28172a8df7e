//! Dictionary data model
//!
//! A [`DictionaryItem`] owns one trained dictionary and its storage state.
//! Per-segment items are exclusively owned by the generation call that
//! produced them; dictionaries shared across small files are handed out as
//! [`SharedDict`] clones whose strong count is the reference count.

use crate::error::{DictError, Result};
use crate::io::round_up_to_block;
use parking_lot::Mutex;
use std::sync::Arc;

/// Identifier of a fixed-size storage block in the final image
pub type BlockAddr = u64;

/// One trained dictionary and its storage state
///
/// `block_addr` is write-once: it is assigned the first time the dictionary's
/// bytes are durably written and never changes afterwards. A second
/// [`place`](DictionaryItem::place) is a programming error and fails loudly.
#[derive(Debug, Default)]
pub struct DictionaryItem {
    buffer: Option<Vec<u8>>,
    dict_size: u64,
    block_addr: Option<BlockAddr>,
}

impl DictionaryItem {
    /// An item with no trained bytes (training failed or not yet run)
    pub fn untrained() -> Self {
        DictionaryItem::default()
    }

    /// An item holding freshly trained bytes
    ///
    /// The stored size is rounded up to the block size, since storage is
    /// allocated in block units.
    pub fn trained(buffer: Vec<u8>) -> Self {
        let dict_size = round_up_to_block(buffer.len() as u64);
        DictionaryItem {
            buffer: Some(buffer),
            dict_size,
            block_addr: None,
        }
    }

    /// Install trained bytes into an existing (shared) item
    pub fn set_trained(&mut self, buffer: Vec<u8>) {
        self.dict_size = round_up_to_block(buffer.len() as u64);
        self.buffer = Some(buffer);
    }

    /// Raw trained bytes, if still resident
    pub fn buffer(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    /// Drop the trained bytes (training failure or post-flush release)
    pub fn release_buffer(&mut self) {
        self.buffer = None;
    }

    /// Trained size rounded up to the block size
    pub fn dict_size(&self) -> u64 {
        self.dict_size
    }

    /// Block address, if the bytes have been durably written
    pub fn block_addr(&self) -> Option<BlockAddr> {
        self.block_addr
    }

    /// Whether the dictionary bytes have been written to the image
    pub fn is_placed(&self) -> bool {
        self.block_addr.is_some()
    }

    /// Record the block address of the written bytes, exactly once
    ///
    /// # Errors
    ///
    /// Returns [`DictError::AlreadyPlaced`] if an address was already
    /// assigned; the existing address is left unchanged.
    pub fn place(&mut self, addr: BlockAddr) -> Result<()> {
        if let Some(existing) = self.block_addr {
            return Err(DictError::AlreadyPlaced(existing));
        }
        self.block_addr = Some(addr);
        Ok(())
    }
}

/// A dictionary shared by many small-file records
///
/// The strong count of the `Arc` is the reference count; the item is
/// destroyed exactly once, when the last referencing record drops its clone.
pub type SharedDict = Arc<Mutex<DictionaryItem>>;

/// Allocate a fresh shared slot for a batch dictionary
pub fn shared(item: DictionaryItem) -> SharedDict {
    Arc::new(Mutex::new(item))
}

/// Ordered block addresses, one slot per segment of a file
///
/// `None` entries are explicit: that segment compresses without a dictionary.
/// Slots are never silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentIndex {
    entries: Vec<Option<BlockAddr>>,
}

impl SegmentIndex {
    /// An index with `segments` unset slots
    pub fn with_segments(segments: usize) -> Self {
        SegmentIndex {
            entries: vec![None; segments],
        }
    }

    /// Assign the dictionary address for segment `idx`
    pub fn set(&mut self, idx: usize, addr: BlockAddr) {
        self.entries[idx] = Some(addr);
    }

    /// Dictionary address for segment `idx`, if one was placed
    pub fn get(&self, idx: usize) -> Option<BlockAddr> {
        self.entries.get(idx).copied().flatten()
    }

    /// Number of segment slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no slots
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of segments that ended up with a dictionary
    pub fn assigned(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Iterate slots in segment order
    pub fn iter(&self) -> impl Iterator<Item = Option<BlockAddr>> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BLOCK_SIZE;

    #[test]
    fn test_place_is_write_once() {
        let mut item = DictionaryItem::trained(vec![0xAB; 100]);
        item.place(7).unwrap();
        assert_eq!(item.block_addr(), Some(7));

        // Second placement fails loudly and leaves the address unchanged
        let err = item.place(9).unwrap_err();
        assert!(matches!(err, DictError::AlreadyPlaced(7)));
        assert_eq!(item.block_addr(), Some(7));
    }

    #[test]
    fn test_trained_size_rounds_to_block() {
        let item = DictionaryItem::trained(vec![0; 100]);
        assert_eq!(item.dict_size(), BLOCK_SIZE);

        let item = DictionaryItem::trained(vec![0; BLOCK_SIZE as usize + 1]);
        assert_eq!(item.dict_size(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn test_untrained_has_no_buffer() {
        let item = DictionaryItem::untrained();
        assert!(item.buffer().is_none());
        assert!(!item.is_placed());
    }

    #[test]
    fn test_release_buffer() {
        let mut item = DictionaryItem::trained(vec![1, 2, 3]);
        assert!(item.buffer().is_some());
        item.release_buffer();
        assert!(item.buffer().is_none());
    }

    #[test]
    fn test_segment_index_explicit_unset() {
        let mut index = SegmentIndex::with_segments(3);
        assert_eq!(index.len(), 3);
        assert_eq!(index.assigned(), 0);

        index.set(1, 42);
        assert_eq!(index.get(0), None);
        assert_eq!(index.get(1), Some(42));
        assert_eq!(index.get(2), None);
        assert_eq!(index.assigned(), 1);
    }

    #[test]
    fn test_shared_strong_count_is_refcount() {
        let dict = shared(DictionaryItem::trained(vec![0; 10]));
        let a = Arc::clone(&dict);
        let b = Arc::clone(&dict);
        assert_eq!(Arc::strong_count(&dict), 3);
        drop(a);
        drop(b);
        assert_eq!(Arc::strong_count(&dict), 1);
    }
}
