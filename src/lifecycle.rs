//! Shared dictionary teardown
//!
//! Runs once when the image build finishes: first every still-resident
//! shared dictionary is appended to the side persistence file (one entry per
//! dictionary, not per referencing file), then every small-file record is
//! released. A dictionary's buffer is freed exactly once, when its last
//! referencing record drops.
//!
//! Side-file entries are framed (magic, originating inode, length, crc32)
//! so a later run can locate and verify each dictionary instead of guessing
//! at boundaries in a raw byte stream.

use crate::config::DictConfig;
use crate::error::{DictError, Result};
use crate::registry::SmallFileRegistry;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const SIDE_MAGIC: &[u8; 4] = b"RDIC";
const SIDE_HEADER_LEN: usize = 24;

/// Append-only persistence file of trained dictionaries
pub struct SideFile {
    file: File,
}

impl SideFile {
    /// Open (or create) the side file for appending
    pub fn append_to<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(SideFile { file })
    }

    /// Append one dictionary entry
    pub fn append(&mut self, ino: u64, bytes: &[u8]) -> Result<()> {
        self.file.write_all(SIDE_MAGIC)?;
        self.file.write_all(&ino.to_le_bytes())?;
        self.file.write_all(&(bytes.len() as u64).to_le_bytes())?;
        self.file.write_all(&crc32fast::hash(bytes).to_le_bytes())?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Load every entry, verifying framing and checksums
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<SideEntry>> {
        let data = std::fs::read(path)?;
        let mut entries = Vec::new();
        let mut off = 0;

        while off < data.len() {
            if data.len() - off < SIDE_HEADER_LEN {
                return Err(DictError::SideFile(format!(
                    "truncated entry header at offset {}",
                    off
                )));
            }
            if &data[off..off + 4] != SIDE_MAGIC {
                return Err(DictError::SideFile(format!(
                    "bad entry magic at offset {}",
                    off
                )));
            }

            let ino = read_u64(&data[off + 4..off + 12]);
            let len = read_u64(&data[off + 12..off + 20]) as usize;
            let crc = read_u32(&data[off + 20..off + 24]);

            let start = off + SIDE_HEADER_LEN;
            if data.len() - start < len {
                return Err(DictError::SideFile(format!(
                    "truncated dictionary bytes at offset {}",
                    start
                )));
            }
            let bytes = data[start..start + len].to_vec();
            if crc32fast::hash(&bytes) != crc {
                return Err(DictError::SideFile(format!(
                    "checksum mismatch for entry at offset {}",
                    off
                )));
            }

            entries.push(SideEntry { ino, bytes });
            off = start + len;
        }

        Ok(entries)
    }
}

fn read_u64(src: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(src);
    u64::from_le_bytes(buf)
}

fn read_u32(src: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(src);
    u32::from_le_bytes(buf)
}

/// One persisted dictionary: originating inode and raw trained bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEntry {
    pub ino: u64,
    pub bytes: Vec<u8>,
}

/// Accounting returned by [`teardown`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TeardownStats {
    /// Dictionaries appended to the side file
    pub persisted: usize,
    /// Records removed from the registry
    pub released: usize,
    /// Dictionaries whose last reference dropped
    pub freed: usize,
}

/// Persist still-resident dictionaries and release every registry record
///
/// Persisting happens first, in registry traversal order, deduplicated by
/// dictionary identity; the recorded inode is the first referencing file's.
/// Releasing then drops each record's counted reference; a dictionary is
/// freed exactly once, with its last reference, regardless of order.
pub fn teardown(registry: &mut SmallFileRegistry, cfg: &DictConfig) -> Result<TeardownStats> {
    let mut stats = TeardownStats::default();

    let mut side = SideFile::append_to(&cfg.side_file)?;
    let mut seen: HashSet<usize> = HashSet::new();
    for record in registry.records() {
        if let Some(dict) = record.dict() {
            if !seen.insert(Arc::as_ptr(dict) as usize) {
                continue;
            }
            let item = dict.lock();
            if let Some(buffer) = item.buffer() {
                side.append(record.ino(), buffer)?;
                stats.persisted += 1;
            }
        }
    }

    for record in registry.drain() {
        if let Some(dict) = record.dict() {
            if Arc::strong_count(dict) == 1 {
                let item = dict.lock();
                debug!(
                    "releasing last reference to a shared dictionary ({} bytes placed at {:?})",
                    item.dict_size(),
                    item.block_addr()
                );
                stats.freed += 1;
            }
        }
        stats.released += 1;
    }

    debug!(
        "teardown: {} dictionaries persisted, {} records released, {} freed",
        stats.persisted, stats.released, stats.freed
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::{shared, DictionaryItem};

    #[test]
    fn test_side_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict-buffer");

        let mut side = SideFile::append_to(&path).unwrap();
        side.append(42, &[1, 2, 3, 4]).unwrap();
        side.append(43, &[9; 5000]).unwrap();
        drop(side);

        let entries = SideFile::load(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], SideEntry { ino: 42, bytes: vec![1, 2, 3, 4] });
        assert_eq!(entries[1].ino, 43);
        assert_eq!(entries[1].bytes.len(), 5000);
    }

    #[test]
    fn test_side_file_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict-buffer");

        let mut side = SideFile::append_to(&path).unwrap();
        side.append(1, &[7; 100]).unwrap();
        drop(side);

        let mut data = std::fs::read(&path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        std::fs::write(&path, &data).unwrap();

        let err = SideFile::load(&path).unwrap_err();
        assert!(matches!(err, DictError::SideFile(_)));
    }

    #[test]
    fn test_side_file_detects_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict-buffer");

        let mut side = SideFile::append_to(&path).unwrap();
        side.append(1, &[7; 100]).unwrap();
        drop(side);

        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 10]).unwrap();

        assert!(SideFile::load(&path).is_err());
    }

    #[test]
    fn test_teardown_persists_once_per_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DictConfig {
            side_file: dir.path().join("dict-buffer"),
            ..Default::default()
        };

        let mut registry = SmallFileRegistry::new();
        registry.register(1, "/src/a", 100);
        registry.register(2, "/src/b", 100);
        registry.register(3, "/src/c", 100);

        // Two records share one dictionary, the third has its own.
        let first = shared(DictionaryItem::trained(vec![0xAA; 300]));
        let second = shared(DictionaryItem::trained(vec![0xBB; 200]));
        registry.records_mut()[0].attach(&first);
        registry.records_mut()[1].attach(&first);
        registry.records_mut()[2].attach(&second);
        drop(first);
        drop(second);

        let stats = teardown(&mut registry, &cfg).unwrap();
        assert_eq!(stats.persisted, 2);
        assert_eq!(stats.released, 3);
        assert_eq!(stats.freed, 2);
        assert!(registry.is_empty());

        let entries = SideFile::load(&cfg.side_file).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].ino, 1);
        assert_eq!(entries[0].bytes, vec![0xAA; 300]);
        assert_eq!(entries[1].ino, 3);
    }

    #[test]
    fn test_teardown_skips_bufferless_dictionaries() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DictConfig {
            side_file: dir.path().join("dict-buffer"),
            ..Default::default()
        };

        let mut registry = SmallFileRegistry::new();
        registry.register(1, "/src/a", 100);
        let failed = shared(DictionaryItem::untrained());
        registry.records_mut()[0].attach(&failed);
        drop(failed);

        let stats = teardown(&mut registry, &cfg).unwrap();
        assert_eq!(stats.persisted, 0);
        assert_eq!(stats.released, 1);
        assert!(SideFile::load(&cfg.side_file).unwrap().is_empty());
    }

    #[test]
    fn test_dictionary_freed_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DictConfig {
            side_file: dir.path().join("dict-buffer"),
            ..Default::default()
        };

        let mut registry = SmallFileRegistry::new();
        registry.register(1, "/src/a", 100);
        registry.register(2, "/src/b", 100);

        let dict = shared(DictionaryItem::trained(vec![1; 64]));
        registry.records_mut()[0].attach(&dict);
        registry.records_mut()[1].attach(&dict);
        let observer = Arc::downgrade(&dict);
        drop(dict);

        let stats = teardown(&mut registry, &cfg).unwrap();
        assert_eq!(stats.freed, 1);
        assert!(observer.upgrade().is_none());
    }
}
