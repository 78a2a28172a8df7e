//! Dictionary subsystem configuration
//!
//! Loaded by the outer image builder's config layer; this crate never parses
//! files or command-line flags itself.

use crate::io::BLOCK_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for dictionary generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictConfig {
    /// Dictionary segment size in blocks
    ///
    /// Each segment of a large file trains its own dictionary; small files
    /// share one dictionary per segment-sized sample batch.
    pub seg_blocks: u32,

    /// Dictionary capacity in bytes (upper bound on trained size)
    pub capacity: usize,

    /// Path of the side persistence file written at teardown
    pub side_file: PathBuf,
}

impl Default for DictConfig {
    fn default() -> Self {
        DictConfig {
            // 1 MiB segments at 4 KiB blocks
            seg_blocks: 256,
            capacity: 64 * 1024,
            side_file: PathBuf::from("dict-buffer"),
        }
    }
}

impl DictConfig {
    /// Segment size in bytes
    pub fn segment_size(&self) -> u64 {
        self.seg_blocks as u64 * BLOCK_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DictConfig::default();
        assert_eq!(config.seg_blocks, 256);
        assert_eq!(config.capacity, 64 * 1024);
        assert_eq!(config.segment_size(), 1024 * 1024);
    }

    #[test]
    fn test_segment_size_follows_block_count() {
        let config = DictConfig {
            seg_blocks: 16,
            ..Default::default()
        };
        assert_eq!(config.segment_size(), 16 * BLOCK_SIZE);
    }
}
