//! Compression-dictionary subsystem for read-only filesystem image builders
//!
//! When an image builder packs files with segment-based compression, each
//! segment can reference a trained dictionary that primes the compressor
//! with common patterns. This crate decides, per file, whether and how that
//! dictionary is produced:
//!
//! - **Large files** train one dictionary per fixed-size segment
//!   ([`segment::generate`]), each written into reserved block space and
//!   addressed by a [`SegmentIndex`].
//! - **Small files** are registered up front ([`SmallFileRegistry`]) and
//!   batched by the shared pool ([`pool::build_shared_dicts`]): one
//!   dictionary is trained per segment-sized sample batch and shared,
//!   reference-counted, by every file in the batch.
//! - **Teardown** ([`lifecycle::teardown`]) persists still-resident
//!   dictionaries to a side file for reuse across runs and releases every
//!   record, freeing each dictionary exactly once.
//!
//! Training is delegated to the zstd dictionary builder and may legitimately
//! fail on small or uniform samples; affected segments simply compress
//! without a dictionary. Storage placement is write-once: a dictionary's
//! block address never changes after its bytes are written.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rofs_dict::{pool, segment, lifecycle, DictConfig, ImageSpace, SmallFileRegistry};
//! use std::fs::File;
//! use std::path::Path;
//!
//! let cfg = DictConfig::default();
//! let space = ImageSpace::create("image.rofs").unwrap();
//!
//! // Register small files, then train their shared dictionaries in one pass.
//! let mut registry = SmallFileRegistry::new();
//! registry.register(1001, "/src/etc/host.conf", 92);
//! registry.register(1002, "/src/etc/services", 12813);
//! pool::build_shared_dicts(&mut registry, &cfg).unwrap();
//!
//! // Generate per-segment dictionaries while packing each file.
//! let path = Path::new("/src/usr/lib/libbig.so");
//! let mut file = File::open(path).unwrap();
//! let size = file.metadata().unwrap().len();
//! let dicts = segment::generate(
//!     segment::SourceFile { ino: 2001, path, size, file: &mut file },
//!     &cfg,
//!     &registry,
//!     &space,
//! )
//! .unwrap();
//! assert_eq!(dicts.index.len() as u64, (size + cfg.segment_size() - 1) / cfg.segment_size());
//!
//! // At the end of the build, persist and release.
//! lifecycle::teardown(&mut registry, &cfg).unwrap();
//! ```

pub mod config;
pub mod dict;
pub mod error;
pub mod io;
pub mod lifecycle;
pub mod pool;
pub mod registry;
pub mod segment;
pub mod space;
pub mod training;

// Re-export commonly used types
pub use config::DictConfig;
pub use dict::{shared, BlockAddr, DictionaryItem, SegmentIndex, SharedDict};
pub use error::{DictError, Result};
pub use io::{blk_to_addr, round_up_to_block, ImageFile, BLOCK_SIZE};
pub use lifecycle::{SideEntry, SideFile, TeardownStats};
pub use registry::{SmallFileRecord, SmallFileRegistry};
pub use segment::{SegmentDicts, SourceFile};
pub use space::{Extent, ImageSpace, SpaceKind};
pub use training::{TrainingError, NUM_SUBSAMPLES};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
