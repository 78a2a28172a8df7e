//! Per-file segment dictionary generation
//!
//! A large file is split into fixed-size segments and one dictionary is
//! trained per segment. A registered small file skips training entirely and
//! reuses the shared dictionary its batch produced, writing it to the image
//! on first use.
//!
//! Training or write failure for one segment leaves that segment's index
//! entry unset and moves on; compression for that segment falls back to
//! dictionary-less mode.

use crate::config::DictConfig;
use crate::dict::{DictionaryItem, SegmentIndex};
use crate::error::Result;
use crate::io::{read_full, round_up_to_block};
use crate::registry::SmallFileRegistry;
use crate::space::{Extent, ImageSpace, SpaceKind};
use crate::training;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

/// One source file to generate segment dictionaries for
///
/// The open handle is positioned at the start and is handed back rewound, so
/// the caller can reuse it for content compression.
pub struct SourceFile<'a> {
    pub ino: u64,
    pub path: &'a Path,
    pub size: u64,
    pub file: &'a mut File,
}

/// Result of one generation call
pub struct SegmentDicts {
    /// Segments actually processed
    pub segments: usize,
    /// Dictionary block address per segment; unset entries are explicit
    pub index: SegmentIndex,
    /// Per-segment dictionary items (empty on the shared fast path)
    pub items: Vec<DictionaryItem>,
    /// The reservation holding the written dictionary payloads
    pub extent: Extent,
}

/// Generate dictionaries for every segment of `src`
///
/// Small files already batched by the shared pool reuse their batch
/// dictionary; everything else trains one dictionary per segment and writes
/// it into newly reserved block space.
pub fn generate(
    src: SourceFile<'_>,
    cfg: &DictConfig,
    registry: &SmallFileRegistry,
    space: &ImageSpace,
) -> Result<SegmentDicts> {
    let SourceFile {
        ino,
        path,
        size,
        file,
    } = src;
    let segment_size = cfg.segment_size();
    let segs = ((size + segment_size - 1) / segment_size) as usize;
    let mut extent = space.reserve(SpaceKind::Data);

    debug!("generating dictionary segments for {}", path.display());

    // Small-file fast path: reuse the shared dictionary trained by the pool.
    if size < segment_size {
        if let Some(dict) = registry.lookup(ino).and_then(|r| r.dict()) {
            let mut index = SegmentIndex::with_segments(segs);
            let mut item = dict.lock();

            if !item.is_placed() && item.buffer().is_some() {
                let addr = extent.tail_block()?;
                let wrote = match item.buffer() {
                    Some(buffer) => match extent.write_at(addr, buffer) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(
                                "shared dictionary write failed for {}: {}",
                                path.display(),
                                e
                            );
                            false
                        }
                    },
                    None => false,
                };
                if wrote {
                    extent.grow(item.dict_size())?;
                    item.place(addr)?;
                }
            }

            if segs > 0 {
                if let Some(addr) = item.block_addr() {
                    index.set(0, addr);
                }
            }
            drop(item);

            file.seek(SeekFrom::Start(0))?;
            return Ok(SegmentDicts {
                segments: segs,
                index,
                items: Vec::new(),
                extent,
            });
        }
    }

    let mut sample = vec![0u8; segment_size as usize];
    let mut items = Vec::with_capacity(segs);
    let mut index = SegmentIndex::with_segments(segs);
    let mut processed = 0;

    for i in 0..segs {
        let insize = read_full(&mut *file, &mut sample)?;
        if insize == 0 {
            break;
        }
        processed = i + 1;

        let bytes = match training::train_segment(&sample[..insize], cfg.capacity) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(
                    "training skipped segment {} of {}: {}",
                    i,
                    path.display(),
                    e
                );
                items.push(DictionaryItem::untrained());
                continue;
            }
        };

        let dict_size = round_up_to_block(bytes.len() as u64);
        let addr = extent.tail_block()?;
        if let Err(e) = extent.write_at(addr, &bytes) {
            warn!(
                "dictionary write failed for segment {} of {}: {}",
                i,
                path.display(),
                e
            );
            items.push(DictionaryItem::untrained());
            continue;
        }
        extent.grow(dict_size)?;

        debug!(
            "generated {} bytes for dictionary segment {} @ block {}",
            bytes.len(),
            i,
            addr
        );

        let mut item = DictionaryItem::trained(bytes);
        item.place(addr)?;
        index.set(i, addr);
        items.push(item);
    }

    for (i, entry) in index.iter().enumerate() {
        debug!("segment {} dictionary block: {:?}", i, entry);
    }

    // The handle is shared with the content compressor; rewind it.
    file.seek(SeekFrom::Start(0))?;

    Ok(SegmentDicts {
        segments: processed,
        index,
        items,
        extent,
    })
}
