//! Shared dictionary pool
//!
//! Small files do not each pay for an individually trained dictionary.
//! Instead the registry is walked once in registration order, each file's
//! content is accumulated into a shared sample buffer up to the segment-size
//! budget, and one dictionary is trained per batch. Every file in a batch
//! references the same dictionary; the association is made by batch
//! membership before training completes.

use crate::config::DictConfig;
use crate::dict::{shared, DictionaryItem, SharedDict};
use crate::error::{DictError, Result};
use crate::io::read_full;
use crate::registry::SmallFileRegistry;
use crate::training::{equal_subsamples, train};
use std::fs::File;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Train shared dictionaries for every registered small file
///
/// A batch closes when the accumulated samples reach the segment-size budget
/// or the registry is exhausted, whichever comes first; a fresh batch opens
/// for any remaining files. Returns the number of batches trained.
///
/// # Errors
///
/// Training failure aborts the call with [`DictError::Training`]; every file
/// in the failed batch already references the batch's (now bufferless)
/// dictionary and must be treated as dictionary-less. Failure to open or
/// read a source file is fatal to the whole call.
pub fn build_shared_dicts(registry: &mut SmallFileRegistry, cfg: &DictConfig) -> Result<usize> {
    let segment_size = cfg.segment_size() as usize;
    let total = registry.len();
    if total == 0 {
        return Ok(0);
    }

    let mut sample = vec![0u8; segment_size];
    let mut accumulated = 0usize;
    let mut batch: Option<SharedDict> = None;
    let mut batch_files = 0usize;
    let mut batches = 0usize;

    for idx in 0..total {
        let last = idx + 1 == total;

        // A new batch opens lazily with the first file that lands in it.
        let dict = match &batch {
            Some(dict) => Arc::clone(dict),
            None => {
                let dict = shared(DictionaryItem::untrained());
                batch = Some(Arc::clone(&dict));
                dict
            }
        };

        {
            let record = &mut registry.records_mut()[idx];
            let mut file = File::open(record.src_path()).map_err(|e| {
                error!(
                    "failed to open {} for shared dictionary sampling: {}",
                    record.src_path().display(),
                    e
                );
                e
            })?;

            let got = read_full(&mut file, &mut sample[accumulated..]).map_err(|e| {
                error!(
                    "failed to read {} for shared dictionary sampling: {}",
                    record.src_path().display(),
                    e
                );
                e
            })?;
            accumulated += got;

            record.attach(&dict);
            batch_files += 1;
        }

        if accumulated >= segment_size || last {
            let boundaries = equal_subsamples(accumulated);
            match train(&sample[..accumulated], &boundaries, cfg.capacity) {
                Ok(bytes) => {
                    debug!(
                        "trained shared dictionary: {} bytes from {} files ({} sample bytes)",
                        bytes.len(),
                        batch_files,
                        accumulated
                    );
                    dict.lock().set_trained(bytes);
                    batches += 1;
                    batch = None;
                    batch_files = 0;
                    accumulated = 0;
                }
                Err(e) => {
                    // Every file in this batch already holds a reference to
                    // the item; releasing the buffer marks them all
                    // dictionary-less.
                    dict.lock().release_buffer();
                    warn!(
                        "shared dictionary training failed for a {}-file batch: {}",
                        batch_files, e
                    );
                    return Err(DictError::Training(e));
                }
            }
        }
    }

    Ok(batches)
}
