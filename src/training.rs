//! Dictionary training adapter
//!
//! Wraps the zstd dictionary builder (`ZDICT` under the hood). Training is a
//! black box: given a sample buffer partitioned by boundaries and a capacity,
//! it either returns dictionary bytes or fails. Failure is a legitimate
//! outcome for small or overly uniform sample sets and is recoverable:
//! callers fall back to dictionary-less compression.

use thiserror::Error;

/// Number of equal sub-samples a contiguous buffer is split into for training
pub const NUM_SUBSAMPLES: usize = 32;

/// The training algorithm rejected the sample set
///
/// Recoverable: the affected segment or batch simply gets no dictionary.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct TrainingError {
    reason: String,
}

impl TrainingError {
    fn new(reason: impl Into<String>) -> Self {
        TrainingError {
            reason: reason.into(),
        }
    }
}

/// Boundaries splitting `len` bytes into [`NUM_SUBSAMPLES`] equal sub-samples
///
/// The trailing `len % NUM_SUBSAMPLES` bytes are not covered, matching the
/// equal-size partition the trainer expects.
pub fn equal_subsamples(len: usize) -> Vec<usize> {
    vec![len / NUM_SUBSAMPLES; NUM_SUBSAMPLES]
}

/// Train a dictionary of at most `capacity` bytes from `samples`
///
/// `boundaries` partitions the front of `samples` into sub-samples; bytes
/// past the covered range are ignored.
pub fn train(
    samples: &[u8],
    boundaries: &[usize],
    capacity: usize,
) -> std::result::Result<Vec<u8>, TrainingError> {
    let covered: usize = boundaries.iter().sum();
    if covered == 0 {
        return Err(TrainingError::new("sample set is empty"));
    }
    if covered > samples.len() {
        return Err(TrainingError::new(format!(
            "boundaries cover {} bytes but only {} supplied",
            covered,
            samples.len()
        )));
    }

    zstd::dict::from_continuous(&samples[..covered], boundaries, capacity)
        .map_err(|e| TrainingError::new(e.to_string()))
}

/// Train over one contiguous segment using the 32-subsample convention
pub fn train_segment(
    segment: &[u8],
    capacity: usize,
) -> std::result::Result<Vec<u8>, TrainingError> {
    train(segment, &equal_subsamples(segment.len()), capacity)
}
