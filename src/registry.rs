//! Small-file registry
//!
//! The image builder registers every file too small to deserve its own
//! dictionary before dictionary generation starts. The registry is an
//! explicit object passed to the pool builder, the segment generator, and
//! the lifecycle manager; it is created alongside the build and drained at
//! teardown.

use crate::dict::SharedDict;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One file that participates in shared-dictionary batching
#[derive(Debug)]
pub struct SmallFileRecord {
    ino: u64,
    src_path: PathBuf,
    size: u64,
    dict: Option<SharedDict>,
}

impl SmallFileRecord {
    /// Source inode number
    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// Source path the file's content is read from
    pub fn src_path(&self) -> &Path {
        &self.src_path
    }

    /// Declared size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The shared dictionary this record references, if batched
    pub fn dict(&self) -> Option<&SharedDict> {
        self.dict.as_ref()
    }

    /// Point this record at a batch dictionary, taking a counted reference
    pub(crate) fn attach(&mut self, dict: &SharedDict) {
        self.dict = Some(Arc::clone(dict));
    }
}

/// Ordered collection of small-file candidates
#[derive(Debug, Default)]
pub struct SmallFileRegistry {
    records: Vec<SmallFileRecord>,
}

impl SmallFileRegistry {
    pub fn new() -> Self {
        SmallFileRegistry::default()
    }

    /// Register a candidate small file, preserving registration order
    pub fn register(&mut self, ino: u64, src_path: impl Into<PathBuf>, size: u64) {
        self.records.push(SmallFileRecord {
            ino,
            src_path: src_path.into(),
            size,
            dict: None,
        });
    }

    /// Find a record by source inode number
    pub fn lookup(&self, ino: u64) -> Option<&SmallFileRecord> {
        self.records.iter().find(|r| r.ino == ino)
    }

    /// Number of registered files
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in registration order
    pub fn records(&self) -> &[SmallFileRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [SmallFileRecord] {
        &mut self.records
    }

    /// Remove and return every record, in registration order
    pub(crate) fn drain(&mut self) -> Vec<SmallFileRecord> {
        std::mem::take(&mut self.records)
    }
}
