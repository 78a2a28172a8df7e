//! Property-based tests for segment accounting
//!
//! Uses proptest to verify the index shape invariants hold across many
//! random file sizes and segment widths.

use proptest::prelude::*;
use rofs_dict::{segment, DictConfig, ImageSpace, SmallFileRegistry, SourceFile, BLOCK_SIZE};
use std::fs::File;
use std::io::Write;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_index_width_is_ceil_of_size_over_segment(
        size in 0usize..200_000,
        seg_blocks in 1u32..8
    ) {
        let dir = tempfile::tempdir().unwrap();
        let space = ImageSpace::create(dir.path().join("image.rofs")).unwrap();
        let registry = SmallFileRegistry::new();
        let cfg = DictConfig {
            seg_blocks,
            capacity: 2048,
            ..Default::default()
        };

        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let path = dir.path().join("file.bin");
        File::create(&path).unwrap().write_all(&data).unwrap();

        let mut file = File::open(&path).unwrap();
        let out = segment::generate(
            SourceFile { ino: 1, path: &path, size: size as u64, file: &mut file },
            &cfg,
            &registry,
            &space,
        )
        .unwrap();

        let segment_size = seg_blocks as u64 * BLOCK_SIZE;
        let expected = ((size as u64 + segment_size - 1) / segment_size) as usize;
        prop_assert_eq!(out.index.len(), expected);
        prop_assert!(out.segments <= expected);

        // Whatever trained landed on block boundaries, in order.
        let addrs: Vec<_> = out.index.iter().flatten().collect();
        prop_assert!(addrs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prop_placed_items_are_never_replaced(
        size in 40_000usize..120_000,
        seg_blocks in 4u32..8
    ) {
        let dir = tempfile::tempdir().unwrap();
        let space = ImageSpace::create(dir.path().join("image.rofs")).unwrap();
        let registry = SmallFileRegistry::new();
        let cfg = DictConfig {
            seg_blocks,
            capacity: 2048,
            ..Default::default()
        };

        let mut data = Vec::with_capacity(size);
        let mut i = 0u64;
        while data.len() < size {
            data.extend_from_slice(format!("row {:08} col={:04}\n", i, i % 977).as_bytes());
            i += 1;
        }
        data.truncate(size);
        let path = dir.path().join("file.bin");
        File::create(&path).unwrap().write_all(&data).unwrap();

        let mut file = File::open(&path).unwrap();
        let out = segment::generate(
            SourceFile { ino: 1, path: &path, size: size as u64, file: &mut file },
            &cfg,
            &registry,
            &space,
        )
        .unwrap();

        // Each placed item carries exactly the address recorded in the index,
        // and a second placement attempt fails without changing it.
        for (idx, mut item) in out.items.into_iter().enumerate() {
            if let Some(addr) = out.index.get(idx) {
                prop_assert_eq!(item.block_addr(), Some(addr));
                prop_assert!(item.place(addr + 1).is_err());
                prop_assert_eq!(item.block_addr(), Some(addr));
            }
        }
    }
}
