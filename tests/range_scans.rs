//! # Range Scan Tests
//!
//! File-backed scans under the filter shapes the engine supports:
//!
//! 1. Key-range only: exact clip at both bounds, ascending order, early
//!    termination at the upper bound.
//! 2. Data-range with bitmaps and the secondary index: all and only the
//!    matching records, with strictly fewer data-page reads than the
//!    unindexed baseline.
//! 3. A data range disjoint from every page bitmap: the index alone proves
//!    the result empty and no data page is read.
//! 4. Index-driven walks over a region that has wrapped: entries whose data
//!    pages were reclaimed are skipped (in whole index pages where
//!    possible), including pages reclaimed in the middle of a scan.

use tempfile::tempdir;

use stratadb::{LinearBucketCodec, RangeFilter, SeriesStore, StoreBuilder};

fn key(k: u32) -> [u8; 4] {
    k.to_le_bytes()
}

fn payload(value: u32) -> [u8; 12] {
    let mut data = [0u8; 12];
    data[..4].copy_from_slice(&value.to_le_bytes());
    data
}

fn data_of(slice: &[u8]) -> u32 {
    u32::from_le_bytes(slice[..4].try_into().unwrap())
}

fn base_builder() -> StoreBuilder {
    SeriesStore::builder()
        .key_size(4)
        .data_size(12)
        .page_size(512)
        .end_address(512 * 2000)
        .erase_size_pages(4)
}

fn filled(indexed: bool, records: u32) -> (tempfile::TempDir, SeriesStore<stratadb::FileStorage>) {
    let dir = tempdir().unwrap();
    let mut builder =
        base_builder().bitmap_codec(Box::new(LinearBucketCodec::new(8, 0, 1000).unwrap()));
    if indexed {
        builder = builder.buffer_blocks(4).use_index(true);
    }
    let mut store = builder.open(dir.path()).unwrap();
    for i in 0..records {
        store.put(&key(i), &payload(i % 1000)).unwrap();
    }
    store.flush().unwrap();
    (dir, store)
}

mod key_range_tests {
    use super::*;

    #[test]
    fn key_range_returns_exactly_the_window() {
        let dir = tempdir().unwrap();
        let mut store = base_builder().open(dir.path()).unwrap();
        for i in 0..3_000u32 {
            store.put(&key(i), &payload(i)).unwrap();
        }
        store.flush().unwrap();

        let mut scan = store.scan(RangeFilter::new().min_key(&key(500)).max_key(&key(1500)));
        let mut expected = 500u32;
        while let Some((k, _)) = store.scan_next(&mut scan).unwrap() {
            assert_eq!(k, key(expected), "keys must arrive in ascending order");
            expected += 1;
        }

        assert_eq!(expected, 1501, "the window holds exactly 1001 records");
        assert!(store.scan_next(&mut scan).unwrap().is_none());
    }
}

mod data_range_tests {
    use super::*;

    #[test]
    fn data_range_yields_all_and_only_matches() {
        let (_dir, mut store) = filled(true, 20_000);
        assert!(store.config().features.use_index);

        let mut scan = store.scan(
            RangeFilter::new()
                .min_data(&payload(300)[..4])
                .max_data(&payload(630)[..4]),
        );
        let mut seen = Vec::new();
        while let Some((k, d)) = store.scan_next(&mut scan).unwrap() {
            let value = data_of(d);
            assert!((300..=630).contains(&value), "value {value} out of range");
            seen.push(u32::from_le_bytes(k.try_into().unwrap()));
        }

        let expected: Vec<u32> = (0..20_000)
            .filter(|i| (300..=630).contains(&(i % 1000)))
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn the_index_beats_the_sequential_baseline() {
        let (_dir_a, mut indexed) = filled(true, 20_000);
        let (_dir_b, mut baseline) = filled(false, 20_000);

        let filter = RangeFilter::new()
            .min_data(&payload(300)[..4])
            .max_data(&payload(395)[..4]);

        indexed.reset_stats();
        let mut scan = indexed.scan(filter.clone());
        let mut with_index = 0u32;
        while indexed.scan_next(&mut scan).unwrap().is_some() {
            with_index += 1;
        }

        baseline.reset_stats();
        let mut scan = baseline.scan(filter);
        let mut without = 0u32;
        while baseline.scan_next(&mut scan).unwrap().is_some() {
            without += 1;
        }

        assert_eq!(with_index, without, "both walks must agree on the result");
        assert!(with_index > 0);
        assert!(
            indexed.stats().idx_reads < baseline.stats().reads,
            "index pages read ({}) must undercut the baseline's data pages ({})",
            indexed.stats().idx_reads,
            baseline.stats().reads
        );
        assert!(
            indexed.stats().reads + indexed.stats().idx_reads < baseline.stats().reads,
            "total reads with the index ({} + {}) must undercut the baseline ({})",
            indexed.stats().reads,
            indexed.stats().idx_reads,
            baseline.stats().reads
        );
    }

    #[test]
    fn disjoint_range_touches_only_the_index() {
        let dir = tempdir().unwrap();
        let mut store = base_builder()
            .buffer_blocks(4)
            .bitmap_codec(Box::new(LinearBucketCodec::new(8, 0, 1000).unwrap()))
            .use_index(true)
            .open(dir.path())
            .unwrap();
        for i in 0..20_000u32 {
            store.put(&key(i), &payload(i % 400)).unwrap();
        }
        store.flush().unwrap();

        store.reset_stats();
        let mut scan = store.scan(
            RangeFilter::new()
                .min_data(&payload(800)[..4])
                .max_data(&payload(900)[..4]),
        );
        assert!(store.scan_next(&mut scan).unwrap().is_none());

        assert_eq!(store.stats().reads, 0, "no data page may be read");
        assert!(store.stats().idx_reads > 0, "the index pages prove emptiness");
    }

    #[test]
    fn combined_key_and_data_bounds_compose() {
        let (_dir, mut store) = filled(true, 20_000);

        let mut scan = store.scan(
            RangeFilter::new()
                .min_key(&key(5_000))
                .max_key(&key(15_000))
                .min_data(&payload(990)[..4])
                .max_data(&payload(999)[..4]),
        );
        let mut count = 0u32;
        while let Some((k, d)) = store.scan_next(&mut scan).unwrap() {
            let k = u32::from_le_bytes(k.try_into().unwrap());
            let d = data_of(d);
            assert!((5_000..=15_000).contains(&k));
            assert!((990..=999).contains(&d));
            count += 1;
        }

        let expected = (5_000..=15_000)
            .filter(|i| (990..=999).contains(&(i % 1000)))
            .count() as u32;
        assert_eq!(count, expected);
    }
}

mod wrapped_index_tests {
    use super::*;

    // 64-byte pages with an 8-byte bitmap hold six records and six index
    // entries each; a 128-page budget splits into a 108-page data region
    // and a 20-page index region, so a few hundred records wrap the data
    fn small_indexed_store(
        dir: &std::path::Path,
        records: u32,
    ) -> SeriesStore<stratadb::FileStorage> {
        let mut store = SeriesStore::builder()
            .key_size(4)
            .data_size(4)
            .page_size(64)
            .buffer_blocks(4)
            .end_address(64 * 128)
            .erase_size_pages(4)
            .track_min_max(false)
            .bitmap_codec(Box::new(LinearBucketCodec::new(8, 0, 1000).unwrap()))
            .use_index(true)
            .open(dir)
            .unwrap();
        for i in 0..records {
            store.put(&i.to_le_bytes(), &i.to_le_bytes()).unwrap();
        }
        store.flush().unwrap();
        store
    }

    fn all_data() -> RangeFilter {
        RangeFilter::new()
            .min_data(&0u32.to_le_bytes())
            .max_data(&999u32.to_le_bytes())
    }

    #[test]
    fn index_walk_skips_reclaimed_entries_after_wrap() {
        let dir = tempdir().unwrap();
        let mut store = small_indexed_store(dir.path(), 700);

        let per_page = store.records_per_page() as u32;
        assert_eq!(per_page, 6);
        let first = store.first_live_page().0;
        // more dead pages than one index page covers, so the walk must
        // jump whole index pages before it finds the first live entry
        assert!(first >= 8, "the data region must have wrapped and advanced");

        store.reset_stats();
        let mut scan = store.scan(all_data());
        let mut keys = Vec::new();
        while let Some((k, d)) = store.scan_next(&mut scan).unwrap() {
            assert_eq!(k, d, "data mirrors the key in this workload");
            keys.push(u32::from_le_bytes(k.try_into().unwrap()));
        }

        let expected: Vec<u32> = (first * per_page..700).collect();
        assert_eq!(keys, expected, "exactly the live window, oldest first");
        assert!(store.stats().idx_reads > 0, "the walk must come from the index");
    }

    #[test]
    fn index_walk_survives_a_wrap_mid_scan() {
        let dir = tempdir().unwrap();
        // exactly fills the 108-page data region; the next flush wraps
        let mut store = small_indexed_store(dir.path(), 648);
        assert_eq!(store.first_live_page().0, 0);

        let mut scan = store.scan(all_data());
        let mut keys = Vec::new();
        for _ in 0..3 {
            let (k, _) = store.scan_next(&mut scan).unwrap().unwrap();
            keys.push(u32::from_le_bytes(k.try_into().unwrap()));
        }
        assert_eq!(keys, vec![0, 1, 2]);

        // three more pages: the first lands on the slot the cursor is
        // parked on, and the wrap reclaims the oldest erase block
        for i in 648..666u32 {
            store.put(&i.to_le_bytes(), &i.to_le_bytes()).unwrap();
        }
        store.flush().unwrap();
        let first = store.first_live_page().0;
        assert!(first >= 4, "the interleaved writes must have reclaimed pages");

        while let Some((k, _)) = store.scan_next(&mut scan).unwrap() {
            keys.push(u32::from_le_bytes(k.try_into().unwrap()));
        }

        // the rewritten slot is abandoned, entries for reclaimed pages are
        // skipped, and the walk resumes at the oldest surviving page
        let mut expected = vec![0, 1, 2];
        expected.extend(first * 6..666);
        assert_eq!(keys, expected);
    }
}
