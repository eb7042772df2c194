//! # Series Store
//!
//! The engine itself: an append-only store for fixed-size records whose keys
//! arrive in non-decreasing order. Records accumulate in an in-memory write
//! frame; a full frame is stamped with the next logical page id and written
//! to the next physical slot of the circular data region. Once written, a
//! page is immutable until the region wraps over it.
//!
//! ## Write Path
//!
//! `put` copies the record into the write frame and maintains the page
//! summary as it goes: min/max key and data (when tracking is on) and the
//! page bitmap (when a codec is configured). When the frame fills, it is
//! flushed through the allocator, one bitmap entry is appended to the index
//! write frame (when indexing), the average key gap estimate is refreshed,
//! and the frame is reset. `flush` persists partially filled frames and
//! syncs; it writes nothing when a frame is empty, so flushing twice is
//! harmless.
//!
//! ## Point Lookup
//!
//! `get` runs an interpolated search over the live page range. The first
//! probe lands at `(key - min_key) / (records_per_page * avg_gap)`; each
//! miss tightens a first/last envelope from the probed page's first and
//! last keys and re-estimates the distance arithmetically. On uniformly
//! spaced keys this converges in an expected O(1) page reads and degrades
//! to the envelope's O(log n) otherwise. Inside the located page an exact
//! binary search finishes the job. `SearchMode::Binary` swaps the probe
//! strategy for a plain binary search over pages.
//!
//! The gap estimate is `(max_key - min_key) / live_pages / (records_per_page
//! - 1)`, clamped to at least 1, refreshed at every flush. `min_key` starts
//! at the first flushed key and is re-derived from the oldest live page
//! whenever a wrap reclaims pages (with the uniform-density estimate as the
//! fallback if that read fails).
//!
//! ## Failure Semantics
//!
//! A failed page write surfaces the error and leaves the write frame and
//! its summary intact; nothing is retried and nothing is reset. Read errors
//! propagate from `get` and scans. A missing key is `Ok(None)`, not an
//! error.
//!
//! ## Resource Model
//!
//! Single-threaded and non-reentrant; all I/O is synchronous. Slices
//! returned by `get` (and by scans) borrow the data read frame and are
//! invalidated by the next engine call. Call `flush` before dropping the
//! store to persist buffered records.

use std::cmp::Ordering;

use eyre::{ensure, Result, WrapErr};

use crate::bitmap::{BitmapCodec, MAX_BITMAP_WIDTH};
use crate::buffer::{FramePool, DATA_READ_FRAME, DATA_WRITE_FRAME, INDEX_READ_FRAME, INDEX_WRITE_FRAME};
use crate::config::{
    Features, SearchMode, StoreBuilder, StoreConfig, INDEX_BUFFER_BLOCKS, INDEX_REGION_DIVISOR,
    MIN_BUFFER_BLOCKS,
};
use crate::record::{DataCodec, KeyCodec, U32LeKey, U32LePrefix};
use crate::region::{LogicalPageId, PhysicalPageId, RegionAllocator};
use crate::stats::Stats;
use crate::storage::{BlockStorage, IndexLayout, IndexPageHeader, PageLayout};

pub struct SeriesStore<S: BlockStorage> {
    pub(crate) cfg: StoreConfig,
    pub(crate) layout: PageLayout,
    pub(crate) idx_layout: Option<IndexLayout>,
    pub(crate) key_codec: Box<dyn KeyCodec>,
    pub(crate) data_codec: Box<dyn DataCodec>,
    pub(crate) bitmap_codec: Option<Box<dyn BitmapCodec>>,
    pub(crate) data: S,
    pub(crate) index: Option<S>,
    pub(crate) data_alloc: RegionAllocator,
    pub(crate) idx_alloc: Option<RegionAllocator>,
    pub(crate) frames: FramePool,
    pub(crate) buffered_page: Option<PhysicalPageId>,
    pub(crate) buffered_idx_page: Option<PhysicalPageId>,
    pub(crate) min_key: i64,
    pub(crate) avg_key_diff: i64,
    pub(crate) stats: Stats,
}

impl SeriesStore<crate::storage::FileStorage> {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }
}

impl<S: BlockStorage> SeriesStore<S> {
    pub(crate) fn build(builder: StoreBuilder, data: S, index: Option<S>) -> Result<Self> {
        let StoreBuilder {
            key_size,
            data_size,
            page_size,
            buffer_blocks,
            start_address,
            end_address,
            erase_size_pages,
            use_index,
            track_min_max,
            track_sum,
            search_mode,
            key_codec,
            data_codec,
            bitmap_codec,
        } = builder;

        ensure!(
            page_size > 0 && page_size % 8 == 0,
            "page size {} must be a positive multiple of 8",
            page_size
        );
        ensure!(
            end_address > start_address,
            "end address {} must exceed start address {}",
            end_address,
            start_address
        );
        ensure!(erase_size_pages >= 1, "erase block must span at least one page");
        ensure!(
            buffer_blocks >= MIN_BUFFER_BLOCKS,
            "need at least {} page frames, got {}",
            MIN_BUFFER_BLOCKS,
            buffer_blocks
        );

        let use_bitmap = bitmap_codec.is_some();
        let bitmap_size = match &bitmap_codec {
            Some(codec) => {
                let width = codec.bitmap_size();
                ensure!(
                    width >= 1 && width <= MAX_BITMAP_WIDTH,
                    "bitmap codec reports unsupported width {}",
                    width
                );
                width
            }
            None => 0,
        };
        if use_index {
            ensure!(
                use_bitmap,
                "the secondary index stores per-page bitmaps; configure a bitmap codec to use it"
            );
        }
        // Fewer than four frames downgrades to no-index rather than failing.
        let indexed = use_index && buffer_blocks >= INDEX_BUFFER_BLOCKS;

        let layout = PageLayout::new(page_size, key_size, data_size, bitmap_size, track_min_max)?;

        let num_pages = ((end_address - start_address) / page_size as u64) as u32;
        let blocks_needed = if indexed { 4 } else { 2 };
        ensure!(
            num_pages >= blocks_needed * erase_size_pages,
            "region of {} pages is too small; {} erase blocks of {} pages are required",
            num_pages,
            blocks_needed,
            erase_size_pages
        );

        let (data_pages, idx_pages) = if indexed {
            // One index entry per data page: the index region must both hit
            // the size target and hold enough entries to cover every live
            // data page, or it would wrap ahead of the data region.
            let entries_per_page = ((page_size - crate::storage::INDEX_HEADER_SIZE)
                / bitmap_size.max(1))
            .max(1) as u32;
            let mut idx = (num_pages / INDEX_REGION_DIVISOR)
                .max(num_pages.div_ceil(entries_per_page + 1));
            if idx < 2 * erase_size_pages {
                idx = 2 * erase_size_pages;
            } else {
                // round up to a whole number of erase blocks
                idx = (idx / erase_size_pages + 1) * erase_size_pages;
            }
            ensure!(
                num_pages >= idx + 2 * erase_size_pages,
                "region of {} pages leaves no room for data beside {} index pages",
                num_pages,
                idx
            );
            (num_pages - idx, idx)
        } else {
            (num_pages, 0)
        };

        let data_alloc = RegionAllocator::new(0, data_pages, erase_size_pages)?;
        let (idx_alloc, idx_layout, index) = if indexed {
            ensure!(
                index.is_some(),
                "index enabled but no index storage was supplied"
            );
            (
                Some(RegionAllocator::new(0, idx_pages, erase_size_pages)?),
                Some(IndexLayout::new(page_size, bitmap_size)?),
                index,
            )
        } else {
            (None, None, None)
        };

        let frames = FramePool::new(buffer_blocks, page_size)?;

        let cfg = StoreConfig {
            key_size,
            data_size,
            page_size,
            buffer_blocks,
            start_address,
            end_address,
            erase_size_pages,
            bitmap_size,
            features: Features {
                use_index: indexed,
                track_min_max,
                track_sum,
                use_bitmap,
            },
            search_mode,
        };

        Ok(Self {
            cfg,
            layout,
            idx_layout,
            key_codec: key_codec.unwrap_or_else(|| Box::new(U32LeKey)),
            data_codec: data_codec.unwrap_or_else(|| Box::new(U32LePrefix)),
            bitmap_codec,
            data,
            index,
            data_alloc,
            idx_alloc,
            frames,
            buffered_page: None,
            buffered_idx_page: None,
            min_key: 0,
            avg_key_diff: 1,
            stats: Stats::default(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn records_per_page(&self) -> usize {
        self.layout.max_records
    }

    /// Logical id the next flushed page will receive. Strictly increasing
    /// for the store's lifetime.
    pub fn next_page_id(&self) -> LogicalPageId {
        self.data_alloc.next_logical()
    }

    /// Logical id of the oldest page still readable. Advances by one erase
    /// block each time a wrap reclaims pages.
    pub fn first_live_page(&self) -> LogicalPageId {
        self.data_alloc.first_logical()
    }

    /// Appends one record. Keys must arrive in non-decreasing order; that
    /// ordering is what the page summaries and interpolated lookup rely on,
    /// and it is not re-checked here.
    pub fn put(&mut self, key: &[u8], data: &[u8]) -> Result<()> {
        ensure!(
            key.len() == self.cfg.key_size,
            "key length {} does not match configured key size {}",
            key.len(),
            self.cfg.key_size
        );
        ensure!(
            data.len() == self.cfg.data_size,
            "data length {} does not match configured data size {}",
            data.len(),
            self.cfg.data_size
        );

        if self.layout.count(self.frames.frame(DATA_WRITE_FRAME)) as usize
            >= self.layout.max_records
        {
            self.flush_data_page()?;
        }

        let layout = self.layout;
        let frame = self.frames.frame_mut(DATA_WRITE_FRAME);
        let count = layout.count(frame) as usize;

        let slot = layout.record_slot_mut(frame, count);
        slot[..layout.key_size].copy_from_slice(key);
        slot[layout.key_size..].copy_from_slice(data);
        layout.set_count(frame, count as u16 + 1);

        if self.cfg.features.track_min_max {
            if count == 0 {
                layout.min_key_mut(frame).copy_from_slice(key);
                layout.max_key_mut(frame).copy_from_slice(key);
                layout.min_data_mut(frame).copy_from_slice(data);
                layout.max_data_mut(frame).copy_from_slice(data);
            } else {
                // monotone keys: every insert is the new page maximum
                layout.max_key_mut(frame).copy_from_slice(key);
                if self.data_codec.compare(data, layout.min_data(frame)) == Ordering::Less {
                    layout.min_data_mut(frame).copy_from_slice(data);
                }
                if self.data_codec.compare(data, layout.max_data(frame)) == Ordering::Greater {
                    layout.max_data_mut(frame).copy_from_slice(data);
                }
            }
        }

        if let Some(codec) = &self.bitmap_codec {
            codec.update(data, layout.bitmap_mut(frame));
        }

        Ok(())
    }

    /// Persists a partially filled write frame (and index frame) and syncs.
    /// Empty frames are skipped, so repeated flushes write nothing new.
    pub fn flush(&mut self) -> Result<()> {
        if self.layout.count(self.frames.frame(DATA_WRITE_FRAME)) > 0 {
            self.flush_data_page()?;
        }
        if self.index.is_some() {
            let entries =
                IndexPageHeader::from_bytes(self.frames.frame(INDEX_WRITE_FRAME))?.entry_count();
            if entries > 0 {
                self.flush_index_page()?;
                let next = self.data_alloc.next_logical();
                self.reset_index_frame(next)?;
            }
        }
        self.data.sync()?;
        if let Some(index) = self.index.as_mut() {
            index.sync()?;
        }
        Ok(())
    }

    /// Point lookup. Returns the data slice for an exact key match,
    /// borrowed from the read frame until the next engine call.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<&[u8]>> {
        ensure!(
            key.len() == self.cfg.key_size,
            "key length {} does not match configured key size {}",
            key.len(),
            self.cfg.key_size
        );
        let live = self.data_alloc.live_pages();
        if live == 0 {
            return Ok(None);
        }
        let last_live = (live - 1) as i64;
        match self.cfg.search_mode {
            SearchMode::Interpolated => self.locate_interpolated(key, last_live)?,
            SearchMode::Binary => self.locate_binary(key, last_live)?,
        }

        let frame = self.frames.frame(DATA_READ_FRAME);
        match self.search_page(frame, key) {
            Some(slot) => Ok(Some(self.layout.record_data(frame, slot))),
            None => Ok(None),
        }
    }

    /// Writes the full data write frame to the next slot and resets it.
    fn flush_data_page(&mut self) -> Result<()> {
        let slot = self.data_alloc.allocate();
        {
            let frame = self.frames.frame_mut(DATA_WRITE_FRAME);
            self.layout.set_logical_id(frame, slot.logical);
        }
        self.data
            .write_page(slot.physical, self.frames.frame(DATA_WRITE_FRAME))
            .wrap_err("data page flush failed")?;
        self.stats.writes += 1;
        // the slot may have been resident in the read frame from a previous
        // lap; that copy is stale now
        if self.buffered_page == Some(slot.physical) {
            self.buffered_page = None;
        }

        if slot.reclaimed_pages > 0 {
            self.refresh_min_key(slot.reclaimed_pages);
        }

        if self.index.is_some() {
            self.append_index_entry(slot.logical)?;
        }

        // refresh the gap estimator from the page just flushed, while its
        // records are still in the frame
        let frame = self.frames.frame(DATA_WRITE_FRAME);
        let last = self.key_codec.as_i64(self.layout.last_key(frame));
        if slot.logical == LogicalPageId(0) {
            // first flush: start the floor at the true smallest key
            self.min_key = self.key_codec.as_i64(self.layout.first_key(frame));
        }
        let live = self.data_alloc.live_pages().saturating_sub(1).max(1) as i64;
        let per_page = (self.layout.max_records as i64 - 1).max(1);
        self.avg_key_diff = ((last - self.min_key) / live / per_page).max(1);

        let layout = self.layout;
        layout.init_page(self.frames.frame_mut(DATA_WRITE_FRAME));
        Ok(())
    }

    /// Re-derives the minimum-key floor after a wrap discarded the oldest
    /// erase block. Reading the oldest live page gives the exact floor; if
    /// that read fails the uniform-density estimate stands in.
    fn refresh_min_key(&mut self, reclaimed: u32) {
        let oldest = self.data_alloc.to_physical(0);
        match self.read_data_page(oldest) {
            Ok(()) => {
                let frame = self.frames.frame(DATA_READ_FRAME);
                self.min_key = self.key_codec.as_i64(self.layout.first_key(frame));
            }
            Err(_) => {
                self.min_key +=
                    reclaimed as i64 * self.avg_key_diff * self.layout.max_records as i64;
            }
        }
    }

    /// Appends the just-flushed data page's bitmap to the index write
    /// frame, flushing that frame first if it is full.
    fn append_index_entry(&mut self, covered: LogicalPageId) -> Result<()> {
        let Some(idx_layout) = self.idx_layout else {
            return Ok(());
        };
        let mut at =
            IndexPageHeader::from_bytes(self.frames.frame(INDEX_WRITE_FRAME))?.entry_count()
                as usize;
        if at >= idx_layout.max_entries {
            self.flush_index_page()?;
            self.reset_index_frame(covered)?;
            at = 0;
        }
        let (data_frame, idx_frame) = self
            .frames
            .frame_pair_mut(DATA_WRITE_FRAME, INDEX_WRITE_FRAME);
        let bitmap = self.layout.bitmap(data_frame);
        idx_layout.entry_mut(idx_frame, at).copy_from_slice(bitmap);
        let header = IndexPageHeader::from_bytes_mut(idx_frame)?;
        header.set_entry_count(at as u16 + 1);
        Ok(())
    }

    fn flush_index_page(&mut self) -> Result<()> {
        let Some(alloc) = self.idx_alloc.as_mut() else {
            return Ok(());
        };
        let slot = alloc.allocate();
        {
            let frame = self.frames.frame_mut(INDEX_WRITE_FRAME);
            let header = IndexPageHeader::from_bytes_mut(frame)?;
            header.set_logical_id(slot.logical);
        }
        let Some(index) = self.index.as_mut() else {
            return Ok(());
        };
        index
            .write_page(slot.physical, self.frames.frame(INDEX_WRITE_FRAME))
            .wrap_err("index page flush failed")?;
        self.stats.idx_writes += 1;
        if self.buffered_idx_page == Some(slot.physical) {
            self.buffered_idx_page = None;
        }
        Ok(())
    }

    /// Clears the index write frame and stamps the logical id of the first
    /// data page its entries will cover.
    fn reset_index_frame(&mut self, covered: LogicalPageId) -> Result<()> {
        let frame = self.frames.frame_mut(INDEX_WRITE_FRAME);
        frame.fill(0);
        let header = IndexPageHeader::from_bytes_mut(frame)?;
        header.set_min_data_page(covered);
        Ok(())
    }

    /// Reads a data page into the read frame, or reuses it when the page is
    /// already resident.
    pub(crate) fn read_data_page(&mut self, page: PhysicalPageId) -> Result<()> {
        if self.buffered_page == Some(page) {
            self.stats.buffer_hits += 1;
            return Ok(());
        }
        self.data
            .read_page(page, self.frames.frame_mut(DATA_READ_FRAME))?;
        self.stats.reads += 1;
        self.buffered_page = Some(page);
        Ok(())
    }

    /// Reads an index page into the index read frame, or reuses it.
    pub(crate) fn read_index_page(&mut self, page: PhysicalPageId) -> Result<()> {
        if self.buffered_idx_page == Some(page) {
            self.stats.buffer_hits += 1;
            return Ok(());
        }
        let Some(index) = self.index.as_mut() else {
            eyre::bail!("index file not configured");
        };
        index.read_page(page, self.frames.frame_mut(INDEX_READ_FRAME))?;
        self.stats.idx_reads += 1;
        self.buffered_idx_page = Some(page);
        Ok(())
    }

    /// Interpolated page search. Leaves the verdict page in the read frame.
    fn locate_interpolated(&mut self, key: &[u8], last_live: i64) -> Result<()> {
        let k = self.key_codec.as_i64(key);
        let stride = (self.layout.max_records as i64 * self.avg_key_diff).max(1);
        let mut first: i64 = 0;
        let mut last: i64 = last_live;
        let mut page: i64 = if k < self.min_key {
            0
        } else {
            ((k - self.min_key) / stride).clamp(0, last_live)
        };

        loop {
            let physical = self.data_alloc.to_physical(page as u32);
            self.read_data_page(physical)?;
            if first >= last {
                break;
            }
            let frame = self.frames.frame(DATA_READ_FRAME);
            let page_first = self.layout.first_key(frame);
            let page_last = self.layout.last_key(frame);
            if self.key_codec.compare(key, page_first) == Ordering::Less {
                last = page - 1;
                let mut jump = (k - self.key_codec.as_i64(page_first)) / stride - 1;
                if page + jump < first {
                    jump = first - page;
                }
                page += jump;
            } else if self.key_codec.compare(key, page_last) == Ordering::Greater {
                first = page + 1;
                let mut jump = (k - self.key_codec.as_i64(page_last)) / stride + 1;
                if page + jump > last {
                    jump = last - page;
                }
                page += jump;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Plain binary search over live pages. Leaves the verdict page in the
    /// read frame.
    fn locate_binary(&mut self, key: &[u8], last_live: i64) -> Result<()> {
        let mut first: i64 = 0;
        let mut last: i64 = last_live;
        let mut page = (first + last) / 2;

        loop {
            let physical = self.data_alloc.to_physical(page as u32);
            self.read_data_page(physical)?;
            if first >= last {
                break;
            }
            let frame = self.frames.frame(DATA_READ_FRAME);
            if self.key_codec.compare(key, self.layout.first_key(frame)) == Ordering::Less {
                last = page - 1;
            } else if self.key_codec.compare(key, self.layout.last_key(frame)) == Ordering::Greater
            {
                first = page + 1;
            } else {
                break;
            }
            page = (first + last) / 2;
            if page < first {
                page = first;
            }
        }
        Ok(())
    }

    /// Exact binary search within a page.
    fn search_page(&self, frame: &[u8], key: &[u8]) -> Option<usize> {
        let count = self.layout.count(frame) as i64;
        let mut lo: i64 = 0;
        let mut hi: i64 = count - 1;
        while lo <= hi {
            let mid = (lo + hi) / 2;
            match self
                .key_codec
                .compare(self.layout.record_key(frame, mid as usize), key)
            {
                Ordering::Less => lo = mid + 1,
                Ordering::Equal => return Some(mid as usize),
                Ordering::Greater => hi = mid - 1,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::LinearBucketCodec;
    use crate::storage::MemStorage;

    fn record(value: u32) -> [u8; 4] {
        value.to_le_bytes()
    }

    fn small_store() -> SeriesStore<MemStorage> {
        // header 6, record 8: seven records per 64-byte page
        SeriesStore::builder()
            .key_size(4)
            .data_size(4)
            .page_size(64)
            .buffer_blocks(2)
            .end_address(64 * 32)
            .erase_size_pages(4)
            .track_min_max(false)
            .open_with(MemStorage::new(64), None)
            .unwrap()
    }

    #[test]
    fn put_flush_get_round_trip() {
        let mut store = small_store();
        for i in 0..50u32 {
            store.put(&record(i), &record(i * 10)).unwrap();
        }
        store.flush().unwrap();

        for i in 0..50u32 {
            let data = store.get(&record(i)).unwrap().expect("key must be found");
            assert_eq!(data, record(i * 10));
        }
        assert_eq!(store.get(&record(500)).unwrap(), None);
    }

    #[test]
    fn get_before_any_flush_is_none() {
        let mut store = small_store();
        store.put(&record(1), &record(2)).unwrap();

        assert_eq!(store.get(&record(1)).unwrap(), None);
        assert_eq!(store.stats().reads, 0);
    }

    #[test]
    fn empty_flush_writes_nothing() {
        let mut store = small_store();
        store.flush().unwrap();
        assert_eq!(store.stats().writes, 0);

        store.put(&record(1), &record(1)).unwrap();
        store.flush().unwrap();
        let writes = store.stats().writes;
        store.flush().unwrap();
        assert_eq!(store.stats().writes, writes, "flush must be idempotent");
    }

    #[test]
    fn repeated_get_hits_the_read_frame() {
        let mut store = small_store();
        for i in 0..50u32 {
            store.put(&record(i), &record(i)).unwrap();
        }
        store.flush().unwrap();

        store.reset_stats();
        store.get(&record(30)).unwrap();
        let cold = store.stats();
        store.get(&record(30)).unwrap();
        let warm = store.stats();

        assert_eq!(warm.reads, cold.reads, "second lookup must not touch storage");
        assert!(warm.buffer_hits > cold.buffer_hits);
    }

    #[test]
    fn binary_search_mode_finds_the_same_records() {
        let mut store = SeriesStore::builder()
            .key_size(4)
            .data_size(4)
            .page_size(64)
            .end_address(64 * 32)
            .erase_size_pages(4)
            .track_min_max(false)
            .search_mode(SearchMode::Binary)
            .open_with(MemStorage::new(64), None)
            .unwrap();
        for i in 0..50u32 {
            store.put(&record(i), &record(i + 7)).unwrap();
        }
        store.flush().unwrap();

        for i in (0..50u32).step_by(7) {
            assert_eq!(store.get(&record(i)).unwrap(), Some(record(i + 7).as_slice()));
        }
        assert_eq!(store.get(&record(99)).unwrap(), None);
    }

    #[test]
    fn flushed_pages_carry_summaries() {
        let mut store = SeriesStore::builder()
            .key_size(4)
            .data_size(4)
            .page_size(64)
            .end_address(64 * 32)
            .erase_size_pages(4)
            .bitmap_codec(Box::new(LinearBucketCodec::new(1, 0, 80).unwrap()))
            .open_with(MemStorage::new(64), None)
            .unwrap();
        // header 6 + 1 bitmap + 2*4 + 2*4 = 23, record 8: five per page
        assert_eq!(store.records_per_page(), 5);
        for i in 0..5u32 {
            store.put(&record(100 + i), &record(i * 15)).unwrap();
        }
        store.flush().unwrap();

        let mut page = vec![0u8; 64];
        store
            .data
            .read_page(PhysicalPageId(0), &mut page)
            .unwrap();
        let layout = store.layout;
        assert_eq!(layout.logical_id(&page), LogicalPageId(0));
        assert_eq!(layout.count(&page), 5);
        assert_eq!(layout.min_key(&page), record(100));
        assert_eq!(layout.max_key(&page), record(104));
        assert_eq!(layout.min_data(&page), record(0));
        assert_eq!(layout.max_data(&page), record(60));
        // values 0, 15, 30, 45, 60 over 10-unit buckets: bits 0, 1, 3, 4, 6
        assert_eq!(layout.bitmap(&page), &[0b1101_1010]);

        // every stored value must test positive against the page bitmap
        let codec = LinearBucketCodec::new(1, 0, 80).unwrap();
        for i in 0..5 {
            assert!(codec.contains(layout.record_data(&page, i), layout.bitmap(&page)));
        }
        assert!(!codec.contains(&record(25), layout.bitmap(&page)));
    }

    #[test]
    fn failed_page_write_leaves_the_frame_intact() {
        struct BrokenStorage;
        impl BlockStorage for BrokenStorage {
            fn read_page(&mut self, _: PhysicalPageId, _: &mut [u8]) -> Result<()> {
                eyre::bail!("read refused")
            }
            fn write_page(&mut self, _: PhysicalPageId, _: &[u8]) -> Result<()> {
                eyre::bail!("write refused")
            }
            fn sync(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let mut store = SeriesStore::builder()
            .key_size(4)
            .data_size(4)
            .page_size(64)
            .end_address(64 * 32)
            .erase_size_pages(4)
            .track_min_max(false)
            .open_with(BrokenStorage, None)
            .unwrap();

        let per_page = store.records_per_page() as u32;
        for i in 0..per_page {
            store.put(&record(i), &record(i)).unwrap();
        }
        // the next put must flush, which fails; the buffered page survives
        assert!(store.put(&record(per_page), &record(0)).is_err());
        assert_eq!(
            store.layout.count(store.frames.frame(DATA_WRITE_FRAME)) as usize,
            store.records_per_page()
        );
        assert_eq!(store.stats().writes, 0);
    }

    #[test]
    fn rejects_wrong_record_geometry() {
        let mut store = small_store();

        assert!(store.put(&[1, 2], &record(0)).is_err());
        assert!(store.put(&record(0), &[1, 2, 3]).is_err());
    }

    #[test]
    fn rejects_undersized_region() {
        let result = SeriesStore::builder()
            .key_size(4)
            .data_size(4)
            .page_size(64)
            .end_address(64 * 7)
            .erase_size_pages(4)
            .open_with(MemStorage::new(64), None);

        assert!(result.is_err());
    }

    #[test]
    fn index_requires_a_bitmap_codec() {
        let result = SeriesStore::builder()
            .key_size(4)
            .data_size(4)
            .page_size(64)
            .buffer_blocks(4)
            .end_address(64 * 64)
            .erase_size_pages(4)
            .use_index(true)
            .open_with(MemStorage::new(64), Some(MemStorage::new(64)));

        assert!(result.is_err());
    }

    #[test]
    fn index_downgrades_with_two_frames() {
        let store = SeriesStore::builder()
            .key_size(4)
            .data_size(4)
            .page_size(64)
            .buffer_blocks(2)
            .end_address(64 * 64)
            .erase_size_pages(4)
            .bitmap_codec(Box::new(LinearBucketCodec::new(1, 0, 80).unwrap()))
            .use_index(true)
            .open_with(MemStorage::new(64), Some(MemStorage::new(64)))
            .unwrap();

        assert!(!store.config().features.use_index);
        assert!(store.index.is_none());
    }
}
