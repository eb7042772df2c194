//! # Range Scans
//!
//! A scan walks records in key order, filtered by any combination of key
//! and data bounds. The cursor object holds only positions and the query
//! bitmap; the engine drives it and yields `(key, data)` slices borrowed
//! from the data read frame, valid until the next engine call:
//!
//! ```ignore
//! let mut scan = store.scan(RangeFilter::new().min_data(&low).max_data(&high));
//! while let Some((key, data)) = store.scan_next(&mut scan)? {
//!     // use key and data before touching the store again
//! }
//! ```
//!
//! The cursor remembers the physical slot and the stamped logical id of the
//! page it is positioned on. If another engine call evicted that page from
//! the read frame between `scan_next` calls, it is transparently read back;
//! if a wrap rewrote the slot in the meantime, the id mismatch makes the
//! cursor abandon the page instead of walking a newer page's records.
//!
//! ## Page Advance
//!
//! Candidate pages come from one of two walks, both bounded by the
//! allocator's live-page predicate:
//!
//! - **Sequential**: oldest to newest data page, ending at the first slot
//!   that is no longer live. Used when there is no data-range bound or no
//!   secondary index. When bitmaps are enabled and a data bound is set,
//!   each loaded page is still pruned against its own bitmap before its
//!   records are scanned.
//! - **Index-driven**: when a data bound is set and the index file exists,
//!   the walk reads index pages instead and only touches data pages whose
//!   bitmap entry overlaps the query bitmap. Entries covering data pages
//!   that a wrap has reclaimed are skipped arithmetically; a skip spanning
//!   whole index pages jumps over them without reading the entries, and
//!   every surviving entry is re-checked against the live window as it is
//!   consumed, because an interleaved write can reclaim pages after their
//!   index page was loaded.
//!
//! ## Record Filtering
//!
//! Within a candidate page, records below `min_key` are skipped and the
//! first record above `max_key` ends the scan for good, which is sound
//! because keys are stored in non-decreasing order. Data bounds are checked
//! per record; bitmap buckets are coarse, so a page-level match does not
//! guarantee every record matches.
//!
//! Records still sitting in the write frame are not visible to scans; call
//! `flush` first to include them.

use std::cmp::Ordering;

use eyre::Result;

use crate::bitmap::{self, MAX_BITMAP_WIDTH};
use crate::buffer::{DATA_READ_FRAME, INDEX_READ_FRAME};
use crate::region::{LogicalPageId, PhysicalPageId};
use crate::storage::{BlockStorage, IndexPageHeader};
use crate::store::SeriesStore;

/// Optional key and data bounds, all inclusive.
#[derive(Debug, Default, Clone)]
pub struct RangeFilter {
    pub(crate) min_key: Option<Vec<u8>>,
    pub(crate) max_key: Option<Vec<u8>>,
    pub(crate) min_data: Option<Vec<u8>>,
    pub(crate) max_data: Option<Vec<u8>>,
}

impl RangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_key(mut self, key: &[u8]) -> Self {
        self.min_key = Some(key.to_vec());
        self
    }

    pub fn max_key(mut self, key: &[u8]) -> Self {
        self.max_key = Some(key.to_vec());
        self
    }

    pub fn min_data(mut self, data: &[u8]) -> Self {
        self.min_data = Some(data.to_vec());
        self
    }

    pub fn max_data(mut self, data: &[u8]) -> Self {
        self.max_data = Some(data.to_vec());
        self
    }
}

/// Cursor state for one scan. Create with [`SeriesStore::scan`], drive with
/// [`SeriesStore::scan_next`].
#[derive(Debug)]
pub struct Scan {
    filter: RangeFilter,
    query_bitmap: Option<Vec<u8>>,
    use_index: bool,
    /// Next live data page position (sequential walk).
    pos: u32,
    /// Next record within the current data page.
    rec: usize,
    /// Physical slot of the current data page, once one is loaded.
    page: Option<PhysicalPageId>,
    /// Logical id stamped on that page when it was loaded. A mismatch on a
    /// later visit means a wrap rewrote the slot.
    page_id: Option<LogicalPageId>,
    done: bool,
    /// Next live index page position (index walk).
    idx_pos: u32,
    /// Next entry within the loaded index page.
    idx_rec: usize,
    idx_loaded: bool,
    /// Logical id of the loaded index page, to detect slots the index
    /// region has wrapped onto.
    idx_page_id: Option<LogicalPageId>,
    /// Logical id of the first data page the loaded index page covers.
    idx_base: LogicalPageId,
}

impl<S: BlockStorage> SeriesStore<S> {
    /// Starts a scan. When bitmaps are enabled and a data bound is present,
    /// the query bitmap is built once here; with the index file available
    /// the scan will then walk index pages instead of the data region.
    pub fn scan(&self, filter: RangeFilter) -> Scan {
        let mut query_bitmap = None;
        let mut use_index = false;
        if let Some(codec) = &self.bitmap_codec {
            if filter.min_data.is_some() || filter.max_data.is_some() {
                let mut bm = vec![0u8; codec.bitmap_size()];
                codec.range(
                    filter.min_data.as_deref(),
                    filter.max_data.as_deref(),
                    &mut bm,
                );
                query_bitmap = Some(bm);
                use_index = self.index.is_some();
            }
        }
        Scan {
            filter,
            query_bitmap,
            use_index,
            pos: 0,
            rec: 0,
            page: None,
            page_id: None,
            done: false,
            idx_pos: 0,
            idx_rec: 0,
            idx_loaded: false,
            idx_page_id: None,
            idx_base: LogicalPageId(0),
        }
    }

    /// Yields the next matching record, or `None` when the scan is over.
    /// The slices borrow the read frame and are invalidated by the next
    /// engine call.
    pub fn scan_next<'a>(&'a mut self, scan: &mut Scan) -> Result<Option<(&'a [u8], &'a [u8])>> {
        if scan.done {
            return Ok(None);
        }
        let layout = self.layout;
        let hit = loop {
            let loaded = match scan.page {
                Some(page) => {
                    if self.buffered_page != Some(page) {
                        self.read_data_page(page)?;
                    }
                    let frame = self.frames.frame(DATA_READ_FRAME);
                    if scan.page_id == Some(layout.logical_id(frame)) {
                        layout.count(frame) as usize
                    } else {
                        // a wrap rewrote this slot while the cursor was
                        // parked on it; the records it was walking are gone
                        0
                    }
                }
                None => 0,
            };
            if scan.page.is_none() || scan.rec >= loaded {
                if !self.advance_page(scan)? {
                    scan.done = true;
                    break None;
                }
                scan.rec = 0;
                continue;
            }

            let at = scan.rec;
            scan.rec += 1;
            let frame = self.frames.frame(DATA_READ_FRAME);
            let key = layout.record_key(frame, at);
            let data = layout.record_data(frame, at);

            if let Some(min) = scan.filter.min_key.as_deref() {
                if self.key_codec.compare(key, min) == Ordering::Less {
                    continue;
                }
            }
            if let Some(max) = scan.filter.max_key.as_deref() {
                if self.key_codec.compare(key, max) == Ordering::Greater {
                    // keys are monotone: nothing later can match either
                    scan.done = true;
                    break None;
                }
            }
            if let Some(min) = scan.filter.min_data.as_deref() {
                if self.data_codec.compare(data, min) == Ordering::Less {
                    continue;
                }
            }
            if let Some(max) = scan.filter.max_data.as_deref() {
                if self.data_codec.compare(data, max) == Ordering::Greater {
                    continue;
                }
            }
            break Some(at);
        };

        match hit {
            Some(at) => {
                let frame = self.frames.frame(DATA_READ_FRAME);
                Ok(Some((
                    layout.record_key(frame, at),
                    layout.record_data(frame, at),
                )))
            }
            None => Ok(None),
        }
    }

    /// Loads the next candidate data page into the read frame. Returns
    /// false when no candidates remain.
    fn advance_page(&mut self, scan: &mut Scan) -> Result<bool> {
        loop {
            let physical = if scan.use_index {
                match self.next_index_candidate(scan)? {
                    Some(page) => page,
                    None => return Ok(false),
                }
            } else {
                // the position bound stops the cursor from lapping the
                // circular mapping; the slot itself must still be live
                if scan.pos >= self.data_alloc.live_pages() {
                    return Ok(false);
                }
                let page = self.data_alloc.to_physical(scan.pos);
                if !self.data_alloc.is_live(page) {
                    return Ok(false);
                }
                scan.pos += 1;
                page
            };

            self.read_data_page(physical)?;
            scan.page = Some(physical);
            scan.page_id = Some(
                self.layout
                    .logical_id(self.frames.frame(DATA_READ_FRAME)),
            );

            match scan.query_bitmap.as_deref() {
                Some(query) => {
                    let frame = self.frames.frame(DATA_READ_FRAME);
                    if bitmap::overlaps(query, self.layout.bitmap(frame)) {
                        return Ok(true);
                    }
                    // the page proves it holds nothing in range; next one
                }
                None => return Ok(true),
            }
        }
    }

    /// Walks index entries until one overlaps the query bitmap and returns
    /// the data page it covers. Returns `None` when the index is exhausted.
    fn next_index_candidate(&mut self, scan: &mut Scan) -> Result<Option<PhysicalPageId>> {
        let mut query = [0u8; MAX_BITMAP_WIDTH];
        let query = match scan.query_bitmap.as_deref() {
            Some(bm) => {
                query[..bm.len()].copy_from_slice(bm);
                &query[..bm.len()]
            }
            None => return Ok(None),
        };
        let Some(idx_layout) = self.idx_layout else {
            return Ok(None);
        };

        loop {
            let Some(alloc) = self.idx_alloc.as_ref() else {
                return Ok(None);
            };
            if scan.idx_pos >= alloc.live_pages() {
                return Ok(None);
            }
            let physical = alloc.to_physical(scan.idx_pos);
            let fresh = !scan.idx_loaded;
            if fresh || self.buffered_idx_page != Some(physical) {
                self.read_index_page(physical)?;
            }

            let header = IndexPageHeader::from_bytes(self.frames.frame(INDEX_READ_FRAME))?;
            let page_id = header.logical_id();
            let entries = header.entry_count() as usize;
            if fresh {
                scan.idx_loaded = true;
                scan.idx_page_id = Some(page_id);
                scan.idx_base = header.min_data_page();

                // entries for data pages a wrap has reclaimed are dead;
                // skip them without reading their pages
                let first_live = self.data_alloc.first_logical();
                if first_live > scan.idx_base {
                    let skip = (first_live.0 - scan.idx_base.0) as usize;
                    if skip >= entries {
                        // the whole page is dead, and possibly the next
                        // few: each full index page covers max_entries
                        // data pages
                        scan.idx_pos += (skip / idx_layout.max_entries).max(1) as u32;
                        scan.idx_rec = 0;
                        scan.idx_loaded = false;
                        continue;
                    }
                    scan.idx_rec = scan.idx_rec.max(skip);
                }
            } else if scan.idx_page_id != Some(page_id) {
                // the index region wrapped onto this slot while the cursor
                // was parked on it; take the page now in the slot from the
                // top instead of resuming into foreign entries
                scan.idx_rec = 0;
                scan.idx_loaded = false;
                continue;
            }

            let frame = self.frames.frame(INDEX_READ_FRAME);
            while scan.idx_rec < entries {
                let entry = idx_layout.entry(frame, scan.idx_rec);
                let covered = LogicalPageId(scan.idx_base.0 + scan.idx_rec as u32);
                scan.idx_rec += 1;
                if !bitmap::overlaps(query, entry) {
                    continue;
                }
                // an interleaved write can reclaim this entry's data page
                // after the index page was loaded; the id check matters
                // because the mapping saturates for ids below the window
                if covered < self.data_alloc.first_logical() {
                    continue;
                }
                let physical = self.data_alloc.physical_of(covered);
                if !self.data_alloc.is_live(physical) {
                    continue;
                }
                return Ok(Some(physical));
            }

            scan.idx_pos += 1;
            scan.idx_rec = 0;
            scan.idx_loaded = false;
        }
    }
}
