//! # Index Page Layout
//!
//! The secondary index is a sequence of pages holding one bitmap entry per
//! flushed data page, in flush order. A scan with a data-range predicate
//! walks these small pages instead of the data region and only reads the
//! data pages whose entry overlaps the query bitmap.
//!
//! ## Header (16 bytes)
//!
//! ```text
//! Offset  Size  Field          Description
//! ------  ----  -------------  -----------------------------------------
//! 0       4     logical_id     Logical index page id, stamped at flush
//! 4       2     entry_count    Number of bitmap entries on this page
//! 6       2     (padding)
//! 8       4     min_data_page  Logical id of the first data page covered
//! 12      4     (reserved)
//! ```
//!
//! Entry `i` summarizes data page `min_data_page + i`; that correspondence
//! is what lets a scan skip entries for reclaimed data pages without reading
//! them. Entries are raw bitmaps of the configured width, packed back to
//! back after the header.
//!
//! The header is a fixed, naturally aligned layout, so it is transmuted in
//! place with `zerocopy`. Page frames come from the engine's frame pool,
//! which aligns every frame to 8 bytes.

use eyre::{ensure, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::region::LogicalPageId;

pub const INDEX_HEADER_SIZE: usize = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IndexPageHeader {
    logical_id: u32,
    entry_count: u16,
    _pad: u16,
    min_data_page: u32,
    _reserved: u32,
}

impl IndexPageHeader {
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        let size = std::mem::size_of::<Self>();
        ensure!(
            data.len() >= size,
            "buffer too small for IndexPageHeader: {} < {}",
            data.len(),
            size
        );
        Self::ref_from_bytes(&data[..size])
            .map_err(|e| eyre::eyre!("failed to read IndexPageHeader: {:?}", e))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        let size = std::mem::size_of::<Self>();
        ensure!(
            data.len() >= size,
            "buffer too small for IndexPageHeader: {} < {}",
            data.len(),
            size
        );
        Self::mut_from_bytes(&mut data[..size])
            .map_err(|e| eyre::eyre!("failed to read IndexPageHeader: {:?}", e))
    }

    pub fn logical_id(&self) -> LogicalPageId {
        LogicalPageId(self.logical_id)
    }

    pub fn set_logical_id(&mut self, id: LogicalPageId) {
        self.logical_id = id.0;
    }

    pub fn entry_count(&self) -> u16 {
        self.entry_count
    }

    pub fn set_entry_count(&mut self, count: u16) {
        self.entry_count = count;
    }

    pub fn min_data_page(&self) -> LogicalPageId {
        LogicalPageId(self.min_data_page)
    }

    pub fn set_min_data_page(&mut self, id: LogicalPageId) {
        self.min_data_page = id.0;
    }
}

/// Entry geometry for one index-page configuration.
#[derive(Debug, Clone, Copy)]
pub struct IndexLayout {
    pub page_size: usize,
    pub entry_size: usize,
    pub max_entries: usize,
}

impl IndexLayout {
    pub fn new(page_size: usize, bitmap_size: usize) -> Result<Self> {
        ensure!(bitmap_size >= 1, "index entries need a non-empty bitmap");
        let max_entries = (page_size - INDEX_HEADER_SIZE) / bitmap_size;
        ensure!(
            max_entries >= 1,
            "page size {} cannot fit the index header plus one {} byte entry",
            page_size,
            bitmap_size
        );
        Ok(Self {
            page_size,
            entry_size: bitmap_size,
            max_entries,
        })
    }

    pub fn init_page(&self, frame: &mut [u8]) {
        frame.fill(0);
    }

    pub fn entry<'a>(&self, frame: &'a [u8], index: usize) -> &'a [u8] {
        let at = INDEX_HEADER_SIZE + index * self.entry_size;
        &frame[at..at + self.entry_size]
    }

    pub fn entry_mut<'a>(&self, frame: &'a mut [u8], index: usize) -> &'a mut [u8] {
        let at = INDEX_HEADER_SIZE + index * self.entry_size;
        &mut frame[at..at + self.entry_size]
    }
}
