//! # Store Configuration
//!
//! A store is configured through a fluent builder and validated once at
//! open. Geometry (key, data, and page sizes, the region bounds, the erase
//! block size) is plain data; behavior at the seams (ordering, interpolation,
//! bitmap encoding) is supplied as capability objects. Invalid combinations
//! are rejected at `open`, never discovered later.
//!
//! ## Feature Toggles
//!
//! | toggle | effect |
//! |---|---|
//! | `track_min_max` | per-page min/max key and data summary fields |
//! | `bitmap_codec(..)` | per-page data bitmaps (width comes from the codec) |
//! | `use_index` | a secondary file of per-page bitmaps for scan pruning |
//! | `track_sum` | reserved; accepted but maintains nothing |
//!
//! The secondary index stores bitmaps, so `use_index` requires a bitmap
//! codec. Indexing also needs four page frames; if the buffer holds fewer,
//! the store downgrades to no-index rather than failing.
//!
//! ## Region Layout
//!
//! `start_address..end_address` (bytes) divided by `page_size` gives the
//! page budget. Without the index the whole budget is the data region. With
//! it, roughly one percent of the pages (at least two erase blocks, rounded
//! up to an erase-block multiple) is carved off for index pages, which live
//! in their own file addressed from slot zero.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = SeriesStore::builder()
//!     .key_size(4)
//!     .data_size(12)
//!     .page_size(512)
//!     .buffer_blocks(4)
//!     .end_address(512 * 1000)
//!     .erase_size_pages(4)
//!     .bitmap_codec(Box::new(LinearBucketCodec::new(8, 0, 1000)?))
//!     .use_index(true)
//!     .open("./store")?;
//! ```

use std::path::Path;

use eyre::{Result, WrapErr};

use crate::bitmap::BitmapCodec;
use crate::record::{DataCodec, KeyCodec};
use crate::storage::{BlockStorage, FileStorage};
use crate::store::SeriesStore;

pub const DATA_FILE_NAME: &str = "datafile.bin";
pub const INDEX_FILE_NAME: &str = "idxfile.bin";

/// Frames required to run without the secondary index.
pub const MIN_BUFFER_BLOCKS: usize = 2;
/// Frames required to run with it.
pub const INDEX_BUFFER_BLOCKS: usize = 4;
/// Index pages target roughly this fraction of the page budget.
pub const INDEX_REGION_DIVISOR: u32 = 100;

/// Summary and index toggles, resolved at open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    pub use_index: bool,
    pub track_min_max: bool,
    /// Reserved for page-level aggregates; maintains nothing.
    pub track_sum: bool,
    pub use_bitmap: bool,
}

/// Point-lookup strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Estimate the page from the key value and the running average key
    /// gap, then correct against page summaries. Expected O(1) page reads
    /// on uniformly spaced keys.
    #[default]
    Interpolated,
    /// Plain binary search over the live page range.
    Binary,
}

/// Resolved configuration held by an open store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub key_size: usize,
    pub data_size: usize,
    pub page_size: usize,
    pub buffer_blocks: usize,
    pub start_address: u64,
    pub end_address: u64,
    pub erase_size_pages: u32,
    pub bitmap_size: usize,
    pub features: Features,
    pub search_mode: SearchMode,
}

/// Fluent configuration for [`SeriesStore`]. Obtain one through
/// `SeriesStore::builder()`.
pub struct StoreBuilder {
    pub(crate) key_size: usize,
    pub(crate) data_size: usize,
    pub(crate) page_size: usize,
    pub(crate) buffer_blocks: usize,
    pub(crate) start_address: u64,
    pub(crate) end_address: u64,
    pub(crate) erase_size_pages: u32,
    pub(crate) use_index: bool,
    pub(crate) track_min_max: bool,
    pub(crate) track_sum: bool,
    pub(crate) search_mode: SearchMode,
    pub(crate) key_codec: Option<Box<dyn KeyCodec>>,
    pub(crate) data_codec: Option<Box<dyn DataCodec>>,
    pub(crate) bitmap_codec: Option<Box<dyn BitmapCodec>>,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            key_size: 4,
            data_size: 12,
            page_size: 512,
            buffer_blocks: MIN_BUFFER_BLOCKS,
            start_address: 0,
            end_address: 0,
            erase_size_pages: 8,
            use_index: false,
            track_min_max: true,
            track_sum: false,
            search_mode: SearchMode::default(),
            key_codec: None,
            data_codec: None,
            bitmap_codec: None,
        }
    }

    pub fn key_size(mut self, bytes: usize) -> Self {
        self.key_size = bytes;
        self
    }

    pub fn data_size(mut self, bytes: usize) -> Self {
        self.data_size = bytes;
        self
    }

    pub fn page_size(mut self, bytes: usize) -> Self {
        self.page_size = bytes;
        self
    }

    /// Number of page frames in the buffer pool. Two minimum; four when the
    /// secondary index is enabled.
    pub fn buffer_blocks(mut self, frames: usize) -> Self {
        self.buffer_blocks = frames;
        self
    }

    pub fn start_address(mut self, bytes: u64) -> Self {
        self.start_address = bytes;
        self
    }

    pub fn end_address(mut self, bytes: u64) -> Self {
        self.end_address = bytes;
        self
    }

    pub fn erase_size_pages(mut self, pages: u32) -> Self {
        self.erase_size_pages = pages;
        self
    }

    /// Enables the secondary bitmap index. Requires a bitmap codec and four
    /// buffer frames; with fewer frames the store silently runs unindexed.
    pub fn use_index(mut self, enabled: bool) -> Self {
        self.use_index = enabled;
        self
    }

    pub fn track_min_max(mut self, enabled: bool) -> Self {
        self.track_min_max = enabled;
        self
    }

    /// Reserved. Accepted for configuration compatibility; no summaries are
    /// maintained yet.
    pub fn track_sum(mut self, enabled: bool) -> Self {
        self.track_sum = enabled;
        self
    }

    pub fn search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    /// Key ordering and numeric projection. Defaults to 4-byte
    /// little-endian unsigned keys.
    pub fn key_codec(mut self, codec: Box<dyn KeyCodec>) -> Self {
        self.key_codec = Some(codec);
        self
    }

    /// Data ordering. Defaults to ordering by the leading 4 bytes.
    pub fn data_codec(mut self, codec: Box<dyn DataCodec>) -> Self {
        self.data_codec = Some(codec);
        self
    }

    /// Enables per-page data bitmaps using the given encoder. The bitmap
    /// width is taken from the codec.
    pub fn bitmap_codec(mut self, codec: Box<dyn BitmapCodec>) -> Self {
        self.bitmap_codec = Some(codec);
        self
    }

    /// True when the index survives the frame-count downgrade rule.
    pub(crate) fn effective_index(&self) -> bool {
        self.use_index && self.buffer_blocks >= INDEX_BUFFER_BLOCKS
    }

    /// Opens a file-backed store inside `dir`, creating the directory and
    /// truncating `datafile.bin` (and `idxfile.bin` when indexed).
    pub fn open<P: AsRef<Path>>(self, dir: P) -> Result<SeriesStore<FileStorage>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create store directory {:?}", dir))?;
        let data = FileStorage::create(dir.join(DATA_FILE_NAME), self.page_size)?;
        let index = if self.effective_index() {
            Some(FileStorage::create(
                dir.join(INDEX_FILE_NAME),
                self.page_size,
            )?)
        } else {
            None
        };
        SeriesStore::build(self, data, index)
    }

    /// Opens a store over caller-supplied storage backends.
    pub fn open_with<S: BlockStorage>(self, data: S, index: Option<S>) -> Result<SeriesStore<S>> {
        SeriesStore::build(self, data, index)
    }
}
