//! # StrataDB - Embedded Time-Series Storage Engine
//!
//! StrataDB is an append-only key-value store for time-series workloads on
//! resource-constrained, flash-backed or file-backed block storage. Keys
//! arrive in non-decreasing order (timestamps), values are fixed-size
//! records, and everything is written in sequential physical order through
//! a handful of pre-allocated page frames:
//!
//! - **Sequential writes only**: records accumulate in one write frame and
//!   full pages land at the next slot of a circular, erase-block-aligned
//!   region. No in-place updates, no deletes; a wrap reclaims the oldest
//!   erase block.
//! - **Per-page summaries**: each page records its min/max key, min/max
//!   data, and a small bitmap over a caller-defined data attribute.
//! - **Interpolated point lookup**: the monotone key stream makes page
//!   positions predictable; lookups land near the right page arithmetically
//!   and finish with an in-page binary search.
//! - **Bitmap-pruned scans**: a data-range query builds one query bitmap
//!   and skips every page whose bitmap cannot overlap it, driven by a
//!   compact secondary index file when one is configured.
//!
//! ## Quick Start
//!
//! ```ignore
//! use stratadb::{LinearBucketCodec, RangeFilter, SeriesStore};
//!
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
//!
//! store.put(&1000u32.to_le_bytes(), &record)?;
//! store.flush()?;
//!
//! if let Some(data) = store.get(&1000u32.to_le_bytes())? {
//!     // data borrows the read frame until the next store call
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        SeriesStore (put/get/flush)          │
//! ├──────────────────────┬──────────────────────┤
//! │  Scan (range query,  │  Point lookup        │
//! │  bitmap pruning)     │  (interpolated)      │
//! ├──────────────────────┴──────────────────────┤
//! │  Page codecs (data page, index page)        │
//! ├─────────────────────────────────────────────┤
//! │  Region allocators (circular, erase-aware)  │
//! ├─────────────────────────────────────────────┤
//! │  Frame pool (2 or 4 fixed page frames)      │
//! ├─────────────────────────────────────────────┤
//! │  BlockStorage (file-backed or in-memory)    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`store`]: the engine; write path, point lookup, flush
//! - [`scan`]: range scans with bitmap pruning
//! - [`region`]: circular allocators and the two page id types
//! - [`storage`]: block storage trait, backends, page layouts
//! - [`buffer`]: the fixed frame pool
//! - [`bitmap`]: bitmap codec trait and bucketized encoders
//! - [`record`]: key and data capability traits
//! - [`config`]: builder and resolved configuration
//! - [`stats`]: operation counters
//!
//! ## Constraints
//!
//! The store is single-threaded and non-reentrant; all I/O is synchronous.
//! Keys must be inserted in non-decreasing order, records are fixed-size,
//! and files are truncated at open (no recovery from previous runs).

pub mod bitmap;
pub mod buffer;
pub mod config;
pub mod record;
pub mod region;
pub mod scan;
pub mod stats;
pub mod storage;
pub mod store;

pub use bitmap::{BitmapCodec, LinearBucketCodec};
pub use config::{Features, SearchMode, StoreBuilder, StoreConfig};
pub use record::{DataCodec, KeyCodec, U32LeKey, U32LePrefix};
pub use region::{LogicalPageId, PhysicalPageId};
pub use scan::{RangeFilter, Scan};
pub use stats::Stats;
pub use storage::{BlockStorage, FileStorage, MemStorage};
pub use store::SeriesStore;
