//! # Block Storage
//!
//! The engine talks to its backing device through one narrow, page-granular
//! interface: read a page, write a page, sync. Erase is not a device call
//! here; the region allocator models reclamation by advancing its erase
//! frontier at write time, and a reclaimed slot is simply overwritten later.
//!
//! Two backends are provided:
//!
//! - `FileStorage`: seek-based I/O against one file, truncated at creation.
//!   This is the normal deployment shape, with the data and index regions in
//!   `datafile.bin` and `idxfile.bin`.
//! - `MemStorage`: a growable in-memory region. Useful for tests and for
//!   RAM-backed scratch stores.
//!
//! All I/O is synchronous and blocking; the engine is single-threaded and
//! issues one operation at a time. Every call transfers exactly one page of
//! the configured size.

mod file;
mod index_page;
mod memory;
mod page;

pub use file::FileStorage;
pub use index_page::{IndexLayout, IndexPageHeader, INDEX_HEADER_SIZE};
pub use memory::MemStorage;
pub use page::PageLayout;

use eyre::Result;

use crate::region::PhysicalPageId;

/// Page-granular access to a storage region.
pub trait BlockStorage {
    /// Reads the page at `page` into `frame`. The frame length must equal
    /// the backend's page size.
    fn read_page(&mut self, page: PhysicalPageId, frame: &mut [u8]) -> Result<()>;

    /// Writes `frame` to the page at `page`, overwriting whatever the slot
    /// held before.
    fn write_page(&mut self, page: PhysicalPageId, frame: &[u8]) -> Result<()>;

    /// Blocks until previously written pages are durable.
    fn sync(&mut self) -> Result<()>;
}
