//! In-memory page storage, the file backend's drop-in twin.

use eyre::{bail, ensure, Result};

use super::BlockStorage;
use crate::region::PhysicalPageId;

/// A growable in-memory region. Pages must be written before they can be
/// read, matching the file backend's behavior on fresh files.
#[derive(Debug)]
pub struct MemStorage {
    bytes: Vec<u8>,
    page_size: usize,
}

impl MemStorage {
    pub fn new(page_size: usize) -> Self {
        Self {
            bytes: Vec::new(),
            page_size,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl BlockStorage for MemStorage {
    fn read_page(&mut self, page: PhysicalPageId, frame: &mut [u8]) -> Result<()> {
        ensure!(
            frame.len() == self.page_size,
            "frame length {} does not match page size {}",
            frame.len(),
            self.page_size
        );
        let start = page.0 as usize * self.page_size;
        if start + self.page_size > self.bytes.len() {
            bail!("page {} has never been written", page.0);
        }
        frame.copy_from_slice(&self.bytes[start..start + self.page_size]);
        Ok(())
    }

    fn write_page(&mut self, page: PhysicalPageId, frame: &[u8]) -> Result<()> {
        ensure!(
            frame.len() == self.page_size,
            "frame length {} does not match page size {}",
            frame.len(),
            self.page_size
        );
        let start = page.0 as usize * self.page_size;
        if start + self.page_size > self.bytes.len() {
            self.bytes.resize(start + self.page_size, 0);
        }
        self.bytes[start..start + self.page_size].copy_from_slice(frame);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}
