//! Seek-based page I/O against a single file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};

use super::BlockStorage;
use crate::region::PhysicalPageId;

/// One storage region backed by one file. Creation truncates: a store never
/// resumes from an existing file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    file: File,
    page_size: usize,
}

impl FileStorage {
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to create storage file {:?}", path))?;
        Ok(Self {
            path,
            file,
            page_size,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn offset(&self, page: PhysicalPageId) -> u64 {
        page.0 as u64 * self.page_size as u64
    }
}

impl BlockStorage for FileStorage {
    fn read_page(&mut self, page: PhysicalPageId, frame: &mut [u8]) -> Result<()> {
        ensure!(
            frame.len() == self.page_size,
            "frame length {} does not match page size {}",
            frame.len(),
            self.page_size
        );
        self.file
            .seek(SeekFrom::Start(self.offset(page)))
            .wrap_err_with(|| format!("seek to page {} in {:?} failed", page.0, self.path))?;
        self.file
            .read_exact(frame)
            .wrap_err_with(|| format!("failed to read page {} from {:?}", page.0, self.path))
    }

    fn write_page(&mut self, page: PhysicalPageId, frame: &[u8]) -> Result<()> {
        ensure!(
            frame.len() == self.page_size,
            "frame length {} does not match page size {}",
            frame.len(),
            self.page_size
        );
        self.file
            .seek(SeekFrom::Start(self.offset(page)))
            .wrap_err_with(|| format!("seek to page {} in {:?} failed", page.0, self.path))?;
        self.file
            .write_all(frame)
            .wrap_err_with(|| format!("failed to write page {} to {:?}", page.0, self.path))
    }

    fn sync(&mut self) -> Result<()> {
        self.file
            .sync_all()
            .wrap_err_with(|| format!("failed to sync {:?}", self.path))
    }
}
