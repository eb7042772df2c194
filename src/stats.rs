//! # Operation Counters
//!
//! Lightweight per-engine counters for the physical work behind each
//! operation: page reads and writes on the data and index files, and reads
//! served from the resident read frames instead of storage. Point-lookup
//! cost and index pruning effectiveness are both judged from these numbers.
//!
//! The counters are plain integers on the engine; the engine is
//! single-threaded by contract so no atomics are involved.

use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Data pages read from storage.
    pub reads: u64,
    /// Data pages written to storage.
    pub writes: u64,
    /// Index pages read from storage.
    pub idx_reads: u64,
    /// Index pages written to storage.
    pub idx_writes: u64,
    /// Page requests served from a read frame without touching storage.
    pub buffer_hits: u64,
}

impl Stats {
    pub fn reset(&mut self) {
        *self = Stats::default();
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "data page reads:   {}", self.reads)?;
        writeln!(f, "data page writes:  {}", self.writes)?;
        writeln!(f, "index page reads:  {}", self.idx_reads)?;
        writeln!(f, "index page writes: {}", self.idx_writes)?;
        write!(f, "buffer hits:       {}", self.buffer_hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_all_counters() {
        let mut stats = Stats {
            reads: 3,
            writes: 2,
            idx_reads: 1,
            idx_writes: 1,
            buffer_hits: 9,
        };
        stats.reset();

        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn display_lists_every_counter() {
        let stats = Stats {
            reads: 12,
            writes: 5,
            idx_reads: 2,
            idx_writes: 1,
            buffer_hits: 7,
        };
        let report = stats.to_string();

        assert!(report.contains("data page reads:   12"));
        assert!(report.contains("buffer hits:       7"));
    }
}
