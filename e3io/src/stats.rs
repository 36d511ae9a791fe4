// SPDX-License-Identifier: MIT

use crate::{E3IO, IoResult, SECTOR_SIZE};

/// Simple counters, no_std friendly.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct IoStats {
    pub reads: u64,
    pub read_bytes: u64,
    pub writes: u64,
    pub write_bytes: u64,
    pub flushes: u64,

    // Requests not aligned on a sector boundary
    pub unaligned: u64,
}

impl IoStats {
    #[inline]
    pub fn reset(&mut self) {
        *self = IoStats::default();
    }
}

/// Transparent instrumentation wrapper.
#[derive(Debug)]
pub struct IOCounter<IO: E3IO> {
    inner: IO,
    pub stats: IoStats,
}

impl<IO: E3IO> IOCounter<IO> {
    #[inline]
    pub fn new(inner: IO) -> Self {
        Self {
            inner,
            stats: IoStats::default(),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> IoStats {
        self.stats
    }

    #[inline]
    pub fn into_inner(self) -> IO {
        self.inner
    }

    #[inline]
    fn track_alignment(&mut self, offset: u64, len: usize) {
        let s = SECTOR_SIZE as u64;
        if !offset.is_multiple_of(s) || !(len as u64).is_multiple_of(s) {
            self.stats.unaligned += 1;
        }
    }
}

impl<IO: E3IO> E3IO for IOCounter<IO> {
    #[inline]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> IoResult {
        self.track_alignment(offset, data.len());
        self.stats.writes += 1;
        self.stats.write_bytes += data.len() as u64;
        self.inner.write_at(offset, data)
    }

    #[inline]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> IoResult {
        self.track_alignment(offset, buf.len());
        self.stats.reads += 1;
        self.stats.read_bytes += buf.len() as u64;
        self.inner.read_at(offset, buf)
    }

    #[inline]
    fn flush(&mut self) -> IoResult {
        self.stats.flushes += 1;
        self.inner.flush()
    }
}

#[cfg(all(test, feature = "mem", feature = "std"))]
mod test {
    use crate::prelude::*;

    #[test]
    fn test_counts_sector_traffic() {
        let mut buf = vec![0u8; 4 * SECTOR_SIZE];
        let mut io = IOCounter::new(MemIO::new(&mut buf));

        let sector = [1u8; SECTOR_SIZE];
        io.write_sector(1, &sector).unwrap();
        let mut back = [0u8; SECTOR_SIZE];
        io.read_sector(1, &mut back).unwrap();
        io.read_u16_at(3).unwrap();
        io.flush().unwrap();

        let s = io.snapshot();
        assert_eq!(s.writes, 1);
        assert_eq!(s.reads, 2);
        assert_eq!(s.read_bytes, SECTOR_SIZE as u64 + 2);
        assert_eq!(s.flushes, 1);
        assert_eq!(s.unaligned, 1);
    }
}
