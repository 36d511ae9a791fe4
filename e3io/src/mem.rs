// SPDX-License-Identifier: MIT

use crate::{E3IO, IoError, IoResult};

/// In-memory implementation of `E3IO`.
///
/// Useful for tests and RAM-backed images.
#[derive(Debug)]
pub struct MemIO<'a> {
    buffer: &'a mut [u8],
    flushes: u64,
}

impl<'a> MemIO<'a> {
    #[inline]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, flushes: 0 }
    }

    /// Number of `flush` calls seen so far.
    #[inline]
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    fn check_bounds(&self, off: u64, len: usize) -> IoResult<usize> {
        let end = off.checked_add(len as u64).ok_or(IoError::OutOfBounds)?;
        if end > self.buffer.len() as u64 {
            return Err(IoError::OutOfBounds);
        }
        Ok(off as usize)
    }
}

impl<'a> E3IO for MemIO<'a> {
    #[inline(always)]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> IoResult {
        let start = self.check_bounds(offset, data.len())?;
        self.buffer[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    #[inline(always)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> IoResult {
        let start = self.check_bounds(offset, buf.len())?;
        buf.copy_from_slice(&self.buffer[start..start + buf.len()]);
        Ok(())
    }

    #[inline]
    fn flush(&mut self) -> IoResult {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(all(test, feature = "std"))]
mod test {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_rw() {
        let mut buf = [0u8; 256];
        let mut io = MemIO::new(&mut buf);
        io.write_at(10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        io.read_at(10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut buf = [0u8; 512];
        let mut io = MemIO::new(&mut buf);
        let mut sector = [0u8; SECTOR_SIZE];
        io.read_sector(0, &mut sector).unwrap();
        assert_eq!(io.read_sector(1, &mut sector), Err(IoError::OutOfBounds));
        assert_eq!(io.write_at(510, &[0u8; 4]), Err(IoError::OutOfBounds));
    }

    #[test]
    fn test_sector_rw() {
        let mut buf = vec![0u8; 4 * SECTOR_SIZE];
        let mut io = MemIO::new(&mut buf);

        let mut sector = [0u8; SECTOR_SIZE];
        sector[0] = 0xAB;
        sector[511] = 0xCD;
        io.write_sector(2, &sector).unwrap();

        let mut back = [0u8; SECTOR_SIZE];
        io.read_sector(2, &mut back).unwrap();
        assert_eq!(back, sector);
        assert_eq!(buf[2 * SECTOR_SIZE], 0xAB);
    }

    #[test]
    fn test_zero_sectors() {
        let mut buf = vec![0xFFu8; 3 * SECTOR_SIZE];
        let mut io = MemIO::new(&mut buf);

        io.zero_sectors(1, 1).unwrap();

        assert!(buf[..SECTOR_SIZE].iter().all(|&b| b == 0xFF));
        assert!(buf[SECTOR_SIZE..2 * SECTOR_SIZE].iter().all(|&b| b == 0));
        assert!(buf[2 * SECTOR_SIZE..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_primitive_le() {
        let mut buf = [0u8; 16];
        let mut io = MemIO::new(&mut buf);
        io.write_u16_at(2, 0x7FFF).unwrap();
        io.write_u32_at(4, 0x3355_4D45).unwrap();
        assert_eq!(io.read_u16_at(2).unwrap(), 0x7FFF);
        assert_eq!(io.read_u8_at(4).unwrap(), 0x45);
        assert_eq!(&buf[4..8], b"EMU3");
    }

    #[test]
    fn test_unaligned_sectors_rejected() {
        let mut buf = vec![0u8; 2 * SECTOR_SIZE];
        let mut io = MemIO::new(&mut buf);
        let mut short = [0u8; 100];
        assert_eq!(io.read_sectors(0, &mut short), Err(IoError::Unaligned));
    }

    #[test]
    fn test_fields_in_sector() {
        let mut buf = vec![0u8; 2 * SECTOR_SIZE];
        let mut io = MemIO::new(&mut buf);
        io.write_u16_in_sector(1, 0x12, 0x0009).unwrap();
        io.write_u8_in_sector(1, 0, 0x0A).unwrap();
        assert_eq!(io.read_u16_in_sector(1, 0x12).unwrap(), 9);
        // A field may not spill into the next sector.
        assert_eq!(io.write_u32_in_sector(0, 510, 1), Err(IoError::OutOfBounds));
        assert_eq!(buf[SECTOR_SIZE], 0x0A);
        assert_eq!(&buf[SECTOR_SIZE + 0x12..SECTOR_SIZE + 0x14], &[0x09, 0x00]);
    }
}
