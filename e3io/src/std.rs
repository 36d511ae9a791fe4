// SPDX-License-Identifier: MIT

use std::io::{Error, Read, Seek, SeekFrom, Write};

use crate::{E3IO, IoError, IoResult};

/// `E3IO` over any seekable stream, typically an image file.
#[derive(Debug)]
pub struct StdIO<'a, T: Read + Write + Seek> {
    io: &'a mut T,
}

impl<'a, T: Read + Write + Seek> StdIO<'a, T> {
    #[inline]
    pub fn new(io: &'a mut T) -> Self {
        Self { io }
    }
}

impl<'a, T: Read + Write + Seek> E3IO for StdIO<'a, T> {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> IoResult {
        self.io.seek(SeekFrom::Start(offset))?;
        self.io.write_all(data)?;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> IoResult {
        self.io.seek(SeekFrom::Start(offset))?;
        self.io.read_exact(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> IoResult {
        self.io.flush()?;
        Ok(())
    }
}

impl From<Error> for IoError {
    #[cold]
    #[inline(never)]
    fn from(e: Error) -> Self {
        // Leak the string to produce a 'static str. Acceptable for error mapping.
        let leaked_str: &'static str = Box::leak(e.to_string().into_boxed_str());
        IoError::Other(leaked_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::*;
    use tempfile::tempfile;

    #[test]
    fn test_rw() {
        let mut file = tempfile().unwrap();
        let mut io = StdIO::new(&mut file);
        io.write_at(10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        io.read_at(10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
    }

    #[test]
    fn test_sector_rw_and_flush() {
        let mut file = tempfile().unwrap();
        let mut io = StdIO::new(&mut file);

        let sector = [0x5Au8; SECTOR_SIZE];
        io.write_sector(3, &sector).unwrap();
        io.flush().unwrap();

        let mut back = [0u8; SECTOR_SIZE];
        io.read_sector(3, &mut back).unwrap();
        assert_eq!(back, sector);
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut file = tempfile().unwrap();
        let mut io = StdIO::new(&mut file);
        let mut back = [0u8; SECTOR_SIZE];
        assert!(io.read_sector(0, &mut back).is_err());
    }
}
