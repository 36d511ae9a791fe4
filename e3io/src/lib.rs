// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

// Core modules
pub mod errors;
mod macros;
pub mod stats;

// Backend modules
#[cfg(feature = "mem")]
mod mem;

#[cfg(feature = "std")]
mod std;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::E3IO;
    pub use super::E3IOExt;
    pub use super::E3IOStructExt;
    pub use super::SECTOR_SIZE;
    pub use super::Sector;
    pub use super::errors::*;
    pub use super::stats::*;

    #[cfg(feature = "mem")]
    pub use super::mem::MemIO;

    #[cfg(feature = "std")]
    pub use super::std::StdIO;
}

// Internal use
use errors::*;

// Constants

/// Size of one device sector. The format never uses anything else.
pub const SECTOR_SIZE: usize = 512;

/// One sector worth of bytes.
pub type Sector = [u8; SECTOR_SIZE];

/// Absolute offset of a `len`-byte field at `byte` inside `sector`.
/// Fields never straddle a sector boundary.
#[doc(hidden)]
#[inline]
pub fn field_offset(sector: u64, byte: usize, len: usize) -> IoResult<u64> {
    if byte + len > SECTOR_SIZE {
        return Err(IoError::OutOfBounds);
    }
    sector
        .checked_mul(SECTOR_SIZE as u64)
        .and_then(|base| base.checked_add(byte as u64))
        .ok_or(IoError::OutOfBounds)
}

// Traits

/// Byte-addressed device abstraction.
///
/// Implementations may target RAM, image files or a block device. All calls
/// are synchronous; `flush` forces pending writes to stable storage.
pub trait E3IO {
    /// Writes `data` at `offset` (absolute).
    fn write_at(&mut self, offset: u64, data: &[u8]) -> IoResult;

    /// Reads `buf.len()` bytes into `buf` from `offset` (absolute).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> IoResult;

    /// Flushes any buffered data (may be a no-op).
    fn flush(&mut self) -> IoResult;
}

/// Sector-addressed helpers on top of [`E3IO`].
///
/// The filesystem only ever talks in whole 512-byte sectors; these helpers
/// are the "read sector N" / "write sector N" primitives it is built on.
pub trait E3IOExt: E3IO {
    /// Reads sector `n` into `buf`.
    #[inline(always)]
    fn read_sector(&mut self, n: u64, buf: &mut Sector) -> IoResult {
        let off = n.checked_mul(SECTOR_SIZE as u64).ok_or(IoError::OutOfBounds)?;
        self.read_at(off, buf)
    }

    /// Writes `buf` to sector `n`.
    #[inline(always)]
    fn write_sector(&mut self, n: u64, buf: &Sector) -> IoResult {
        let off = n.checked_mul(SECTOR_SIZE as u64).ok_or(IoError::OutOfBounds)?;
        self.write_at(off, buf)
    }

    /// Reads `buf.len() / SECTOR_SIZE` contiguous sectors starting at `first`.
    ///
    /// # Errors
    /// Returns `IoError::Unaligned` if `buf.len()` is not a multiple of the sector size.
    #[inline(always)]
    fn read_sectors(&mut self, first: u64, buf: &mut [u8]) -> IoResult {
        if !buf.len().is_multiple_of(SECTOR_SIZE) {
            return Err(IoError::Unaligned);
        }
        let off = first
            .checked_mul(SECTOR_SIZE as u64)
            .ok_or(IoError::OutOfBounds)?;
        self.read_at(off, buf)
    }

    /// Writes `buf.len() / SECTOR_SIZE` contiguous sectors starting at `first`.
    #[inline(always)]
    fn write_sectors(&mut self, first: u64, buf: &[u8]) -> IoResult {
        if !buf.len().is_multiple_of(SECTOR_SIZE) {
            return Err(IoError::Unaligned);
        }
        let off = first
            .checked_mul(SECTOR_SIZE as u64)
            .ok_or(IoError::OutOfBounds)?;
        self.write_at(off, buf)
    }

    /// Zeroes `count` sectors starting at `first`.
    #[inline(always)]
    fn zero_sectors(&mut self, first: u64, count: u64) -> IoResult {
        const ZERO: Sector = [0u8; SECTOR_SIZE];
        for n in first..first.saturating_add(count) {
            self.write_sector(n, &ZERO)?;
        }
        Ok(())
    }

    // Little-endian u8/u16/u32 field accessors
    e3io_impl_le_fields!(u8, u16, u32);
}

impl<T: E3IO + ?Sized> E3IOExt for T {}

/// Extension trait for reading and writing on-disk structs using zerocopy.
pub trait E3IOStructExt: E3IO {
    /// Reads a struct of type `T` from the given offset.
    fn read_struct<T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
    ) -> IoResult<T> {
        let size = core::mem::size_of::<T>();
        if size > SECTOR_SIZE {
            return Err(IoError::Other("read_struct: type larger than a sector"));
        }
        let mut buf = [0u8; SECTOR_SIZE];
        self.read_at(offset, &mut buf[..size])?;
        T::read_from_bytes(&buf[..size]).map_err(|_| IoError::Other("read_struct failed"))
    }

    /// Writes a struct of type `T` at the given offset.
    fn write_struct<T: zerocopy::IntoBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
        val: &T,
    ) -> IoResult {
        self.write_at(offset, val.as_bytes())
    }
}

impl<T: E3IO + ?Sized> E3IOStructExt for T {}
