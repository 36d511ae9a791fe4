// SPDX-License-Identifier: MIT

/// Little-endian field accessors for on-disk integers.
///
/// For each type this emits `read_<ty>_at` / `write_<ty>_at` on an absolute
/// byte offset, plus `read_<ty>_in_sector` / `write_<ty>_in_sector` taking a
/// sector number and a byte offset inside it, the way superblock and info
/// fields are addressed.
#[macro_export]
macro_rules! e3io_impl_le_fields {
    ($($ty:ty),+ $(,)?) => {
        $(
            paste::paste! {
                #[inline(always)]
                fn [<write_ $ty _at>](&mut self, offset: u64, value: $ty) -> IoResult {
                    self.write_at(offset, &value.to_le_bytes())
                }

                #[inline(always)]
                fn [<read_ $ty _at>](&mut self, offset: u64) -> IoResult<$ty> {
                    let mut buf = [0u8; core::mem::size_of::<$ty>()];
                    self.read_at(offset, &mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }

                #[inline(always)]
                fn [<write_ $ty _in_sector>](&mut self, sector: u64, byte: usize, value: $ty) -> IoResult {
                    let offset = $crate::field_offset(sector, byte, core::mem::size_of::<$ty>())?;
                    self.[<write_ $ty _at>](offset, value)
                }

                #[inline(always)]
                fn [<read_ $ty _in_sector>](&mut self, sector: u64, byte: usize) -> IoResult<$ty> {
                    let offset = $crate::field_offset(sector, byte, core::mem::size_of::<$ty>())?;
                    self.[<read_ $ty _at>](offset)
                }
            }
        )+
    };
}
