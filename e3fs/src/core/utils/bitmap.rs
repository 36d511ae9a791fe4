// SPDX-License-Identifier: MIT

//! Bit-level helpers over byte slices.
//!
//! Used for the directory content-block pool, the per-directory file id map
//! and the checker's cluster ownership map. Bit `n` lives in byte `n / 8`,
//! at position `n % 8` (LSB first).

/// Extension trait for bitmap operations on byte slices.
pub trait BitmapOps {
    /// Sets or clears bit `bit`. Out-of-range bits are ignored.
    fn set_bit(&mut self, bit: usize, value: bool);

    /// Returns bit `bit`, `false` when out of range.
    fn get_bit(&self, bit: usize) -> bool;

    /// First clear bit in `[start, limit)`.
    ///
    /// `limit` is clamped to the bitmap's capacity, so callers can pass the
    /// logical size of a map whose byte length was rounded up.
    fn find_first_zero(&self, start: usize, limit: usize) -> Option<usize>;

    /// Number of set bits in `[0, limit)`.
    fn count_ones_below(&self, limit: usize) -> usize;
}

/// Byte length needed to hold `bits` bits.
#[inline]
pub const fn bitmap_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

impl BitmapOps for [u8] {
    #[inline]
    fn set_bit(&mut self, bit: usize, value: bool) {
        let Some(byte) = self.get_mut(bit / 8) else {
            return;
        };
        let mask = 1u8 << (bit % 8);
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    #[inline]
    fn get_bit(&self, bit: usize) -> bool {
        self.get(bit / 8)
            .is_some_and(|b| b & (1 << (bit % 8)) != 0)
    }

    fn find_first_zero(&self, start: usize, limit: usize) -> Option<usize> {
        let limit = limit.min(self.len() * 8);
        let mut bit = start;
        while bit < limit {
            let byte = self[bit / 8];
            // Whole byte taken: jump to the next boundary.
            if byte == 0xFF && bit % 8 == 0 {
                bit += 8;
                continue;
            }
            if byte & (1 << (bit % 8)) == 0 {
                return Some(bit);
            }
            bit += 1;
        }
        None
    }

    fn count_ones_below(&self, limit: usize) -> usize {
        let limit = limit.min(self.len() * 8);
        let full = limit / 8;
        let mut n: usize = self[..full].iter().map(|b| b.count_ones() as usize).sum();
        let rem = limit % 8;
        if rem != 0 {
            n += (self[full] & ((1u8 << rem) - 1)).count_ones() as usize;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_bit() {
        let mut map = [0u8; 2];
        map.set_bit(0, true);
        map.set_bit(9, true);
        assert_eq!(map, [0b0000_0001, 0b0000_0010]);
        assert!(map.get_bit(9));

        map.set_bit(0, false);
        assert!(!map.get_bit(0));
        assert_eq!(map[0], 0);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut map = [0u8; 1];
        map.set_bit(42, true);
        assert_eq!(map, [0]);
        assert!(!map.get_bit(42));
    }

    #[test]
    fn test_find_first_zero_respects_limit() {
        // 100 file ids need 13 bytes; bits 100..104 must never be handed out.
        let mut ids = [0xFFu8; 13];
        assert_eq!(ids.find_first_zero(0, 100), None);

        ids.set_bit(57, false);
        assert_eq!(ids.find_first_zero(0, 100), Some(57));
        assert_eq!(ids.find_first_zero(58, 100), None);

        let empty = [0u8; 2];
        assert_eq!(empty.find_first_zero(3, 16), Some(3));
        assert_eq!(empty.find_first_zero(0, 0), None);
    }

    #[test]
    fn test_count_ones_below() {
        let map = [0b1010_1010u8, 0b0000_1111];
        assert_eq!(map.count_ones_below(16), 8);
        assert_eq!(map.count_ones_below(10), 6);
        assert_eq!(map.count_ones_below(1000), 8);
        assert_eq!(bitmap_len(100), 13);
    }
}
