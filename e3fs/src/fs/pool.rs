// SPDX-License-Identifier: MIT
#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::{
    core::utils::bitmap::{BitmapOps, bitmap_len},
    fs::geometry::Geometry,
};

/// Usage map of the directory content region.
///
/// Not persisted: rebuilt at mount from the root directories' block lists.
/// Blocks are handed out as block-list values (relative to the root start).
/// A block listed by two directories is pinned: releasing it through one
/// owner must not hand it out while the other still lists it.
#[derive(Debug, Clone)]
pub struct ContentPool {
    map: Vec<u8>,
    pinned: Vec<u8>,
    blocks: u32,
    root_blocks: u32,
}

impl ContentPool {
    pub fn new(geo: &Geometry) -> Self {
        Self {
            map: vec![0; bitmap_len(geo.content_blocks as usize)],
            pinned: vec![0; bitmap_len(geo.content_blocks as usize)],
            blocks: geo.content_blocks,
            root_blocks: geo.root_blocks,
        }
    }

    #[inline]
    fn index(&self, value: u16) -> Option<usize> {
        let index = (value as u32).checked_sub(self.root_blocks)?;
        (index < self.blocks).then_some(index as usize)
    }

    /// Records a block found in an existing block list.
    ///
    /// Returns `false` when the value is outside the region or already taken.
    /// A second claim pins the block for the rest of the mount.
    pub fn claim(&mut self, value: u16) -> bool {
        match self.index(value) {
            Some(i) if !self.map.get_bit(i) => {
                self.map.set_bit(i, true);
                true
            }
            Some(i) => {
                self.pinned.set_bit(i, true);
                false
            }
            None => false,
        }
    }

    /// Takes the lowest free content block.
    pub fn allocate(&mut self) -> Option<u16> {
        let i = self.map.find_first_zero(0, self.blocks as usize)?;
        self.map.set_bit(i, true);
        Some((self.root_blocks + i as u32) as u16)
    }

    /// Returns a block to the pool. Pinned blocks stay allocated.
    pub fn release(&mut self, value: u16) -> bool {
        match self.index(value) {
            Some(i) if !self.pinned.get_bit(i) => {
                self.map.set_bit(i, false);
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_pinned(&self, value: u16) -> bool {
        self.index(value).is_some_and(|i| self.pinned.get_bit(i))
    }

    #[inline]
    pub fn is_used(&self, value: u16) -> bool {
        self.index(value).is_some_and(|i| self.map.get_bit(i))
    }

    pub fn used_count(&self) -> u32 {
        self.map.count_ones_below(self.blocks as usize) as u32
    }

    pub fn free_count(&self) -> u32 {
        self.blocks - self.used_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(root_blocks: u32, content_blocks: u32) -> ContentPool {
        ContentPool {
            map: vec![0; bitmap_len(content_blocks as usize)],
            pinned: vec![0; bitmap_len(content_blocks as usize)],
            blocks: content_blocks,
            root_blocks,
        }
    }

    #[test]
    fn test_allocate_release() {
        let mut p = pool(2, 3);
        assert_eq!(p.allocate(), Some(2));
        assert_eq!(p.allocate(), Some(3));
        assert_eq!(p.allocate(), Some(4));
        assert_eq!(p.allocate(), None);

        p.release(3);
        assert_eq!(p.free_count(), 1);
        assert_eq!(p.allocate(), Some(3));
    }

    #[test]
    fn test_claim_rejects_foreign_and_shared() {
        let mut p = pool(2, 4);
        assert!(p.claim(5));
        assert!(!p.claim(5));
        assert!(!p.claim(1)); // root block
        assert!(!p.claim(6)); // past the region
        assert!(p.is_used(5));
        assert_eq!(p.used_count(), 1);
    }

    #[test]
    fn test_shared_block_survives_release() {
        let mut p = pool(2, 4);
        assert!(p.claim(3));
        assert!(!p.claim(3));
        assert!(p.is_pinned(3));

        assert!(!p.release(3));
        assert!(p.is_used(3));
        assert_eq!(p.allocate(), Some(2));
        assert_eq!(p.allocate(), Some(4));
        assert_eq!(p.allocate(), Some(5));
        assert_eq!(p.allocate(), None);

        assert!(p.release(4));
        assert!(!p.is_used(4));
    }
}
