// SPDX-License-Identifier: MIT
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use e3io::prelude::*;
use zerocopy::{FromBytes, FromZeros};

use crate::{
    core::{
        errors::*,
        utils::bitmap::{BitmapOps, bitmap_len},
    },
    fs::{constant::*, geometry::Geometry, pool::ContentPool, types::*},
};

/// Physical position of a directory record. Doubles as the inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryLocation {
    pub block: u64,
    pub slot: u8,
}

impl EntryLocation {
    #[inline]
    pub fn new(block: u64, slot: u8) -> Self {
        Self { block, slot }
    }

    /// `(block << 4) | slot`
    #[inline]
    pub fn ino(self) -> u64 {
        (self.block << E3_SLOT_BITS) | self.slot as u64
    }

    #[inline]
    pub fn from_ino(ino: u64) -> Self {
        Self {
            block: ino >> E3_SLOT_BITS,
            slot: (ino & ((1 << E3_SLOT_BITS) - 1)) as u8,
        }
    }

    #[inline]
    fn offset(self) -> u64 {
        self.block * E3_BLOCK_SIZE as u64 + self.slot as u64 * E3_DENTRY_SIZE as u64
    }
}

/// Which directory an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirRef {
    Root,
    /// Subdirectory whose record sits at this root slot.
    Sub(EntryLocation),
}

pub type EntryBlock = [E3RawEntry; E3_ENTRIES_PER_BLOCK];

/// Directory record access over a borrowed device.
///
/// Holds no state of its own; the volume builds one per operation while it
/// holds the device lock.
pub struct DirectoryTable<'a, IO: E3IO + ?Sized> {
    io: &'a mut IO,
    geo: &'a Geometry,
}

impl<'a, IO: E3IO + ?Sized> DirectoryTable<'a, IO> {
    pub fn new(io: &'a mut IO, geo: &'a Geometry) -> Self {
        Self { io, geo }
    }

    pub fn read_entry(&mut self, loc: EntryLocation) -> DirectoryResult<E3RawEntry> {
        Ok(self.io.read_struct::<E3RawEntry>(loc.offset())?)
    }

    pub fn write_entry(&mut self, loc: EntryLocation, entry: &E3RawEntry) -> DirectoryResult {
        Ok(self.io.write_struct(loc.offset(), entry)?)
    }

    pub fn read_block(&mut self, block: u64) -> DirectoryResult<EntryBlock> {
        let mut sector = [0u8; E3_BLOCK_SIZE];
        self.io.read_sector(block, &mut sector)?;
        EntryBlock::read_from_bytes(&sector)
            .map_err(|_| DirectoryError::Corrupted("unreadable directory block"))
    }

    /// Zeroes a fresh directory block; every slot reads as unused.
    pub fn clear_block(&mut self, block: u64) -> DirectoryResult {
        Ok(self.io.zero_sectors(block, 1)?)
    }

    /// Absolute blocks holding `dir`'s records, in scan order.
    pub fn blocks(&mut self, dir: DirRef) -> DirectoryResult<Vec<u64>> {
        match dir {
            DirRef::Root => Ok((self.geo.root_start as u64..self.geo.root_end()).collect()),
            DirRef::Sub(loc) => {
                let list = self.block_list_of(loc)?;
                let geo = self.geo;
                Ok(list
                    .iter()
                    .filter_map(|v| {
                        let block = geo.content_block(v);
                        if block.is_none() {
                            log::warn!("e3fs: directory {loc:?} lists block {v} outside content region");
                        }
                        block
                    })
                    .collect())
            }
        }
    }

    fn block_list_of(&mut self, loc: EntryLocation) -> DirectoryResult<E3BlockList> {
        match self.read_entry(loc)?.kind() {
            EntryKind::Directory(list) => Ok(list),
            _ => Err(DirectoryError::NotADirectory),
        }
    }

    /// Visits every slot of `dir` until `f` returns `Some`.
    fn scan<R>(
        &mut self,
        dir: DirRef,
        mut f: impl FnMut(EntryLocation, &E3RawEntry) -> Option<R>,
    ) -> DirectoryResult<Option<R>> {
        for block in self.blocks(dir)? {
            let entries = self.read_block(block)?;
            for (slot, entry) in entries.iter().enumerate() {
                if let Some(r) = f(EntryLocation::new(block, slot as u8), entry) {
                    return Ok(Some(r));
                }
            }
        }
        Ok(None)
    }

    /// First live record named `name` (exact, case-sensitive).
    pub fn find_by_name(
        &mut self,
        dir: DirRef,
        name: &[u8; E3_NAME_LEN],
    ) -> DirectoryResult<Option<(E3RawEntry, EntryLocation)>> {
        self.scan(dir, |loc, e| (e.is_live() && e.name_matches(name)).then_some((*e, loc)))
    }

    /// Live file carrying `id`.
    pub fn find_by_identity(
        &mut self,
        dir: DirRef,
        id: u8,
    ) -> DirectoryResult<Option<(E3RawEntry, EntryLocation)>> {
        self.scan(dir, |loc, e| {
            (matches!(e.kind(), EntryKind::File(_)) && e.id == id).then_some((*e, loc))
        })
    }

    pub fn live_count(&mut self, dir: DirRef) -> DirectoryResult<u32> {
        let mut n = 0;
        self.scan(dir, |_, e| {
            if e.is_live() {
                n += 1;
            }
            None::<()>
        })?;
        Ok(n)
    }

    /// True when no live record remains in the subdirectory.
    pub fn is_empty(&mut self, loc: EntryLocation) -> DirectoryResult<bool> {
        Ok(self.scan(DirRef::Sub(loc), |_, e| e.is_live().then_some(()))?.is_none())
    }

    /// Finds a reusable slot, growing a subdirectory by one content block
    /// when every existing slot is live.
    ///
    /// The flag tells whether a block was added. The returned slot is not
    /// written; the caller commits the record.
    pub fn allocate_entry(
        &mut self,
        dir: DirRef,
        pool: &mut ContentPool,
    ) -> DirectoryResult<(EntryLocation, bool)> {
        if let Some(loc) = self.scan(dir, |loc, e| e.is_free_slot().then_some(loc))? {
            return Ok((loc, false));
        }

        let DirRef::Sub(dir_loc) = dir else {
            return Err(DirectoryError::OutOfSpace);
        };
        let mut entry = self.read_entry(dir_loc)?;
        let mut list = match entry.kind() {
            EntryKind::Directory(list) => list,
            _ => return Err(DirectoryError::NotADirectory),
        };
        crate::ensure!(list.len() < E3_MAX_DIR_BLOCKS, DirectoryError::OutOfSpace);

        let value = pool.allocate().ok_or(DirectoryError::OutOfSpace)?;
        let Some(block) = self.geo.content_block(value) else {
            pool.release(value);
            return Err(DirectoryError::Corrupted("content pool out of sync"));
        };
        let grown = self.clear_block(block).and_then(|_| {
            list.push(value);
            entry.set_block_list(&list);
            self.write_entry(dir_loc, &entry)
        });
        if let Err(e) = grown {
            pool.release(value);
            return Err(e);
        }

        log::debug!("e3fs: directory {dir_loc:?} grew to {} blocks", list.len());
        Ok((EntryLocation::new(block, 0), true))
    }

    /// Lowest id in `0..100` not held by a live file of `dir`.
    pub fn allocate_free_file_id(&mut self, dir: DirRef) -> DirectoryResult<u8> {
        let mut used = [0u8; bitmap_len(E3_MAX_FILES)];
        self.scan(dir, |_, e| {
            if matches!(e.kind(), EntryKind::File(_)) {
                used.set_bit(e.id as usize, true);
            }
            None::<()>
        })?;
        used.find_first_zero(0, E3_MAX_FILES)
            .map(|id| id as u8)
            .ok_or(DirectoryError::OutOfSpace)
    }

    /// Removes the record at `loc`.
    ///
    /// Files are only marked deleted; their cluster chain is the caller's.
    /// Directories must be empty; their content blocks go back to `pool` and
    /// the slot is zeroed.
    pub fn retire_entry(&mut self, loc: EntryLocation, pool: &mut ContentPool) -> DirectoryResult {
        let mut entry = self.read_entry(loc)?;
        match entry.kind() {
            EntryKind::File(_) => {
                entry.mark_deleted();
                self.write_entry(loc, &entry)
            }
            EntryKind::Directory(list) => {
                crate::ensure!(self.is_empty(loc)?, DirectoryError::NotEmpty);
                self.write_entry(loc, &E3RawEntry::new_zeroed())?;
                for value in list.iter() {
                    if !pool.release(value) && pool.is_pinned(value) {
                        log::warn!("e3fs: block {value} is still listed by another directory, kept");
                    }
                }
                Ok(())
            }
            EntryKind::Unused | EntryKind::Deleted => Err(DirectoryError::NotFound),
        }
    }

    /// Overwrites the name field only; the record does not move.
    pub fn rename_entry(&mut self, loc: EntryLocation, name: &[u8; E3_NAME_LEN]) -> DirectoryResult {
        let mut entry = self.read_entry(loc)?;
        crate::ensure!(entry.is_live(), DirectoryError::NotFound);
        entry.name = *name;
        self.write_entry(loc, &entry)
    }
}
