// SPDX-License-Identifier: MIT
#[cfg(not(feature = "std"))]
use alloc::string::String;

use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{core::errors::*, fs::constant::*};

/// One 32-byte directory record, as stored on disk.
///
/// The 14-byte tail is a union: file attributes for entries living in a
/// subdirectory, a block list for directories living in the root.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct E3RawEntry {
    pub name: [u8; E3_NAME_LEN],
    pub id: u8,
    pub kind: u8,
    pub data: [u8; 14],
}

const _: () = assert!(size_of::<E3RawEntry>() == E3_DENTRY_SIZE);

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct E3FileAttrs {
    pub start_cluster: U16<LittleEndian>,
    pub clusters: U16<LittleEndian>,
    pub blocks: U16<LittleEndian>,
    pub bytes: U16<LittleEndian>,
    pub file_type: u8,
    pub props: [u8; 5],
}

/// A directory's own content blocks, numbered from the root region start.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct E3BlockList {
    pub blocks: [U16<LittleEndian>; E3_MAX_DIR_BLOCKS],
}

/// Decoded view of a slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Unused,
    File(E3FileAttrs),
    Directory(E3BlockList),
    Deleted,
}

impl E3RawEntry {
    pub fn file(name: [u8; E3_NAME_LEN], id: u8, attrs: E3FileAttrs) -> Self {
        let mut e = Self {
            name,
            id,
            kind: E3_KIND_FILE,
            data: [0; 14],
        };
        e.set_file_attrs(&attrs);
        e
    }

    pub fn directory(name: [u8; E3_NAME_LEN], list: E3BlockList) -> Self {
        let mut e = Self {
            name,
            id: E3_DIR_ID,
            kind: E3_KIND_DIR,
            data: [0; 14],
        };
        e.set_block_list(&list);
        e
    }

    /// A directory carries the directory marker in its id byte. Records
    /// that only set the kind byte are accepted too.
    pub fn kind(&self) -> EntryKind {
        if self.id == E3_DIR_ID || self.kind == E3_KIND_DIR || self.kind == E3_KIND_DIR_ALT {
            return EntryKind::Directory(self.block_list());
        }
        let attrs = self.file_attrs();
        match attrs.file_type {
            E3_FTYPE_STD | E3_FTYPE_UPDATE => EntryKind::File(attrs),
            E3_FTYPE_DELETED if !self.name_bytes().is_empty() => EntryKind::Deleted,
            _ => EntryKind::Unused,
        }
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self.kind(), EntryKind::File(_) | EntryKind::Directory(_))
    }

    #[inline]
    pub fn is_free_slot(&self) -> bool {
        matches!(self.kind(), EntryKind::Unused | EntryKind::Deleted)
    }

    /// Name without its padding.
    #[inline]
    pub fn name_bytes(&self) -> &[u8] {
        trim_name(&self.name)
    }

    pub fn name(&self) -> String {
        decode_name(&self.name)
    }

    #[inline]
    pub fn name_matches(&self, name: &[u8; E3_NAME_LEN]) -> bool {
        self.name_bytes() == trim_name(name)
    }

    #[inline]
    pub fn file_attrs(&self) -> E3FileAttrs {
        // 14 bytes on both sides, cannot fail
        E3FileAttrs::read_from_bytes(&self.data).unwrap_or_else(|_| E3FileAttrs::empty(0))
    }

    #[inline]
    pub fn set_file_attrs(&mut self, attrs: &E3FileAttrs) {
        self.data.copy_from_slice(attrs.as_bytes());
    }

    #[inline]
    pub fn block_list(&self) -> E3BlockList {
        E3BlockList::read_from_bytes(&self.data).unwrap_or_else(|_| E3BlockList::empty())
    }

    #[inline]
    pub fn set_block_list(&mut self, list: &E3BlockList) {
        self.data.copy_from_slice(list.as_bytes());
    }

    /// Marks a file entry deleted. The name stays on disk.
    pub fn mark_deleted(&mut self) {
        let mut attrs = self.file_attrs();
        attrs.file_type = E3_FTYPE_DELETED;
        self.set_file_attrs(&attrs);
    }
}

impl E3FileAttrs {
    /// Attributes of a freshly created, zero-length file.
    pub fn empty(start_cluster: u16) -> Self {
        Self {
            start_cluster: start_cluster.into(),
            clusters: U16::new(1),
            blocks: U16::new(1),
            bytes: U16::new(0),
            file_type: E3_FTYPE_STD,
            props: [0; 5],
        }
    }

    #[inline]
    pub fn start(&self) -> u16 {
        self.start_cluster.get()
    }

    /// `clusters == 0`, `blocks == 0`, `blocks > blocks_per_cluster` or
    /// `bytes > 512` cannot describe a file.
    pub fn is_corrupt(&self, blocks_per_cluster: u32) -> bool {
        let blocks = self.blocks.get() as u32;
        self.clusters.get() == 0
            || blocks == 0
            || blocks > blocks_per_cluster
            || self.bytes.get() as usize > E3_BLOCK_SIZE
    }

    /// Byte length. Only meaningful when `!is_corrupt()`.
    pub fn size(&self, blocks_per_cluster: u32) -> u64 {
        let cluster_bytes = blocks_per_cluster as u64 * E3_BLOCK_SIZE as u64;
        (self.clusters.get() as u64).saturating_sub(1) * cluster_bytes
            + (self.blocks.get() as u64).saturating_sub(1) * E3_BLOCK_SIZE as u64
            + self.bytes.get() as u64
    }

    /// Blocks covered by the declared length.
    pub fn declared_blocks(&self, blocks_per_cluster: u32) -> u64 {
        (self.clusters.get() as u64).saturating_sub(1) * blocks_per_cluster as u64
            + self.blocks.get() as u64
    }

    /// Rewrites the counters for `size` bytes. `None` if they overflow.
    pub fn set_size(&mut self, size: u64, blocks_per_cluster: u32) -> Option<()> {
        let (clusters, blocks, bytes) = size_to_counts(size, blocks_per_cluster)?;
        self.clusters = clusters.into();
        self.blocks = blocks.into();
        self.bytes = bytes.into();
        Some(())
    }
}

impl E3BlockList {
    pub fn empty() -> Self {
        Self {
            blocks: [U16::new(E3_DIR_BLOCK_FREE); E3_MAX_DIR_BLOCKS],
        }
    }

    pub fn single(block: u16) -> Self {
        let mut list = Self::empty();
        list.blocks[0] = block.into();
        list
    }

    /// Allocated block numbers, in list order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.blocks
            .iter()
            .map(|b| b.get())
            .filter(|&b| b != E3_DIR_BLOCK_FREE)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores `block` in the first free slot; `false` when the list is full.
    pub fn push(&mut self, block: u16) -> bool {
        match self.blocks.iter_mut().find(|b| b.get() == E3_DIR_BLOCK_FREE) {
            Some(slot) => {
                *slot = block.into();
                true
            }
            None => false,
        }
    }
}

/// `(clusters, blocks, bytes)` for a file of `size` bytes.
///
/// Every count is 1-based for the last unit, so an empty file is `(1, 1, 0)`
/// and a file of exactly one block is `(1, 1, 512)`.
pub fn size_to_counts(size: u64, blocks_per_cluster: u32) -> Option<(u16, u16, u16)> {
    if size == 0 {
        return Some((1, 1, 0));
    }
    let block = E3_BLOCK_SIZE as u64;
    let cluster_bytes = blocks_per_cluster as u64 * block;
    let clusters = size.div_ceil(cluster_bytes);
    let rem = size - (clusters - 1) * cluster_bytes;
    let blocks = rem.div_ceil(block);
    let bytes = rem - (blocks - 1) * block;
    Some((
        u16::try_from(clusters).ok()?,
        u16::try_from(blocks).ok()?,
        bytes as u16,
    ))
}

// === Names ===

/// Drops the trailing run of spaces and NULs.
pub fn trim_name(raw: &[u8; E3_NAME_LEN]) -> &[u8] {
    let end = raw
        .iter()
        .rposition(|&b| b != E3_NAME_PAD && b != 0)
        .map_or(0, |i| i + 1);
    &raw[..end]
}

pub fn decode_name(raw: &[u8; E3_NAME_LEN]) -> String {
    String::from_utf8_lossy(trim_name(raw)).into_owned()
}

/// Encodes `name` into the space-padded field.
///
/// A trailing space cannot round-trip through the padding and is rejected,
/// as are `.`/`..`, `/` and NUL.
pub fn encode_name(name: &str) -> DirectoryResult<[u8; E3_NAME_LEN]> {
    let bytes = name.as_bytes();
    crate::ensure!(!bytes.is_empty(), DirectoryError::InvalidName);
    crate::ensure!(bytes.len() <= E3_NAME_LEN, DirectoryError::NameTooLong);
    crate::ensure!(name != "." && name != "..", DirectoryError::InvalidName);
    crate::ensure!(
        !bytes.iter().any(|&b| b == b'/' || b == 0),
        DirectoryError::InvalidName
    );
    crate::ensure!(!name.ends_with(' '), DirectoryError::InvalidName);

    let mut raw = [E3_NAME_PAD; E3_NAME_LEN];
    raw[..bytes.len()].copy_from_slice(bytes);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BPC: u32 = 128;

    #[test]
    fn test_name_padding() {
        let raw = encode_name("KICK.WAV").unwrap();
        assert_eq!(&raw, b"KICK.WAV        ");
        assert_eq!(decode_name(&raw), "KICK.WAV");

        let mut nul_padded = [0u8; 16];
        nul_padded[..3].copy_from_slice(b"PAD");
        assert_eq!(trim_name(&nul_padded), b"PAD");
    }

    #[test]
    fn test_name_rejections() {
        assert_eq!(encode_name(""), Err(DirectoryError::InvalidName));
        assert_eq!(encode_name("A "), Err(DirectoryError::InvalidName));
        assert_eq!(encode_name("A/B"), Err(DirectoryError::InvalidName));
        assert_eq!(encode_name(".."), Err(DirectoryError::InvalidName));
        assert_eq!(
            encode_name("SEVENTEEN_CHARS__"),
            Err(DirectoryError::NameTooLong)
        );
        assert!(encode_name("SIXTEEN_CHARS___").is_ok());
    }

    #[test]
    fn test_classification() {
        let name = encode_name("FILE").unwrap();
        let mut e = E3RawEntry::file(name, 3, E3FileAttrs::empty(1));
        assert!(matches!(e.kind(), EntryKind::File(_)));

        e.mark_deleted();
        assert_eq!(e.kind(), EntryKind::Deleted);
        assert_eq!(e.name(), "FILE");

        let zero = E3RawEntry::read_from_bytes(&[0u8; 32]).unwrap();
        assert_eq!(zero.kind(), EntryKind::Unused);

        let dir = E3RawEntry::directory(encode_name("SOUNDS").unwrap(), E3BlockList::single(2));
        match dir.kind() {
            EntryKind::Directory(list) => assert_eq!(list.iter().collect::<Vec<_>>(), [2]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(dir.id, E3_DIR_ID);
    }

    #[test]
    fn test_directory_by_id_marker() {
        let mut raw = [0u8; 32];
        raw[..6].copy_from_slice(b"SOUNDS");
        raw[6..16].fill(b' ');
        raw[16] = E3_DIR_ID;
        raw[18..20].copy_from_slice(&2u16.to_le_bytes());
        for i in 1..E3_MAX_DIR_BLOCKS {
            raw[18 + i * 2..20 + i * 2].copy_from_slice(&E3_DIR_BLOCK_FREE.to_le_bytes());
        }
        let e = E3RawEntry::read_from_bytes(&raw).unwrap();
        match e.kind() {
            EntryKind::Directory(list) => assert_eq!(list.iter().collect::<Vec<_>>(), [2]),
            other => panic!("unexpected {other:?}"),
        }

        // Files never carry the marker as an id.
        let f = E3RawEntry::file(encode_name("A").unwrap(), 99, E3FileAttrs::empty(1));
        assert!(matches!(f.kind(), EntryKind::File(_)));
    }

    #[test]
    fn test_size_counts() {
        assert_eq!(size_to_counts(0, BPC), Some((1, 1, 0)));
        assert_eq!(size_to_counts(512, BPC), Some((1, 1, 512)));
        assert_eq!(size_to_counts(513, BPC), Some((1, 2, 1)));
        assert_eq!(size_to_counts(65536, BPC), Some((1, 128, 512)));
        assert_eq!(size_to_counts(65537, BPC), Some((2, 1, 1)));

        let mut attrs = E3FileAttrs::empty(1);
        attrs.set_size(100_000, BPC).unwrap();
        assert_eq!(attrs.size(BPC), 100_000);
        assert!(!attrs.is_corrupt(BPC));
        assert_eq!(attrs.declared_blocks(BPC), 196);
    }

    #[test]
    fn test_corrupt_attrs() {
        let mut attrs = E3FileAttrs::empty(1);
        attrs.blocks = U16::new(0);
        assert!(attrs.is_corrupt(BPC));

        let mut attrs = E3FileAttrs::empty(1);
        attrs.blocks = U16::new(129);
        assert!(attrs.is_corrupt(BPC));

        let mut attrs = E3FileAttrs::empty(1);
        attrs.bytes = U16::new(513);
        assert!(attrs.is_corrupt(BPC));
    }

    #[test]
    fn test_block_list_push() {
        let mut list = E3BlockList::single(2);
        for b in 3..9 {
            assert!(list.push(b));
        }
        assert_eq!(list.len(), E3_MAX_DIR_BLOCKS);
        assert!(!list.push(99));
    }
}
