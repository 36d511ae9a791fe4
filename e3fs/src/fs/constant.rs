// SPDX-License-Identifier: MIT

// === Disk Layout Parameters ===

pub const E3_BLOCK_SIZE: usize = 512;
pub const E3_SIGNATURE: &[u8; 4] = b"EMU3";
pub const E3_SUPERBLOCK_SECTOR: u64 = 0;

/// Valid range of the cluster shift byte (superblock offset 0x28).
pub const E3_MIN_CLUSTER_SHIFT: u8 = 1;
pub const E3_MAX_CLUSTER_SHIFT: u8 = 15;
/// Cluster size for shift 1, doubled per extra shift step.
pub const E3_BASE_CLUSTER_BYTES: u32 = 0x10000;

// === Cluster Table ===

pub const E3_CLUSTER_FREE: u16 = 0;
pub const E3_CLUSTER_EOC: u16 = 0x7FFF;
pub const E3_FIRST_CLUSTER: u16 = 1;
pub const E3_CLUSTER_ENTRY_SIZE: usize = 2;
pub const E3_CLUSTER_ENTRIES_PER_BLOCK: usize = E3_BLOCK_SIZE / E3_CLUSTER_ENTRY_SIZE;

// === Directory Entries ===

pub const E3_DENTRY_SIZE: usize = 32;
pub const E3_ENTRIES_PER_BLOCK: usize = E3_BLOCK_SIZE / E3_DENTRY_SIZE;
pub const E3_NAME_LEN: usize = 16;
pub const E3_NAME_PAD: u8 = b' ';

pub const E3_MAX_FILES: usize = 100; // ids 0..=99
pub const E3_MAX_DIR_BLOCKS: usize = 7;
pub const E3_DIR_BLOCK_FREE: u16 = 0x7FFF;

pub const E3_KIND_DIR: u8 = 0x40;
pub const E3_KIND_DIR_ALT: u8 = 0x80;
pub const E3_KIND_FILE: u8 = 0x00;
pub const E3_DIR_ID: u8 = 0x80;

pub const E3_FTYPE_STD: u8 = 0x81;
pub const E3_FTYPE_UPDATE: u8 = 0x80;
pub const E3_FTYPE_DELETED: u8 = 0x00;

// === Inodes ===

pub const E3_ROOT_INO: u64 = 1;
pub const E3_SLOT_BITS: u32 = 4;

// === Non-empty markers ===

pub const E3_MARKER_SECTOR: u64 = 1;
pub const E3_MARKER_SECTOR_BYTE: u8 = 0x0A;
pub const E3_INFO_MARKER_OFFSET: u64 = 0x12;
pub const E3_INFO_MARKER: [u8; 2] = [0x09, 0x00];
