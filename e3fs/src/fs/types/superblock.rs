// SPDX-License-Identifier: MIT

use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::fs::{constant::*, geometry::Geometry};

/// Sector 0 of an EMU3 volume.
///
/// Only the first 0x29 bytes carry meaning; the tail is preserved as-is by
/// the driver and zeroed by the formatter.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C)]
pub struct E3Superblock {
    pub signature: [u8; 4],
    pub blocks: U32<LittleEndian>,
    pub info_start: U32<LittleEndian>,
    pub info_blocks: U32<LittleEndian>,
    pub root_start: U32<LittleEndian>,
    pub root_blocks: U32<LittleEndian>,
    pub cluster_list_start: U32<LittleEndian>,
    pub cluster_list_blocks: U32<LittleEndian>,
    pub data_start: U32<LittleEndian>,
    pub clusters: U32<LittleEndian>,
    pub cluster_shift: u8,
    pub reserved: [u8; 471],
}

const _: () = assert!(size_of::<E3Superblock>() == E3_BLOCK_SIZE);

impl E3Superblock {
    pub fn from_geometry(geo: &Geometry) -> Self {
        let mut sb = Self::new_zeroed();
        sb.signature = *E3_SIGNATURE;
        sb.blocks = geo.total_blocks.into();
        sb.info_start = geo.info_start.into();
        sb.info_blocks = geo.info_blocks.into();
        sb.root_start = geo.root_start.into();
        sb.root_blocks = geo.root_blocks.into();
        sb.cluster_list_start = geo.cluster_list_start.into();
        sb.cluster_list_blocks = geo.cluster_list_blocks.into();
        sb.data_start = geo.data_start.into();
        sb.clusters = geo.clusters.into();
        sb.cluster_shift = geo.cluster_shift;
        sb
    }

    #[inline]
    pub fn has_signature(&self) -> bool {
        &self.signature == E3_SIGNATURE
    }
}
