// SPDX-License-Identifier: MIT

use zerocopy::FromBytes;

use crate::{
    core::errors::*,
    fs::{constant::*, types::E3Superblock},
};

/// Decoded volume layout. Immutable for the lifetime of a mount.
///
/// All positions are absolute 512-byte block numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub total_blocks: u32,
    pub info_start: u32,
    pub info_blocks: u32,
    pub root_start: u32,
    pub root_blocks: u32,
    pub cluster_list_start: u32,
    pub cluster_list_blocks: u32,
    pub data_start: u32,
    pub clusters: u32,
    pub cluster_shift: u8,
    pub blocks_per_cluster: u32,

    /// Directory content blocks, between the root region and the cluster list.
    pub content_start: u32,
    pub content_blocks: u32,
}

impl Geometry {
    /// Decodes sector 0.
    pub fn parse(sector: &[u8; E3_BLOCK_SIZE]) -> GeometryResult<Self> {
        let sb = E3Superblock::read_from_bytes(sector).map_err(|_| GeometryError::InvalidFormat)?;
        Self::from_superblock(&sb)
    }

    pub fn from_superblock(sb: &E3Superblock) -> GeometryResult<Self> {
        crate::ensure!(sb.has_signature(), GeometryError::InvalidFormat);

        let shift = sb.cluster_shift;
        crate::ensure!(
            (E3_MIN_CLUSTER_SHIFT..=E3_MAX_CLUSTER_SHIFT).contains(&shift),
            GeometryError::InvalidFormat
        );

        let mut geo = Self {
            total_blocks: sb.blocks.get(),
            info_start: sb.info_start.get(),
            info_blocks: sb.info_blocks.get(),
            root_start: sb.root_start.get(),
            root_blocks: sb.root_blocks.get(),
            cluster_list_start: sb.cluster_list_start.get(),
            cluster_list_blocks: sb.cluster_list_blocks.get(),
            data_start: sb.data_start.get(),
            clusters: sb.clusters.get(),
            cluster_shift: shift,
            blocks_per_cluster: cluster_blocks_for_shift(shift),
            content_start: 0,
            content_blocks: 0,
        };
        geo.content_start = geo.root_end() as u32;
        geo.content_blocks = geo.cluster_list_start.saturating_sub(geo.content_start);

        geo.validate()?;
        Ok(geo)
    }

    /// Checks that every region lies inside the volume and none overlap.
    pub fn validate(&self) -> GeometryResult {
        crate::ensure!(
            self.root_blocks > 0,
            GeometryError::CorruptLayout("empty root directory region")
        );
        crate::ensure!(
            self.clusters > 0 && self.clusters < E3_CLUSTER_EOC as u32,
            GeometryError::CorruptLayout("cluster count outside link range")
        );
        crate::ensure!(
            self.cluster_list_blocks as u64 * E3_CLUSTER_ENTRIES_PER_BLOCK as u64
                > self.clusters as u64,
            GeometryError::CorruptLayout("cluster list too small for cluster count")
        );
        // Block lists address content blocks relative to the root start.
        crate::ensure!(
            self.root_blocks as u64 + (self.content_blocks as u64) < E3_DIR_BLOCK_FREE as u64,
            GeometryError::CorruptLayout("directory content region too large")
        );

        let regions = self.regions();
        for (i, &(name, start, len)) in regions.iter().enumerate() {
            crate::ensure!(
                start + len <= self.total_blocks as u64,
                GeometryError::CorruptLayout(name)
            );
            for &(_, other_start, other_len) in &regions[i + 1..] {
                let disjoint = start + len <= other_start || other_start + other_len <= start;
                crate::ensure!(
                    disjoint || len == 0 || other_len == 0,
                    GeometryError::CorruptLayout("overlapping regions")
                );
            }
        }
        Ok(())
    }

    fn regions(&self) -> [(&'static str, u64, u64); 6] {
        [
            ("superblock outside volume", E3_SUPERBLOCK_SECTOR, 1),
            (
                "info region outside volume",
                self.info_start as u64,
                self.info_blocks as u64,
            ),
            (
                "root region outside volume",
                self.root_start as u64,
                self.root_blocks as u64,
            ),
            (
                "directory content region outside volume",
                self.content_start as u64,
                self.content_blocks as u64,
            ),
            (
                "cluster list outside volume",
                self.cluster_list_start as u64,
                self.cluster_list_blocks as u64,
            ),
            ("data region outside volume", self.data_start as u64, self.data_blocks()),
        ]
    }

    #[inline]
    pub fn root_end(&self) -> u64 {
        self.root_start as u64 + self.root_blocks as u64
    }

    #[inline]
    pub fn cluster_bytes(&self) -> u64 {
        self.blocks_per_cluster as u64 * E3_BLOCK_SIZE as u64
    }

    #[inline]
    pub fn data_blocks(&self) -> u64 {
        self.clusters as u64 * self.blocks_per_cluster as u64
    }

    /// Last block the volume claims, read at mount to check the device is large enough.
    #[inline]
    pub fn last_block(&self) -> u64 {
        (self.data_start as u64 + self.data_blocks()).max(self.total_blocks as u64) - 1
    }

    /// Physical block of `offset` inside data cluster `cluster` (1-based).
    #[inline]
    pub fn cluster_block(&self, cluster: u16, offset: u32) -> u64 {
        self.data_start as u64
            + (cluster as u64 - 1) * self.blocks_per_cluster as u64
            + offset as u64
    }

    /// Absolute block of a block-list value, if it names a content block.
    #[inline]
    pub fn content_block(&self, list_value: u16) -> Option<u64> {
        let index = (list_value as u32).checked_sub(self.root_blocks)?;
        (index < self.content_blocks).then(|| self.content_start as u64 + index as u64)
    }

    /// Inverse of [`Geometry::content_block`] for a pool index.
    #[inline]
    pub fn content_list_value(&self, index: u32) -> u16 {
        (self.root_blocks + index) as u16
    }

    #[inline]
    pub fn in_root(&self, block: u64) -> bool {
        (self.root_start as u64..self.root_end()).contains(&block)
    }

    #[inline]
    pub fn in_content(&self, block: u64) -> bool {
        let start = self.content_start as u64;
        (start..start + self.content_blocks as u64).contains(&block)
    }
}

/// `(0x10000 << (shift - 1)) / 512`, the cluster size in blocks.
#[inline]
pub fn cluster_blocks_for_shift(shift: u8) -> u32 {
    (E3_BASE_CLUSTER_BYTES << (shift - 1)) / E3_BLOCK_SIZE as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::{FromZeros, IntoBytes};

    fn sample() -> Geometry {
        let mut geo = Geometry {
            total_blocks: 1300,
            info_start: 1,
            info_blocks: 1,
            root_start: 2,
            root_blocks: 2,
            cluster_list_start: 8,
            cluster_list_blocks: 1,
            data_start: 9,
            clusters: 10,
            cluster_shift: 1,
            blocks_per_cluster: 128,
            content_start: 0,
            content_blocks: 0,
        };
        geo.content_start = geo.root_end() as u32;
        geo.content_blocks = geo.cluster_list_start - geo.content_start;
        geo
    }

    fn sector_of(geo: &Geometry) -> [u8; E3_BLOCK_SIZE] {
        let mut sector = [0u8; E3_BLOCK_SIZE];
        sector.copy_from_slice(E3Superblock::from_geometry(geo).as_bytes());
        sector
    }

    #[test]
    fn test_parse_roundtrip() {
        let geo = sample();
        let parsed = Geometry::parse(&sector_of(&geo)).unwrap();
        assert_eq!(parsed, geo);
        assert_eq!(parsed.content_start, 4);
        assert_eq!(parsed.content_blocks, 4);
        assert_eq!(parsed.cluster_block(1, 0), 9);
        assert_eq!(parsed.cluster_block(2, 3), 9 + 128 + 3);
    }

    #[test]
    fn test_cluster_shift() {
        assert_eq!(cluster_blocks_for_shift(1), 128);
        assert_eq!(cluster_blocks_for_shift(2), 256);
        assert_eq!(cluster_blocks_for_shift(4), 1024);
    }

    #[test]
    fn test_bad_signature() {
        let mut sector = sector_of(&sample());
        sector[0] = b'X';
        assert_eq!(Geometry::parse(&sector), Err(GeometryError::InvalidFormat));

        let blank = E3Superblock::new_zeroed();
        assert_eq!(
            Geometry::from_superblock(&blank),
            Err(GeometryError::InvalidFormat)
        );
    }

    #[test]
    fn test_bad_shift() {
        let mut sector = sector_of(&sample());
        sector[0x28] = 0;
        assert_eq!(Geometry::parse(&sector), Err(GeometryError::InvalidFormat));
        sector[0x28] = 16;
        assert_eq!(Geometry::parse(&sector), Err(GeometryError::InvalidFormat));
    }

    #[test]
    fn test_region_outside_volume() {
        let mut geo = sample();
        geo.total_blocks = 100; // data region needs 1289 blocks
        let err = Geometry::parse(&sector_of(&geo)).unwrap_err();
        assert!(matches!(err, GeometryError::CorruptLayout(_)));
        assert_eq!(E3Error::from(err).kind(), ErrorKind::CorruptLayout);
    }

    #[test]
    fn test_overlapping_regions() {
        let mut geo = sample();
        geo.data_start = 8; // on top of the cluster list
        assert_eq!(
            Geometry::parse(&sector_of(&geo)),
            Err(GeometryError::CorruptLayout("overlapping regions"))
        );
    }

    #[test]
    fn test_content_block_mapping() {
        let geo = sample();
        assert_eq!(geo.content_block(1), None); // inside root
        assert_eq!(geo.content_block(2), Some(4));
        assert_eq!(geo.content_block(5), Some(7));
        assert_eq!(geo.content_block(6), None); // cluster list
        assert_eq!(geo.content_list_value(0), 2);
    }
}
