// SPDX-License-Identifier: MIT

use e3io::prelude::*;
use zerocopy::IntoBytes;

pub use crate::core::formatter::*;

use crate::{
    core::errors::*,
    fs::{
        constant::*,
        geometry::{Geometry, cluster_blocks_for_shift},
        types::E3Superblock,
    },
};

/// Layout knobs for a fresh volume, in 512-byte blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatParams {
    pub info_blocks: u32,
    pub root_dir_blocks: u32,
    /// Pool that subdirectory blocks are drawn from.
    pub dir_content_blocks: u32,
    pub clusters: u32,
    pub cluster_shift: u8,
}

impl Default for FormatParams {
    /// A small image: 32 clusters of 64 KiB, two root blocks, eight
    /// directory content blocks.
    fn default() -> Self {
        Self {
            info_blocks: 1,
            root_dir_blocks: 2,
            dir_content_blocks: 8,
            clusters: 32,
            cluster_shift: 1,
        }
    }
}

impl FormatParams {
    pub fn with_info_blocks(mut self, n: u32) -> Self {
        self.info_blocks = n;
        self
    }

    pub fn with_root_dir_blocks(mut self, n: u32) -> Self {
        self.root_dir_blocks = n;
        self
    }

    pub fn with_dir_content_blocks(mut self, n: u32) -> Self {
        self.dir_content_blocks = n;
        self
    }

    pub fn with_clusters(mut self, n: u32) -> Self {
        self.clusters = n;
        self
    }

    pub fn with_cluster_shift(mut self, shift: u8) -> Self {
        self.cluster_shift = shift;
        self
    }

    /// Blocks needed for the cluster list: `clusters + 1` u16 entries.
    #[inline]
    pub fn cluster_list_blocks(&self) -> u32 {
        ((self.clusters as u64 + 1) * E3_CLUSTER_ENTRY_SIZE as u64).div_ceil(E3_BLOCK_SIZE as u64)
            as u32
    }

    /// Size of the whole image in blocks. Saturates on absurd params, which
    /// the formatter rejects anyway.
    pub fn total_blocks(&self) -> u64 {
        let shift = self.cluster_shift.clamp(E3_MIN_CLUSTER_SHIFT, E3_MAX_CLUSTER_SHIFT);
        let data = self.clusters as u64 * cluster_blocks_for_shift(shift) as u64;
        1 + self.info_blocks as u64
            + self.root_dir_blocks as u64
            + self.dir_content_blocks as u64
            + self.cluster_list_blocks() as u64
            + data
    }

    fn validate(&self) -> FormatterResult {
        crate::ensure!(
            (E3_MIN_CLUSTER_SHIFT..=E3_MAX_CLUSTER_SHIFT).contains(&self.cluster_shift),
            FormatterError::Invalid("cluster shift outside 1..=15")
        );
        crate::ensure!(
            self.clusters > 0 && self.clusters < E3_CLUSTER_EOC as u32,
            FormatterError::Invalid("cluster count outside 1..0x7FFF")
        );
        crate::ensure!(
            self.info_blocks > 0,
            FormatterError::Invalid("info region must hold at least one block")
        );
        crate::ensure!(
            self.root_dir_blocks > 0,
            FormatterError::Invalid("root region must hold at least one block")
        );
        crate::ensure!(
            self.total_blocks() <= u32::MAX as u64,
            FormatterError::Invalid("volume too large for 32-bit block numbers")
        );
        Ok(())
    }
}

/// Lays down an empty EMU3 volume:
/// superblock, info region, root, directory content, cluster list, data.
///
/// Metadata regions are zeroed; the data region only on a full format.
pub struct E3Formatter<'a, IO: E3IO + ?Sized> {
    io: &'a mut IO,
    params: FormatParams,
}

impl<'a, IO: E3IO + ?Sized> E3Formatter<'a, IO> {
    pub fn new(io: &'a mut IO, params: FormatParams) -> Self {
        Self { io, params }
    }

    /// Layout the formatter writes. Not validated until [`FsFormatter::format`].
    pub fn geometry(&self) -> Geometry {
        let p = &self.params;
        let shift = p.cluster_shift.clamp(E3_MIN_CLUSTER_SHIFT, E3_MAX_CLUSTER_SHIFT);
        let info_start = E3_SUPERBLOCK_SECTOR as u32 + 1;
        let root_start = info_start + p.info_blocks;
        let content_start = root_start + p.root_dir_blocks;
        let cluster_list_start = content_start + p.dir_content_blocks;
        let data_start = cluster_list_start + p.cluster_list_blocks();

        Geometry {
            total_blocks: p.total_blocks() as u32,
            info_start,
            info_blocks: p.info_blocks,
            root_start,
            root_blocks: p.root_dir_blocks,
            cluster_list_start,
            cluster_list_blocks: p.cluster_list_blocks(),
            data_start,
            clusters: p.clusters,
            cluster_shift: shift,
            blocks_per_cluster: cluster_blocks_for_shift(shift),
            content_start,
            content_blocks: p.dir_content_blocks,
        }
    }

    fn check_device(&mut self, geo: &Geometry) -> FormatterResult {
        let mut last = [0u8; E3_BLOCK_SIZE];
        match self.io.read_sector(geo.last_block(), &mut last) {
            Ok(()) => Ok(()),
            Err(IoError::OutOfBounds) => Err(FormatterError::Invalid("volume does not fit the device")),
            Err(e) => Err(e.into()),
        }
    }

    fn write_superblock(&mut self, geo: &Geometry) -> FormatterResult {
        let sb = E3Superblock::from_geometry(geo);
        self.io.write_sector(E3_SUPERBLOCK_SECTOR, &sb_sector(&sb))?;
        Ok(())
    }

    /// Info, root, content and cluster list are contiguous.
    fn zero_metadata(&mut self, geo: &Geometry) -> FormatterResult {
        let first = geo.info_start as u64;
        self.io.zero_sectors(first, geo.data_start as u64 - first)?;
        Ok(())
    }

    fn zero_data(&mut self, geo: &Geometry) -> FormatterResult {
        self.io.zero_sectors(geo.data_start as u64, geo.data_blocks())?;
        Ok(())
    }
}

fn sb_sector(sb: &E3Superblock) -> Sector {
    let mut sector = [0u8; E3_BLOCK_SIZE];
    sector.copy_from_slice(sb.as_bytes());
    sector
}

impl<'a, IO: E3IO + ?Sized> FsFormatter for E3Formatter<'a, IO> {
    fn format(&mut self, full_format: bool) -> FormatterResult {
        self.params.validate()?;
        let geo = self.geometry();
        geo.validate()?;
        self.check_device(&geo)?;

        self.write_superblock(&geo)?;
        self.zero_metadata(&geo)?;
        if full_format {
            self.zero_data(&geo)?;
        }
        self.io.flush()?;

        log::info!(
            "e3fs: formatted {} blocks, {} clusters of {} blocks",
            geo.total_blocks,
            geo.clusters,
            geo.blocks_per_cluster
        );
        Ok(())
    }

    fn flush(&mut self) -> FormatterResult {
        self.io.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let params = FormatParams::default();
        let mut buf = vec![0xAAu8; params.total_blocks() as usize * E3_BLOCK_SIZE];
        let mut io = MemIO::new(&mut buf);
        let mut fmt = E3Formatter::new(&mut io, params);
        fmt.format(false).unwrap();
        let geo = fmt.geometry();

        assert_eq!(geo.info_start, 1);
        assert_eq!(geo.root_start, 2);
        assert_eq!(geo.content_start, 4);
        assert_eq!(geo.cluster_list_start, 12);
        assert_eq!(geo.cluster_list_blocks, 1);
        assert_eq!(geo.data_start, 13);
        assert_eq!(geo.total_blocks, 13 + 32 * 128);

        let mut sector = [0u8; E3_BLOCK_SIZE];
        io.read_sector(0, &mut sector).unwrap();
        assert_eq!(Geometry::parse(&sector).unwrap(), geo);

        // Metadata zeroed, data untouched on a quick format.
        io.read_sector(12, &mut sector).unwrap();
        assert!(sector.iter().all(|&b| b == 0));
        io.read_sector(13, &mut sector).unwrap();
        assert!(sector.iter().all(|&b| b == 0xAA));
        assert_eq!(io.flushes(), 1);
    }

    #[test]
    fn test_full_format_zeroes_data() {
        let params = FormatParams::default().with_clusters(2);
        let mut buf = vec![0xAAu8; params.total_blocks() as usize * E3_BLOCK_SIZE];
        {
            let mut io = MemIO::new(&mut buf);
            E3Formatter::new(&mut io, params).format(true).unwrap();
        }
        assert!(buf[E3_BLOCK_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_cluster_list_sizing() {
        assert_eq!(FormatParams::default().with_clusters(255).cluster_list_blocks(), 1);
        assert_eq!(FormatParams::default().with_clusters(256).cluster_list_blocks(), 2);
    }

    #[test]
    fn test_rejects_bad_params() {
        let mut buf = vec![0u8; 64 * E3_BLOCK_SIZE];
        let mut io = MemIO::new(&mut buf);

        for params in [
            FormatParams::default().with_cluster_shift(0),
            FormatParams::default().with_cluster_shift(16),
            FormatParams::default().with_clusters(0),
            FormatParams::default().with_clusters(0x7FFF),
            FormatParams::default().with_root_dir_blocks(0),
        ] {
            let err = E3Formatter::new(&mut io, params).format(false).unwrap_err();
            assert!(matches!(err, FormatterError::Invalid(_)), "{params:?}");
        }
    }

    #[test]
    fn test_rejects_small_device() {
        let params = FormatParams::default();
        let mut buf = vec![0u8; (params.total_blocks() as usize - 1) * E3_BLOCK_SIZE];
        let mut io = MemIO::new(&mut buf);
        assert_eq!(
            E3Formatter::new(&mut io, params).format(false),
            Err(FormatterError::Invalid("volume does not fit the device"))
        );
    }
}
