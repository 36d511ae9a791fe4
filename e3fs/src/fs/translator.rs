// SPDX-License-Identifier: MIT

use crate::{
    core::errors::*,
    fs::{cluster::ClusterTable, geometry::Geometry, types::E3FileAttrs},
};

/// Result of mapping a logical block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMapping {
    /// Backed by this physical block.
    Mapped(u64),
    /// Inside the allocated clusters but past the declared length; reads as zeros.
    Hole,
}

/// Logical block of a file to physical block, through its cluster chain.
///
/// Blocks below the declared length are mapped, blocks up to the end of the
/// declared clusters are holes, anything further is out of bounds.
pub fn map_file_block(
    table: &ClusterTable,
    geo: &Geometry,
    attrs: &E3FileAttrs,
    logical_block: u64,
) -> E3Result<BlockMapping> {
    if attrs.is_corrupt(geo.blocks_per_cluster) {
        log::warn!(
            "e3fs: file at cluster {} has impossible counters, refusing to map",
            attrs.start()
        );
        return Err(DirectoryError::Corrupted("file entry with impossible counters").into());
    }

    let allocated = attrs.clusters.get() as u64 * geo.blocks_per_cluster as u64;
    if logical_block >= allocated {
        return Err(E3Error::OutOfBounds);
    }
    if logical_block >= attrs.declared_blocks(geo.blocks_per_cluster) {
        return Ok(BlockMapping::Hole);
    }

    match table.translate(geo, attrs.start(), logical_block) {
        Ok(block) => Ok(BlockMapping::Mapped(block)),
        Err(ClusterError::NotFound) => {
            log::warn!(
                "e3fs: chain at cluster {} shorter than declared length",
                attrs.start()
            );
            Err(ClusterError::NotFound.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Directories use their flat block list, one list entry per logical block.
pub fn map_dir_block(blocks: &[u64], logical_block: u64) -> E3Result<BlockMapping> {
    usize::try_from(logical_block)
        .ok()
        .and_then(|i| blocks.get(i))
        .map(|&b| BlockMapping::Mapped(b))
        .ok_or(E3Error::OutOfBounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> Geometry {
        Geometry {
            total_blocks: 2000,
            info_start: 1,
            info_blocks: 1,
            root_start: 2,
            root_blocks: 1,
            cluster_list_start: 3,
            cluster_list_blocks: 1,
            data_start: 4,
            clusters: 10,
            cluster_shift: 1,
            blocks_per_cluster: 128,
            content_start: 3,
            content_blocks: 0,
        }
    }

    #[test]
    fn test_file_mapping_regions() {
        let g = geo();
        let mut table = ClusterTable::new(&g);
        let head = table.allocate_chain_head().unwrap();
        let mut attrs = E3FileAttrs::empty(head);
        attrs.set_size(1000, g.blocks_per_cluster).unwrap();

        assert_eq!(
            map_file_block(&table, &g, &attrs, 1).unwrap(),
            BlockMapping::Mapped(5)
        );
        assert_eq!(map_file_block(&table, &g, &attrs, 2).unwrap(), BlockMapping::Hole);
        assert_eq!(map_file_block(&table, &g, &attrs, 127).unwrap(), BlockMapping::Hole);
        assert_eq!(
            map_file_block(&table, &g, &attrs, 128),
            Err(E3Error::OutOfBounds)
        );
    }

    #[test]
    fn test_short_chain_is_reported() {
        let g = geo();
        let mut table = ClusterTable::new(&g);
        let head = table.allocate_chain_head().unwrap();
        let mut attrs = E3FileAttrs::empty(head);
        attrs.set_size(70_000, g.blocks_per_cluster).unwrap(); // needs 2 clusters

        let err = map_file_block(&table, &g, &attrs, 130).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_dir_mapping() {
        let blocks = [10, 12];
        assert_eq!(map_dir_block(&blocks, 1).unwrap(), BlockMapping::Mapped(12));
        assert_eq!(map_dir_block(&blocks, 2), Err(E3Error::OutOfBounds));
    }
}
