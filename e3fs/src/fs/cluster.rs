// SPDX-License-Identifier: MIT
#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use e3io::prelude::*;

use crate::{
    core::errors::*,
    fs::{constant::*, geometry::Geometry},
};

/// Decoded cluster-table link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLink {
    Free,
    EndOfChain,
    Next(u16),
}

impl ClusterLink {
    #[inline]
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            E3_CLUSTER_FREE => ClusterLink::Free,
            E3_CLUSTER_EOC => ClusterLink::EndOfChain,
            next => ClusterLink::Next(next),
        }
    }

    #[inline]
    pub fn raw(self) -> u16 {
        match self {
            ClusterLink::Free => E3_CLUSTER_FREE,
            ClusterLink::EndOfChain => E3_CLUSTER_EOC,
            ClusterLink::Next(next) => next,
        }
    }
}

/// In-memory copy of the on-disk cluster list.
///
/// `links` mirrors the whole region, so entry 0 and the tail past `clusters`
/// are written back untouched. Only `1..=clusters` is ever interpreted.
/// Nothing here performs I/O except [`ClusterTable::load`] and
/// [`ClusterTable::store`].
#[derive(Debug, Clone)]
pub struct ClusterTable {
    links: Vec<u16>,
    clusters: u16,
}

impl ClusterTable {
    /// Fresh all-free table sized for `geo`.
    pub fn new(geo: &Geometry) -> Self {
        Self {
            links: vec![E3_CLUSTER_FREE; region_entries(geo)],
            clusters: geo.clusters as u16,
        }
    }

    pub fn load<IO: E3IO + ?Sized>(io: &mut IO, geo: &Geometry) -> IoResult<Self> {
        let mut raw = vec![0u8; geo.cluster_list_blocks as usize * E3_BLOCK_SIZE];
        io.read_sectors(geo.cluster_list_start as u64, &mut raw)?;
        let links = raw
            .chunks_exact(E3_CLUSTER_ENTRY_SIZE)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(Self {
            links,
            clusters: geo.clusters as u16,
        })
    }

    /// Serialises the whole region back to disk.
    pub fn store<IO: E3IO + ?Sized>(&self, io: &mut IO, geo: &Geometry) -> IoResult {
        let mut raw = Vec::with_capacity(self.links.len() * E3_CLUSTER_ENTRY_SIZE);
        for link in &self.links {
            raw.extend_from_slice(&link.to_le_bytes());
        }
        io.write_sectors(geo.cluster_list_start as u64, &raw)
    }

    #[inline]
    pub fn clusters(&self) -> u16 {
        self.clusters
    }

    #[inline]
    pub fn is_valid(&self, cluster: u16) -> bool {
        (E3_FIRST_CLUSTER..=self.clusters).contains(&cluster)
    }

    pub fn link(&self, cluster: u16) -> ClusterResult<ClusterLink> {
        crate::ensure!(self.is_valid(cluster), ClusterError::InvalidCluster(cluster));
        Ok(ClusterLink::from_raw(self.links[cluster as usize]))
    }

    #[inline]
    fn set(&mut self, cluster: u16, link: ClusterLink) {
        self.links[cluster as usize] = link.raw();
    }

    /// Lowest free cluster, scanning from 1.
    pub fn next_free(&self) -> Option<u16> {
        (E3_FIRST_CLUSTER..=self.clusters).find(|&c| self.links[c as usize] == E3_CLUSTER_FREE)
    }

    pub fn free_count(&self) -> u32 {
        (E3_FIRST_CLUSTER..=self.clusters)
            .filter(|&c| self.links[c as usize] == E3_CLUSTER_FREE)
            .count() as u32
    }

    /// Claims the lowest free cluster as a one-cluster chain.
    pub fn allocate_chain_head(&mut self) -> ClusterResult<u16> {
        let head = self.next_free().ok_or(ClusterError::OutOfSpace)?;
        self.set(head, ClusterLink::EndOfChain);
        Ok(head)
    }

    /// Walks the chain starting at `start`, yielding each member.
    pub fn chain(&self, start: u16) -> ChainIter<'_> {
        ChainIter {
            table: self,
            next: Some(start),
            steps: 0,
        }
    }

    pub fn chain_len(&self, start: u16) -> ClusterResult<u32> {
        let mut len = 0;
        for c in self.chain(start) {
            c?;
            len += 1;
        }
        Ok(len)
    }

    /// `n`-th member of the chain (0 is `start`).
    pub fn get_nth(&self, start: u16, n: u32) -> ClusterResult<u16> {
        let mut walk = self.chain(start);
        for _ in 0..n {
            walk.next().ok_or(ClusterError::NotFound)??;
        }
        walk.next().ok_or(ClusterError::NotFound)?
    }

    /// Grows the chain to `target_len` clusters, returning the final length.
    ///
    /// Runs out of space mid-way without undoing the clusters already
    /// appended; the chain stays well formed.
    pub fn extend_chain(&mut self, start: u16, target_len: u32) -> ClusterResult<u32> {
        let mut len = 0;
        let mut tail = start;
        for c in self.chain(start) {
            tail = c?;
            len += 1;
        }
        while len < target_len {
            let next = self.next_free().ok_or(ClusterError::OutOfSpace)?;
            self.set(tail, ClusterLink::Next(next));
            self.set(next, ClusterLink::EndOfChain);
            tail = next;
            len += 1;
        }
        Ok(len)
    }

    /// Keeps the first `keep_len` clusters and frees the rest.
    pub fn prune_to(&mut self, start: u16, keep_len: u32) -> ClusterResult {
        crate::ensure!(keep_len > 0, ClusterError::Other("prune_to: keep at least one cluster"));
        let last = self.get_nth(start, keep_len - 1)?;
        let rest = self.link(last)?;
        self.set(last, ClusterLink::EndOfChain);
        if let ClusterLink::Next(next) = rest {
            self.release_from(next);
        }
        Ok(())
    }

    /// Frees every cluster of the chain, head included. Returns the count.
    pub fn free_chain(&mut self, start: u16) -> ClusterResult<u32> {
        crate::ensure!(self.is_valid(start), ClusterError::InvalidCluster(start));
        Ok(self.release_from(start))
    }

    // Each member is freed before its link is followed, so a cycle ends on a
    // free cluster.
    fn release_from(&mut self, start: u16) -> u32 {
        let mut freed = 0;
        let mut cur = start;
        loop {
            if !self.is_valid(cur) {
                log::warn!("e3fs: chain link to invalid cluster {cur}, stopping release");
                break;
            }
            let link = ClusterLink::from_raw(self.links[cur as usize]);
            if link == ClusterLink::Free {
                log::warn!("e3fs: chain reaches free cluster {cur}, stopping release");
                break;
            }
            self.set(cur, ClusterLink::Free);
            freed += 1;
            match link {
                ClusterLink::Next(next) => cur = next,
                _ => break,
            }
        }
        freed
    }

    /// Physical block of `logical_block` in the file whose chain starts at
    /// `start`.
    pub fn translate(&self, geo: &Geometry, start: u16, logical_block: u64) -> ClusterResult<u64> {
        let bpc = geo.blocks_per_cluster as u64;
        let index = u32::try_from(logical_block / bpc).map_err(|_| ClusterError::NotFound)?;
        let cluster = self.get_nth(start, index)?;
        Ok(geo.cluster_block(cluster, (logical_block % bpc) as u32))
    }
}

/// Iterator over a chain. Yields an error and stops on a broken link or a
/// cycle.
pub struct ChainIter<'a> {
    table: &'a ClusterTable,
    next: Option<u16>,
    steps: u32,
}

impl Iterator for ChainIter<'_> {
    type Item = ClusterResult<u16>;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next.take()?;
        self.steps += 1;
        if self.steps > self.table.clusters as u32 {
            return Some(Err(ClusterError::LoopDetected));
        }
        let link = match self.table.link(cur) {
            Ok(link) => link,
            Err(e) => return Some(Err(e)),
        };
        match link {
            ClusterLink::EndOfChain => {}
            ClusterLink::Next(next) => self.next = Some(next),
            // Member of a chain marked free
            ClusterLink::Free => return Some(Err(ClusterError::InvalidCluster(cur))),
        }
        Some(Ok(cur))
    }
}

/// Number of u16 entries in the on-disk region.
#[inline]
fn region_entries(geo: &Geometry) -> usize {
    geo.cluster_list_blocks as usize * E3_CLUSTER_ENTRIES_PER_BLOCK
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo(clusters: u32) -> Geometry {
        Geometry {
            total_blocks: 64,
            info_start: 1,
            info_blocks: 1,
            root_start: 2,
            root_blocks: 1,
            cluster_list_start: 3,
            cluster_list_blocks: 1,
            data_start: 4,
            clusters,
            cluster_shift: 1,
            blocks_per_cluster: 128,
            content_start: 3,
            content_blocks: 0,
        }
    }

    fn chain_of(t: &ClusterTable, start: u16) -> Vec<u16> {
        t.chain(start).map(|c| c.unwrap()).collect()
    }

    #[test]
    fn test_alloc_then_free_restores_table() {
        let mut t = ClusterTable::new(&geo(10));
        t.allocate_chain_head().unwrap();
        let before = t.links.clone();

        let head = t.allocate_chain_head().unwrap();
        assert_eq!(head, 2);
        assert_eq!(t.link(head).unwrap(), ClusterLink::EndOfChain);
        assert_eq!(t.free_chain(head).unwrap(), 1);
        assert_eq!(t.links, before);
    }

    #[test]
    fn test_extend_and_get_nth() {
        let mut t = ClusterTable::new(&geo(10));
        let head = t.allocate_chain_head().unwrap();
        assert_eq!(t.extend_chain(head, 4).unwrap(), 4);

        assert_eq!(t.get_nth(head, 3).unwrap(), 4);
        assert_eq!(t.get_nth(head, 4), Err(ClusterError::NotFound));
        assert_eq!(chain_of(&t, head), [1, 2, 3, 4]);

        // Already long enough
        assert_eq!(t.extend_chain(head, 2).unwrap(), 4);
    }

    #[test]
    fn test_chain_terminates_once() {
        let mut t = ClusterTable::new(&geo(10));
        let a = t.allocate_chain_head().unwrap();
        let b = t.allocate_chain_head().unwrap();
        t.extend_chain(a, 3).unwrap();
        t.extend_chain(b, 2).unwrap();

        for head in [a, b] {
            let members = chain_of(&t, head);
            let ends: Vec<u16> = members
                .iter()
                .copied()
                .filter(|&c| t.link(c).unwrap() == ClusterLink::EndOfChain)
                .collect();
            assert_eq!(ends, [*members.last().unwrap()]);
        }
        // Interleaved allocation: a = 1,3,4 ; b = 2,5
        assert_eq!(chain_of(&t, a), [1, 3, 4]);
        assert_eq!(chain_of(&t, b), [2, 5]);
    }

    #[test]
    fn test_prune_then_extend_restores_length() {
        let mut t = ClusterTable::new(&geo(10));
        let head = t.allocate_chain_head().unwrap();
        t.extend_chain(head, 5).unwrap();
        let free_before = t.free_count();

        t.prune_to(head, 2).unwrap();
        assert_eq!(t.chain_len(head).unwrap(), 2);
        assert_eq!(t.free_count(), free_before + 3);

        t.extend_chain(head, 5).unwrap();
        assert_eq!(t.chain_len(head).unwrap(), 5);
        assert_eq!(t.free_count(), free_before);
    }

    #[test]
    fn test_out_of_space_keeps_partial_extension() {
        let mut t = ClusterTable::new(&geo(3));
        let head = t.allocate_chain_head().unwrap();
        assert_eq!(t.extend_chain(head, 5), Err(ClusterError::OutOfSpace));
        assert_eq!(t.chain_len(head).unwrap(), 3);
        assert_eq!(t.allocate_chain_head(), Err(ClusterError::OutOfSpace));
    }

    #[test]
    fn test_loop_detected() {
        let mut t = ClusterTable::new(&geo(4));
        t.set(1, ClusterLink::Next(2));
        t.set(2, ClusterLink::Next(1));
        assert_eq!(t.chain_len(1), Err(ClusterError::LoopDetected));
        assert_eq!(t.get_nth(1, 10), Err(ClusterError::LoopDetected));

        // Release terminates and frees both members.
        assert_eq!(t.free_chain(1).unwrap(), 2);
        assert_eq!(t.free_count(), 4);
    }

    #[test]
    fn test_broken_links() {
        let mut t = ClusterTable::new(&geo(4));
        t.set(1, ClusterLink::Next(9));
        assert_eq!(t.get_nth(1, 1), Err(ClusterError::InvalidCluster(9)));

        t.set(1, ClusterLink::Next(2)); // 2 is free
        assert_eq!(t.chain_len(1), Err(ClusterError::InvalidCluster(2)));
        assert_eq!(t.free_chain(0), Err(ClusterError::InvalidCluster(0)));
    }

    #[test]
    fn test_translate() {
        let g = geo(10);
        let mut t = ClusterTable::new(&g);
        let head = t.allocate_chain_head().unwrap();
        t.allocate_chain_head().unwrap(); // someone else's cluster 2
        t.extend_chain(head, 2).unwrap(); // head -> 3

        assert_eq!(t.translate(&g, head, 5).unwrap(), 4 + 5);
        assert_eq!(t.translate(&g, head, 130).unwrap(), 4 + 2 * 128 + 2);
        assert_eq!(t.translate(&g, head, 256), Err(ClusterError::NotFound));
    }

    #[test]
    fn test_store_preserves_reserved_entries() {
        let g = geo(4);
        let mut image = vec![0u8; 8 * E3_BLOCK_SIZE];
        let base = g.cluster_list_start as usize * E3_BLOCK_SIZE;
        image[base..base + 2].copy_from_slice(&0xBEEFu16.to_le_bytes());
        image[base + 20..base + 22].copy_from_slice(&0x1234u16.to_le_bytes());

        let mut io = MemIO::new(&mut image);
        let mut t = ClusterTable::load(&mut io, &g).unwrap();
        t.allocate_chain_head().unwrap();
        t.store(&mut io, &g).unwrap();

        assert_eq!(&image[base..base + 2], &0xBEEFu16.to_le_bytes());
        assert_eq!(&image[base + 2..base + 4], &E3_CLUSTER_EOC.to_le_bytes());
        assert_eq!(&image[base + 20..base + 22], &0x1234u16.to_le_bytes());
    }
}
