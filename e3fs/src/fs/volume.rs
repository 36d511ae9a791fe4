// SPDX-License-Identifier: MIT
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use bitflags::bitflags;
use e3io::prelude::*;
use spin::{Mutex, RwLock};

use crate::{
    core::errors::*,
    fs::{
        cluster::ClusterTable,
        constant::*,
        directory::{DirRef, DirectoryTable, EntryLocation},
        geometry::Geometry,
        pool::ContentPool,
        translator::{BlockMapping, map_dir_block, map_file_block},
        types::*,
    },
};

/// Inode number handed to the VFS layer.
pub type Ino = u64;

bitflags! {
    /// Metadata that `sync` still has to write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        const CLUSTER_TABLE = 1 << 0;
        const NON_EMPTY     = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub ino: Ino,
    pub kind: FileKind,
    pub size: u64,
    /// 512-byte blocks.
    pub blocks: u64,
    pub nlink: u32,
    /// Per-directory file id, files only.
    pub id: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStats {
    pub block_size: u32,
    /// Data region size in blocks.
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub clusters: u32,
    pub free_clusters: u32,
    pub used_entries: u32,
    pub free_entries: u32,
    pub content_blocks: u32,
    pub free_content_blocks: u32,
    pub name_max: u32,
}

/// Mutable metadata, guarded by the volume's metadata lock.
#[derive(Debug)]
pub(crate) struct MetaState {
    pub clusters: ClusterTable,
    pub pool: ContentPool,
    /// Live records: directories in root plus files in them.
    pub used_entries: u32,
    pub dirty: DirtyFlags,
}

/// What an inode number resolves to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Node {
    Root,
    Dir(EntryLocation, E3BlockList),
    File(EntryLocation, E3RawEntry, E3FileAttrs),
}

/// A mounted EMU3 volume.
///
/// Every metadata mutation holds the metadata write lock for its whole
/// duration, then the device lock. Lookups and scans only take the device
/// lock; data reads take the metadata lock shared. A scan racing a mutation
/// may observe either state of the record.
pub struct E3Volume<IO: E3IO> {
    geo: Geometry,
    pub(crate) meta: RwLock<MetaState>,
    pub(crate) io: Mutex<IO>,
}

impl<IO: E3IO> E3Volume<IO> {
    /// Decodes the superblock, loads the cluster list and rebuilds the
    /// content-block pool from the root's directory records.
    pub fn mount(mut io: IO) -> E3Result<Self> {
        let mut sector = [0u8; E3_BLOCK_SIZE];
        io.read_sector(E3_SUPERBLOCK_SECTOR, &mut sector)?;
        let geo = Geometry::parse(&sector)?;

        io.read_sector(geo.last_block(), &mut sector)
            .map_err(|e| match e {
                IoError::OutOfBounds => {
                    GeometryError::CorruptLayout("device smaller than declared volume")
                }
                other => GeometryError::IO(other),
            })?;

        let clusters = ClusterTable::load(&mut io, &geo)?;
        let mut pool = ContentPool::new(&geo);
        let mut used_entries = 0;
        {
            let mut table = DirectoryTable::new(&mut io, &geo);
            let mut subdirs = Vec::new();
            for block in table.blocks(DirRef::Root)? {
                for (slot, entry) in table.read_block(block)?.iter().enumerate() {
                    let EntryKind::Directory(list) = entry.kind() else {
                        continue;
                    };
                    for value in list.iter() {
                        if !pool.claim(value) {
                            log::warn!(
                                "e3fs: directory '{}' lists foreign or shared block {value}",
                                entry.name()
                            );
                        }
                    }
                    subdirs.push(EntryLocation::new(block, slot as u8));
                }
            }
            used_entries += subdirs.len() as u32;
            for loc in subdirs {
                used_entries += table.live_count(DirRef::Sub(loc))?;
            }
        }

        log::info!(
            "e3fs: EMU3 volume: {} blocks, info@{}, root@{}+{}, clusters@{}+{}, data@{}, {} clusters of {} blocks, {} entries",
            geo.total_blocks,
            geo.info_start,
            geo.root_start,
            geo.root_blocks,
            geo.cluster_list_start,
            geo.cluster_list_blocks,
            geo.data_start,
            geo.clusters,
            geo.blocks_per_cluster,
            used_entries
        );

        Ok(Self {
            geo,
            meta: RwLock::new(MetaState {
                clusters,
                pool,
                used_entries,
                dirty: DirtyFlags::empty(),
            }),
            io: Mutex::new(io),
        })
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geo
    }

    #[inline]
    pub fn root_ino(&self) -> Ino {
        E3_ROOT_INO
    }

    pub(crate) fn resolve(&self, io: &mut IO, ino: Ino) -> E3Result<Node> {
        if ino == E3_ROOT_INO {
            return Ok(Node::Root);
        }
        let loc = EntryLocation::from_ino(ino);
        let in_root = self.geo.in_root(loc.block);
        crate::ensure!(
            in_root || self.geo.in_content(loc.block),
            DirectoryError::NotFound
        );

        let entry = DirectoryTable::new(io, &self.geo).read_entry(loc)?;
        match (entry.kind(), in_root) {
            (EntryKind::Directory(list), true) => Ok(Node::Dir(loc, list)),
            (EntryKind::File(attrs), false) => Ok(Node::File(loc, entry, attrs)),
            _ => Err(DirectoryError::NotFound.into()),
        }
    }

    fn dir_ref(&self, io: &mut IO, ino: Ino) -> E3Result<DirRef> {
        match self.resolve(io, ino)? {
            Node::Root => Ok(DirRef::Root),
            Node::Dir(loc, _) => Ok(DirRef::Sub(loc)),
            Node::File(..) => Err(DirectoryError::NotADirectory.into()),
        }
    }

    fn file_of(&self, io: &mut IO, ino: Ino) -> E3Result<(EntryLocation, E3RawEntry, E3FileAttrs)> {
        match self.resolve(io, ino)? {
            Node::File(loc, entry, attrs) => {
                if attrs.is_corrupt(self.geo.blocks_per_cluster) {
                    log::warn!("e3fs: '{}' has impossible size counters", entry.name());
                    return Err(DirectoryError::Corrupted("file entry with impossible counters").into());
                }
                Ok((loc, entry, attrs))
            }
            _ => Err(DirectoryError::IsADirectory.into()),
        }
    }

    // === Namespace ===

    /// Inode of `name` in `dir`, `None` when absent.
    pub fn lookup(&self, dir: Ino, name: &str) -> E3Result<Option<Ino>> {
        let raw = encode_name(name)?;
        let mut io = self.io.lock();
        let dir = self.dir_ref(&mut io, dir)?;
        let found = DirectoryTable::new(&mut *io, &self.geo).find_by_name(dir, &raw)?;
        Ok(found.map(|(_, loc)| loc.ino()))
    }

    /// Creates an empty file in a subdirectory.
    ///
    /// The chain head is claimed before the slot; if the record cannot be
    /// committed the head is released again.
    pub fn create(&self, dir: Ino, name: &str) -> E3Result<Ino> {
        let raw = encode_name(name)?;
        let mut meta = self.meta.write();
        let mut io = self.io.lock();

        let dir = match self.resolve(&mut io, dir)? {
            Node::Root => return Err(DirectoryError::PermissionDenied.into()),
            Node::Dir(loc, _) => DirRef::Sub(loc),
            Node::File(..) => return Err(DirectoryError::NotADirectory.into()),
        };

        let MetaState {
            clusters,
            pool,
            used_entries,
            dirty,
        } = &mut *meta;
        let mut table = DirectoryTable::new(&mut *io, &self.geo);
        crate::ensure!(
            table.find_by_name(dir, &raw)?.is_none(),
            DirectoryError::AlreadyExists
        );
        let id = table.allocate_free_file_id(dir)?;
        let head = clusters.allocate_chain_head()?;

        let committed = table.allocate_entry(dir, pool).and_then(|(loc, _)| {
            let entry = E3RawEntry::file(raw, id, E3FileAttrs::empty(head));
            table.write_entry(loc, &entry).map(|_| loc)
        });
        let loc = match committed {
            Ok(loc) => loc,
            Err(e) => {
                release_chain(clusters, head);
                return Err(e.into());
            }
        };

        *used_entries += 1;
        dirty.insert(DirtyFlags::CLUSTER_TABLE | DirtyFlags::NON_EMPTY);
        log::debug!("e3fs: create '{name}' id {id} cluster {head} at {loc:?}");
        Ok(loc.ino())
    }

    /// Marks a file deleted and frees its chain. The name stays on disk.
    pub fn unlink(&self, dir: Ino, name: &str) -> E3Result {
        let raw = encode_name(name)?;
        let mut meta = self.meta.write();
        let mut io = self.io.lock();
        let dir = self.dir_ref(&mut io, dir)?;

        let MetaState {
            clusters,
            pool,
            used_entries,
            dirty,
        } = &mut *meta;
        let mut table = DirectoryTable::new(&mut *io, &self.geo);
        let (entry, loc) = table
            .find_by_name(dir, &raw)?
            .ok_or(DirectoryError::NotFound)?;
        let attrs = match entry.kind() {
            EntryKind::File(attrs) => attrs,
            _ => return Err(DirectoryError::IsADirectory.into()),
        };

        table.retire_entry(loc, pool)?;
        release_chain(clusters, attrs.start());
        *used_entries = used_entries.saturating_sub(1);
        dirty.insert(DirtyFlags::CLUSTER_TABLE);
        log::debug!("e3fs: unlink '{name}' at {loc:?}");
        Ok(())
    }

    /// Renames inside one directory. The record keeps its slot, so the inode
    /// number survives.
    pub fn rename(
        &self,
        old_dir: Ino,
        old_name: &str,
        new_dir: Ino,
        new_name: &str,
        replace: bool,
    ) -> E3Result {
        crate::ensure!(
            old_dir == new_dir,
            DirectoryError::CrossDirectoryRenameUnsupported
        );
        let old_raw = encode_name(old_name)?;
        let new_raw = encode_name(new_name)?;

        let mut meta = self.meta.write();
        let mut io = self.io.lock();
        let dir = self.dir_ref(&mut io, old_dir)?;

        let MetaState {
            clusters,
            pool,
            used_entries,
            dirty,
        } = &mut *meta;
        let mut table = DirectoryTable::new(&mut *io, &self.geo);
        let (src, src_loc) = table
            .find_by_name(dir, &old_raw)?
            .ok_or(DirectoryError::NotFound)?;
        if old_raw == new_raw {
            return Ok(());
        }

        if let Some((dst, dst_loc)) = table.find_by_name(dir, &new_raw)? {
            crate::ensure!(replace, DirectoryError::AlreadyExists);
            match (src.kind(), dst.kind()) {
                (EntryKind::File(_), EntryKind::File(attrs)) => {
                    table.retire_entry(dst_loc, pool)?;
                    release_chain(clusters, attrs.start());
                    dirty.insert(DirtyFlags::CLUSTER_TABLE);
                }
                (EntryKind::Directory(_), EntryKind::Directory(_)) => {
                    table.retire_entry(dst_loc, pool)?;
                }
                (EntryKind::File(_), _) => return Err(DirectoryError::IsADirectory.into()),
                _ => return Err(DirectoryError::NotADirectory.into()),
            }
            *used_entries = used_entries.saturating_sub(1);
        }

        table.rename_entry(src_loc, &new_raw)?;
        log::debug!("e3fs: rename '{old_name}' -> '{new_name}' at {src_loc:?}");
        Ok(())
    }

    /// Creates a directory in the root, owning one fresh content block.
    pub fn mkdir(&self, parent: Ino, name: &str) -> E3Result<Ino> {
        let raw = encode_name(name)?;
        let mut meta = self.meta.write();
        let mut io = self.io.lock();
        match self.resolve(&mut io, parent)? {
            Node::Root => {}
            Node::Dir(..) => return Err(DirectoryError::PermissionDenied.into()),
            Node::File(..) => return Err(DirectoryError::NotADirectory.into()),
        }

        let MetaState {
            pool,
            used_entries,
            dirty,
            ..
        } = &mut *meta;
        let mut table = DirectoryTable::new(&mut *io, &self.geo);
        crate::ensure!(
            table.find_by_name(DirRef::Root, &raw)?.is_none(),
            DirectoryError::AlreadyExists
        );

        let (loc, _) = table.allocate_entry(DirRef::Root, pool)?;
        let value = pool.allocate().ok_or(DirectoryError::OutOfSpace)?;
        let committed = match self.geo.content_block(value) {
            Some(block) => table.clear_block(block).and_then(|_| {
                let entry = E3RawEntry::directory(raw, E3BlockList::single(value));
                table.write_entry(loc, &entry)
            }),
            None => Err(DirectoryError::Corrupted("content pool out of sync")),
        };
        if let Err(e) = committed {
            pool.release(value);
            return Err(e.into());
        }

        *used_entries += 1;
        dirty.insert(DirtyFlags::NON_EMPTY);
        log::debug!("e3fs: mkdir '{name}' block {value} at {loc:?}");
        Ok(loc.ino())
    }

    /// Removes an empty directory and returns its blocks to the pool.
    pub fn rmdir(&self, parent: Ino, name: &str) -> E3Result {
        let raw = encode_name(name)?;
        let mut meta = self.meta.write();
        let mut io = self.io.lock();
        let dir = self.dir_ref(&mut io, parent)?;

        let MetaState {
            pool, used_entries, ..
        } = &mut *meta;
        let mut table = DirectoryTable::new(&mut *io, &self.geo);
        let (entry, loc) = table
            .find_by_name(dir, &raw)?
            .ok_or(DirectoryError::NotFound)?;
        crate::ensure!(
            matches!(entry.kind(), EntryKind::Directory(_)),
            DirectoryError::NotADirectory
        );

        table.retire_entry(loc, pool)?;
        *used_entries = used_entries.saturating_sub(1);
        log::debug!("e3fs: rmdir '{name}' at {loc:?}");
        Ok(())
    }

    // === Data ===

    /// Reads up to `buf.len()` bytes at `offset`, clamped to the file size.
    pub fn read_bytes(&self, ino: Ino, offset: u64, buf: &mut [u8]) -> E3Result<usize> {
        let meta = self.meta.read();
        let mut io = self.io.lock();
        let (_, _, attrs) = self.file_of(&mut io, ino)?;

        let size = attrs.size(self.geo.blocks_per_cluster);
        if offset >= size {
            return Ok(0);
        }
        let len = (size - offset).min(buf.len() as u64) as usize;

        let mut sector = [0u8; E3_BLOCK_SIZE];
        let mut done = 0;
        while done < len {
            let pos = offset + done as u64;
            let within = (pos % E3_BLOCK_SIZE as u64) as usize;
            let n = (E3_BLOCK_SIZE - within).min(len - done);
            match map_file_block(&meta.clusters, &self.geo, &attrs, pos / E3_BLOCK_SIZE as u64)? {
                BlockMapping::Mapped(block) => io.read_sector(block, &mut sector)?,
                BlockMapping::Hole => sector.fill(0),
            }
            buf[done..done + n].copy_from_slice(&sector[within..within + n]);
            done += n;
        }
        Ok(len)
    }

    /// Writes `data` at `offset`, growing the chain as needed.
    ///
    /// A gap between the old end and `offset` reads back as zeros. When the
    /// volume fills up mid-way the clusters already appended stay linked and
    /// the declared size is left unchanged.
    pub fn write_bytes(&self, ino: Ino, offset: u64, data: &[u8]) -> E3Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let mut meta = self.meta.write();
        let mut io = self.io.lock();
        let (loc, mut entry, mut attrs) = self.file_of(&mut io, ino)?;

        let bpc = self.geo.blocks_per_cluster;
        let old_size = attrs.size(bpc);
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(E3Error::OutOfBounds)?;
        let (needed, _, _) = size_to_counts(end.max(old_size), bpc).ok_or(E3Error::OutOfBounds)?;

        // A partial extension stays linked, so the table is dirty either way.
        meta.dirty.insert(DirtyFlags::CLUSTER_TABLE);
        meta.clusters.extend_chain(attrs.start(), needed as u32)?;

        let table = &meta.clusters;
        if offset > old_size {
            fill_span(&mut *io, table, &self.geo, attrs.start(), old_size, offset - old_size, None)?;
        }
        fill_span(&mut *io, table, &self.geo, attrs.start(), offset, data.len() as u64, Some(data))?;

        if end > old_size {
            attrs.set_size(end, bpc).ok_or(E3Error::OutOfBounds)?;
            entry.set_file_attrs(&attrs);
            DirectoryTable::new(&mut *io, &self.geo).write_entry(loc, &entry)?;
        }
        log::debug!("e3fs: write {} bytes at {offset} to {loc:?}", data.len());
        Ok(data.len())
    }

    /// Sets the file length. Shrinking prunes the chain, growing extends it
    /// and zero-fills the new range.
    pub fn truncate(&self, ino: Ino, new_size: u64) -> E3Result {
        let mut meta = self.meta.write();
        let mut io = self.io.lock();
        let (loc, mut entry, mut attrs) = self.file_of(&mut io, ino)?;

        let bpc = self.geo.blocks_per_cluster;
        let old_size = attrs.size(bpc);
        if new_size == old_size {
            return Ok(());
        }
        let (needed, _, _) = size_to_counts(new_size, bpc).ok_or(E3Error::OutOfBounds)?;

        meta.dirty.insert(DirtyFlags::CLUSTER_TABLE);
        if new_size < old_size {
            meta.clusters.prune_to(attrs.start(), needed as u32)?;
        } else {
            meta.clusters.extend_chain(attrs.start(), needed as u32)?;
            fill_span(
                &mut *io,
                &meta.clusters,
                &self.geo,
                attrs.start(),
                old_size,
                new_size - old_size,
                None,
            )?;
        }

        attrs.set_size(new_size, bpc).ok_or(E3Error::OutOfBounds)?;
        entry.set_file_attrs(&attrs);
        DirectoryTable::new(&mut *io, &self.geo).write_entry(loc, &entry)?;
        log::debug!("e3fs: truncate {loc:?} {old_size} -> {new_size}");
        Ok(())
    }

    /// Physical block behind `logical_block` of `ino`.
    pub fn bmap(&self, ino: Ino, logical_block: u64) -> E3Result<BlockMapping> {
        let meta = self.meta.read();
        let mut io = self.io.lock();
        self.bmap_locked(&meta, &mut io, ino, logical_block)
            .map(|(mapping, _)| mapping)
    }

    /// Mapping plus the file size when `ino` is a file.
    fn bmap_locked(
        &self,
        meta: &MetaState,
        io: &mut IO,
        ino: Ino,
        logical_block: u64,
    ) -> E3Result<(BlockMapping, Option<u64>)> {
        match self.resolve(io, ino)? {
            Node::Root => {
                let blocks = DirectoryTable::new(io, &self.geo).blocks(DirRef::Root)?;
                Ok((map_dir_block(&blocks, logical_block)?, None))
            }
            Node::Dir(loc, _) => {
                let blocks = DirectoryTable::new(io, &self.geo).blocks(DirRef::Sub(loc))?;
                Ok((map_dir_block(&blocks, logical_block)?, None))
            }
            Node::File(_, _, attrs) => {
                let mapping = map_file_block(&meta.clusters, &self.geo, &attrs, logical_block)?;
                Ok((mapping, Some(attrs.size(self.geo.blocks_per_cluster))))
            }
        }
    }

    /// Page-cache style read of one block; holes and bytes past the end of
    /// a file come back zeroed.
    pub fn read_block(&self, ino: Ino, logical_block: u64, buf: &mut Sector) -> E3Result {
        let meta = self.meta.read();
        let mut io = self.io.lock();
        let (mapping, size) = self.bmap_locked(&meta, &mut io, ino, logical_block)?;
        match mapping {
            BlockMapping::Mapped(block) => io.read_sector(block, buf)?,
            BlockMapping::Hole => buf.fill(0),
        }
        if let Some(size) = size {
            let valid = size
                .saturating_sub(logical_block * E3_BLOCK_SIZE as u64)
                .min(E3_BLOCK_SIZE as u64) as usize;
            buf[valid..].fill(0);
        }
        Ok(())
    }

    // === Attributes ===

    pub fn stat(&self, ino: Ino) -> E3Result<Stat> {
        let mut io = self.io.lock();
        let bpc = self.geo.blocks_per_cluster;
        Ok(match self.resolve(&mut io, ino)? {
            Node::Root => Stat {
                ino,
                kind: FileKind::Directory,
                size: self.geo.root_blocks as u64 * E3_BLOCK_SIZE as u64,
                blocks: self.geo.root_blocks as u64,
                nlink: 2,
                id: None,
            },
            Node::Dir(_, list) => Stat {
                ino,
                kind: FileKind::Directory,
                size: list.len() as u64 * E3_BLOCK_SIZE as u64,
                blocks: list.len() as u64,
                nlink: 2,
                id: None,
            },
            Node::File(_, entry, attrs) => {
                crate::ensure!(
                    !attrs.is_corrupt(bpc),
                    DirectoryError::Corrupted("file entry with impossible counters")
                );
                Stat {
                    ino,
                    kind: FileKind::File,
                    size: attrs.size(bpc),
                    blocks: attrs.declared_blocks(bpc),
                    nlink: 1,
                    id: Some(entry.id),
                }
            }
        })
    }

    pub fn statfs(&self) -> VolumeStats {
        let meta = self.meta.read();
        let free_clusters = meta.clusters.free_count();
        VolumeStats {
            block_size: E3_BLOCK_SIZE as u32,
            total_blocks: self.geo.data_blocks(),
            free_blocks: free_clusters as u64 * self.geo.blocks_per_cluster as u64,
            clusters: self.geo.clusters,
            free_clusters,
            used_entries: meta.used_entries,
            free_entries: (E3_MAX_FILES as u32).saturating_sub(meta.used_entries),
            content_blocks: self.geo.content_blocks,
            free_content_blocks: meta.pool.free_count(),
            name_max: E3_NAME_LEN as u32,
        }
    }

    // === Lifecycle ===

    /// Writes back dirty metadata and flushes the device.
    pub fn sync(&self) -> E3Result {
        let mut meta = self.meta.write();
        let mut io = self.io.lock();

        if meta.dirty.contains(DirtyFlags::CLUSTER_TABLE) {
            meta.clusters.store(&mut *io, &self.geo)?;
        }
        if meta.dirty.contains(DirtyFlags::NON_EMPTY) && meta.used_entries > 0 {
            self.write_non_empty_markers(&mut io)?;
        }
        meta.dirty = DirtyFlags::empty();
        io.flush()?;
        Ok(())
    }

    fn write_non_empty_markers(&self, io: &mut IO) -> IoResult {
        if self.geo.info_blocks == 0 {
            return Ok(());
        }
        io.write_u16_in_sector(
            self.geo.info_start as u64,
            E3_INFO_MARKER_OFFSET as usize,
            u16::from_le_bytes(E3_INFO_MARKER),
        )?;

        let info_range = self.geo.info_start as u64..(self.geo.info_start + self.geo.info_blocks) as u64;
        if info_range.contains(&E3_MARKER_SECTOR) {
            io.write_u8_in_sector(E3_MARKER_SECTOR, 0, E3_MARKER_SECTOR_BYTE)?;
        }
        Ok(())
    }

    /// Syncs and hands the device back.
    pub fn unmount(self) -> E3Result<IO> {
        self.sync()?;
        log::info!("e3fs: unmounted");
        Ok(self.io.into_inner())
    }

    #[inline]
    pub fn dirty(&self) -> DirtyFlags {
        self.meta.read().dirty
    }
}

/// Frees a chain that is no longer referenced. A corrupt start cluster
/// only leaks.
fn release_chain(clusters: &mut ClusterTable, start: u16) {
    if let Err(e) = clusters.free_chain(start) {
        log::warn!("e3fs: cannot free chain at {start}: {e}");
    }
}

/// Writes `len` bytes at `offset` of a file through its chain, from `src` or
/// zeros. Partial blocks are read-modify-written.
fn fill_span<IO: E3IO + ?Sized>(
    io: &mut IO,
    table: &ClusterTable,
    geo: &Geometry,
    start: u16,
    offset: u64,
    len: u64,
    src: Option<&[u8]>,
) -> E3Result {
    let mut sector = [0u8; E3_BLOCK_SIZE];
    let mut done = 0u64;
    while done < len {
        let pos = offset + done;
        let within = (pos % E3_BLOCK_SIZE as u64) as usize;
        let n = ((E3_BLOCK_SIZE - within) as u64).min(len - done) as usize;
        let block = table.translate(geo, start, pos / E3_BLOCK_SIZE as u64)?;

        if n < E3_BLOCK_SIZE {
            io.read_sector(block, &mut sector)?;
        }
        match src {
            Some(data) => {
                let from = done as usize;
                sector[within..within + n].copy_from_slice(&data[from..from + n]);
            }
            None => sector[within..within + n].fill(0),
        }
        io.write_sector(block, &sector)?;
        done += n as u64;
    }
    Ok(())
}
