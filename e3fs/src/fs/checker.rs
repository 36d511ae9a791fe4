// SPDX-License-Identifier: MIT
#[cfg(not(feature = "std"))]
use alloc::{format, string::String, vec, vec::Vec};

use e3io::prelude::*;

pub use crate::core::checker::*;

use crate::{
    core::utils::bitmap::{BitmapOps, bitmap_len},
    fs::{
        cluster::ClusterLink,
        constant::*,
        directory::{DirRef, DirectoryTable, EntryLocation},
        geometry::Geometry,
        types::*,
        volume::E3Volume,
    },
};

/// A live record found while walking the tree.
struct Record {
    path: String,
    loc: EntryLocation,
    /// Owning directory record; `None` in the root.
    parent: Option<EntryLocation>,
    entry: E3RawEntry,
}

/// Structural checker over a mounted volume.
///
/// Reads the on-disk records and the in-memory cluster table and content
/// pool under the volume's locks; it never writes.
pub struct E3Checker<'v, IO: E3IO> {
    vol: &'v E3Volume<IO>,
    /// Cluster ownership map filled by the chain phase.
    owned: Option<Vec<u8>>,
}

impl<'v, IO: E3IO> E3Checker<'v, IO> {
    pub fn new(vol: &'v E3Volume<IO>) -> Self {
        Self { vol, owned: None }
    }

    fn geo(&self) -> &'v Geometry {
        self.vol.geometry()
    }

    /// Root directories, then the files of each.
    fn walk(&self) -> CheckerResult<(Vec<Record>, Vec<Record>)> {
        let geo = self.geo();
        let mut io = self.vol.io.lock();
        let mut table = DirectoryTable::new(&mut *io, geo);

        let mut dirs = Vec::new();
        for block in table.blocks(DirRef::Root)? {
            for (slot, entry) in table.read_block(block)?.iter().enumerate() {
                if entry.is_live() {
                    dirs.push(Record {
                        path: entry.name(),
                        loc: EntryLocation::new(block, slot as u8),
                        parent: None,
                        entry: *entry,
                    });
                }
            }
        }

        let mut files = Vec::new();
        for dir in dirs.iter().filter(|d| matches!(d.entry.kind(), EntryKind::Directory(_))) {
            for block in table.blocks(DirRef::Sub(dir.loc))? {
                for (slot, entry) in table.read_block(block)?.iter().enumerate() {
                    if entry.is_live() {
                        files.push(Record {
                            path: format!("{}/{}", dir.path, entry.name()),
                            loc: EntryLocation::new(block, slot as u8),
                            parent: Some(dir.loc),
                            entry: *entry,
                        });
                    }
                }
            }
        }
        Ok((dirs, files))
    }

    /// Walks every file chain, marking owners. Findings go to `rep`.
    fn walk_chains(&self, files: &[Record], rep: &mut VerifyReport) -> Vec<u8> {
        let geo = self.geo();
        let meta = self.vol.meta.read();
        let table = &meta.clusters;
        let mut owned = vec![0u8; bitmap_len(geo.clusters as usize + 1)];

        for file in files {
            let EntryKind::File(attrs) = file.entry.kind() else {
                rep.push(Finding::warn("DIR.LEVEL", format!("{}: directory below root", file.path)));
                continue;
            };
            if attrs.is_corrupt(geo.blocks_per_cluster) {
                rep.push(Finding::err(
                    "FILE.ATTR",
                    format!("{}: impossible size counters", file.path),
                ));
                continue;
            }

            let mut len = 0u32;
            for member in table.chain(attrs.start()) {
                match member {
                    Ok(c) => {
                        if owned.get_bit(c as usize) {
                            rep.push(Finding::err(
                                "CHAIN.SHARED",
                                format!("{}: cluster {c} already owned", file.path),
                            ));
                            break;
                        }
                        owned.set_bit(c as usize, true);
                        len += 1;
                    }
                    Err(e) => {
                        rep.push(Finding::err(
                            "CHAIN.BROKEN",
                            format!("{}: {e} after {len} clusters", file.path),
                        ));
                        break;
                    }
                }
            }

            let declared = attrs.clusters.get() as u32;
            if len < declared {
                rep.push(Finding::err(
                    "CHAIN.SHORT",
                    format!("{}: chain holds {len} of {declared} clusters", file.path),
                ));
            } else if len > declared {
                rep.push(Finding::warn(
                    "CHAIN.LONG",
                    format!("{}: {} clusters past the declared size", file.path, len - declared),
                ));
            }
        }
        owned
    }
}

impl<'v, IO: E3IO> FsChecker for E3Checker<'v, IO> {
    fn check_superblock(&mut self, rep: &mut VerifyReport) -> CheckerResult {
        let mut sector = [0u8; E3_BLOCK_SIZE];
        self.vol.io.lock().read_sector(E3_SUPERBLOCK_SECTOR, &mut sector)?;

        match Geometry::parse(&sector) {
            Ok(geo) if geo == *self.geo() => {
                rep.push(Finding::info("SB.OK", "superblock decodes to the mounted layout"))
            }
            Ok(_) => rep.push(Finding::err(
                "SB.CHANGED",
                "superblock no longer matches the mounted layout",
            )),
            Err(e) => rep.push(Finding::err("SB.DECODE", format!("superblock: {e}"))),
        }
        Ok(())
    }

    fn check_chains(&mut self, rep: &mut VerifyReport) -> CheckerResult {
        let (_, files) = self.walk()?;
        let owned = self.walk_chains(&files, rep);
        self.owned = Some(owned);
        Ok(())
    }

    fn check_directories(&mut self, rep: &mut VerifyReport) -> CheckerResult {
        let geo = self.geo();
        let (dirs, files) = self.walk()?;
        let mut listed = vec![0u8; bitmap_len(geo.content_blocks as usize)];

        for dir in &dirs {
            let EntryKind::Directory(list) = dir.entry.kind() else {
                rep.push(Finding::warn("DIR.LEVEL", format!("{}: file in root", dir.path)));
                continue;
            };
            for value in list.iter() {
                if geo.content_block(value).is_none() {
                    rep.push(Finding::err(
                        "DIR.RANGE",
                        format!("{}: block {value} outside the content region", dir.path),
                    ));
                    continue;
                }
                let index = (value as u32 - geo.root_blocks) as usize;
                if listed.get_bit(index) {
                    rep.push(Finding::err(
                        "DIR.SHARED",
                        format!("{}: block {value} listed twice", dir.path),
                    ));
                }
                listed.set_bit(index, true);
            }

            let mut ids = [0u8; bitmap_len(256)];
            for file in files.iter().filter(|f| f.parent == Some(dir.loc)) {
                let id = file.entry.id as usize;
                if id >= E3_MAX_FILES {
                    rep.push(Finding::warn("DIR.ID", format!("{}: id {id} out of range", file.path)));
                } else if ids.get_bit(id) {
                    rep.push(Finding::warn("DIR.ID", format!("{}: duplicate id {id}", file.path)));
                }
                ids.set_bit(id, true);
            }
        }

        let meta = self.vol.meta.read();
        for index in 0..geo.content_blocks {
            let value = geo.content_list_value(index);
            if meta.pool.is_used(value) != listed.get_bit(index as usize) {
                rep.push(Finding::err(
                    "POOL.SYNC",
                    format!("content block {value} pool state disagrees with the block lists"),
                ));
            }
        }

        let live = (dirs.len() + files.len()) as u32;
        if meta.used_entries != live {
            rep.push(Finding::warn(
                "META.COUNT",
                format!("{} entries counted, {live} on disk", meta.used_entries),
            ));
        }
        Ok(())
    }

    fn check_cross_reference(&mut self, rep: &mut VerifyReport) -> CheckerResult {
        let owned = match self.owned.take() {
            Some(owned) => owned,
            None => {
                let (_, files) = self.walk()?;
                let mut scratch = VerifyReport::default();
                self.walk_chains(&files, &mut scratch)
            }
        };

        let meta = self.vol.meta.read();
        let table = &meta.clusters;
        let mut leaked = 0u32;
        let mut first = None;
        for c in E3_FIRST_CLUSTER..=table.clusters() {
            let used = !matches!(table.link(c), Ok(ClusterLink::Free));
            if used && !owned.get_bit(c as usize) {
                leaked += 1;
                first.get_or_insert(c);
            }
        }
        if let Some(first) = first {
            rep.push(Finding::warn(
                "CLUS.LEAK",
                format!("{leaked} allocated clusters owned by no file, first {first}"),
            ));
        }
        self.owned = Some(owned);
        Ok(())
    }
}
