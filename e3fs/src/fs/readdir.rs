// SPDX-License-Identifier: MIT
#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use e3io::prelude::*;

use crate::{
    core::errors::*,
    fs::{
        constant::*,
        directory::{DirRef, DirectoryTable, EntryBlock, EntryLocation},
        types::EntryKind,
        volume::{E3Volume, FileKind, Ino, Node},
    },
};

/// One name produced by [`ReadDir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub ino: Ino,
    pub kind: FileKind,
    /// Position to resume after this entry.
    pub next_pos: u64,
}

/// Restartable directory listing.
///
/// Positions 0 and 1 are `.` and `..`; position `2 + block * 16 + slot`
/// addresses a record. Slots that are not live are skipped, so positions are
/// stable across calls as long as the directory does not shrink.
pub struct ReadDir<'v, IO: E3IO> {
    vol: &'v E3Volume<IO>,
    dir_ino: Ino,
    /// Subdirectories only live in the root, so the parent is always root.
    parent: Ino,
    root: bool,
    blocks: Vec<u64>,
    pos: u64,
    cached: Option<(usize, EntryBlock)>,
    done: bool,
}

impl<IO: E3IO> E3Volume<IO> {
    /// Lists `dir` starting at `pos` (0 for a fresh listing).
    pub fn iterate(&self, dir: Ino, pos: u64) -> E3Result<ReadDir<'_, IO>> {
        let mut io = self.io.lock();
        let (dir_ref, root) = match self.resolve(&mut io, dir)? {
            Node::Root => (DirRef::Root, true),
            Node::Dir(loc, _) => (DirRef::Sub(loc), false),
            Node::File(..) => return Err(DirectoryError::NotADirectory.into()),
        };
        let blocks = DirectoryTable::new(&mut *io, self.geometry()).blocks(dir_ref)?;

        Ok(ReadDir {
            vol: self,
            dir_ino: dir,
            parent: E3_ROOT_INO,
            root,
            blocks,
            pos,
            cached: None,
            done: false,
        })
    }
}

impl<IO: E3IO> ReadDir<'_, IO> {
    /// Position the next call to `next` starts from.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn load(&mut self, index: usize) -> E3Result<&EntryBlock> {
        if self.cached.as_ref().is_none_or(|(i, _)| *i != index) {
            let mut io = self.vol.io.lock();
            let entries =
                DirectoryTable::new(&mut *io, self.vol.geometry()).read_block(self.blocks[index])?;
            self.cached = Some((index, entries));
        }
        match &self.cached {
            Some((_, entries)) => Ok(entries),
            None => Err(E3Error::Other("directory block cache empty")),
        }
    }

    fn dot(&mut self, name: &str, ino: Ino) -> DirEntry {
        self.pos += 1;
        DirEntry {
            name: name.into(),
            ino,
            kind: FileKind::Directory,
            next_pos: self.pos,
        }
    }
}

impl<IO: E3IO> Iterator for ReadDir<'_, IO> {
    type Item = E3Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.pos {
            0 => return Some(Ok(self.dot(".", self.dir_ino))),
            1 => return Some(Ok(self.dot("..", self.parent))),
            _ => {}
        }

        let bpc = self.vol.geometry().blocks_per_cluster;
        loop {
            let index = usize::try_from(self.pos - 2).ok()?;
            let (block_index, slot) = (index / E3_ENTRIES_PER_BLOCK, index % E3_ENTRIES_PER_BLOCK);
            if block_index >= self.blocks.len() {
                self.done = true;
                return None;
            }
            let entry = match self.load(block_index) {
                Ok(entries) => entries[slot],
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            self.pos += 1;

            let kind = match (entry.kind(), self.root) {
                (EntryKind::Directory(_), true) => FileKind::Directory,
                (EntryKind::File(attrs), false) => {
                    if attrs.is_corrupt(bpc) {
                        log::warn!("e3fs: skipping '{}', impossible size counters", entry.name());
                        continue;
                    }
                    FileKind::File
                }
                (EntryKind::Unused | EntryKind::Deleted, _) => continue,
                _ => {
                    log::warn!("e3fs: skipping '{}', wrong record kind for its level", entry.name());
                    continue;
                }
            };

            let loc = EntryLocation::new(self.blocks[block_index], slot as u8);
            return Some(Ok(DirEntry {
                name: entry.name(),
                ino: loc.ino(),
                kind,
                next_pos: self.pos,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::formatter::{E3Formatter, FormatParams, FsFormatter};

    fn volume(buf: &mut Vec<u8>) -> E3Volume<MemIO<'_>> {
        let params = FormatParams::default();
        *buf = vec![0u8; params.total_blocks() as usize * E3_BLOCK_SIZE];
        {
            let mut io = MemIO::new(buf);
            E3Formatter::new(&mut io, params).format(false).unwrap();
        }
        E3Volume::mount(MemIO::new(buf)).unwrap()
    }

    fn names(it: ReadDir<'_, MemIO<'_>>) -> Vec<String> {
        it.map(|e| e.unwrap().name).collect()
    }

    #[test]
    fn test_lists_dots_then_records() {
        let mut buf = Vec::new();
        let vol = volume(&mut buf);
        let root = vol.root_ino();
        let dir = vol.mkdir(root, "SOUNDS").unwrap();
        vol.create(dir, "KICK.WAV").unwrap();
        vol.create(dir, "SNARE.WAV").unwrap();

        assert_eq!(names(vol.iterate(root, 0).unwrap()), [".", "..", "SOUNDS"]);

        let listing: Vec<DirEntry> = vol.iterate(dir, 0).unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(listing.len(), 4);
        assert_eq!(listing[0].ino, dir);
        assert_eq!(listing[1].ino, root);
        assert_eq!(listing[2].name, "KICK.WAV");
        assert_eq!(listing[2].kind, FileKind::File);
        assert_eq!(vol.lookup(dir, "SNARE.WAV").unwrap(), Some(listing[3].ino));
    }

    #[test]
    fn test_resume_and_skip_deleted() {
        let mut buf = Vec::new();
        let vol = volume(&mut buf);
        let dir = vol.mkdir(vol.root_ino(), "SOUNDS").unwrap();
        for n in ["A", "B", "C"] {
            vol.create(dir, n).unwrap();
        }
        vol.unlink(dir, "B").unwrap();

        let mut it = vol.iterate(dir, 0).unwrap();
        it.next();
        it.next();
        let a = it.next().unwrap().unwrap();
        assert_eq!(a.name, "A");
        assert_eq!(it.position(), a.next_pos);

        // A fresh iterator resumes where the last one stopped.
        assert_eq!(names(vol.iterate(dir, a.next_pos).unwrap()), ["C"]);
    }

    #[test]
    fn test_iterate_file_fails() {
        let mut buf = Vec::new();
        let vol = volume(&mut buf);
        let dir = vol.mkdir(vol.root_ino(), "SOUNDS").unwrap();
        let file = vol.create(dir, "KICK.WAV").unwrap();
        let err = vol.iterate(file, 0).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
    }
}
