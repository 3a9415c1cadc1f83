//! # 文件系统层
//!
//! Superblock, inode table and directory access on one partition, plus
//! file extraction. Nothing in here allocates.

use std::io::Write;

use block_dev::{BlockDevice, SECTOR_SIZE};

use crate::config::{DATA_AREA_SECTOR, INODE_COUNT, INODE_SIZE, SUPER_BLOCK_SECTOR};
use crate::layout::{dir_slots, inode_position, DirEntry, Inode, SuperBlock};
use crate::{DirScan, Disk, Error, Partition, Result, SectorId};

/// A directory entry resolved to the inode it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub ino: u32,
    /// Name as stored in the directory entry
    pub name: String,
    pub inode: Inode,
}

/// Location of one directory entry slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirSlot {
    /// Partition-relative directory block
    pub block: u32,
    /// Entry index inside the block
    pub index: usize,
    pub entry: DirEntry,
}

impl<D: BlockDevice> Disk<D> {
    /// `None` when the partition carries no filesystem.
    pub fn superblock(&mut self, part: &Partition) -> Result<Option<SuperBlock>> {
        let (sector, len) = self.read_sector_partial(part.sector(SUPER_BLOCK_SECTOR))?;
        if len == 0 {
            return Ok(None);
        }
        SuperBlock::decode(&sector)
    }

    /// Reads inode `ino`; `None` when the device ends inside its record.
    pub fn read_inode(&mut self, part: &Partition, ino: u32) -> Result<Option<Inode>> {
        let (rel, offset) = inode_location(ino)?;
        let (sector, len) = self.read_sector_partial(part.sector(rel))?;
        if len < offset + INODE_SIZE {
            log::debug!("inode {ino} of {} is truncated", part.name);
            return Ok(None);
        }
        Ok(Inode::decode(&sector[offset..]))
    }

    pub(crate) fn write_inode(&mut self, part: &Partition, ino: u32, inode: &Inode) -> Result<()> {
        let raw = inode.encode()?;
        self.write_inode_raw(part, ino, &raw)
    }

    pub(crate) fn clear_inode(&mut self, part: &Partition, ino: u32) -> Result<()> {
        self.write_inode_raw(part, ino, &[0; INODE_SIZE])
    }

    fn write_inode_raw(&mut self, part: &Partition, ino: u32, raw: &[u8; INODE_SIZE]) -> Result<()> {
        let (rel, offset) = inode_location(ino)?;
        self.modify_sector(part.sector(rel), |sector| {
            sector[offset..offset + INODE_SIZE].copy_from_slice(raw)
        })
    }

    /// Absolute sector of a data block pointer, checked against the data
    /// area of the partition.
    pub(crate) fn data_block(&self, part: &Partition, block: u32) -> Result<SectorId> {
        if block < DATA_AREA_SECTOR || block >= part.end() {
            return Err(Error::BlockOutOfRange(block));
        }
        Ok(part.sector(block))
    }

    /// Every entry slot of directory `dir`, empty ones included, in block
    /// then slot order.
    pub(crate) fn dir_entries(&mut self, part: &Partition, dir: &Inode) -> Result<Vec<DirSlot>> {
        let mut slots = Vec::new();
        for block in dir.blocks() {
            let id = self.data_block(part, block)?;
            let sector = self.read_sector(id)?;
            for (index, raw) in dir_slots(&sector).enumerate() {
                let entry = DirEntry::decode(raw).unwrap_or_default();
                slots.push(DirSlot {
                    block,
                    index,
                    entry,
                });
            }
        }
        Ok(slots)
    }

    /// Lists the root directory named by the superblock.
    pub fn list_directory(&mut self, part: &Partition) -> Result<Vec<FileEntry>> {
        match self.superblock(part)? {
            Some(sb) => self.list_directory_at(part, sb.root_inode),
            None => {
                log::debug!("{} carries no PFS superblock", part.name);
                Ok(Vec::new())
            }
        }
    }

    /// Lists directory inode `ino`.
    pub fn list_directory_at(&mut self, part: &Partition, ino: u32) -> Result<Vec<FileEntry>> {
        let dir = match self.read_inode(part, ino)? {
            Some(dir) if dir.is_dir() => dir,
            _ => return Ok(Vec::new()),
        };

        let scan = self.config().dir_scan;
        let mut files = Vec::new();
        let mut hole_in = None;
        for slot in self.dir_entries(part, &dir)? {
            if hole_in == Some(slot.block) {
                continue;
            }
            if slot.entry.is_empty() {
                if scan == DirScan::StopAtHole {
                    hole_in = Some(slot.block);
                }
                continue;
            }
            if slot.entry.name.is_empty() {
                continue;
            }

            match self.read_inode(part, slot.entry.ino)? {
                Some(inode) => files.push(FileEntry {
                    ino: slot.entry.ino,
                    name: slot.entry.name,
                    inode,
                }),
                None => log::debug!("entry {} names an unreadable inode", slot.entry.name),
            }
        }

        Ok(files)
    }

    /// Looks `name` up in the root directory.
    pub fn find(&mut self, part: &Partition, name: &str) -> Result<Option<FileEntry>> {
        Ok(self
            .list_directory(part)?
            .into_iter()
            .find(|file| file.name == name))
    }

    /// Copies the content of a file inode into `out`, returning the bytes
    /// written.
    pub fn extract<W: Write>(&mut self, part: &Partition, inode: &Inode, out: &mut W) -> Result<u64> {
        if inode.is_dir() {
            return Err(Error::NotAFile(inode.name.clone()));
        }

        let mut remaining = u64::from(inode.size);
        for block in inode.blocks() {
            if remaining == 0 {
                break;
            }
            let id = self.data_block(part, block)?;
            let sector = self.read_sector(id)?;
            let len = remaining.min(SECTOR_SIZE as u64);
            out.write_all(&sector[..len as usize])?;
            remaining -= len;
        }

        if remaining > 0 {
            log::warn!("{} ends {remaining} bytes short of its size", inode.name);
        }
        Ok(u64::from(inode.size) - remaining)
    }
}

fn inode_location(ino: u32) -> Result<(u32, usize)> {
    if ino >= INODE_COUNT {
        return Err(Error::InodeOutOfRange(ino));
    }
    Ok(inode_position(ino))
}
