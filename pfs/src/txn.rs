//! # 写入事务
//!
//! A write is planned in full before the device is touched: [`Disk::stage_write`]
//! resolves every sector, inode and directory slot it will use, and
//! [`Disk::commit`] only writes what was planned.
//!
//! There is no rollback. A commit that fails after the data sectors went out
//! leaves them orphaned; they stay allocated in the sense that they hold
//! non-zero data, and the failure is logged with their numbers.

use std::time::{SystemTime, UNIX_EPOCH};

use block_dev::{BlockDevice, SECTOR_SIZE};

use crate::alloc::{Allocator, BlockScanner, FreeCheck, InodeScanner};
use crate::config::{DIR_ENTRY_SIZE, NAME_MAX_LEN, USABLE_DIRECT_BLOCKS};
use crate::layout::{sanitize_name, DirEntry, Inode};
use crate::{Disk, Error, Partition, Result};

/// Where the new directory entry goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntrySlot {
    /// An empty slot inside an existing directory block
    Existing { block: u32, index: usize },
    /// Slot 0 of a new directory block, stored in pointer `pointer` of the
    /// directory inode
    Fresh { block: u32, pointer: usize },
}

/// A fully planned file write. Dropping it leaves the device untouched.
#[derive(Debug)]
pub struct StagedWrite<'a> {
    part: Partition,
    name: String,
    data: &'a [u8],
    blocks: Vec<u32>,
    ino: u32,
    dir_ino: u32,
    dir: Inode,
    slot: EntrySlot,
}

impl StagedWrite<'_> {
    #[inline]
    pub fn partition(&self) -> &Partition {
        &self.part
    }

    /// Name as it will be stored.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ino(&self) -> u32 {
        self.ino
    }

    /// Data blocks in file order.
    #[inline]
    pub fn blocks(&self) -> &[u32] {
        &self.blocks
    }

    /// Directory block that will be added to the root directory, if any.
    pub fn fresh_dir_block(&self) -> Option<u32> {
        match self.slot {
            EntrySlot::Fresh { block, .. } => Some(block),
            EntrySlot::Existing { .. } => None,
        }
    }
}

impl<D: BlockDevice> Disk<D> {
    /// Plans writing `data` as `dest_name` into the root directory of
    /// partition `partition_index`. Reads only.
    pub fn stage_write<'a>(
        &mut self,
        partition_index: usize,
        data: &'a [u8],
        dest_name: &str,
    ) -> Result<StagedWrite<'a>> {
        let part = self.partition(partition_index)?;
        let sb = self
            .superblock(&part)?
            .ok_or_else(|| Error::NotFormatted(part.name.clone()))?;
        let dir_ino = sb.root_inode;
        let dir = match self.read_inode(&part, dir_ino)? {
            Some(dir) if dir.is_dir() => dir,
            _ => return Err(Error::NotADirectory(dir_ino)),
        };

        let name = sanitize_name(dest_name, NAME_MAX_LEN);
        if !is_plain_name(&name) {
            return Err(Error::InvalidName(dest_name.into()));
        }
        let entries = self.dir_entries(&part, &dir)?;
        if entries
            .iter()
            .any(|slot| !slot.entry.is_empty() && slot.entry.name == name)
        {
            return Err(Error::AlreadyExists(name));
        }

        let max = USABLE_DIRECT_BLOCKS * SECTOR_SIZE;
        if data.len() > max {
            return Err(Error::FileTooLarge {
                size: data.len(),
                max,
            });
        }
        let needed = data.len().div_ceil(SECTOR_SIZE);

        let mut scanner = BlockScanner::new(self, &part)?;
        let mut blocks = Vec::with_capacity(needed);
        while blocks.len() < needed {
            match scanner.allocate(self)? {
                Some(block) => blocks.push(block),
                None => {
                    return Err(Error::OutOfSpace {
                        needed,
                        found: blocks.len(),
                    })
                }
            }
        }

        let ino = InodeScanner::new(&part)
            .allocate(self)?
            .ok_or(Error::NoFreeInode)?;

        let slot = match entries.iter().find(|slot| slot.entry.is_empty()) {
            Some(slot) => EntrySlot::Existing {
                block: slot.block,
                index: slot.index,
            },
            None => {
                let pointer = dir.free_pointer().ok_or(Error::DirectoryFull)?;
                let block = scanner
                    .allocate_with(self, FreeCheck::LeadingWord)?
                    .ok_or(Error::OutOfSpace {
                        needed: needed + 1,
                        found: needed,
                    })?;
                EntrySlot::Fresh { block, pointer }
            }
        };

        log::debug!(
            "staged {name}: {} bytes in blocks {blocks:?}, inode {ino}, {slot:?}",
            data.len()
        );
        Ok(StagedWrite {
            part,
            name,
            data,
            blocks,
            ino,
            dir_ino,
            dir,
            slot,
        })
    }

    /// Writes a staged plan out and returns the new inode number.
    pub fn commit(&mut self, staged: StagedWrite<'_>) -> Result<u32> {
        for (block, chunk) in staged.blocks.iter().zip(staged.data.chunks(SECTOR_SIZE)) {
            let mut sector = [0; SECTOR_SIZE];
            sector[..chunk.len()].copy_from_slice(chunk);
            self.write_sector(staged.part.sector(*block), &sector)?;
        }

        if let Err(err) = self.commit_metadata(&staged) {
            log::warn!(
                "writing {} failed after its data went out, blocks {:?} are orphaned",
                staged.name,
                staged.blocks
            );
            return Err(err);
        }

        log::info!(
            "wrote {} ({} bytes) to {} as inode {}",
            staged.name,
            staged.data.len(),
            staged.part.name,
            staged.ino
        );
        Ok(staged.ino)
    }

    fn commit_metadata(&mut self, staged: &StagedWrite<'_>) -> Result<()> {
        let part = &staged.part;
        let now = timestamp();

        // the size fits: it was bounded by six sectors while staging
        let inode = Inode::file(&staged.name, staged.data.len() as u32, &staged.blocks, now);
        self.write_inode(part, staged.ino, &inode)?;

        let (block, index) = match staged.slot {
            EntrySlot::Existing { block, index } => (block, index),
            EntrySlot::Fresh { block, pointer } => {
                self.zero_sector(part.sector(block))?;
                let mut dir = staged.dir.clone();
                dir.direct_blocks[pointer] = block;
                dir.mtime = now;
                self.write_inode(part, staged.dir_ino, &dir)?;
                (block, 0)
            }
        };

        let raw = DirEntry::new(staged.ino, &staged.name).encode()?;
        let offset = index * DIR_ENTRY_SIZE;
        self.modify_sector(part.sector(block), |sector| {
            sector[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(&raw)
        })?;

        self.flush()
    }

    /// Stages and commits in one go.
    pub fn write_file(&mut self, partition_index: usize, data: &[u8], dest_name: &str) -> Result<u32> {
        let staged = self.stage_write(partition_index, data, dest_name)?;
        self.commit(staged)
    }

    /// Removes `name` from the root directory: clears its entry, frees its
    /// inode and zeroes its data blocks. Returns the freed inode number.
    pub fn remove_file(&mut self, partition_index: usize, name: &str) -> Result<u32> {
        let part = self.partition(partition_index)?;
        let sb = self
            .superblock(&part)?
            .ok_or_else(|| Error::NotFormatted(part.name.clone()))?;
        let dir = match self.read_inode(&part, sb.root_inode)? {
            Some(dir) if dir.is_dir() => dir,
            _ => return Err(Error::NotADirectory(sb.root_inode)),
        };

        let slot = self
            .dir_entries(&part, &dir)?
            .into_iter()
            .find(|slot| !slot.entry.is_empty() && slot.entry.name == name)
            .ok_or_else(|| Error::NotFound(name.into()))?;
        let ino = slot.entry.ino;
        let inode = self
            .read_inode(&part, ino)?
            .ok_or_else(|| Error::NotFound(name.into()))?;
        if inode.is_dir() {
            return Err(Error::NotAFile(name.into()));
        }

        // every pointer is checked before the first write
        let blocks = inode
            .blocks()
            .map(|block| self.data_block(&part, block))
            .collect::<Result<Vec<_>>>()?;

        let offset = slot.index * DIR_ENTRY_SIZE;
        self.modify_sector(part.sector(slot.block), |sector| {
            sector[offset..offset + DIR_ENTRY_SIZE].fill(0)
        })?;
        InodeScanner::new(&part).free(self, ino)?;
        for id in blocks {
            self.zero_sector(id)?;
        }
        self.flush()?;

        log::info!("removed {name} (inode {ino}) from {}", part.name);
        Ok(ino)
    }
}

/// A name that is a single path component: no separators, not `.` or `..`.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Seconds since the epoch, saturated into 32 bits.
pub(crate) fn timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().min(u64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}
