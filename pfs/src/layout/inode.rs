//! 索引节点
//!
//! An inode record is 128 bytes, four to a sector:
//!
//! ```text
//! 0x00 mode | 0x04 size | 0x08 direct[0..6] | 0x20 name (32) | 0x40 mtime | 0x44 ctime
//! ```
//!
//! The name field sits on top of direct slots 6 and 7, so those two slots
//! can never hold a block; they always decode as zero.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use enumflags2::{bitflags, BitFlags};

use super::{decode_name, encode_name};
use crate::config::{
    DIRECT_BLOCKS, INODES_PER_SECTOR, INODE_SIZE, INODE_TABLE_SECTOR, NAME_MAX_LEN,
    USABLE_DIRECT_BLOCKS,
};
use crate::{Error, Result};

const NAME_FIELD_LEN: usize = NAME_MAX_LEN + 1;

#[allow(clippy::enum_variant_names)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeMode {
    OtherExec = 0o001,
    OtherWrite = 0o002,
    OtherRead = 0o004,
    GroupExec = 0o010,
    GroupWrite = 0o020,
    GroupRead = 0o040,
    OwnerExec = 0o100,
    OwnerWrite = 0o200,
    OwnerRead = 0o400,
    Directory = 0x4000,
}

/// Mode of a regular file: every permission bit, no type bit.
pub const FILE_MODE: u32 = 0o777;

#[binrw]
#[brw(little)]
struct DiskInode {
    mode: u32,
    size: u32,
    direct: [u32; USABLE_DIRECT_BLOCKS],
    #[br(map = |raw: [u8; NAME_FIELD_LEN]| decode_name(&raw))]
    #[bw(map = |name: &String| encode_name::<NAME_FIELD_LEN>(name))]
    name: String,
    mtime: u32,
    ctime: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inode {
    /// Bit 0x4000 marks a directory; zero marks a free record
    pub mode: u32,
    pub size: u32,
    /// Partition-relative sectors; the first zero ends the list
    pub direct_blocks: [u32; DIRECT_BLOCKS],
    pub name: String,
    pub mtime: u32,
    pub ctime: u32,
}

/// Relative sector and in-sector byte offset of inode `ino`.
#[inline]
pub fn inode_position(ino: u32) -> (u32, usize) {
    let sector = INODE_TABLE_SECTOR + ino / INODES_PER_SECTOR;
    let offset = (ino % INODES_PER_SECTOR) as usize * INODE_SIZE;
    (sector, offset)
}

impl Inode {
    pub fn file(name: &str, size: u32, blocks: &[u32], now: u32) -> Self {
        let mut direct_blocks = [0; DIRECT_BLOCKS];
        for (dst, &block) in direct_blocks.iter_mut().zip(blocks) {
            *dst = block;
        }

        Self {
            mode: FILE_MODE,
            size,
            direct_blocks,
            name: name.into(),
            mtime: now,
            ctime: now,
        }
    }

    pub fn directory(name: &str, now: u32) -> Self {
        Self {
            mode: FILE_MODE | InodeMode::Directory as u32,
            name: name.into(),
            mtime: now,
            ctime: now,
            ..Default::default()
        }
    }

    #[inline]
    pub fn flags(&self) -> BitFlags<InodeMode> {
        BitFlags::from_bits_truncate(self.mode)
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.flags().contains(InodeMode::Directory)
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.mode == 0
    }

    /// Allocated blocks in order, up to the first empty pointer.
    pub fn blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.direct_blocks.iter().copied().take_while(|&b| b != 0)
    }

    /// First pointer slot that can still take a block.
    pub fn free_pointer(&self) -> Option<usize> {
        self.direct_blocks[..USABLE_DIRECT_BLOCKS]
            .iter()
            .position(|&b| b == 0)
    }

    /// Decodes a record; `None` if `raw` is shorter than one inode.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        let raw = raw.get(..INODE_SIZE)?;
        let disk = DiskInode::read(&mut Cursor::new(raw)).ok()?;

        let mut direct_blocks = [0; DIRECT_BLOCKS];
        direct_blocks[..USABLE_DIRECT_BLOCKS].copy_from_slice(&disk.direct);

        Some(Self {
            mode: disk.mode,
            size: disk.size,
            direct_blocks,
            name: disk.name,
            mtime: disk.mtime,
            ctime: disk.ctime,
        })
    }

    pub fn encode(&self) -> Result<[u8; INODE_SIZE]> {
        if let Some(slot) =
            (USABLE_DIRECT_BLOCKS..DIRECT_BLOCKS).find(|&i| self.direct_blocks[i] != 0)
        {
            return Err(Error::LayoutOverlap(slot));
        }

        let mut direct = [0; USABLE_DIRECT_BLOCKS];
        direct.copy_from_slice(&self.direct_blocks[..USABLE_DIRECT_BLOCKS]);
        let disk = DiskInode {
            mode: self.mode,
            size: self.size,
            direct,
            name: self.name.clone(),
            mtime: self.mtime,
            ctime: self.ctime,
        };

        let mut raw = [0; INODE_SIZE];
        disk.write(&mut Cursor::new(&mut raw[..]))?;
        Ok(raw)
    }
}
