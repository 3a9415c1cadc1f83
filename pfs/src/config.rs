//! Layout constants and engine configuration
//!
//! Partition-relative layout:
//! 分区头 | 超级块 | 索引节点表 (8 sectors) | 数据区

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Relative sector of the superblock.
pub const SUPER_BLOCK_SECTOR: u32 = 1;
/// Relative sector where the inode table starts.
pub const INODE_TABLE_SECTOR: u32 = 2;
/// Sectors occupied by the inode table.
pub const INODE_TABLE_SECTORS: u32 = 8;
/// Relative sector where data blocks may be allocated; nothing below it is
/// ever handed out by the block allocator.
pub const DATA_AREA_SECTOR: u32 = INODE_TABLE_SECTOR + INODE_TABLE_SECTORS;

pub const INODE_SIZE: usize = 128;
pub const INODES_PER_SECTOR: u32 = (block_dev::SECTOR_SIZE / INODE_SIZE) as u32;
/// Size of the inode table; inode numbers are `0..INODE_COUNT`.
pub const INODE_COUNT: u32 = INODE_TABLE_SECTORS * INODES_PER_SECTOR;
/// Root directory inode written by the formatter.
pub const ROOT_INODE: u32 = 2;
/// Inodes below this are reserved for the filesystem.
pub const FIRST_FREE_INODE: u32 = 3;

/// Data pointer slots of an inode.
pub const DIRECT_BLOCKS: usize = 8;
/// Slots not shadowed by the inode name field.
pub const USABLE_DIRECT_BLOCKS: usize = 6;

pub const DIR_ENTRY_SIZE: usize = 64;
pub const DIR_ENTRIES_PER_SECTOR: usize = block_dev::SECTOR_SIZE / DIR_ENTRY_SIZE;

/// Longest inode or directory entry name, the last byte stays NUL.
pub const NAME_MAX_LEN: usize = 31;
/// Longest partition name. The header name field ends where mtime begins.
pub const PARTITION_NAME_MAX_LEN: usize = 27;

/// Sectors the formatter leaves unused at the end of the device.
pub const RESERVED_TAIL_SECTORS: u64 = 100;
/// Smallest device the formatter accepts.
pub const MIN_FORMAT_SECTORS: u64 = 128;
/// First sector of the partition created by the formatter.
pub const FORMAT_START_SECTOR: u64 = 1;

/// Sectors examined per allocation call by default.
pub const DEFAULT_SCAN_WINDOW: u32 = 1000;

/// How far one block allocation call scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanWindow {
    /// At most this many sectors from the search start.
    Bounded(u32),
    /// Up to the end of the partition.
    Full,
}

impl Default for ScanWindow {
    fn default() -> Self {
        Self::Bounded(DEFAULT_SCAN_WINDOW)
    }
}

impl FromStr for ScanWindow {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("full") {
            return Ok(Self::Full);
        }
        s.parse().map(Self::Bounded)
    }
}

impl fmt::Display for ScanWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{n}"),
            Self::Full => f.write_str("full"),
        }
    }
}

/// How a directory block is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirScan {
    /// Every slot is examined, empty slots are skipped.
    #[default]
    Full,
    /// The walk of a block ends at its first empty slot. Entries behind a
    /// hole left by a removal are not reported.
    StopAtHole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub scan_window: ScanWindow,
    pub dir_scan: DirScan,
}
