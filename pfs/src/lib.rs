//! APA partition tables and the PFS filesystem on raw 512-byte sectors.
//!
//! Everything goes through a [`Disk`], which owns the device handle:
//!
//! ```text
//! txn / format     write orchestration: stage → commit
//! alloc            block and inode allocators (scan based, no bitmap)
//! fs               superblock, inodes, directories, extraction
//! apa              partition table and partition headers
//! layout           on-disk records
//! sector           sector I/O over a BlockDevice
//! ```

pub mod alloc;
pub mod apa;
pub mod config;
mod error;
mod format;
mod fs;
pub mod layout;
mod sector;
mod txn;

pub use block_dev::{BlockDevice, RamDisk, Sector, SECTOR_SIZE};

pub use self::{
    apa::{Diagnosis, HeaderProbe, Partition, SlotReport},
    config::{Config, DirScan, ScanWindow},
    error::{Error, Result},
    fs::FileEntry,
    layout::{DirEntry, Inode, InodeMode, PartitionHeader, SuperBlock},
    sector::{Disk, SectorId},
    txn::StagedWrite,
};

/// Partition table magic, also carried by every partition header.
pub const APA_MAGIC: [u8; 3] = *b"APA";
/// Superblock magic.
pub const PFS_MAGIC: [u8; 4] = *b"PFS ";
