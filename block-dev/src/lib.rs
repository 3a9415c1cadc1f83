//! # Block device interface
//!
//! A block device stores data in fixed 512-byte sectors; sector `n` lives at
//! byte offset `n * SECTOR_SIZE`. [`BlockDevice`] abstracts reading and
//! writing such a device, whether it is a raw disk, an image file or memory.

use std::collections::BTreeMap;
use std::io;

mod ram_disk;

pub use ram_disk::RamDisk;

/// Size of one sector in bytes.
pub const SECTOR_SIZE: usize = 512;

/// The contents of one sector.
pub type Sector = [u8; SECTOR_SIZE];

/// Sector-granular access to a seekable store.
///
/// Every method takes `&mut self`: a device handle has exactly one owner and
/// is never shared between concurrent users.
pub trait BlockDevice {
    /// Reads sector `block_id` into `buf`.
    ///
    /// Returns how many leading bytes of `buf` are backed by the device. A
    /// value below [`SECTOR_SIZE`] means the device ended inside (or before)
    /// the sector; the remainder of `buf` is zero-filled.
    fn read_block(&mut self, block_id: u64, buf: &mut Sector) -> io::Result<usize>;

    /// Writes `buf` to sector `block_id`.
    fn write_block(&mut self, block_id: u64, buf: &Sector) -> io::Result<()>;

    /// Number of whole sectors on the device.
    fn num_blocks(&mut self) -> io::Result<u64>;

    /// Pushes buffered writes down to the underlying medium.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    #[inline]
    fn read_block(&mut self, block_id: u64, buf: &mut Sector) -> io::Result<usize> {
        (**self).read_block(block_id, buf)
    }

    #[inline]
    fn write_block(&mut self, block_id: u64, buf: &Sector) -> io::Result<()> {
        (**self).write_block(block_id, buf)
    }

    #[inline]
    fn num_blocks(&mut self) -> io::Result<u64> {
        (**self).num_blocks()
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for Box<T> {
    #[inline]
    fn read_block(&mut self, block_id: u64, buf: &mut Sector) -> io::Result<usize> {
        (**self).read_block(block_id, buf)
    }

    #[inline]
    fn write_block(&mut self, block_id: u64, buf: &Sector) -> io::Result<()> {
        (**self).write_block(block_id, buf)
    }

    #[inline]
    fn num_blocks(&mut self) -> io::Result<u64> {
        (**self).num_blocks()
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Sectors keyed by their index; absent keys read as zero.
type SectorMap = BTreeMap<u64, Box<Sector>>;
