//! # 分配器
//!
//! PFS keeps no bitmap: free space is found by scanning the medium on every
//! call. Allocation only reserves in memory; nothing reaches the device until
//! the caller writes the sector or inode it was handed.

use std::collections::BTreeSet;

use block_dev::{BlockDevice, Sector, SECTOR_SIZE};

use crate::config::{DATA_AREA_SECTOR, FIRST_FREE_INODE, INODE_COUNT};
use crate::{Disk, Partition, Result, ScanWindow};

/// 分配器
///
/// `Id` is a partition-relative sector or an inode number.
pub trait Allocator {
    type Id;

    /// Reserves a free unit; `None` when none is left in reach.
    fn allocate<D: BlockDevice>(&mut self, disk: &mut Disk<D>) -> Result<Option<Self::Id>>;

    /// Returns a unit to the free pool by clearing it on the device.
    fn free<D: BlockDevice>(&mut self, disk: &mut Disk<D>, id: Self::Id) -> Result<()>;

    fn is_free<D: BlockDevice>(&mut self, disk: &mut Disk<D>, id: Self::Id) -> Result<bool>;
}

/// What a free data sector looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreeCheck {
    /// Every byte is zero.
    #[default]
    Zeroed,
    /// The first 32-bit word is zero; the sector must be zeroed before use.
    LeadingWord,
}

impl FreeCheck {
    #[inline]
    pub fn accepts(self, sector: &Sector) -> bool {
        match self {
            Self::Zeroed => sector.iter().all(|&b| b == 0),
            Self::LeadingWord => sector[..4] == [0; 4],
        }
    }
}

/// 数据块扫描分配器
///
/// Sectors referenced by a live inode are never handed out, whatever they
/// contain, and neither is anything below the data area.
#[derive(Debug)]
pub struct BlockScanner {
    part: Partition,
    window: ScanWindow,
    /// Where the next `allocate` starts scanning
    cursor: u32,
    /// Blocks held by live inodes when the scanner was built
    referenced: BTreeSet<u32>,
    /// Blocks handed out by this scanner
    reserved: BTreeSet<u32>,
}

impl BlockScanner {
    /// Builds a scanner over `part`, collecting the blocks of every live inode.
    pub fn new<D: BlockDevice>(disk: &mut Disk<D>, part: &Partition) -> Result<Self> {
        let mut referenced = BTreeSet::new();
        for ino in 0..INODE_COUNT {
            if let Some(inode) = disk.read_inode(part, ino)? {
                if !inode.is_free() {
                    referenced.extend(inode.blocks());
                }
            }
        }
        log::debug!(
            "{}: {} blocks referenced by live inodes",
            part.name,
            referenced.len()
        );

        Ok(Self {
            part: part.clone(),
            window: disk.config().scan_window,
            cursor: DATA_AREA_SECTOR,
            referenced,
            reserved: BTreeSet::new(),
        })
    }

    #[inline]
    pub fn reserved(&self) -> impl Iterator<Item = u32> + '_ {
        self.reserved.iter().copied()
    }

    #[inline]
    fn in_use(&self, block: u32) -> bool {
        block < DATA_AREA_SECTOR || self.referenced.contains(&block) || self.reserved.contains(&block)
    }

    /// First free sector at or after `search_start`, within one scan window.
    ///
    /// The scan ends early at the end of the partition or the first sector the
    /// device does not fully back.
    pub fn find_free_block<D: BlockDevice>(
        &self,
        disk: &mut Disk<D>,
        search_start: u32,
        check: FreeCheck,
    ) -> Result<Option<u32>> {
        let start = search_start.max(DATA_AREA_SECTOR);
        let end = match self.window {
            ScanWindow::Bounded(n) => start.saturating_add(n).min(self.part.end()),
            ScanWindow::Full => self.part.end(),
        };

        for block in start..end {
            if self.in_use(block) {
                continue;
            }
            let (sector, len) = disk.read_sector_partial(self.part.sector(block))?;
            if len < SECTOR_SIZE {
                log::debug!("{}: device ends at block {block}", self.part.name);
                break;
            }
            if check.accepts(&sector) {
                return Ok(Some(block));
            }
        }

        log::debug!("{}: no free block in {start}..{end}", self.part.name);
        Ok(None)
    }

    /// Reserves the next free block and moves the cursor past it.
    pub fn allocate_with<D: BlockDevice>(
        &mut self,
        disk: &mut Disk<D>,
        check: FreeCheck,
    ) -> Result<Option<u32>> {
        let found = self.find_free_block(disk, self.cursor, check)?;
        if let Some(block) = found {
            self.reserved.insert(block);
            self.cursor = block + 1;
            log::debug!("{}: reserved block {block}", self.part.name);
        }
        Ok(found)
    }
}

impl Allocator for BlockScanner {
    type Id = u32;

    fn allocate<D: BlockDevice>(&mut self, disk: &mut Disk<D>) -> Result<Option<u32>> {
        self.allocate_with(disk, FreeCheck::Zeroed)
    }

    fn free<D: BlockDevice>(&mut self, disk: &mut Disk<D>, block: u32) -> Result<()> {
        let id = disk.data_block(&self.part, block)?;
        disk.zero_sector(id)?;
        self.reserved.remove(&block);
        self.referenced.remove(&block);
        Ok(())
    }

    fn is_free<D: BlockDevice>(&mut self, disk: &mut Disk<D>, block: u32) -> Result<bool> {
        if self.in_use(block) || block >= self.part.end() {
            return Ok(false);
        }
        let (sector, len) = disk.read_sector_partial(self.part.sector(block))?;
        Ok(len == SECTOR_SIZE && FreeCheck::Zeroed.accepts(&sector))
    }
}

/// 索引节点分配器: first record from inode 3 whose mode is zero.
#[derive(Debug)]
pub struct InodeScanner {
    part: Partition,
    reserved: BTreeSet<u32>,
}

impl InodeScanner {
    pub fn new(part: &Partition) -> Self {
        Self {
            part: part.clone(),
            reserved: BTreeSet::new(),
        }
    }
}

impl Allocator for InodeScanner {
    type Id = u32;

    fn allocate<D: BlockDevice>(&mut self, disk: &mut Disk<D>) -> Result<Option<u32>> {
        for ino in FIRST_FREE_INODE..INODE_COUNT {
            if self.is_free(disk, ino)? {
                self.reserved.insert(ino);
                log::debug!("{}: reserved inode {ino}", self.part.name);
                return Ok(Some(ino));
            }
        }
        Ok(None)
    }

    fn free<D: BlockDevice>(&mut self, disk: &mut Disk<D>, ino: u32) -> Result<()> {
        disk.clear_inode(&self.part, ino)?;
        self.reserved.remove(&ino);
        Ok(())
    }

    fn is_free<D: BlockDevice>(&mut self, disk: &mut Disk<D>, ino: u32) -> Result<bool> {
        if ino < FIRST_FREE_INODE || self.reserved.contains(&ino) {
            return Ok(false);
        }
        Ok(disk
            .read_inode(&self.part, ino)?
            .is_some_and(|inode| inode.is_free()))
    }
}

impl<D: BlockDevice> Disk<D> {
    /// First free data sector of `part` at or after `search_start`, scanning
    /// one configured window. Returns a partition-relative sector.
    pub fn find_free_block(&mut self, part: &Partition, search_start: u32) -> Result<Option<u32>> {
        BlockScanner::new(self, part)?.find_free_block(self, search_start, FreeCheck::Zeroed)
    }
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;
    use crate::{Config, Error, Inode};

    fn part() -> Partition {
        Partition {
            start_sector: 1,
            sector_count: 99,
            name: "test".into(),
            pfs_type: 1,
        }
    }

    #[test]
    fn free_check() {
        let mut sector = [0; SECTOR_SIZE];
        assert!(FreeCheck::Zeroed.accepts(&sector));
        sector[100] = 1;
        assert!(!FreeCheck::Zeroed.accepts(&sector));
        assert!(FreeCheck::LeadingWord.accepts(&sector));
        sector[3] = 1;
        assert!(!FreeCheck::LeadingWord.accepts(&sector));
    }

    #[test]
    fn skips_dirty_and_referenced() {
        let part = part();
        let mut disk = Disk::new(RamDisk::new(100));
        disk.write_sector(part.sector(10), &[1; SECTOR_SIZE]).unwrap();
        disk.write_inode(&part, 3, &Inode::file("zeros", 512, &[11], 0))
            .unwrap();

        // block 11 is all zero but belongs to a file
        assert_eq!(Some(12), disk.find_free_block(&part, 0).unwrap());
        assert_eq!(Some(40), disk.find_free_block(&part, 40).unwrap());
    }

    #[test]
    fn allocate_advances() {
        let part = part();
        let mut disk = Disk::new(RamDisk::new(100));
        let mut scanner = BlockScanner::new(&mut disk, &part).unwrap();

        assert_eq!(Some(10), scanner.allocate(&mut disk).unwrap());
        assert_eq!(Some(11), scanner.allocate(&mut disk).unwrap());
        assert_eq!(vec![10, 11], scanner.reserved().collect::<Vec<_>>());
        // still zero on the device, only reserved
        assert!(!scanner.is_free(&mut disk, 10).unwrap());
        assert!(scanner.is_free(&mut disk, 12).unwrap());

        scanner.free(&mut disk, 10).unwrap();
        assert!(scanner.is_free(&mut disk, 10).unwrap());
        assert!(matches!(
            scanner.free(&mut disk, 3),
            Err(Error::BlockOutOfRange(3))
        ));
    }

    #[test]
    fn bounded_window() {
        let part = part();
        let mut disk = Disk::with_config(
            RamDisk::new(100),
            Config {
                scan_window: ScanWindow::Bounded(5),
                ..Default::default()
            },
        );
        for block in 10..15 {
            disk.write_sector(part.sector(block), &[0xEE; SECTOR_SIZE])
                .unwrap();
        }

        assert_eq!(None, disk.find_free_block(&part, 10).unwrap());
        assert_eq!(Some(15), disk.find_free_block(&part, 11).unwrap());

        disk.set_config(Config {
            scan_window: ScanWindow::Full,
            ..Default::default()
        });
        assert_eq!(Some(15), disk.find_free_block(&part, 0).unwrap());
    }

    #[test]
    fn leading_word_check() {
        let part = part();
        let mut disk = Disk::new(RamDisk::new(100));
        let mut stale = [0; SECTOR_SIZE];
        stale[8] = 0xFF;
        disk.write_sector(part.sector(10), &stale).unwrap();

        let mut scanner = BlockScanner::new(&mut disk, &part).unwrap();
        let found = scanner.allocate_with(&mut disk, FreeCheck::LeadingWord);
        assert_eq!(Some(10), found.unwrap());
        assert_eq!(Some(11), scanner.allocate(&mut disk).unwrap());
    }

    #[test]
    fn stops_at_device_end() {
        // partition claims more sectors than the device holds
        let part = part();
        let mut disk = Disk::new(RamDisk::new(20));
        for block in 10..19 {
            disk.write_sector(part.sector(block), &[1; SECTOR_SIZE]).unwrap();
        }
        assert_eq!(None, disk.find_free_block(&part, 0).unwrap());
    }

    #[test]
    fn inode_allocation() {
        let part = part();
        let mut disk = Disk::new(RamDisk::new(100));
        disk.write_inode(&part, 3, &Inode::file("a", 0, &[], 0)).unwrap();

        let mut inodes = InodeScanner::new(&part);
        assert_eq!(Some(4), inodes.allocate(&mut disk).unwrap());
        assert_eq!(Some(5), inodes.allocate(&mut disk).unwrap());
        assert!(!inodes.is_free(&mut disk, 2).unwrap());

        inodes.free(&mut disk, 3).unwrap();
        assert!(inodes.is_free(&mut disk, 3).unwrap());
        assert_eq!(Some(3), inodes.allocate(&mut disk).unwrap());

        // reservations alone never reach the device
        for ino in 3..32 {
            disk.write_inode(&part, ino, &Inode::file("f", 0, &[], 0))
                .unwrap();
        }
        assert_eq!(None, InodeScanner::new(&part).allocate(&mut disk).unwrap());
    }
}
