//! Lays down a fresh APA table with a single empty PFS partition.

use block_dev::BlockDevice;

use crate::config::{
    DATA_AREA_SECTOR, FORMAT_START_SECTOR, INODE_TABLE_SECTOR, MIN_FORMAT_SECTORS,
    PARTITION_NAME_MAX_LEN, RESERVED_TAIL_SECTORS, ROOT_INODE, SUPER_BLOCK_SECTOR,
};
use crate::layout::{sanitize_name, Inode, PartitionHeader, SuperBlock, TableSector, TableSlot};
use crate::txn::timestamp;
use crate::{Disk, Error, Partition, Result, SectorId};

impl<D: BlockDevice> Disk<D> {
    /// Formats the first `total_sectors` sectors of the device. Everything
    /// the table, header, superblock and inode table cover is overwritten;
    /// the data area is left as it was.
    pub fn format(&mut self, total_sectors: u64, partition_name: &str) -> Result<Partition> {
        if total_sectors < MIN_FORMAT_SECTORS {
            return Err(Error::DeviceTooSmall {
                sectors: total_sectors,
                min: MIN_FORMAT_SECTORS,
            });
        }
        let available = self.num_sectors()?;
        if available < total_sectors {
            return Err(Error::DeviceTooSmall {
                sectors: available,
                min: total_sectors,
            });
        }

        let name = sanitize_name(partition_name, PARTITION_NAME_MAX_LEN);
        if name.is_empty() {
            return Err(Error::InvalidName(partition_name.into()));
        }

        let sector_count = (total_sectors - FORMAT_START_SECTOR - RESERVED_TAIL_SECTORS)
            .min(u64::from(u32::MAX)) as u32;
        let start_sector = FORMAT_START_SECTOR as u32;
        let now = timestamp();

        let slot = TableSlot {
            active: 0x80,
            chs_start: [0x00, 0x01, 0x01],
            kind: 0x01,
            chs_end: [0xFF, 0xFE, 0xFF],
            start_sector,
            sector_count,
        };
        let table = TableSector::new(total_sectors, slot);
        self.write_sector(SectorId::new(0), &table.encode()?)?;

        let header = PartitionHeader {
            pfs_type: 1,
            partition_id: 1,
            start_sector,
            sector_count,
            name: name.clone(),
            mtime: now,
            ctime: now,
        };
        let part = Partition {
            start_sector: FORMAT_START_SECTOR,
            sector_count: sector_count.into(),
            name,
            pfs_type: header.pfs_type,
        };
        self.write_sector(part.sector(0), &header.encode()?)?;
        self.write_sector(
            part.sector(SUPER_BLOCK_SECTOR),
            &SuperBlock::default().encode()?,
        )?;

        for rel in INODE_TABLE_SECTOR..DATA_AREA_SECTOR {
            self.zero_sector(part.sector(rel))?;
        }
        self.write_inode(&part, ROOT_INODE, &Inode::directory("", now))?;
        self.flush()?;

        log::info!(
            "formatted {total_sectors} sectors: partition {} at sector {}, {} sectors",
            part.name,
            part.start_sector,
            part.sector_count
        );
        Ok(part)
    }
}
