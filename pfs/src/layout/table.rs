use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use block_dev::{Sector, SECTOR_SIZE};

use crate::{Result, APA_MAGIC};

/// One 16-byte slot of the standard partition table at 0x1BE.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableSlot {
    /// 0 marks an unused slot, 0x80 an active one
    pub active: u8,
    pub chs_start: [u8; 3],
    pub kind: u8,
    pub chs_end: [u8; 3],
    pub start_sector: u32,
    pub sector_count: u32,
}

impl TableSlot {
    #[inline]
    pub fn is_used(&self) -> bool {
        self.active != 0
    }

    /// A used slot that also names a non-empty range past sector 0.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_used() && self.start_sector > 0 && self.sector_count > 0
    }
}

/// Sector 0: the APA signature followed by the slot array.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSector {
    /// `APA` at 0x1B0; the boot code area before it is left zero
    #[brw(pad_before = 0x1B0)]
    pub magic: [u8; 3],
    pub version: u8,
    pub total_sectors: u64,
    pub checksum: u16,
    pub slots: [TableSlot; 4],
    /// [0x55, 0xAA]
    pub signature: [u8; 2],
}

impl TableSector {
    pub const MAGIC_OFFSET: usize = 0x1B0;
    pub const SLOTS_OFFSET: usize = 0x1BE;
    pub const SLOT_SIZE: usize = 16;

    pub fn new(total_sectors: u64, slot: TableSlot) -> Self {
        let mut slots = [TableSlot::default(); 4];
        slots[0] = slot;

        Self {
            magic: APA_MAGIC,
            version: 1,
            total_sectors,
            checksum: 0,
            slots,
            signature: [0x55, 0xAA],
        }
    }

    #[inline]
    pub fn has_magic(&self) -> bool {
        self.magic == APA_MAGIC
    }

    pub fn decode(sector: &Sector) -> Result<Self> {
        Ok(Self::read(&mut Cursor::new(&sector[..]))?)
    }

    pub fn encode(&self) -> Result<Sector> {
        let mut sector = [0; SECTOR_SIZE];
        self.write(&mut Cursor::new(&mut sector[..]))?;
        Ok(sector)
    }
}
