//! # Partition table parser
//!
//! Sector 0 carries the `APA` signature and four standard 16-byte slots; each
//! valid slot points at a partition header sector carrying the magic again.

use std::fmt;

use block_dev::{BlockDevice, Sector, SECTOR_SIZE};

use crate::layout::{PartitionHeader, TableSector, TableSlot};
use crate::{Disk, Error, Result, SectorId, APA_MAGIC, PFS_MAGIC};

/// A resolved APA partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub start_sector: u64,
    pub sector_count: u64,
    pub name: String,
    pub pfs_type: u32,
}

impl Partition {
    /// Absolute sector of the partition-relative sector `rel`.
    #[inline]
    pub fn sector(&self, rel: u32) -> SectorId {
        SectorId::new(self.start_sector + u64::from(rel))
    }

    /// Partition-relative sector bound usable by 32-bit block pointers.
    #[inline]
    pub fn end(&self) -> u32 {
        self.sector_count.min(u64::from(u32::MAX)) as u32
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - Sector: {}, Size: {} sectors",
            self.name, self.start_sector, self.sector_count
        )
    }
}

impl<D: BlockDevice> Disk<D> {
    /// Enumerates the partitions in slot order.
    ///
    /// A device without the table magic yields an empty list: it is taken as
    /// not formatted for APA, not as corrupt.
    pub fn partitions(&mut self) -> Result<Vec<Partition>> {
        let (sector, len) = self.read_sector_partial(SectorId::new(0))?;
        if len < SECTOR_SIZE {
            log::warn!("sector 0 is truncated ({len} bytes), no partition table");
            return Ok(Vec::new());
        }

        let table = TableSector::decode(&sector)?;
        if !table.has_magic() {
            log::warn!("APA magic not found in sector 0, this might not be an APA disk");
            if log::log_enabled!(log::Level::Trace) {
                for line in hex_window(&sector) {
                    log::trace!("{line}");
                }
            }
            return Ok(Vec::new());
        }

        let mut partitions = Vec::new();
        for (index, slot) in table.slots.iter().enumerate() {
            if !slot.is_valid() {
                continue;
            }
            match self.resolve(slot) {
                Ok(Some(partition)) => {
                    log::debug!("slot {index}: {partition}");
                    partitions.push(partition);
                }
                Ok(None) => log::warn!(
                    "slot {index}: no partition header at sector {}",
                    slot.start_sector
                ),
                Err(err) => log::warn!(
                    "slot {index}: could not read partition header at sector {}: {err}",
                    slot.start_sector
                ),
            }
        }

        Ok(partitions)
    }

    /// The partition at `index` in slot order.
    pub fn partition(&mut self, index: usize) -> Result<Partition> {
        let mut partitions = self.partitions()?;
        let count = partitions.len();
        if index >= count {
            return Err(Error::PartitionOutOfRange { index, count });
        }
        Ok(partitions.swap_remove(index))
    }

    /// Whether sector 0 carries the APA signature.
    pub fn has_table(&mut self) -> Result<bool> {
        let (sector, _) = self.read_sector_partial(SectorId::new(0))?;
        Ok(sector[TableSector::MAGIC_OFFSET..][..APA_MAGIC.len()] == APA_MAGIC)
    }

    fn resolve(&mut self, slot: &TableSlot) -> Result<Option<Partition>> {
        let sector = self.read_sector(SectorId::new(slot.start_sector.into()))?;
        let partition = PartitionHeader::decode(&sector)?.map(|header| Partition {
            start_sector: slot.start_sector.into(),
            sector_count: slot.sector_count.into(),
            name: header.name,
            pfs_type: header.pfs_type,
        });
        Ok(partition)
    }

    /// Collects everything an operator needs to tell why a device does not
    /// parse. Never affects what [`Disk::partitions`] returns.
    pub fn diagnose(&mut self) -> Result<Diagnosis> {
        let total_sectors = self.num_sectors()?;

        let mut magic_offsets = Vec::new();
        let (mbr, _) = self.read_sector_partial(SectorId::new(0))?;
        for offset in [TableSector::MAGIC_OFFSET, 0x00] {
            if mbr[offset..offset + APA_MAGIC.len()] == APA_MAGIC {
                magic_offsets.push(offset);
            }
        }
        for id in [1, 2] {
            let (sector, _) = self.read_sector_partial(SectorId::new(id))?;
            if sector[..APA_MAGIC.len()] == APA_MAGIC {
                magic_offsets.push(id as usize * SECTOR_SIZE);
            }
        }

        let mut slots = Vec::new();
        for index in 0..4 {
            let offset = TableSector::SLOTS_OFFSET + index * TableSector::SLOT_SIZE;
            let raw = &mbr[offset..offset + TableSector::SLOT_SIZE];
            // the standard table marks free slots by their type byte
            if raw[4] == 0 {
                continue;
            }
            let start = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
            let count = u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]);
            let header = self.probe_header(start, total_sectors);
            slots.push(SlotReport {
                index,
                start,
                count,
                header,
            });
        }

        Ok(Diagnosis {
            total_sectors,
            magic_offsets,
            slots,
            hex_window: hex_window(&mbr),
            partitions: self.partitions()?,
        })
    }

    fn probe_header(&mut self, start: u32, total_sectors: u64) -> HeaderProbe {
        if start == 0 || u64::from(start) >= total_sectors {
            return HeaderProbe::Skipped;
        }

        match self.read_sector(SectorId::new(start.into())) {
            Ok(sector) if sector[..APA_MAGIC.len()] == APA_MAGIC => HeaderProbe::Apa,
            Ok(sector) if sector[..PFS_MAGIC.len()] == PFS_MAGIC => HeaderProbe::Pfs,
            Ok(sector) => HeaderProbe::Unknown(sector[..64].to_vec()),
            Err(err) => HeaderProbe::Unreadable(err.to_string()),
        }
    }
}

/// What was found at the start sector of a standard table slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderProbe {
    Apa,
    Pfs,
    /// First 64 bytes of an unrecognised header
    Unknown(Vec<u8>),
    Unreadable(String),
    /// Start sector is zero or past the end of the device
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReport {
    pub index: usize,
    pub start: u32,
    pub count: u32,
    pub header: HeaderProbe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub total_sectors: u64,
    /// Byte offsets where the APA magic was seen
    pub magic_offsets: Vec<usize>,
    /// Standard MBR decode of the non-empty slots
    pub slots: Vec<SlotReport>,
    /// Hex dump of sector 0 around the signature
    pub hex_window: Vec<String>,
    pub partitions: Vec<Partition>,
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device size: {} sectors", self.total_sectors)?;
        for offset in &self.magic_offsets {
            writeln!(f, "Found APA magic at offset 0x{offset:X}")?;
        }

        writeln!(f, "\nStandard MBR partition table:")?;
        if self.slots.is_empty() {
            writeln!(f, "  (no entries)")?;
        }
        for slot in &self.slots {
            writeln!(
                f,
                "  Partition {}: Start sector {}, Size {} sectors",
                slot.index, slot.start, slot.count
            )?;
            match &slot.header {
                HeaderProbe::Apa => writeln!(f, "    -> Found APA partition header!")?,
                HeaderProbe::Pfs => writeln!(f, "    -> Found PFS signature!")?,
                HeaderProbe::Unknown(bytes) => {
                    writeln!(f, "    -> Header preview: {}", hex_bytes(bytes))?
                }
                HeaderProbe::Unreadable(err) => {
                    writeln!(f, "    -> Could not read partition header: {err}")?
                }
                HeaderProbe::Skipped => {}
            }
        }

        writeln!(f, "\nSector 0 around the APA signature location (offset 0x1B0):")?;
        for line in &self.hex_window {
            writeln!(f, "  {line}")?;
        }

        if self.partitions.is_empty() {
            write!(f, "\nNo APA partitions found.")
        } else {
            write!(f, "\nFound {} APA partition(s):", self.partitions.len())?;
            for (i, part) in self.partitions.iter().enumerate() {
                write!(f, "\n  [{i}] {part}")?;
            }
            Ok(())
        }
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `offset: hex ascii` lines for bytes 0x190..0x1D0 of sector 0.
fn hex_window(sector: &Sector) -> Vec<String> {
    let start = TableSector::MAGIC_OFFSET - 32;
    let end = TableSector::MAGIC_OFFSET + 32;

    sector[start..end]
        .chunks(16)
        .enumerate()
        .map(|(i, row)| {
            let ascii: String = row
                .iter()
                .map(|&b| if (32..127).contains(&b) { char::from(b) } else { '.' })
                .collect();
            format!("{:04X}: {:<48} {ascii}", start + i * 16, hex_bytes(row))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use block_dev::RamDisk;

    use super::*;
    use crate::layout::{SuperBlock, TableSlot};

    fn slot(start: u32, count: u32) -> TableSlot {
        TableSlot {
            active: 0x80,
            kind: 0x01,
            start_sector: start,
            sector_count: count,
            ..Default::default()
        }
    }

    fn header(name: &str) -> Sector {
        PartitionHeader {
            pfs_type: 1,
            name: name.into(),
            ..Default::default()
        }
        .encode()
        .unwrap()
    }

    /// Four slots: a valid one, an inactive one, one without a header magic
    /// and another valid one.
    fn disk() -> Disk<RamDisk> {
        let mut disk = Disk::new(RamDisk::new(512));
        let mut table = TableSector::new(512, slot(1, 99));
        table.slots[1] = TableSlot {
            active: 0,
            ..slot(100, 100)
        };
        table.slots[2] = slot(200, 100);
        table.slots[3] = slot(300, 100);

        disk.write_sector(SectorId::new(0), &table.encode().unwrap())
            .unwrap();
        disk.write_sector(SectorId::new(1), &header("first")).unwrap();
        disk.write_sector(SectorId::new(100), &header("inactive")).unwrap();
        disk.write_sector(SectorId::new(300), &header("last")).unwrap();
        disk
    }

    #[test]
    fn slot_order_and_skips() {
        let mut disk = disk();
        let partitions = disk.partitions().unwrap();

        assert_eq!(2, partitions.len());
        assert_eq!(
            Partition {
                start_sector: 1,
                sector_count: 99,
                name: "first".into(),
                pfs_type: 1,
            },
            partitions[0]
        );
        assert_eq!("last", partitions[1].name);
        assert_eq!(300, partitions[1].start_sector);
    }

    #[test]
    fn idempotent() {
        let mut disk = disk();
        assert_eq!(disk.partitions().unwrap(), disk.partitions().unwrap());
    }

    #[test]
    fn no_magic_is_empty() {
        let mut disk = Disk::new(RamDisk::new(16));
        assert!(disk.partitions().unwrap().is_empty());
        assert!(!disk.has_table().unwrap());

        let mut tiny = Disk::new(RamDisk::from_bytes(&[0xFF; 100]));
        assert!(tiny.partitions().unwrap().is_empty());
    }

    #[test]
    fn header_past_device_end_is_skipped() {
        let mut disk = Disk::new(RamDisk::new(8));
        let table = TableSector::new(8, slot(50, 10));
        disk.write_sector(SectorId::new(0), &table.encode().unwrap())
            .unwrap();

        assert!(disk.has_table().unwrap());
        assert!(disk.partitions().unwrap().is_empty());
    }

    #[test]
    fn partition_index() {
        let mut disk = disk();
        assert_eq!("last", disk.partition(1).unwrap().name);
        assert!(matches!(
            disk.partition(2),
            Err(Error::PartitionOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn diagnose_blank_device() {
        let mut disk = Disk::new(RamDisk::new(64));
        let mut mbr = [0; SECTOR_SIZE];
        // a plain MBR slot pointing at a PFS superblock
        mbr[0x1BE + 4] = 0x0C;
        mbr[0x1BE + 8] = 4;
        mbr[0x1BE + 12] = 10;
        // another one pointing at garbage
        mbr[0x1CE + 4] = 0x83;
        mbr[0x1CE + 8] = 5;
        mbr[0x1CE + 12] = 10;
        disk.write_sector(SectorId::new(0), &mbr).unwrap();
        disk.write_sector(SectorId::new(4), &SuperBlock::default().encode().unwrap())
            .unwrap();
        disk.write_sector(SectorId::new(5), &[0xAB; SECTOR_SIZE])
            .unwrap();

        let report = disk.diagnose().unwrap();

        assert_eq!(64, report.total_sectors);
        assert!(report.magic_offsets.is_empty());
        assert!(report.partitions.is_empty());
        assert_eq!(2, report.slots.len());
        assert_eq!(HeaderProbe::Pfs, report.slots[0].header);
        assert_eq!(HeaderProbe::Unknown(vec![0xAB; 64]), report.slots[1].header);
        assert_eq!(4, report.hex_window.len());
        assert!(report.hex_window[0].starts_with("0190: 00 00"));
        assert!(report.to_string().contains("No APA partitions found."));

        // diagnosis must not disturb enumeration
        assert!(disk.partitions().unwrap().is_empty());
    }

    #[test]
    fn diagnose_formatted_device() {
        let mut disk = disk();
        let report = disk.diagnose().unwrap();

        assert_eq!(vec![0x1B0, 0x200], report.magic_offsets);
        assert_eq!(HeaderProbe::Apa, report.slots[0].header);
        assert_eq!(disk.partitions().unwrap(), report.partitions);
        assert!(report.hex_window[2].starts_with("01B0: 41 50 41 01"));
        assert!(report.to_string().contains("[1] last"));
    }
}
