use std::io;

use crate::{BlockDevice, Sector, SectorMap, SECTOR_SIZE};

/// A sparse in-memory block device.
///
/// Only sectors holding non-zero bytes are stored, so a multi-gigabyte image
/// costs nothing until it is written to. Two disks compare equal when their
/// lengths and contents match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RamDisk {
    sectors: SectorMap,
    /// Device length in bytes, not necessarily a multiple of [`SECTOR_SIZE`]
    len: u64,
}

impl RamDisk {
    /// An all-zero disk of `num_blocks` sectors.
    pub fn new(num_blocks: u64) -> Self {
        Self {
            sectors: SectorMap::new(),
            len: num_blocks * SECTOR_SIZE as u64,
        }
    }

    /// A disk holding exactly `bytes`; a trailing partial sector reads short.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut sectors = SectorMap::new();
        for (id, chunk) in bytes.chunks(SECTOR_SIZE).enumerate() {
            if chunk.iter().all(|&b| b == 0) {
                continue;
            }
            let mut sector = Box::new([0; SECTOR_SIZE]);
            sector[..chunk.len()].copy_from_slice(chunk);
            sectors.insert(id as u64, sector);
        }

        Self {
            sectors,
            len: bytes.len() as u64,
        }
    }

    /// Device length in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of sectors currently holding non-zero data.
    #[inline]
    pub fn used_blocks(&self) -> usize {
        self.sectors.len()
    }

    /// Bytes backed by the device inside sector `block_id`.
    fn backed(&self, block_id: u64) -> usize {
        let offset = block_id.saturating_mul(SECTOR_SIZE as u64);
        self.len.saturating_sub(offset).min(SECTOR_SIZE as u64) as usize
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&mut self, block_id: u64, buf: &mut Sector) -> io::Result<usize> {
        let backed = self.backed(block_id);
        match self.sectors.get(&block_id) {
            Some(sector) => {
                buf[..backed].copy_from_slice(&sector[..backed]);
                buf[backed..].fill(0);
            }
            None => buf.fill(0),
        }

        Ok(backed)
    }

    fn write_block(&mut self, block_id: u64, buf: &Sector) -> io::Result<()> {
        if self.backed(block_id) < SECTOR_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sector {block_id} lies past the end of the ram disk"),
            ));
        }

        if buf.iter().all(|&b| b == 0) {
            self.sectors.remove(&block_id);
        } else {
            self.sectors.insert(block_id, Box::new(*buf));
        }

        Ok(())
    }

    #[inline]
    fn num_blocks(&mut self) -> io::Result<u64> {
        Ok(self.len / SECTOR_SIZE as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_sectors_read_as_zero() {
        let mut disk = RamDisk::new(8);
        let mut buf = [0xAA; SECTOR_SIZE];

        assert_eq!(SECTOR_SIZE, disk.read_block(3, &mut buf).unwrap());
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(8, disk.num_blocks().unwrap());
    }

    #[test]
    fn write_then_read() {
        let mut disk = RamDisk::new(4);
        let mut sector = [0; SECTOR_SIZE];
        sector[0] = 1;
        sector[511] = 2;
        disk.write_block(2, &sector).unwrap();

        let mut buf = [0; SECTOR_SIZE];
        disk.read_block(2, &mut buf).unwrap();
        assert_eq!(sector, buf);
        assert_eq!(1, disk.used_blocks());

        // zero sectors drop out of the map again
        disk.write_block(2, &[0; SECTOR_SIZE]).unwrap();
        assert_eq!(0, disk.used_blocks());
    }

    #[test]
    fn short_read_at_tail() {
        let mut disk = RamDisk::from_bytes(&[7; SECTOR_SIZE + 100]);
        let mut buf = [0xFF; SECTOR_SIZE];

        assert_eq!(100, disk.read_block(1, &mut buf).unwrap());
        assert!(buf[..100].iter().all(|&b| b == 7));
        assert!(buf[100..].iter().all(|&b| b == 0));

        assert_eq!(0, disk.read_block(5, &mut buf).unwrap());
        assert_eq!(1, disk.num_blocks().unwrap());
    }

    #[test]
    fn write_past_end_fails() {
        let mut disk = RamDisk::new(2);
        assert!(disk.write_block(2, &[1; SECTOR_SIZE]).is_err());

        let mut partial = RamDisk::from_bytes(&[0; 700]);
        assert!(partial.write_block(1, &[1; SECTOR_SIZE]).is_err());
    }

    #[test]
    fn equality_follows_contents() {
        let mut a = RamDisk::new(4);
        let b = RamDisk::new(4);
        a.write_block(1, &[3; SECTOR_SIZE]).unwrap();
        assert_ne!(a, b);
        a.write_block(1, &[0; SECTOR_SIZE]).unwrap();
        assert_eq!(a, b);
    }
}
