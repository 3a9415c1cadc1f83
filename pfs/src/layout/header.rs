use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use block_dev::{Sector, SECTOR_SIZE};

use super::{decode_name, encode_name};
use crate::Result;

/// Bytes between the name offset (0x14) and the mtime field (0x30).
const NAME_FIELD_LEN: usize = 0x30 - 0x14;

/// The first sector of every APA partition.
#[binrw]
#[brw(little, magic = b"APA")]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionHeader {
    #[brw(pad_before = 1)]
    pub pfs_type: u32,
    pub partition_id: u32,
    pub start_sector: u32,
    pub sector_count: u32,
    #[br(map = |raw: [u8; NAME_FIELD_LEN]| decode_name(&raw))]
    #[bw(map = |name: &String| encode_name::<NAME_FIELD_LEN>(name))]
    pub name: String,
    pub mtime: u32,
    pub ctime: u32,
}

impl PartitionHeader {
    /// Decodes a header sector; `None` when the APA magic is missing.
    pub fn decode(sector: &Sector) -> Result<Option<Self>> {
        match Self::read(&mut Cursor::new(&sector[..])) {
            Ok(header) => Ok(Some(header)),
            Err(binrw::Error::BadMagic { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn encode(&self) -> Result<Sector> {
        let mut sector = [0; SECTOR_SIZE];
        self.write(&mut Cursor::new(&mut sector[..]))?;
        Ok(sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> PartitionHeader {
        PartitionHeader {
            pfs_type: 1,
            partition_id: 1,
            start_sector: 1,
            sector_count: 999_899,
            name: "__mbr".into(),
            mtime: 1_700_000_000,
            ctime: 1_600_000_000,
        }
    }

    #[test]
    fn round_trip() {
        let header = header();
        let decoded = PartitionHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(Some(header), decoded);

        let long = PartitionHeader {
            name: "A".repeat(27),
            ..Default::default()
        };
        let decoded = PartitionHeader::decode(&long.encode().unwrap()).unwrap();
        assert_eq!(Some(long), decoded);
    }

    #[test]
    fn byte_positions() {
        let sector = header().encode().unwrap();

        assert_eq!(b"APA\0", &sector[..4]);
        assert_eq!(1u32.to_le_bytes(), sector[0x4..0x8]);
        assert_eq!(1u32.to_le_bytes(), sector[0x8..0xC]);
        assert_eq!(1u32.to_le_bytes(), sector[0xC..0x10]);
        assert_eq!(999_899u32.to_le_bytes(), sector[0x10..0x14]);
        assert_eq!(b"__mbr\0", &sector[0x14..0x1A]);
        assert_eq!(1_700_000_000u32.to_le_bytes(), sector[0x30..0x34]);
        assert_eq!(1_600_000_000u32.to_le_bytes(), sector[0x34..0x38]);
    }

    #[test]
    fn overlong_name_stops_before_mtime() {
        let header = PartitionHeader {
            name: "N".repeat(40),
            mtime: u32::MAX,
            ..Default::default()
        };
        let decoded = PartitionHeader::decode(&header.encode().unwrap())
            .unwrap()
            .unwrap();

        assert_eq!("N".repeat(27), decoded.name);
        assert_eq!(u32::MAX, decoded.mtime);
    }

    #[test]
    fn missing_magic() {
        let mut sector = header().encode().unwrap();
        sector[0] = b'X';
        assert_eq!(None, PartitionHeader::decode(&sector).unwrap());
        assert_eq!(None, PartitionHeader::decode(&[0; SECTOR_SIZE]).unwrap());
    }
}
