use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use block_dev::{Sector, SECTOR_SIZE};

use crate::config::ROOT_INODE;
use crate::Result;

/// 超级块: validates the filesystem and names the root directory.
#[binrw]
#[brw(little, magic = b"PFS ")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub version: u32,
    #[brw(pad_before = 8)]
    pub root_inode: u32,
}

impl Default for SuperBlock {
    fn default() -> Self {
        Self {
            version: 1,
            root_inode: ROOT_INODE,
        }
    }
}

impl SuperBlock {
    /// `None` for a partition that carries no filesystem yet.
    pub fn decode(sector: &Sector) -> Result<Option<Self>> {
        match Self::read(&mut Cursor::new(&sector[..])) {
            Ok(sb) => Ok(Some(sb)),
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
