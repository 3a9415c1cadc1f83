use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use block_dev::Sector;

use super::{decode_name, encode_name};
use crate::config::{DIR_ENTRY_SIZE, NAME_MAX_LEN};
use crate::Result;

const NAME_FIELD_LEN: usize = NAME_MAX_LEN + 1;

/// One 64-byte slot of a directory block. Inode 0 marks an empty slot.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u32,
    #[br(map = |raw: [u8; NAME_FIELD_LEN]| decode_name(&raw))]
    #[bw(map = |name: &String| encode_name::<NAME_FIELD_LEN>(name))]
    pub name: String,
}

impl DirEntry {
    #[inline]
    pub fn new(ino: u32, name: &str) -> Self {
        Self {
            ino,
            name: name.into(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ino == 0
    }

    pub fn decode(raw: &[u8]) -> Option<Self> {
        let raw = raw.get(..DIR_ENTRY_SIZE)?;
        Self::read(&mut Cursor::new(raw)).ok()
    }

    pub fn encode(&self) -> Result<[u8; DIR_ENTRY_SIZE]> {
        let mut raw = [0; DIR_ENTRY_SIZE];
        self.write(&mut Cursor::new(&mut raw[..]))?;
        Ok(raw)
    }
}

/// The eight raw entry slots of a directory block, in slot order.
#[inline]
pub fn dir_slots(sector: &Sector) -> impl Iterator<Item = &[u8]> {
    sector.chunks_exact(DIR_ENTRY_SIZE)
}
