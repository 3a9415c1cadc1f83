//! Sector I/O over an owned block device

use block_dev::{BlockDevice, Sector, SECTOR_SIZE};
use derive_more::{Add, Display, From, Into};

use crate::{Config, Error, Result};

/// Absolute sector number on the device.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Add, From, Into)]
#[repr(transparent)]
pub struct SectorId(u64);

impl core::ops::Add<u64> for SectorId {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        self + Self(rhs)
    }
}

impl SectorId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// An opened device together with the engine configuration.
///
/// The disk owns its device for as long as it lives, so no other handle can
/// mutate the medium behind the engine's back.
#[derive(Debug)]
pub struct Disk<D> {
    dev: D,
    config: Config,
}

impl<D: BlockDevice> Disk<D> {
    pub fn new(dev: D) -> Self {
        Self::with_config(dev, Config::default())
    }

    pub fn with_config(dev: D, config: Config) -> Self {
        Self { dev, config }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    #[inline]
    pub fn into_inner(self) -> D {
        self.dev
    }

    /// Number of whole sectors on the device.
    pub fn num_sectors(&mut self) -> Result<u64> {
        Ok(self.dev.num_blocks()?)
    }

    /// Reads a sector that must be fully backed by the device.
    pub fn read_sector(&mut self, id: SectorId) -> Result<Sector> {
        match self.read_sector_partial(id)? {
            (sector, SECTOR_SIZE) => Ok(sector),
            (_, len) => Err(Error::TruncatedRead {
                sector: id.get(),
                len,
            }),
        }
    }

    /// Reads a sector and reports how many of its bytes the device backs.
    pub fn read_sector_partial(&mut self, id: SectorId) -> Result<(Sector, usize)> {
        let mut sector = [0; SECTOR_SIZE];
        let len = self.dev.read_block(id.get(), &mut sector)?;
        Ok((sector, len))
    }

    pub fn write_sector(&mut self, id: SectorId, sector: &Sector) -> Result<()> {
        log::trace!("write sector {id}");
        Ok(self.dev.write_block(id.get(), sector)?)
    }

    #[inline]
    pub fn zero_sector(&mut self, id: SectorId) -> Result<()> {
        self.write_sector(id, &[0; SECTOR_SIZE])
    }

    /// Reads a sector, lets `f` modify it and writes it back.
    pub fn modify_sector<V>(&mut self, id: SectorId, f: impl FnOnce(&mut Sector) -> V) -> Result<V> {
        let mut sector = self.read_sector(id)?;
        let ret = f(&mut sector);
        self.write_sector(id, &sector)?;
        Ok(ret)
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.dev.flush()?)
    }
}
