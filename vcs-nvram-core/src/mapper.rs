//! Cartridge bankswitching schemes and their hotspots.

use crate::{
    common::{Clock, Reset, ResetKind},
    eeprom::Eeprom,
};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

pub use eff::Eff;
pub use hotspot::{Hotspot, Hotspots};

pub mod eff;
pub mod hotspot;

#[enum_dispatch]
#[derive(Debug)]
#[must_use]
pub enum Mapper {
    None,
    /// `EFF`: `EF` bankswitching with an on-board 24LC16B EEPROM.
    Eff,
}

impl Mapper {
    pub fn none() -> Self {
        None.into()
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None(_))
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::none()
    }
}

/// Type of read operation for an address for a given Mapper.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub enum MappedRead {
    /// Not decoded by the cartridge.
    Bus,
    /// Read from a ROM address.
    Rom(usize),
    /// Read a ROM address with bit 0 replaced by the serial data line.
    I2c { rom: usize, sda: bool },
}

/// Type of write operation for an address for a given Mapper.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub enum MappedWrite {
    /// Do nothing with this write.
    None,
    /// Not decoded by the cartridge.
    Bus,
}

#[enum_dispatch(Mapper)]
pub trait MapRead {
    fn map_read(&mut self, addr: u16) -> MappedRead {
        self.map_peek(addr)
    }

    fn map_peek(&self, _addr: u16) -> MappedRead {
        MappedRead::Bus
    }
}

#[enum_dispatch(Mapper)]
pub trait MapWrite {
    fn map_write(&mut self, _addr: u16, _val: u8) -> MappedWrite {
        MappedWrite::Bus
    }
}

/// Mappers carrying a non-volatile EEPROM.
#[enum_dispatch(Mapper)]
pub trait Nvram {
    /// Attach the EEPROM, replacing (and thereby saving) any previous one.
    fn attach_eeprom(&mut self, _eeprom: Eeprom) {}

    fn eeprom(&self) -> Option<&Eeprom> {
        Option::None
    }

    fn eeprom_mut(&mut self) -> Option<&mut Eeprom> {
        Option::None
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[must_use]
pub struct None;

impl MapRead for None {}
impl MapWrite for None {}
impl Nvram for None {}
impl Clock for None {}
impl Reset for None {}
