//! Address decoding of cartridge hotspots.

use serde::{Deserialize, Serialize};

/// Side effect of accessing a hotspot address.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub enum Hotspot {
    /// Switch to the given bank.
    Bank(usize),
    /// Drive the serial clock line.
    Clock(bool),
    /// Drive the serial data line.
    Data(bool),
    /// Sample the serial data line.
    ReadData,
}

/// Hotspot windows within a cartridge's address space.
///
/// Addresses are masked to the cartridge window before decoding, so every mirror of a hotspot
/// decodes the same.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Hotspots {
    mask: u16,
    bank_start: u16,
    bank_count: u16,
    pins_start: u16,
}

impl Hotspots {
    /// `$1FE0-$1FEF` select one of 16 banks and `$1FF0-$1FF4` drive the EEPROM.
    pub const EFF: Self = Self {
        mask: 0x0FFF,
        bank_start: 0x0FE0,
        bank_count: 16,
        pins_start: 0x0FF0,
    };

    #[must_use]
    pub const fn bank_count(&self) -> usize {
        self.bank_count as usize
    }

    #[must_use]
    pub const fn decode(&self, addr: u16) -> Option<Hotspot> {
        let addr = addr & self.mask;
        if addr >= self.pins_start && addr <= self.pins_start + 4 {
            return Some(match addr - self.pins_start {
                0 => Hotspot::Clock(false),
                1 => Hotspot::Clock(true),
                2 => Hotspot::Data(false),
                3 => Hotspot::Data(true),
                _ => Hotspot::ReadData,
            });
        }
        if addr >= self.bank_start && addr < self.bank_start + self.bank_count {
            return Some(Hotspot::Bank((addr - self.bank_start) as usize));
        }
        None
    }
}
