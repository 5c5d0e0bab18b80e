//! `EFF`: 64KiB `EF` bankswitching with a 24LC16B serial EEPROM.
//!
//! Reading or writing `$1FE0-$1FEF` selects one of 16 4K banks. The EEPROM pins are driven by
//! accessing `$1FF0-$1FF3` and sampled by reading `$1FF4`.

use crate::{
    common::{Clock, Reset, ResetKind},
    eeprom::Eeprom,
    mapper::{Hotspot, Hotspots, MapRead, MapWrite, MappedRead, MappedWrite, Mapper, Nvram},
    mem::{self, Banks},
};
use tracing::debug;

/// ROM size of an `EFF` cartridge.
pub const ROM_SIZE: usize = 64 * 1024;

const ROM_WINDOW: usize = 4 * 1024;
const START_BANK: usize = 1;

// CPU $1000..=$1FFF 4K ROM Bank Switchable, mirrored every $2000

#[derive(Debug)]
#[must_use]
pub struct Eff {
    banks: Banks,
    hotspots: Hotspots,
    eeprom: Option<Eeprom>,
    cycle: u64,
}

impl Eff {
    pub fn load(rom_len: usize) -> Result<Mapper, mem::Error> {
        let mut eff = Self {
            banks: Banks::new(0x1000, 0x1FFF, rom_len, ROM_WINDOW)?,
            hotspots: Hotspots::EFF,
            eeprom: None,
            cycle: 0,
        };
        eff.banks.set(0, START_BANK);
        Ok(eff.into())
    }

    /// Currently selected bank.
    #[must_use]
    pub fn bank(&self) -> usize {
        self.banks.page(0)
    }

    #[must_use]
    pub const fn bank_count(&self) -> usize {
        self.hotspots.bank_count()
    }

    /// The CPU cycle pin writes are stamped with.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Drive the EEPROM pin of a hotspot. Returns whether the hotspot was a pin.
    fn drive(&mut self, hotspot: Hotspot) -> bool {
        let Some(eeprom) = &mut self.eeprom else {
            if matches!(hotspot, Hotspot::Clock(_) | Hotspot::Data(_)) {
                debug!("I2C pin access with no EEPROM attached: {hotspot:?}");
                return true;
            }
            return false;
        };
        match hotspot {
            Hotspot::Clock(level) => eeprom.set_clock(level, self.cycle),
            Hotspot::Data(level) => eeprom.set_data(level, self.cycle),
            Hotspot::Bank(_) | Hotspot::ReadData => return false,
        }
        true
    }

    fn read_data_line(&self) -> bool {
        // An absent device leaves the line pulled up
        self.eeprom.as_ref().map_or(true, Eeprom::read_data_line)
    }
}

impl MapRead for Eff {
    fn map_read(&mut self, addr: u16) -> MappedRead {
        if addr & 0x1000 == 0x1000 {
            match self.hotspots.decode(addr) {
                Some(Hotspot::Bank(bank)) => self.banks.set(0, bank),
                Some(hotspot) => {
                    self.drive(hotspot);
                }
                None => (),
            }
        }
        self.map_peek(addr)
    }

    fn map_peek(&self, addr: u16) -> MappedRead {
        if addr & 0x1000 == 0 {
            return MappedRead::Bus;
        }
        let rom = self.banks.translate(addr);
        match self.hotspots.decode(addr) {
            Some(Hotspot::ReadData) => MappedRead::I2c {
                rom,
                sda: self.read_data_line(),
            },
            _ => MappedRead::Rom(rom),
        }
    }
}

impl MapWrite for Eff {
    fn map_write(&mut self, addr: u16, _val: u8) -> MappedWrite {
        if addr & 0x1000 == 0 {
            return MappedWrite::Bus;
        }
        match self.hotspots.decode(addr) {
            Some(Hotspot::Bank(bank)) => self.banks.set(0, bank),
            // The board latches each pin write twice
            Some(hotspot @ (Hotspot::Clock(_) | Hotspot::Data(_))) => {
                if self.drive(hotspot) {
                    self.drive(hotspot);
                }
            }
            Some(Hotspot::ReadData) | None => (),
        }
        MappedWrite::None
    }
}

impl Nvram for Eff {
    fn attach_eeprom(&mut self, eeprom: Eeprom) {
        self.eeprom = Some(eeprom);
    }

    fn eeprom(&self) -> Option<&Eeprom> {
        self.eeprom.as_ref()
    }

    fn eeprom_mut(&mut self) -> Option<&mut Eeprom> {
        self.eeprom.as_mut()
    }
}

impl Clock for Eff {
    fn clock_to(&mut self, cycle: u64) {
        self.cycle = cycle;
    }
}

impl Reset for Eff {
    fn reset(&mut self, kind: ResetKind) {
        self.banks.set(0, START_BANK);
        if let Some(eeprom) = &mut self.eeprom {
            eeprom.reset(kind);
        }
    }
}
