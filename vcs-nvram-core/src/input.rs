//! Controller port peripherals.

use crate::{
    cart,
    common::{Reset, ResetKind},
    debug::ActivityCallback,
    eeprom::{self, Eeprom, Profile},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A digital pin of a controller port.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub enum Pin {
    One,
    Two,
    Three,
    Four,
    Six,
}

/// SaveKey (or the storage half of an AtariVox), a 24LC256 EEPROM on a controller port.
///
/// Pin 3 carries SDA and pin 4 carries SCL. The pins are written separately by the program but
/// the device only sees them together, see [`Eeprom::set_clock`].
#[derive(Debug)]
#[must_use]
pub struct SaveKey {
    eeprom: Eeprom,
}

impl SaveKey {
    pub const FILENAME: &'static str = "atarivox_eeprom.dat";

    pub fn new(path: impl Into<PathBuf>, config: eeprom::Config) -> Self {
        Self {
            eeprom: Eeprom::with_file(Profile::MT24LC256, path, config),
        }
    }

    /// Default backing file, shared by every ROM.
    #[must_use]
    pub fn default_path(config: &cart::Config) -> PathBuf {
        config.nvram_dir.join(Self::FILENAME)
    }

    /// Create a `SaveKey` from the default backing file.
    pub fn from_config(config: &cart::Config) -> Self {
        Self::new(Self::default_path(config), config.eeprom)
    }

    /// Write a pin level at the given CPU cycle. Pins other than 3 and 4 are not connected.
    pub fn write_pin(&mut self, pin: Pin, level: bool, cycle: u64) {
        match pin {
            Pin::Three => self.eeprom.set_data(level, cycle),
            Pin::Four => self.eeprom.set_clock(level, cycle),
            Pin::One | Pin::Two | Pin::Six => (),
        }
    }

    /// Read a pin level. Unconnected pins read high.
    #[must_use]
    pub const fn read_pin(&self, pin: Pin) -> bool {
        match pin {
            Pin::Three => self.eeprom.read_data_line(),
            Pin::One | Pin::Two | Pin::Four | Pin::Six => true,
        }
    }

    pub fn set_activity_callback(&mut self, callback: impl Into<ActivityCallback>) {
        self.eeprom.set_activity_callback(callback);
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.eeprom.path()
    }

    pub const fn eeprom(&self) -> &Eeprom {
        &self.eeprom
    }

    pub fn eeprom_mut(&mut self) -> &mut Eeprom {
        &mut self.eeprom
    }
}

impl Reset for SaveKey {
    fn reset(&mut self, kind: ResetKind) {
        self.eeprom.reset(kind);
    }
}
