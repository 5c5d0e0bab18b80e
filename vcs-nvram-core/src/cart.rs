//! Atari 2600 cartridge with on-board EEPROM.

use crate::{
    common::{Clock, Reset, ResetKind},
    debug::ActivityCallback,
    eeprom::{self, Eeprom, Profile},
    mapper::{eff, Eff, MapRead, MapWrite, MappedRead, Mapper, Nvram},
    mem::{self, Mem},
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[must_use]
pub enum Error {
    #[error("invalid rom size (expected {expected} bytes, found: {found})")]
    InvalidRomSize { expected: usize, found: usize },
    #[error(transparent)]
    Bank(#[from] mem::Error),
    #[error("{context}: {source:?}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Cartridge configuration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[must_use]
pub struct Config {
    /// Directory holding EEPROM backing files.
    pub nvram_dir: PathBuf,
    pub eeprom: eeprom::Config,
}

impl Config {
    pub const NVRAM_SUFFIX: &'static str = "_eeprom.dat";

    #[must_use]
    pub fn default_nvram_dir() -> PathBuf {
        dirs::data_local_dir().map_or_else(
            || PathBuf::from("nvram"),
            |dir| dir.join("vcs-nvram").join("nvram"),
        )
    }

    /// Backing file for the EEPROM of the ROM named `name`.
    #[must_use]
    pub fn nvram_path(&self, name: &str) -> PathBuf {
        self.nvram_dir.join(format!("{name}{}", Self::NVRAM_SUFFIX))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nvram_dir: Self::default_nvram_dir(),
            eeprom: eeprom::Config::default(),
        }
    }
}

/// An `EFF` cartridge.
#[must_use]
pub struct Cart {
    name: String,
    config: Config,
    rom: Vec<u8>,
    pub(crate) mapper: Mapper,
}

impl Cart {
    /// Load `Cart` from a ROM path.
    ///
    /// # Errors
    ///
    /// If the ROM file cannot be read or is not 64KiB, then an error is returned.
    pub fn from_path<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let path = path.as_ref();
        let mut rom = BufReader::new(
            File::open(path)
                .map_err(|err| Error::io(err, format!("failed to open rom {path:?}")))?,
        );
        let name = path
            .file_stem()
            .map_or_else(|| path.to_string_lossy(), |stem| stem.to_string_lossy());
        Self::from_rom(name, &mut rom, config)
    }

    /// Load `Cart` from ROM data.
    ///
    /// # Errors
    ///
    /// If the ROM data cannot be read or is not 64KiB, then an error is returned.
    pub fn from_rom<S, F>(name: S, rom_data: &mut F, config: Config) -> Result<Self>
    where
        S: ToString,
        F: Read,
    {
        let name = name.to_string();
        let mut rom = Vec::with_capacity(eff::ROM_SIZE);
        rom_data
            .read_to_end(&mut rom)
            .map_err(|err| Error::io(err, "failed to read rom data"))?;
        if rom.len() != eff::ROM_SIZE {
            return Err(Error::InvalidRomSize {
                expected: eff::ROM_SIZE,
                found: rom.len(),
            });
        }

        let mapper = Eff::load(rom.len())?;
        let cart = Self {
            name,
            config,
            rom,
            mapper,
        };
        info!("loaded cart: {cart}");
        debug!("{cart:?}");
        Ok(cart)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub const fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Derived EEPROM backing file, `<nvram_dir>/<name>_eeprom.dat`.
    #[must_use]
    pub fn nvram_path(&self) -> PathBuf {
        self.config.nvram_path(&self.name)
    }

    /// Attach the EEPROM backed by [`Cart::nvram_path`].
    pub fn attach_nvram(&mut self) {
        let path = self.nvram_path();
        self.set_nvram_path(path);
    }

    /// Attach the EEPROM backed by `path`. Any previously attached EEPROM is saved.
    pub fn set_nvram_path(&mut self, path: impl Into<PathBuf>) {
        let eeprom = Eeprom::with_file(Profile::MT24LC16B, path, self.config.eeprom);
        self.mapper.attach_eeprom(eeprom);
    }

    /// Attach the EEPROM backed by `<base>_eeprom.dat`.
    pub fn set_nvram_file(&mut self, base: impl AsRef<Path>) {
        let mut path = base.as_ref().as_os_str().to_owned();
        path.push(Config::NVRAM_SUFFIX);
        self.set_nvram_path(path);
    }

    #[must_use]
    pub fn eeprom(&self) -> Option<&Eeprom> {
        self.mapper.eeprom()
    }

    pub fn eeprom_mut(&mut self) -> Option<&mut Eeprom> {
        self.mapper.eeprom_mut()
    }

    /// Register a callback for EEPROM activity. Does nothing until an EEPROM is attached.
    pub fn set_activity_callback(&mut self, callback: impl Into<ActivityCallback>) {
        if let Some(eeprom) = self.mapper.eeprom_mut() {
            eeprom.set_activity_callback(callback);
        }
    }

    /// Describes the cartridge RAM for debugger views.
    #[must_use]
    pub fn description(&self) -> String {
        let size = self
            .eeprom()
            .map_or(Profile::MT24LC16B, Eeprom::profile)
            .flash_size();
        format!(
            "{}kiB EEPROM\ni²c serial interface @ $FFF0 - $FFF3\ni²c read port @ $FFF4 ($FFF5)\n",
            size / 1024
        )
    }

    fn rom_byte(&self, addr: usize) -> u8 {
        self.rom.get(addr).copied().unwrap_or(0x00)
    }

    fn mapped(&self, mapped: MappedRead) -> u8 {
        match mapped {
            MappedRead::Bus => 0x00,
            MappedRead::Rom(addr) => self.rom_byte(addr),
            MappedRead::I2c { rom, sda } => (self.rom_byte(rom) & 0xFE) | u8::from(sda),
        }
    }
}

impl Mem for Cart {
    fn read(&mut self, addr: u16) -> u8 {
        let mapped = self.mapper.map_read(addr);
        self.mapped(mapped)
    }

    fn peek(&self, addr: u16) -> u8 {
        self.mapped(self.mapper.map_peek(addr))
    }

    fn write(&mut self, addr: u16, val: u8) {
        let _ = self.mapper.map_write(addr, val);
    }
}

impl Reset for Cart {
    fn reset(&mut self, kind: ResetKind) {
        self.mapper.reset(kind);
    }
}

impl Clock for Cart {
    fn clock_to(&mut self, cycle: u64) {
        self.mapper.clock_to(cycle);
    }
}

impl std::fmt::Display for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "{} - EFF, {}KiB ROM", self.name, self.rom.len() / 1024)
    }
}

impl std::fmt::Debug for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        f.debug_struct("Cart")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("rom_len", &self.rom.len())
            .field("mapper", &self.mapper)
            .finish()
    }
}
