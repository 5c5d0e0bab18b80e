//! Microchip 24LCxx serial EEPROM emulation.
//!
//! Two devices of the family are emulated: the 2KiB 24LC16B found on EFF cartridges and the
//! 32KiB 24LC256 inside the SaveKey and AtariVox controller-port peripherals. Both are driven
//! purely through their clock (SCL) and data (SDA) pins.

use crate::{
    common::{Reset, ResetKind},
    debug::ActivityCallback,
    error::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::trace;

pub use flash::FlashStore;
pub use i2c::{I2c, I2cEvent, State};

pub mod flash;
pub mod i2c;

/// Size parameters of an EEPROM device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub struct Profile {
    flash_size: usize,
    page_size: usize,
}

impl Profile {
    /// 24LC16B: 2KiB with 16 byte pages.
    pub const MT24LC16B: Self = Self {
        flash_size: 2 * 1024,
        page_size: 16,
    };
    /// 24LC256: 32KiB with 64 byte pages.
    pub const MT24LC256: Self = Self {
        flash_size: 32 * 1024,
        page_size: 64,
    };

    /// Create a custom profile.
    ///
    /// # Errors
    ///
    /// Both sizes must be powers of two, and a page must hold 4 to 256 bytes and be no larger
    /// than the flash itself.
    pub fn new(flash_size: usize, page_size: usize) -> Result<Self> {
        if !flash_size.is_power_of_two() || flash_size > usize::from(u16::MAX) + 1 {
            return Err(Error::InvalidConfig {
                field: "flash_size",
                value: flash_size.to_string(),
            });
        }
        if !page_size.is_power_of_two() || !(4..=256).contains(&page_size) || page_size > flash_size
        {
            return Err(Error::InvalidConfig {
                field: "page_size",
                value: page_size.to_string(),
            });
        }
        Ok(Self {
            flash_size,
            page_size,
        })
    }

    #[inline]
    #[must_use]
    pub const fn flash_size(&self) -> usize {
        self.flash_size
    }

    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    #[must_use]
    pub const fn page_count(&self) -> usize {
        self.flash_size / self.page_size
    }

    /// The small on-cartridge device. It folds the upper address bits into the device select
    /// byte, latches pins immediately, and never reports itself busy.
    #[inline]
    #[must_use]
    pub const fn is_small(&self) -> bool {
        self.page_size == 16
    }

    /// Device family used to tag activity notifications.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        if self.is_small() {
            "Cartridge EEPROM"
        } else {
            "AtariVox/SaveKey EEPROM"
        }
    }

    /// Wrap an address into the flash array.
    #[inline]
    #[must_use]
    pub const fn wrap(&self, addr: u16) -> usize {
        addr as usize & (self.flash_size - 1)
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}kiB, {} byte pages",
            self.flash_size / 1024,
            self.page_size
        )
    }
}

/// EEPROM configuration settings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[must_use]
pub struct Config {
    /// CPU cycles the device stays busy after a stop condition.
    pub busy_cycles: u64,
}

impl Config {
    /// Roughly 5ms at the 838ns CPU cycle of the console.
    pub const DEFAULT_BUSY_CYCLES: u64 = 5_000_000 / 838;
}

impl Default for Config {
    fn default() -> Self {
        Self {
            busy_cycles: Self::DEFAULT_BUSY_CYCLES,
        }
    }
}

/// Cached level of a pin and the CPU cycle it was last written.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Pin {
    pub level: bool,
    pub cycle: u64,
}

/// A 24LCxx EEPROM as seen from its SCL and SDA pins.
#[derive(Debug)]
#[must_use]
pub struct Eeprom {
    scl: Pin,
    sda: Pin,
    i2c: I2c,
}

impl Eeprom {
    /// Create an erased EEPROM without a backing file.
    pub fn new(profile: Profile, config: Config) -> Self {
        Self::from_flash(FlashStore::blank(profile), config)
    }

    /// Create an EEPROM backed by the file at `path`, saved on drop when modified.
    pub fn with_file(profile: Profile, path: impl Into<PathBuf>, config: Config) -> Self {
        Self::from_flash(FlashStore::load(profile, path), config)
    }

    pub fn from_flash(flash: FlashStore, config: Config) -> Self {
        Self {
            scl: Pin::default(),
            sda: Pin::default(),
            i2c: I2c::new(flash, config),
        }
    }

    /// Register a callback notified of committed reads and writes.
    pub fn set_activity_callback(&mut self, callback: impl Into<ActivityCallback>) {
        self.i2c.set_activity_callback(Some(callback.into()));
    }

    pub fn clear_activity_callback(&mut self) {
        self.i2c.set_activity_callback(None);
    }

    #[inline]
    pub const fn profile(&self) -> Profile {
        self.i2c.flash().profile()
    }

    /// Write the clock (SCL) pin at the given CPU cycle.
    pub fn set_clock(&mut self, level: bool, cycle: u64) {
        self.scl = Pin { level, cycle };
        if self.profile().is_small() {
            self.i2c.clock(level);
        } else {
            self.update();
        }
    }

    /// Write the data (SDA) pin at the given CPU cycle.
    pub fn set_data(&mut self, level: bool, cycle: u64) {
        self.sda = Pin { level, cycle };
        if self.profile().is_small() {
            self.i2c.data(level, cycle);
        } else {
            self.update();
        }
    }

    // Both pins are only latched once they were written in the same cycle, since the caller
    // can't guarantee writing them in a particular order.
    fn update(&mut self) {
        if self.scl.cycle == self.sda.cycle {
            trace!(
                "I2C_PIN_WRITE(SCL = {}, SDA = {}) @ {}",
                u8::from(self.scl.level),
                u8::from(self.sda.level),
                self.scl.cycle
            );
            self.i2c.clock(self.scl.level);
            self.i2c.data(self.sda.level, self.sda.cycle);
        }
    }

    /// Read the SDA line as wired-AND of the controller and the device.
    #[inline]
    #[must_use]
    pub const fn read_data_line(&self) -> bool {
        self.i2c.read_data_line()
    }

    /// Forget which pages the running program used.
    pub fn on_system_reset(&mut self) {
        self.i2c.flash_mut().clear_page_usage();
    }

    /// Erase the entire EEPROM to `$FF`.
    pub fn erase_all(&mut self) {
        self.i2c.flash_mut().erase_all();
    }

    /// Erase the pages used since the last system reset to `$FF`.
    pub fn erase_used_pages(&mut self) {
        self.i2c.flash_mut().erase_used_pages();
    }

    #[must_use]
    pub fn is_page_used(&self, page: usize) -> bool {
        self.i2c.flash().is_page_used(page)
    }

    #[must_use]
    pub fn page_usage(&self) -> &[bool] {
        self.i2c.flash().page_usage()
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.i2c.flash().data()
    }

    /// Backing file the image is saved to on drop.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.i2c.flash().path()
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.i2c.flash().is_dirty()
    }

    #[inline]
    pub const fn state(&self) -> State {
        self.i2c.state()
    }

    #[inline]
    #[must_use]
    pub const fn address(&self) -> u16 {
        self.i2c.address()
    }

    #[must_use]
    pub const fn clock_pin(&self) -> Pin {
        self.scl
    }

    #[must_use]
    pub const fn data_pin(&self) -> Pin {
        self.sda
    }
}

impl Reset for Eeprom {
    fn reset(&mut self, _kind: ResetKind) {
        self.on_system_reset();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Drives an [`Eeprom`] the way a program bit-bangs the bus, advancing one cycle per
    /// pin write and writing both pins together like a controller port would.
    pub(crate) struct Bus {
        pub(crate) eeprom: Eeprom,
        pub(crate) cycle: u64,
    }

    impl Bus {
        pub(crate) const fn new(eeprom: Eeprom) -> Self {
            Self { eeprom, cycle: 100 }
        }

        pub(crate) fn pins(&mut self, scl: bool, sda: bool) {
            self.cycle += 1;
            self.eeprom.set_clock(scl, self.cycle);
            self.eeprom.set_data(sda, self.cycle);
        }

        pub(crate) fn start(&mut self) {
            self.pins(false, true);
            self.pins(true, true);
            self.pins(true, false);
            self.pins(false, false);
        }

        pub(crate) fn stop(&mut self) {
            self.pins(false, false);
            self.pins(true, false);
            self.pins(true, true);
        }

        fn bit(&mut self, bit: bool) {
            self.pins(false, bit);
            self.pins(true, bit);
            self.pins(false, bit);
        }

        /// Clock out a byte and return whether the device acknowledged it.
        pub(crate) fn send(&mut self, byte: u8) -> bool {
            for i in (0..8).rev() {
                self.bit(byte >> i & 1 == 1);
            }
            self.pins(false, true);
            self.pins(true, true);
            let ack = !self.eeprom.read_data_line();
            self.pins(false, true);
            ack
        }

        /// Clock in a byte, acknowledging it unless `last`.
        pub(crate) fn recv(&mut self, last: bool) -> u8 {
            let mut byte = 0;
            for _ in 0..8 {
                self.pins(false, true);
                self.pins(true, true);
                byte = byte << 1 | u8::from(self.eeprom.read_data_line());
            }
            self.bit(last);
            byte
        }

        pub(crate) fn select_address(&mut self, addr: u16) {
            let profile = self.eeprom.profile();
            self.start();
            if profile.is_small() {
                let [hi, lo] = addr.to_be_bytes();
                assert!(self.send(0xA0 | (hi & 0x07) << 1), "write select acked");
                assert!(self.send(lo), "address acked");
            } else {
                let [hi, lo] = addr.to_be_bytes();
                assert!(self.send(0xA0), "write select acked");
                assert!(self.send(hi), "address high acked");
                assert!(self.send(lo), "address low acked");
            }
        }

        pub(crate) fn write(&mut self, addr: u16, bytes: &[u8]) {
            self.select_address(addr);
            for &byte in bytes {
                assert!(self.send(byte), "data acked");
            }
            self.stop();
        }

        pub(crate) fn read(&mut self, addr: u16, len: usize) -> Vec<u8> {
            self.select_address(addr);
            self.start();
            let select = if self.eeprom.profile().is_small() {
                0xA1 | ((addr >> 8) as u8 & 0x07) << 1
            } else {
                0xA1
            };
            assert!(self.send(select), "read select acked");
            let data = (0..len).map(|i| self.recv(i + 1 == len)).collect();
            self.stop();
            data
        }

        pub(crate) fn wait(&mut self, cycles: u64) {
            self.cycle += cycles;
        }
    }

    #[test]
    fn profiles() {
        assert_eq!(Profile::MT24LC16B.page_count(), 128);
        assert_eq!(Profile::MT24LC256.page_count(), 512);
        assert!(Profile::MT24LC16B.is_small());
        assert!(!Profile::MT24LC256.is_small());
        assert_eq!(Profile::MT24LC256.wrap(0x8001), 0x0001);
        assert_eq!(Profile::new(2048, 16).unwrap(), Profile::MT24LC16B);
        assert!(Profile::new(3000, 16).is_err());
        assert!(Profile::new(2048, 24).is_err());
        assert!(Profile::new(16, 32).is_err());
        assert!(Profile::new(2048, 1).is_err());
    }

    #[test]
    fn default_busy_window() {
        assert_eq!(Config::default().busy_cycles, 5966);
    }

    #[test]
    fn round_trip_small() {
        let mut bus = Bus::new(Eeprom::new(Profile::MT24LC16B, Config::default()));
        let bytes = [0xDE, 0xAD, 0xBE, 0xEF, 0x42];
        bus.write(0x0523, &bytes);
        assert_eq!(bus.eeprom.state(), State::Idle);
        assert_eq!(&bus.eeprom.data()[0x523..0x528], &bytes);
        assert_eq!(bus.read(0x0523, bytes.len()), bytes);
    }

    #[test]
    fn round_trip_large() {
        let mut bus = Bus::new(Eeprom::new(Profile::MT24LC256, Config::default()));
        let bytes: Vec<u8> = (0..64).collect();
        bus.write(0x7FC0, &bytes);
        bus.wait(Config::DEFAULT_BUSY_CYCLES);
        assert_eq!(bus.read(0x7FC0, 64), bytes);
        assert!(bus.eeprom.is_page_used(0x7FC0 / 64));
        assert!(!bus.eeprom.is_page_used(0));
    }

    #[test]
    fn sequential_read_wraps_around_flash() {
        let mut bus = Bus::new(Eeprom::new(Profile::MT24LC16B, Config::default()));
        bus.write(0x07FF, &[0x12]);
        bus.write(0x0000, &[0x34]);
        assert_eq!(bus.read(0x07FF, 2), [0x12, 0x34]);
        assert_eq!(bus.eeprom.address(), 0x0001);
    }

    #[test]
    fn page_crossing_truncates() {
        let mut bus = Bus::new(Eeprom::new(Profile::MT24LC16B, Config::default()));
        bus.write(0x001C, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&bus.eeprom.data()[0x1C..0x20], &[1, 2, 3, 4]);
        assert!(bus.eeprom.data()[0x20..0x30].iter().all(|&b| b == 0xFF));
        assert!(bus.eeprom.data()[0x10..0x1C].iter().all(|&b| b == 0xFF));
        assert_eq!(bus.eeprom.address(), 0x0020, "address stops at page boundary");
        assert!(bus.eeprom.is_page_used(1));
        assert!(!bus.eeprom.is_page_used(2));
    }

    #[test]
    fn erase_semantics() {
        let mut bus = Bus::new(Eeprom::new(Profile::MT24LC16B, Config::default()));
        for page in 0..8u16 {
            bus.write(page * 16, &[0x55; 16]);
        }
        bus.eeprom.on_system_reset();
        assert!(bus.eeprom.page_usage().iter().all(|&used| !used));

        bus.write(2 * 16, &[0x66]);
        bus.read(5 * 16, 1);
        bus.eeprom.erase_used_pages();
        for page in 0..8 {
            let expected = if page == 2 || page == 5 { 0xFF } else { 0x55 };
            let data = &bus.eeprom.data()[page * 16..(page + 1) * 16];
            assert!(data.iter().all(|&b| b == expected), "page {page}: {data:?}");
        }

        bus.eeprom.erase_all();
        assert!(bus.eeprom.data().iter().all(|&b| b == 0xFF));
        assert!(bus.eeprom.is_dirty());
    }

    #[test]
    fn busy_after_write_large() {
        let mut bus = Bus::new(Eeprom::new(Profile::MT24LC256, Config::default()));
        bus.write(0x0100, &[0xAB]);

        bus.start();
        assert_eq!(bus.eeprom.state(), State::Idle, "start rejected while busy");
        assert!(!bus.send(0xA0), "no ack while busy");
        bus.stop();

        bus.wait(Config::DEFAULT_BUSY_CYCLES);
        bus.start();
        assert_ne!(bus.eeprom.state(), State::Idle, "start accepted after busy window");
        assert!(bus.send(0xA0));
        bus.stop();
    }

    #[test]
    fn never_busy_small() {
        let mut bus = Bus::new(Eeprom::new(Profile::MT24LC16B, Config::default()));
        bus.write(0x0100, &[0xAB]);
        bus.start();
        assert_eq!(bus.eeprom.state(), State::ByteOutToDevice);
        assert!(bus.send(0xA0));
        bus.stop();
    }

    #[test]
    fn pin_order_independent_large() {
        let mut a = Eeprom::new(Profile::MT24LC256, Config::default());
        let mut b = Eeprom::new(Profile::MT24LC256, Config::default());
        let steps = [(false, true), (true, true), (true, false), (false, false)];
        for (i, &(scl, sda)) in steps.iter().enumerate() {
            let cycle = 10 + i as u64;
            a.set_clock(scl, cycle);
            a.set_data(sda, cycle);
            b.set_data(sda, cycle);
            b.set_clock(scl, cycle);
            assert_eq!(a.state(), b.state(), "step {i}");
            assert_eq!(a.read_data_line(), b.read_data_line(), "step {i}");
        }
        assert_eq!(a.state(), State::ByteOutToDevice, "start condition seen");
    }

    #[test]
    fn unsynchronized_pins_ignored_large() {
        let mut eeprom = Eeprom::new(Profile::MT24LC256, Config::default());
        eeprom.set_clock(false, 9);
        eeprom.set_data(true, 9);
        eeprom.set_clock(true, 10);
        eeprom.set_data(true, 10);
        eeprom.set_data(false, 11);
        eeprom.set_clock(true, 12);
        assert_eq!(eeprom.state(), State::Idle, "no start from mismatched cycles");
    }

    #[test]
    fn small_pins_latch_immediately() {
        let mut eeprom = Eeprom::new(Profile::MT24LC16B, Config::default());
        eeprom.set_clock(true, 10);
        eeprom.set_data(true, 20);
        eeprom.set_data(false, 30);
        assert_eq!(eeprom.state(), State::AckOut);
    }

    #[test]
    fn activity_callback() {
        use std::sync::{Arc, Mutex};

        let messages = Arc::new(Mutex::new(Vec::new()));
        let mut eeprom = Eeprom::new(Profile::MT24LC16B, Config::default());
        eeprom.set_activity_callback({
            let messages = Arc::clone(&messages);
            move |msg: &str| messages.lock().unwrap().push(msg.to_string())
        });
        let mut bus = Bus::new(eeprom);
        bus.write(0x0010, &[1, 2]);
        bus.read(0x0010, 2);

        let messages = messages.lock().unwrap();
        assert_eq!(
            *messages,
            [
                "Cartridge EEPROM write",
                "Cartridge EEPROM read",
                "Cartridge EEPROM read"
            ]
        );
    }
}
