//! Bit-level I2C protocol of a 24LCxx EEPROM.
//!
//! Only a single controller ever drives the bus. Bytes are sampled on the falling edge of SCL
//! and a start or stop condition is an SDA edge while SCL is high. The device acknowledges by
//! pulling SDA low, which is modeled as wired-AND with the controller's SDA level.

use crate::{
    debug::ActivityCallback,
    eeprom::{Config, FlashStore},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn, Level};

/// Set once a shift register holds 8 data bits.
const COMPLETE: u32 = 0x100;
const WRITE_SELECT: u32 = 0x1A0;
const READ_SELECT: u32 = 0x1A1;
/// Select byte with the small device's block address bits masked off.
const SELECT_MASK: u32 = 0x1A1;

/// Protocol state of the device.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub enum State {
    #[default]
    Idle,
    /// Shifting a byte in from the controller.
    ByteOutToDevice,
    /// Driving an acknowledgement of the last byte received.
    AckOut,
    /// Shifting a byte out to the controller.
    ByteInFromDevice,
    /// Waiting for the controller to acknowledge the last byte sent.
    AckWait,
}

/// Diagnostic events emitted while decoding the bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[must_use]
pub enum I2cEvent {
    Start,
    Busy,
    Stop,
    AbandonWrite,
    AbandonRead,
    StartWrite { select: u8 },
    StartRead { select: u8, address: u16 },
    AddressUnknown,
    AddressMsbChanged { msb: u8 },
    OddballFirstByte(u8),
    Sent(u8),
    OutputOverflow,
    Write { count: usize, address: u16 },
    PageCrossing { count: usize },
    Read { address: u16, value: u8 },
    ReadNak,
    Clock { master: bool, slave: bool },
}

impl I2cEvent {
    pub const fn level(&self) -> Level {
        match self {
            Self::Clock { .. } => Level::TRACE,
            Self::Start
            | Self::Stop
            | Self::StartWrite { .. }
            | Self::StartRead { .. }
            | Self::Sent(_)
            | Self::Write { .. }
            | Self::Read { .. }
            | Self::ReadNak
            | Self::Busy => Level::DEBUG,
            Self::AbandonWrite
            | Self::AbandonRead
            | Self::AddressUnknown
            | Self::AddressMsbChanged { .. }
            | Self::OddballFirstByte(_)
            | Self::OutputOverflow
            | Self::PageCrossing { .. } => Level::WARN,
        }
    }
}

impl std::fmt::Display for I2cEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "I2C_START"),
            Self::Busy => write!(f, "I2C_BUSY"),
            Self::Stop => write!(f, "I2C_STOP"),
            Self::AbandonWrite => write!(f, "I2C_WARNING ABANDON WRITE"),
            Self::AbandonRead => write!(f, "I2C_WARNING ABANDON READ"),
            Self::StartWrite { select } => write!(f, "I2C_SENT({select:02X}--start write)"),
            Self::StartRead { select, address } => {
                write!(f, "I2C_SENT({select:02X}--start read @{address:04X})")
            }
            Self::AddressUnknown => write!(f, "I2C_WARNING ADDRESS IS UNKNOWN"),
            Self::AddressMsbChanged { msb } => {
                write!(f, "I2C_WARNING ADDRESS MSB CHANGED (to {msb:X})")
            }
            Self::OddballFirstByte(byte) => write!(f, "I2C_WARNING ODDBALL FIRST BYTE!({byte:02X})"),
            Self::Sent(byte) => write!(f, "I2C_SENT({byte:02X})"),
            Self::OutputOverflow => write!(f, "I2C_WARNING OUTPUT_OVERFLOW!"),
            Self::Write { count, address } => {
                write!(f, "I2C_STOP(Write {count} bytes at {address:04X})")
            }
            Self::PageCrossing { count } => {
                write!(f, "I2C_WARNING PAGECROSSING!(Truncate to {count} bytes)")
            }
            Self::Read { address, value } => write!(f, "I2C_READ({address:04X}={value:02X})"),
            Self::ReadNak => write!(f, "I2C_READ_NAK"),
            Self::Clock { master, slave } => {
                write!(f, "I2C_CLOCK (dat={}/{})", u8::from(*master), u8::from(*slave))
            }
        }
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
struct BusyTimer {
    active: bool,
    armed_at: u64,
}

/// The protocol decoder of an EEPROM, owning its flash.
#[must_use]
pub struct I2c {
    config: Config,
    flash: FlashStore,
    callback: Option<ActivityCallback>,
    state: State,
    master_clock: bool,
    master_data: bool,
    slave_data: bool,
    shift: u32,
    packet: Vec<u8>,
    packet_len: usize,
    address: u16,
    address_known: bool,
    timer: BusyTimer,
}

impl I2c {
    pub fn new(flash: FlashStore, config: Config) -> Self {
        let packet = vec![0x00; 2 * flash.profile().page_size()];
        Self {
            config,
            flash,
            callback: None,
            state: State::Idle,
            master_clock: false,
            master_data: false,
            slave_data: true,
            shift: 0,
            packet,
            packet_len: 0,
            address: 0,
            address_known: false,
            timer: BusyTimer::default(),
        }
    }

    pub fn set_activity_callback(&mut self, callback: Option<ActivityCallback>) {
        self.callback = callback;
    }

    #[inline]
    pub const fn flash(&self) -> &FlashStore {
        &self.flash
    }

    #[inline]
    pub fn flash_mut(&mut self) -> &mut FlashStore {
        &mut self.flash
    }

    #[inline]
    pub const fn state(&self) -> State {
        self.state
    }

    #[inline]
    #[must_use]
    pub const fn address(&self) -> u16 {
        self.address
    }

    #[inline]
    #[must_use]
    pub const fn read_data_line(&self) -> bool {
        self.master_data && self.slave_data
    }

    /// Drive SCL from the controller.
    pub fn clock(&mut self, level: bool) {
        if !level && self.master_clock {
            self.clock_fall();
        }
        self.master_clock = level;
    }

    /// Drive SDA from the controller at the given CPU cycle.
    ///
    /// Edges only register while the device itself releases the line.
    pub fn data(&mut self, level: bool, cycle: u64) {
        if self.master_clock && self.slave_data {
            if level && !self.master_data {
                self.stop(cycle);
            } else if !level && self.master_data {
                self.start(cycle);
            }
        }
        self.master_data = level;
    }

    fn log(&self, event: I2cEvent) {
        match event.level() {
            Level::TRACE => trace!(state = ?self.state, address = self.address, "{event}"),
            Level::DEBUG => debug!(
                state = ?self.state,
                address = self.address,
                packet_len = self.packet_len,
                "{event}"
            ),
            _ => warn!(
                state = ?self.state,
                address = self.address,
                packet_len = self.packet_len,
                "{event}"
            ),
        }
    }

    fn notify(&self, access: &str) {
        if let Some(callback) = &self.callback {
            callback.notify(&format!("{} {access}", self.flash.profile().family()));
        }
    }

    fn start(&mut self, cycle: u64) {
        // A repeated start right after the address bytes is how a random read begins
        if self.state == State::ByteOutToDevice && (self.shift != 1 || self.packet_len != 3) {
            self.log(I2cEvent::AbandonWrite);
            self.address_known = false;
        }
        if self.state == State::ByteInFromDevice {
            self.log(I2cEvent::AbandonRead);
        }
        if self.is_busy(cycle) {
            self.log(I2cEvent::Busy);
            self.state = State::Idle;
        } else {
            self.log(I2cEvent::Start);
            self.state = State::AckOut;
        }
        self.packet_len = 0;
        self.shift = 0;
        self.packet[0] = 0;
    }

    /// Every stop condition starts the write cycle timer, whether or not data was written.
    fn stop(&mut self, cycle: u64) {
        self.timer = BusyTimer {
            active: true,
            armed_at: cycle,
        };
        if self.state == State::ByteOutToDevice && self.shift != 1 {
            self.log(I2cEvent::AbandonWrite);
            self.address_known = false;
        }
        if self.state == State::ByteInFromDevice {
            self.log(I2cEvent::AbandonRead);
            self.address_known = false;
        }
        if self.state == State::ByteOutToDevice && self.shift == 1 && self.packet_len > 3 {
            self.commit();
        } else {
            self.log(I2cEvent::Stop);
        }
        self.state = State::Idle;
    }

    /// Write the buffered data bytes, never crossing into the next page.
    fn commit(&mut self) {
        let profile = self.flash.profile();
        let page_mask = profile.page_size() - 1;
        let mut count = self.packet_len - 3;
        self.log(I2cEvent::Write {
            count,
            address: self.address,
        });
        let remaining = profile.page_size() - (usize::from(self.address) & page_mask);
        if count > remaining {
            count = remaining;
            self.log(I2cEvent::PageCrossing { count });
        }

        for &byte in &self.packet[3..3 + count] {
            self.flash.write(self.address, byte);
            self.address = profile.wrap(self.address.wrapping_add(1)) as u16;
        }
        self.notify("write");
        self.address_known = false;
    }

    fn clock_fall(&mut self) {
        match self.state {
            State::Idle => (),
            State::ByteOutToDevice => {
                self.shift = (self.shift << 1) | u32::from(self.master_data);
                if self.shift & COMPLETE != 0 {
                    if self.packet_len == 0 {
                        self.select();
                    } else {
                        self.state = State::AckOut;
                        self.slave_data = false;
                    }
                }
            }
            State::AckOut => {
                if self.shift != 0 {
                    self.capture();
                }
                self.slave_data = true;
                self.shift = 1;
                self.state = State::ByteOutToDevice;
            }
            State::AckWait => {
                if self.master_data && self.slave_data {
                    self.log(I2cEvent::ReadNak);
                    self.state = State::Idle;
                } else {
                    // The first bit is on the bus as soon as the acknowledge clock falls
                    self.load_read();
                    self.shift_out();
                }
            }
            State::ByteInFromDevice => self.shift_out(),
        }
        self.log(I2cEvent::Clock {
            master: self.master_data,
            slave: self.slave_data,
        });
    }

    /// Decode the device select byte that opens a transaction.
    fn select(&mut self) {
        self.packet[0] = self.shift as u8;
        if self.flash.profile().is_small() && (self.shift & 0xF0) == 0xA0 {
            // Block address bits A10..A8 ride along in the select byte
            let msb = ((self.shift >> 1) & 0x07) as u8;
            if self.shift & 0x01 == 0x01 && u16::from(msb) != self.address >> 8 {
                self.log(I2cEvent::AddressMsbChanged { msb });
            }
            self.packet[1] = msb;
            self.shift &= SELECT_MASK;
        }

        match self.shift {
            WRITE_SELECT => {
                self.log(I2cEvent::StartWrite {
                    select: self.packet[0],
                });
                self.state = State::AckOut;
                self.slave_data = false;
            }
            READ_SELECT => {
                self.state = State::AckWait;
                self.log(I2cEvent::StartRead {
                    select: self.packet[0],
                    address: self.address,
                });
                if !self.address_known {
                    self.log(I2cEvent::AddressUnknown);
                }
                self.slave_data = false;
            }
            _ => {
                self.log(I2cEvent::OddballFirstByte((self.shift & 0xFF) as u8));
                self.state = State::Idle;
            }
        }
    }

    /// Store the byte just acknowledged in the packet buffer.
    fn capture(&mut self) {
        if self.packet_len == 0 {
            self.packet[0] = self.shift as u8;
            // The small device already took its address high byte from the select byte
            self.packet_len = if self.flash.profile().is_small() { 2 } else { 1 };
        } else if self.packet_len < self.packet.len() {
            let byte = self.shift as u8;
            self.log(I2cEvent::Sent(byte));
            self.packet[self.packet_len] = byte;
            self.packet_len += 1;
            let address = u16::from_be_bytes([self.packet[1], self.packet[2]]);
            self.address = self.flash.profile().wrap(address) as u16;
            if self.packet_len > 2 {
                self.address_known = true;
            }
        } else {
            self.log(I2cEvent::OutputOverflow);
        }
    }

    fn load_read(&mut self) {
        self.state = State::ByteInFromDevice;
        self.flash.touch(self.address);
        self.notify("read");
        let value = self.flash.read(self.address);
        self.shift = (u32::from(value) << 1) | 1;
        self.log(I2cEvent::Read {
            address: self.address,
            value,
        });
    }

    fn shift_out(&mut self) {
        self.slave_data = self.shift & COMPLETE != 0;
        self.shift <<= 1;
        if self.shift & 0x1FE == 0 {
            self.state = State::AckWait;
            self.slave_data = true;
            self.address = self.flash.profile().wrap(self.address.wrapping_add(1)) as u16;
        }
    }

    /// The small device never reports busy. Games on EFF boards fail to save when it does,
    /// and ignoring the write delay there has no known side effects.
    fn is_busy(&mut self, cycle: u64) -> bool {
        if self.flash.profile().is_small() {
            return false;
        }
        if self.timer.active {
            let elapsed = cycle.wrapping_sub(self.timer.armed_at);
            self.timer.active = elapsed < self.config.busy_cycles;
        }
        self.timer.active
    }
}

impl std::fmt::Debug for I2c {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2c")
            .field("config", &self.config)
            .field("flash", &self.flash)
            .field("state", &self.state)
            .field("master_clock", &self.master_clock)
            .field("master_data", &self.master_data)
            .field("slave_data", &self.slave_data)
            .field("shift", &format_args!("${:03X}", self.shift))
            .field("packet_len", &self.packet_len)
            .field("address", &format_args!("${:04X}", self.address))
            .field("address_known", &self.address_known)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}
