#![doc = include_str!("../README.md")]

pub mod cart;
pub mod common;
pub mod debug;
pub mod eeprom;
pub mod error;
pub mod fs;
pub mod input;
pub mod mapper;
pub mod mem;

pub mod prelude {
    //! The prelude re-exports all the common structs/enums used for EEPROM emulation.

    pub use crate::{
        cart::{self, Cart},
        common::{Clock, Reset, ResetKind},
        debug::ActivityCallback,
        eeprom::{self, Eeprom, I2cEvent, Profile, State},
        input::{Pin, SaveKey},
        mapper::{MappedRead, MappedWrite, Mapper, Nvram},
        mem::Mem,
    };
}
