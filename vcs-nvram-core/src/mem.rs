//! Memory and Bankswitching implementations.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// A trait that represents CPU bus memory operations.
pub trait Mem {
    /// Read from the given address, triggering any hotspot side effects.
    fn read(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }

    /// Peek from the given address without side effects.
    fn peek(&self, addr: u16) -> u8;

    /// Write value to the given address.
    fn write(&mut self, addr: u16, val: u8);
}

/// Represents a set of ROM banks mapped into an address window.
#[derive(Clone, Serialize, Deserialize)]
#[must_use]
pub struct Banks {
    start: usize,
    end: usize,
    size: NonZeroUsize,
    window: NonZeroUsize,
    shift: usize,
    mask: usize,
    banks: Vec<usize>,
    page_count: usize,
}

#[derive(thiserror::Error, Debug)]
#[must_use]
pub enum Error {
    #[error("bank `window` must a non-zero power of two")]
    InvalidWindow,
    #[error("bank `size` must be non-zero")]
    InvalidSize,
}

impl Banks {
    pub fn new(
        start: usize,
        end: usize,
        capacity: usize,
        window: impl TryInto<NonZeroUsize>,
    ) -> Result<Self, Error> {
        let window = window.try_into().map_err(|_| Error::InvalidWindow)?;
        if !window.is_power_of_two() {
            return Err(Error::InvalidWindow);
        }

        let size = NonZeroUsize::try_from(end - start).map_err(|_| Error::InvalidSize)?;
        let bank_count = (size.get() + 1) / window;
        if bank_count == 0 || capacity == 0 {
            return Err(Error::InvalidSize);
        }

        let mut banks = vec![0; bank_count];
        for (i, bank) in banks.iter_mut().enumerate() {
            *bank = (i * window.get()) % capacity;
        }
        let page_count = capacity / window.get();

        Ok(Self {
            start,
            end,
            size,
            window,
            shift: window.trailing_zeros() as usize,
            mask: page_count.saturating_sub(1),
            banks,
            page_count,
        })
    }

    pub fn set(&mut self, mut bank: usize, page: usize) {
        if bank >= self.banks.len() {
            bank %= self.banks.len();
        }
        self.banks[bank] = (page & self.mask) << self.shift;
        debug_assert!(self.banks[bank] < self.page_count * self.window.get());
    }

    #[must_use]
    pub const fn get(&self, addr: u16) -> usize {
        (addr as usize & self.size.get()) >> self.shift
    }

    #[must_use]
    pub fn translate(&self, addr: u16) -> usize {
        let slot = self.get(addr);
        let page_offset = self.banks[slot];
        page_offset | (addr as usize) & (self.window.get() - 1)
    }

    #[must_use]
    pub fn page(&self, bank: usize) -> usize {
        self.banks[bank] >> self.shift
    }
}

impl std::fmt::Debug for Banks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        f.debug_struct("Bank")
            .field("start", &format_args!("${:04X}", self.start))
            .field("end", &format_args!("${:04X}", self.end))
            .field("size", &format_args!("${:04X}", self.size))
            .field("window", &format_args!("${:04X}", self.window))
            .field("shift", &self.shift)
            .field("mask", &self.mask)
            .field("banks", &self.banks)
            .field("page_count", &self.page_count)
            .finish()
    }
}
