use std::path::Path;
use tracing::Level;
use vcs_nvram_core::{
    cart::{self, Cart},
    common::{Clock, Reset, ResetKind},
    eeprom,
    input::{Pin, SaveKey},
    mem::Mem,
};

const ROM_SIZE: usize = 64 * 1024;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn test_rom() -> Vec<u8> {
    let mut rom = vec![0x00; ROM_SIZE];
    for (bank, data) in rom.chunks_exact_mut(0x1000).enumerate() {
        data.fill(bank as u8);
        data[0xFF4] = 0xF4;
    }
    rom
}

fn test_config(dir: &Path) -> cart::Config {
    cart::Config {
        nvram_dir: dir.to_path_buf(),
        eeprom: eeprom::Config::default(),
    }
}

/// Serial lines as a program sees them.
trait Lines {
    /// Drive SCL and then SDA.
    fn set(&mut self, scl: bool, sda: bool);
    fn sda(&mut self) -> bool;
}

/// Cartridge EEPROM accessed through its hotspots.
struct Hotspots {
    cart: Cart,
    cycle: u64,
}

impl Lines for Hotspots {
    fn set(&mut self, scl: bool, sda: bool) {
        self.cycle += 4;
        self.cart.clock_to(self.cycle);
        self.cart.write(0x1FF0 | u16::from(scl), 0x00);
        self.cart.write(0x1FF2 | u16::from(sda), 0x00);
    }

    fn sda(&mut self) -> bool {
        self.cart.read(0x1FF4) & 0x01 == 0x01
    }
}

/// SaveKey on a controller port, both pins written by a single store.
struct Port {
    savekey: SaveKey,
    cycle: u64,
}

impl Lines for Port {
    fn set(&mut self, scl: bool, sda: bool) {
        self.cycle += 4;
        self.savekey.write_pin(Pin::Three, sda, self.cycle);
        self.savekey.write_pin(Pin::Four, scl, self.cycle);
    }

    fn sda(&mut self) -> bool {
        self.savekey.read_pin(Pin::Three)
    }
}

struct Controller<L> {
    lines: L,
    small: bool,
}

impl<L: Lines> Controller<L> {
    fn start(&mut self) {
        self.lines.set(false, true);
        self.lines.set(true, true);
        self.lines.set(true, false);
        self.lines.set(false, false);
    }

    fn stop(&mut self) {
        self.lines.set(false, false);
        self.lines.set(true, false);
        self.lines.set(true, true);
    }

    fn bit(&mut self, bit: bool) {
        self.lines.set(false, bit);
        self.lines.set(true, bit);
        self.lines.set(false, bit);
    }

    fn send(&mut self, byte: u8) -> bool {
        for i in (0..8).rev() {
            self.bit(byte >> i & 1 == 1);
        }
        self.lines.set(false, true);
        self.lines.set(true, true);
        let ack = !self.lines.sda();
        self.lines.set(false, true);
        ack
    }

    fn recv(&mut self, last: bool) -> u8 {
        let mut byte = 0;
        for _ in 0..8 {
            self.lines.set(false, true);
            self.lines.set(true, true);
            byte = byte << 1 | u8::from(self.lines.sda());
        }
        self.bit(last);
        byte
    }

    fn select(&mut self, addr: u16, read: bool) -> bool {
        let [hi, lo] = addr.to_be_bytes();
        if self.small {
            let select = 0xA0 | (hi & 0x07) << 1 | u8::from(read);
            if read {
                self.send(select)
            } else {
                self.send(select) && self.send(lo)
            }
        } else if read {
            self.send(0xA1)
        } else {
            self.send(0xA0) && self.send(hi) && self.send(lo)
        }
    }

    fn write(&mut self, addr: u16, bytes: &[u8]) -> bool {
        self.start();
        let mut acked = self.select(addr, false);
        for &byte in bytes {
            acked &= self.send(byte);
        }
        self.stop();
        acked
    }

    fn read(&mut self, addr: u16, len: usize) -> Option<Vec<u8>> {
        self.start();
        if !self.select(addr, false) {
            self.stop();
            return None;
        }
        self.start();
        if !self.select(addr, true) {
            self.stop();
            return None;
        }
        let data = (0..len).map(|i| self.recv(i + 1 == len)).collect();
        self.stop();
        Some(data)
    }
}

fn cart_controller(config: cart::Config) -> Controller<Hotspots> {
    let rom = test_rom();
    let mut cart = Cart::from_rom("game", &mut rom.as_slice(), config).expect("valid rom");
    cart.attach_nvram();
    Controller {
        lines: Hotspots { cart, cycle: 0 },
        small: true,
    }
}

#[test]
fn cart_eeprom_persists() -> anyhow::Result<()> {
    init_logging();
    let dir = tempfile::tempdir()?;
    let text = b"HI SCORE 004200";

    let mut controller = cart_controller(test_config(dir.path()));
    assert!(controller.write(0x0123, text), "every byte acknowledged");
    assert_eq!(controller.read(0x0123, 13).as_deref(), Some(&text[..13]));
    drop(controller);

    let image = std::fs::read(dir.path().join("game_eeprom.dat"))?;
    assert_eq!(image.len(), 2048);
    // The page ends at $012F, the rest of the text is lost
    assert_eq!(&image[0x123..0x130], &text[..13]);
    assert!(image[0x130..].iter().all(|&b| b == 0xFF));

    let mut controller = cart_controller(test_config(dir.path()));
    let eeprom = controller.lines.cart.eeprom().expect("attached");
    assert!(!eeprom.is_dirty(), "loaded image is clean");
    assert_eq!(
        controller.read(0x0123, 13).as_deref(),
        Some(&text[..13]),
        "reloaded"
    );
    Ok(())
}

#[test]
fn cart_hotspots() {
    init_logging();
    let dir = tempfile::tempdir().expect("temp dir");
    let rom = test_rom();
    let mut cart =
        Cart::from_rom("game", &mut rom.as_slice(), test_config(dir.path())).expect("valid rom");

    assert_eq!(cart.peek(0x1000), 1, "start bank");
    assert_eq!(cart.read(0x1FE7), 7);
    assert_eq!(cart.peek(0x1800), 7);
    cart.write(0xDFEC, 0x00);
    assert_eq!(cart.peek(0xD000), 12, "mirrored hotspot");

    // No EEPROM yet: pins are ignored and the line floats high
    for addr in 0x1FF0..=0x1FF3 {
        cart.write(addr, 0x00);
        assert_eq!(cart.read(addr), 12);
    }
    assert_eq!(cart.read(0x1FF4), 0xF5);
    assert!(!dir.path().join("game_eeprom.dat").exists());

    cart.attach_nvram();
    cart.write(0x1FF3, 0x00);
    cart.write(0x1FF1, 0x00);
    cart.write(0x1FF2, 0x00);
    assert_eq!(cart.read(0x1FF4), 0xF4, "controller pulls SDA low");

    cart.reset(ResetKind::Hard);
    assert_eq!(cart.peek(0x1000), 1);
}

#[test]
fn cart_erase_used_pages() {
    init_logging();
    let dir = tempfile::tempdir().expect("temp dir");
    let mut controller = cart_controller(test_config(dir.path()));
    assert!(controller.write(0x0000, &[0x11; 16]));
    assert!(controller.write(0x0010, &[0x22; 16]));
    assert!(controller.write(0x0400, &[0x33; 16]));

    controller.lines.cart.reset(ResetKind::Soft);
    assert_eq!(controller.read(0x0010, 1), Some(vec![0x22]));

    let eeprom = controller.lines.cart.eeprom_mut().expect("attached");
    assert_eq!(eeprom.page_usage().iter().filter(|&&used| used).count(), 1);
    eeprom.erase_used_pages();
    let data = eeprom.data();
    assert!(data[0x00..0x10].iter().all(|&b| b == 0x11));
    assert!(data[0x10..0x20].iter().all(|&b| b == 0xFF));
    assert!(data[0x400..0x410].iter().all(|&b| b == 0x33));
}

#[test]
fn savekey_busy_window() -> anyhow::Result<()> {
    init_logging();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("atarivox_eeprom.dat");
    let config = eeprom::Config { busy_cycles: 1000 };
    let mut controller = Controller {
        lines: Port {
            savekey: SaveKey::new(&path, config),
            cycle: 0,
        },
        small: false,
    };

    let page: Vec<u8> = (0..64).map(|i| i * 3).collect();
    assert!(controller.write(0x3000, &page));
    assert_eq!(controller.read(0x3000, 1), None, "busy after write");

    controller.lines.cycle += 1000;
    assert_eq!(controller.read(0x3000, 64), Some(page.clone()));
    assert_eq!(controller.lines.savekey.eeprom().address(), 0x3040);
    drop(controller);

    let image = std::fs::read(&path)?;
    assert_eq!(image.len(), 32 * 1024);
    assert_eq!(&image[0x3000..0x3040], &page[..]);
    Ok(())
}

#[test]
fn savekey_ignores_unsynchronized_pins() {
    init_logging();
    let dir = tempfile::tempdir().expect("temp dir");
    let mut savekey = SaveKey::new(dir.path().join("savekey.dat"), eeprom::Config::default());

    savekey.write_pin(Pin::Four, true, 10);
    savekey.write_pin(Pin::Three, true, 10);
    savekey.write_pin(Pin::Three, false, 20);
    assert_eq!(savekey.eeprom().state(), eeprom::State::Idle);
    assert!(savekey.read_pin(Pin::Three), "data line not latched");
}
