use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use vcs_nvram_core::{cart, eeprom::Profile};

/// EEPROM device to interpret an image as.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub(crate) enum Device {
    /// 2KiB 24LC16B of EFF cartridges.
    Small,
    /// 32KiB 24LC256 of the SaveKey and AtariVox.
    Large,
}

impl From<Device> for Profile {
    fn from(device: Device) -> Self {
        match device {
            Device::Small => Profile::MT24LC16B,
            Device::Large => Profile::MT24LC256,
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Print a hex dump of an EEPROM image.
    Dump {
        /// Image file, relative paths fall back to the NVRAM directory.
        file: PathBuf,
        /// Device profile. [default: detected from file size]
        #[arg(short, long, value_enum)]
        profile: Option<Device>,
    },
    /// Erase an EEPROM image to $FF, creating it with --profile if missing.
    Erase {
        /// Image file, relative paths fall back to the NVRAM directory.
        file: PathBuf,
        /// Device profile. [default: detected from file size]
        #[arg(short, long, value_enum)]
        profile: Option<Device>,
    },
    /// Show the size and page usage of an EEPROM image.
    Info {
        /// Image file, relative paths fall back to the NVRAM directory.
        file: PathBuf,
        /// Device profile. [default: detected from file size]
        #[arg(short, long, value_enum)]
        profile: Option<Device>,
    },
}

/// `nvram` CLI Options
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
#[must_use]
pub(crate) struct Opts {
    /// JSON configuration file.
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,
    /// Increase log verbosity. May be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
    #[command(subcommand)]
    pub(crate) command: Command,
}

impl Opts {
    /// Load the configuration file, if any, over the defaults.
    pub(crate) fn load_config(&self) -> anyhow::Result<cart::Config> {
        let Some(path) = &self.config else {
            return Ok(cart::Config::default());
        };
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}

/// Resolve an image path, falling back to the NVRAM directory for relative paths that don't
/// exist in the working directory.
pub(crate) fn resolve(file: &Path, config: &cart::Config) -> PathBuf {
    if file.is_absolute() || file.exists() {
        file.to_path_buf()
    } else {
        config.nvram_dir.join(file)
    }
}
