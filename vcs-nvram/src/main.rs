//! Inspect and erase serial EEPROM images of Atari 2600 cartridges and controllers.
//!
//! USAGE:
//!     nvram [OPTIONS] <COMMAND>
//!
//! COMMANDS:
//!     dump     Print a hex dump of an EEPROM image
//!     erase    Erase an EEPROM image to $FF, creating it with --profile if missing
//!     info     Show the size and page usage of an EEPROM image
//!
//! OPTIONS:
//!     -c, --config <CONFIG>    JSON configuration file
//!     -v, --verbose...         Increase log verbosity. May be repeated

#![doc = include_str!("../../README.md")]

mod logging;
mod opts;

use anyhow::{bail, Context};
use clap::Parser;
use opts::{Command, Device, Opts};
use std::path::Path;
use tracing::{debug, info};
use vcs_nvram_core::{
    common::hexdump,
    eeprom::{Eeprom, FlashStore, Profile},
    fs,
};

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    logging::init(opts.verbose);
    debug!("CLI Options: {opts:?}");

    let config = opts.load_config()?;
    debug!("Config: {config:?}");

    match &opts.command {
        Command::Dump { file, profile } => {
            let path = opts::resolve(file, &config);
            let (profile, data) = load_image(&path, *profile)?;
            println!("{} ({profile})", path.display());
            for line in hexdump(&data, 0) {
                println!("{line}");
            }
        }
        Command::Erase { file, profile } => {
            let path = opts::resolve(file, &config);
            let profile = erase_profile(&path, *profile)?;
            let mut eeprom = Eeprom::with_file(profile, &path, config.eeprom);
            eeprom.erase_all();
            drop(eeprom);
            info!("erased {} ({profile})", path.display());
        }
        Command::Info { file, profile } => {
            let path = opts::resolve(file, &config);
            let (profile, data) = load_image(&path, *profile)?;
            let used = data
                .chunks_exact(profile.page_size())
                .filter(|page| page.iter().any(|&b| b != FlashStore::ERASED))
                .count();
            println!("file:   {}", path.display());
            println!("device: {}", profile.family());
            println!("size:   {profile}");
            println!("pages:  {used} of {} written", profile.page_count());
        }
    }

    Ok(())
}

/// Read an image without creating or repairing it.
fn load_image(path: &Path, device: Option<Device>) -> anyhow::Result<(Profile, Vec<u8>)> {
    let profile = match device {
        Some(device) => Profile::from(device),
        None => detect_profile(path)?,
    };
    let data = fs::load_exact(path, profile.flash_size())
        .with_context(|| format!("invalid {profile} image {}", path.display()))?;
    Ok((profile, data))
}

/// A missing image can only be created once its size is known.
fn erase_profile(path: &Path, device: Option<Device>) -> anyhow::Result<Profile> {
    match device {
        Some(device) => Ok(Profile::from(device)),
        None if !path.exists() => bail!(
            "{} does not exist, pass --profile to create it",
            path.display()
        ),
        None => detect_profile(path),
    }
}

fn detect_profile(path: &Path) -> anyhow::Result<Profile> {
    let len = std::fs::metadata(path)
        .with_context(|| format!("failed to read {}, try --profile", path.display()))?
        .len();
    match usize::try_from(len) {
        Ok(len) if len == Profile::MT24LC16B.flash_size() => Ok(Profile::MT24LC16B),
        Ok(len) if len == Profile::MT24LC256.flash_size() => Ok(Profile::MT24LC256),
        _ => bail!(
            "unrecognized image size {len} for {}, try --profile",
            path.display()
        ),
    }
}
