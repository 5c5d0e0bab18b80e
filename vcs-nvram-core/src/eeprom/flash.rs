//! EEPROM flash image and its backing file.

use crate::{eeprom::Profile, fs};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// The byte-addressable flash array of an EEPROM, along with which pages the running program
/// has touched since the last system reset.
///
/// The image is loaded from its backing file on construction and written back once, when the
/// store is dropped, if anything changed.
#[must_use]
pub struct FlashStore {
    profile: Profile,
    data: Vec<u8>,
    page_used: Vec<bool>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl FlashStore {
    /// Value of an erased flash cell.
    pub const ERASED: u8 = 0xFF;

    /// Create an erased store with no backing file.
    pub fn blank(profile: Profile) -> Self {
        Self {
            profile,
            data: vec![Self::ERASED; profile.flash_size()],
            page_used: vec![false; profile.page_count()],
            path: None,
            dirty: false,
        }
    }

    /// Load a store from `path`. A missing, unreadable, or wrongly sized file yields an erased
    /// image which is marked dirty so a fresh file gets written on drop.
    pub fn load(profile: Profile, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("NVRAM (EEPROM) file: {}", path.display());

        let mut store = Self::blank(profile);
        match fs::load_exact(&path, profile.flash_size()) {
            Ok(data) => store.data = data,
            Err(err) => {
                warn!("creating new EEPROM image for {}: {err}", path.display());
                store.dirty = true;
            }
        }
        store.path = Some(path);
        store
    }

    #[inline]
    #[must_use]
    pub const fn profile(&self) -> Profile {
        self.profile
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the image differs from what was loaded and will be saved on drop.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        self.data[self.profile.wrap(addr)]
    }

    /// Commit a byte, marking its page as used.
    pub fn write(&mut self, addr: u16, val: u8) {
        let addr = self.profile.wrap(addr);
        self.data[addr] = val;
        self.page_used[addr / self.profile.page_size()] = true;
        self.dirty = true;
    }

    /// Mark the page containing `addr` as used.
    pub fn touch(&mut self, addr: u16) {
        self.page_used[self.profile.wrap(addr) / self.profile.page_size()] = true;
    }

    pub fn clear_page_usage(&mut self) {
        self.page_used.fill(false);
    }

    pub fn erase_all(&mut self) {
        self.data.fill(Self::ERASED);
        self.dirty = true;
    }

    pub fn erase_used_pages(&mut self) {
        let page_size = self.profile.page_size();
        for (page, data) in self.data.chunks_exact_mut(page_size).enumerate() {
            if self.page_used[page] {
                data.fill(Self::ERASED);
                self.dirty = true;
            }
        }
    }

    #[must_use]
    pub fn is_page_used(&self, page: usize) -> bool {
        self.page_used.get(page).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn page_usage(&self) -> &[bool] {
        &self.page_used
    }

    fn save(&self, path: &Path) -> fs::Result<()> {
        fs::save_raw(path, &self.data)?;
        debug!("saved EEPROM image {}", fs::filename(path));
        Ok(())
    }
}

impl Drop for FlashStore {
    fn drop(&mut self) {
        if !self.dirty {
            return;
        }
        if let Some(path) = &self.path {
            if let Err(err) = self.save(path) {
                error!("failed to write EEPROM data file {}: {err}", path.display());
            }
        }
    }
}

impl std::fmt::Debug for FlashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashStore")
            .field("profile", &self.profile)
            .field("len", &self.data.len())
            .field(
                "pages_used",
                &self.page_used.iter().filter(|&&used| used).count(),
            )
            .field("path", &self.path)
            .field("dirty", &self.dirty)
            .finish()
    }
}
