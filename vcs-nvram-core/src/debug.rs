//! Host-side hooks for observing device activity.

use std::sync::Arc;

/// Callback invoked with a short tag such as `"Cartridge EEPROM write"` whenever a device
/// commits a read or write. Used for UI feedback only.
#[derive(Clone)]
#[must_use]
pub struct ActivityCallback {
    callback: Arc<dyn Fn(&str) + Send + Sync + 'static>,
}

impl ActivityCallback {
    pub fn new(callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn notify(&self, message: &str) {
        (self.callback)(message);
    }
}

impl<F> From<F> for ActivityCallback
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn from(callback: F) -> Self {
        Self::new(callback)
    }
}

impl std::fmt::Debug for ActivityCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityCallback").finish_non_exhaustive()
    }
}
