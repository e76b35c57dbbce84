//! OS keyring backed session store.

use super::SessionStore;
use keyring::Entry;
use tracing::warn;

/// Persists session values as keyring entries under one service name.
///
/// Keyring failures are logged and treated as "absent"; a missing entry on
/// removal is not an error.
pub struct KeyringSessionStore {
    service: String,
}

impl KeyringSessionStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Option<Entry> {
        match Entry::new(&self.service, key) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(service = self.service.as_str(), key, error = %e, "keyring entry unavailable");
                None
            }
        }
    }
}

impl Default for KeyringSessionStore {
    fn default() -> Self {
        Self::new("jlpt-study")
    }
}

impl SessionStore for KeyringSessionStore {
    fn get_value(&self, key: &str) -> Option<String> {
        stored_value(key, self.entry(key)?.get_password())
    }

    fn set_value(&self, key: &str, value: &str) {
        if let Some(entry) = self.entry(key) {
            if let Err(e) = entry.set_password(value) {
                warn!(key, error = %e, "failed to persist session value");
            }
        }
    }

    fn remove_value(&self, key: &str) {
        if let Some(entry) = self.entry(key) {
            match entry.delete_password() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => warn!(key, error = %e, "failed to remove session value"),
            }
        }
    }
}

/// A missing entry is an absent value; any other keyring failure is logged.
fn stored_value(key: &str, read: keyring::Result<String>) -> Option<String> {
    match read {
        Ok(value) => Some(value),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "failed to read session value");
            None
        }
    }
}
