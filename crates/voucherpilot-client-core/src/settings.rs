//! Key/value storage capability.
//!
//! The host runtime exposes two relevant stores: roaming settings (persisted
//! per plugin installation) and a window-local cache. Both are modeled by the
//! same narrow trait so the session manager and the reference-data provider
//! can be exercised against an in-memory fake.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("settings_write_failed:{message}")]
    Write { message: String },
    #[error("settings_save_failed:{message}")]
    Save { message: String },
}

pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;
    fn remove(&self, key: &str) -> Result<(), SettingsError>;

    /// Flushes pending writes to the host. Stores without deferred writes
    /// implement this as a no-op.
    fn save(&self) -> Result<(), SettingsError>;
}

/// In-process store used by tests and by dialog-session scratch state.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut entries = self.entries.lock().map_err(|_| SettingsError::Write {
            message: "settings mutex poisoned".to_string(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SettingsError> {
        let mut entries = self.entries.lock().map_err(|_| SettingsError::Write {
            message: "settings mutex poisoned".to_string(),
        })?;
        entries.remove(key);
        Ok(())
    }

    fn save(&self) -> Result<(), SettingsError> {
        Ok(())
    }
}
