//! Session state over host roaming settings.
//!
//! The access/refresh token pair and the signed-in user name are persisted as
//! one serialized record under a single versioned key. Writing the pair as
//! one record keeps the update atomic at the storage layer: a crash can never
//! leave an access token from one login next to a refresh token from another.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::settings::{SettingsError, SettingsStore};
use crate::token_codec::{obfuscate, reveal};

pub const SESSION_KEY: &str = "voucherpilot.session.v1";
const SESSION_SCHEMA_VERSION: u32 = 1;

pub const KEY_MASTER_DATA: &str = "masterData";
pub const KEY_ENTITY_ID: &str = "entityid";
pub const KEY_MODULE_ID: &str = "moduleid";
pub const KEY_EDM_MODULE_ENTITY_ID: &str = "edmmoduleentityid";
pub const KEY_EDM_AGENCY: &str = "edmagency";
pub const KEY_AGENCY_CODE: &str = "agencycode";
pub const KEY_AUTH_URL: &str = "AuthenticationUrl";
pub const KEY_FINANCE_URL: &str = "FinanceUrl";
pub const KEY_DIALOG_OPEN: &str = "dialogOpen";

/// Cache keys owned by the reference-data layer, wiped on logout alongside
/// the session record.
pub const CACHE_KEYS: &[&str] = &[
    KEY_MASTER_DATA,
    KEY_ENTITY_ID,
    KEY_MODULE_ID,
    KEY_EDM_MODULE_ENTITY_ID,
    KEY_EDM_AGENCY,
    KEY_AGENCY_CODE,
    KEY_AUTH_URL,
    KEY_FINANCE_URL,
    KEY_DIALOG_OPEN,
];

/// Live session as held in memory. Tokens are plain here; they are only
/// obfuscated at the storage boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_name: String,
}

impl Session {
    /// Copy of this session carrying a newly refreshed access token.
    #[must_use]
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: self.refresh_token.clone(),
            user_name: self.user_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    version: u32,
    access_token: String,
    refresh_token: String,
    user_name: String,
}

/// Owns the session lifecycle: persist on login, restore on boot, clear on
/// logout or unrecoverable refresh failure.
#[derive(Clone)]
pub struct SessionManager {
    roaming: Arc<dyn SettingsStore>,
    cache: Arc<dyn SettingsStore>,
}

impl SessionManager {
    pub fn new(roaming: Arc<dyn SettingsStore>, cache: Arc<dyn SettingsStore>) -> Self {
        Self { roaming, cache }
    }

    pub fn persist(&self, session: &Session) -> Result<(), SettingsError> {
        let record = SessionRecord {
            version: SESSION_SCHEMA_VERSION,
            access_token: obfuscate(&session.access_token),
            refresh_token: obfuscate(&session.refresh_token),
            user_name: session.user_name.clone(),
        };
        let encoded = serde_json::to_string(&record).map_err(|error| SettingsError::Write {
            message: format!("session encode failed: {error}"),
        })?;
        self.roaming.set(SESSION_KEY, &encoded)?;
        self.roaming.save()
    }

    /// Reads the stored session. Absent, malformed, or undecodable state
    /// degrades to `None` — boot continues as logged out.
    #[must_use]
    pub fn restore(&self) -> Option<Session> {
        let raw = self.roaming.get(SESSION_KEY)?;
        let record = match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) if record.version == SESSION_SCHEMA_VERSION => record,
            Ok(record) => {
                tracing::warn!(
                    target: "voucherpilot.session",
                    version = record.version,
                    "stored session has unknown schema version",
                );
                return None;
            }
            Err(error) => {
                tracing::warn!(
                    target: "voucherpilot.session",
                    error = %error,
                    "stored session is malformed",
                );
                return None;
            }
        };

        let access_token = reveal(&record.access_token);
        let refresh_token = reveal(&record.refresh_token);
        if access_token.is_empty() || refresh_token.is_empty() {
            return None;
        }

        Some(Session {
            access_token,
            refresh_token,
            user_name: record.user_name,
        })
    }

    /// Removes the session record and every cached reference-data key.
    ///
    /// The caller decides whether to also reset the hosting view; partial
    /// client state after a forced logout is otherwise unrecoverable.
    pub fn clear(&self) -> Result<(), SettingsError> {
        self.roaming.remove(SESSION_KEY)?;
        self.roaming.save()?;

        for key in CACHE_KEYS {
            self.cache.remove(key)?;
        }
        self.cache.save()
    }
}
