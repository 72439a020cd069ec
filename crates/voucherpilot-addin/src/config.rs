//! Per-environment agency directory.
//!
//! The deployment pipeline injects one JSON document per environment mapping
//! each agency to its authentication and finance endpoints plus display
//! metadata. The document is read once at boot; agencies feed the login
//! picker.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const ENV_SETTINGS_PATH: &str = "VOUCHERPILOT_SETTINGS_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings_read_failed:{path}:{message}")]
    Read { path: String, message: String },
    #[error("settings_parse_failed:{message}")]
    Parse { message: String },
    #[error("settings_invalid_url:{agency}:{url}")]
    InvalidUrl { agency: String, url: String },
    #[error("settings_path_not_configured")]
    PathNotConfigured,
}

/// The per-environment document, keyed by agency. Wire keys are PascalCase
/// to match the deployed settings files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppSettings {
    pub authentication_urls: BTreeMap<String, String>,
    pub finance_urls: BTreeMap<String, String>,
    pub agency_flags: BTreeMap<String, String>,
    pub agency_codes: BTreeMap<String, String>,
}

/// Everything the flows need for one selected agency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyEndpoints {
    pub agency: String,
    pub auth_url: String,
    pub finance_url: String,
    pub agency_code: String,
    pub flag: Option<String>,
}

impl AppSettings {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(raw).map_err(|error| ConfigError::Parse {
            message: error.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// Loads from the path named by `VOUCHERPILOT_SETTINGS_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(ENV_SETTINGS_PATH)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::PathNotConfigured)?;
        Self::load(Path::new(&path))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (agency, url) in self
            .authentication_urls
            .iter()
            .chain(self.finance_urls.iter())
        {
            if !is_http_url(url) {
                return Err(ConfigError::InvalidUrl {
                    agency: agency.clone(),
                    url: url.clone(),
                });
            }
        }
        Ok(())
    }

    /// Agencies offered in the login picker, in stable order.
    #[must_use]
    pub fn agencies(&self) -> Vec<&str> {
        self.authentication_urls.keys().map(String::as_str).collect()
    }

    /// Resolves everything for one agency; `None` when either endpoint is
    /// missing from the document.
    #[must_use]
    pub fn endpoints_for(&self, agency: &str) -> Option<AgencyEndpoints> {
        let auth_url = self.authentication_urls.get(agency)?;
        let finance_url = self.finance_urls.get(agency)?;
        Some(AgencyEndpoints {
            agency: agency.to_string(),
            auth_url: auth_url.trim_end_matches('/').to_string(),
            finance_url: finance_url.trim_end_matches('/').to_string(),
            agency_code: self
                .agency_codes
                .get(agency)
                .cloned()
                .unwrap_or_else(|| agency.to_string()),
            flag: self.agency_flags.get(agency).cloned(),
        })
    }
}

fn is_http_url(url: &str) -> bool {
    let trimmed = url.trim();
    (trimmed.starts_with("http://") || trimmed.starts_with("https://"))
        && trimmed
            .split_once("://")
            .is_some_and(|(_, remainder)| !remainder.is_empty() && !remainder.starts_with('/'))
}
