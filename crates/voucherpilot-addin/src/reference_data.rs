//! Reference-data provider: module context and master data, fetched once per
//! session and cached for the dialog window.

use std::sync::Arc;

use voucherpilot_client_core::host::ModalLauncher;
use voucherpilot_client_core::master_data::{MasterDataItem, ModuleContext};
use voucherpilot_client_core::session::{
    CACHE_KEYS, KEY_AGENCY_CODE, KEY_EDM_AGENCY, KEY_EDM_MODULE_ENTITY_ID, KEY_ENTITY_ID,
    KEY_MASTER_DATA, KEY_MODULE_ID, SessionManager,
};
use voucherpilot_client_core::settings::{SettingsError, SettingsStore};
use voucherpilot_gateway::GatewayError;
use voucherpilot_gateway::finance_client::FinanceClient;

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub struct ReferenceDataProvider {
    sessions: SessionManager,
    cache: Arc<dyn SettingsStore>,
    launcher: Arc<dyn ModalLauncher>,
}

impl ReferenceDataProvider {
    pub fn new(
        sessions: SessionManager,
        cache: Arc<dyn SettingsStore>,
        launcher: Arc<dyn ModalLauncher>,
    ) -> Self {
        Self {
            sessions,
            cache,
            launcher,
        }
    }

    /// Resolves the agency's module context and parks its identifiers for
    /// subsequent finance calls. `Ok(None)` means the session ended and the
    /// view reset has been requested.
    pub async fn load_module_context(
        &self,
        finance: &FinanceClient,
        agency_code: &str,
    ) -> Result<Option<ModuleContext>, ReferenceError> {
        match finance.fetch_module_context(agency_code).await {
            Ok(Some(context)) => {
                self.cache
                    .set(KEY_ENTITY_ID, &context.entity_id.to_string())?;
                self.cache
                    .set(KEY_MODULE_ID, &context.module_id.to_string())?;
                self.cache.set(
                    KEY_EDM_MODULE_ENTITY_ID,
                    &context.edm_module_entity_id.to_string(),
                )?;
                self.cache.set(KEY_EDM_AGENCY, &context.edm_agency)?;
                self.cache.set(KEY_AGENCY_CODE, agency_code)?;
                self.cache.save()?;
                tracing::info!(
                    target: "voucherpilot.reference",
                    module_id = context.module_id,
                    entity_id = context.entity_id,
                    "module context loaded",
                );
                Ok(Some(context))
            }
            Ok(None) => {
                self.launcher.reload_view();
                Ok(None)
            }
            Err(GatewayError::MalformedResponse { message }) => {
                self.force_logout("module context", &message)?;
                Ok(None)
            }
            Err(error) => Err(ReferenceError::Gateway(error)),
        }
    }

    /// Loads the reference tables and caches them for the dialog window.
    pub async fn load_master_data(
        &self,
        finance: &FinanceClient,
        context: &ModuleContext,
        agency_code: &str,
    ) -> Result<Option<Vec<MasterDataItem>>, ReferenceError> {
        match finance.read_master_data(context, agency_code).await {
            Ok(Some(items)) => {
                let encoded =
                    serde_json::to_string(&items).map_err(|error| SettingsError::Write {
                        message: format!("master data encode failed: {error}"),
                    })?;
                self.cache.set(KEY_MASTER_DATA, &encoded)?;
                self.cache.save()?;
                Ok(Some(items))
            }
            Ok(None) => {
                self.launcher.reload_view();
                Ok(None)
            }
            Err(GatewayError::MalformedResponse { message }) => {
                self.force_logout("master data", &message)?;
                Ok(None)
            }
            Err(error) => Err(ReferenceError::Gateway(error)),
        }
    }

    /// Cached reference tables, empty when absent or unreadable.
    #[must_use]
    pub fn cached_master_data(&self) -> Vec<MasterDataItem> {
        self.cache
            .get(KEY_MASTER_DATA)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Module context reassembled from the cached identifiers.
    #[must_use]
    pub fn cached_module_context(&self) -> Option<ModuleContext> {
        Some(ModuleContext {
            entity_id: self.cache.get(KEY_ENTITY_ID)?.parse().ok()?,
            module_id: self.cache.get(KEY_MODULE_ID)?.parse().ok()?,
            edm_module_entity_id: self.cache.get(KEY_EDM_MODULE_ENTITY_ID)?.parse().ok()?,
            edm_agency: self.cache.get(KEY_EDM_AGENCY)?,
        })
    }

    /// Drops every cached reference key, leaving the session untouched.
    pub fn clear(&self) -> Result<(), ReferenceError> {
        for key in CACHE_KEYS {
            self.cache.remove(key)?;
        }
        self.cache.save()?;
        Ok(())
    }

    fn force_logout(&self, what: &str, message: &str) -> Result<(), ReferenceError> {
        // A response missing its expected shape is indistinguishable from an
        // invalid session for this client; escalate the same way.
        tracing::warn!(
            target: "voucherpilot.reference",
            what,
            message,
            "unusable response; logging out",
        );
        self.sessions.clear()?;
        self.launcher.reload_view();
        Ok(())
    }
}
