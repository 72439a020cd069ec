//! Main panel flow: sign-in, attachment collection, and the hand-off into
//! the dialog window.

use std::sync::Arc;

use voucherpilot_client_core::attachment::{
    Attachment, AttachmentSource, AttachmentSourceError, resolve_contents,
};
use voucherpilot_client_core::handoff::{
    DEFAULT_READY_TIMEOUT, HandoffBackend, HandoffChannel, HandoffError, choose_backend, deliver,
};
use voucherpilot_client_core::host::{HostError, ModalLauncher};
use voucherpilot_client_core::session::{
    KEY_AGENCY_CODE, KEY_AUTH_URL, KEY_DIALOG_OPEN, KEY_FINANCE_URL, Session, SessionManager,
};
use voucherpilot_client_core::settings::{SettingsError, SettingsStore};
use voucherpilot_gateway::auth_client::AuthApi;
use voucherpilot_gateway::GatewayError;

use crate::config::AgencyEndpoints;

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// Inline form validation message; nothing was sent.
    #[error("{message}")]
    Validation { message: String },
    /// Login reached the service but no usable token came back.
    #[error("login failed; check the credentials")]
    Credentials,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Mailbox(#[from] AttachmentSourceError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Handoff(#[from] HandoffError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub agency: String,
    pub user_name: String,
    pub password: String,
}

impl LoginForm {
    fn validate(&self) -> Result<(), PanelError> {
        if self.agency.trim().is_empty()
            || self.user_name.trim().is_empty()
            || self.password.is_empty()
        {
            return Err(PanelError::Validation {
                message: "Please fill in all fields.".to_string(),
            });
        }
        Ok(())
    }
}

/// What a completed hand-off looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffReport {
    pub delivered: usize,
    pub backend: HandoffBackend,
    pub ready_signaled: bool,
}

pub struct PanelFlow {
    sessions: SessionManager,
    cache: Arc<dyn SettingsStore>,
    mailbox: Arc<dyn AttachmentSource>,
    launcher: Arc<dyn ModalLauncher>,
    transient: Arc<dyn HandoffChannel>,
    persistent: Arc<dyn HandoffChannel>,
}

impl PanelFlow {
    pub fn new(
        sessions: SessionManager,
        cache: Arc<dyn SettingsStore>,
        mailbox: Arc<dyn AttachmentSource>,
        launcher: Arc<dyn ModalLauncher>,
        transient: Arc<dyn HandoffChannel>,
        persistent: Arc<dyn HandoffChannel>,
    ) -> Self {
        Self {
            sessions,
            cache,
            mailbox,
            launcher,
            transient,
            persistent,
        }
    }

    /// Session restored from roaming settings, if a usable one exists.
    #[must_use]
    pub fn restore_session(&self) -> Option<Session> {
        self.sessions.restore()
    }

    /// Signs in against the agency's endpoint. On success the session is
    /// persisted and the agency context is parked for the dialog window; the
    /// returned access token feeds the logged-in view. Credential failures
    /// mutate nothing.
    pub async fn login(
        &self,
        auth: &dyn AuthApi,
        endpoints: &AgencyEndpoints,
        form: &LoginForm,
    ) -> Result<String, PanelError> {
        form.validate()?;

        let pair = match auth.login(&form.user_name, &form.password).await {
            Ok(pair) => pair,
            Err(GatewayError::Credentials) => return Err(PanelError::Credentials),
            Err(error) => return Err(PanelError::Gateway(error)),
        };

        self.sessions.persist(&Session {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token,
            user_name: form.user_name.clone(),
        })?;

        self.cache.set(KEY_AUTH_URL, &endpoints.auth_url)?;
        self.cache.set(KEY_FINANCE_URL, &endpoints.finance_url)?;
        self.cache.set(KEY_AGENCY_CODE, &endpoints.agency_code)?;
        self.cache.save()?;

        tracing::info!(
            target: "voucherpilot.panel",
            agency = %endpoints.agency,
            user = %form.user_name,
            "login succeeded",
        );
        Ok(pair.access_token)
    }

    /// Collects the open mail item's attachments and hands them to the
    /// dialog window. Returns `None` when a dialog is already open.
    pub async fn hand_off_attachments(
        &self,
        dialog_url: &str,
    ) -> Result<Option<HandoffReport>, PanelError> {
        if self.cache.get(KEY_DIALOG_OPEN).as_deref() == Some("true") {
            tracing::warn!(
                target: "voucherpilot.panel",
                "dialog already open; skipping launch",
            );
            return Ok(None);
        }

        let attachments = match resolve_contents(self.mailbox.as_ref()).await {
            Ok(attachments) => attachments,
            Err(error) => {
                self.reset_dialog_guard();
                return Err(PanelError::Mailbox(error));
            }
        };

        let total_bytes: usize = attachments.iter().map(Attachment::payload_bytes).sum();
        let backend = choose_backend(total_bytes);
        let channel: &dyn HandoffChannel = match backend {
            HandoffBackend::Transient => self.transient.as_ref(),
            HandoffBackend::Persistent => self.persistent.as_ref(),
        };

        let handle = match self.launcher.open_dialog(dialog_url).await {
            Ok(handle) => handle,
            Err(error) => {
                self.reset_dialog_guard();
                return Err(PanelError::Host(error));
            }
        };
        self.cache.set(KEY_DIALOG_OPEN, "true")?;

        let delivered = attachments.len();
        let ready_signaled =
            deliver(channel, &handle.ready, attachments, DEFAULT_READY_TIMEOUT).await?;

        tracing::info!(
            target: "voucherpilot.panel",
            delivered,
            total_bytes,
            ready_signaled,
            "attachments handed off to dialog",
        );
        Ok(Some(HandoffReport {
            delivered,
            backend,
            ready_signaled,
        }))
    }

    /// Host adapters call this when the dialog window closes.
    pub fn mark_dialog_closed(&self) {
        self.reset_dialog_guard();
    }

    /// Destroys the session and cached reference data, then asks the host to
    /// reset the view — partial client state is otherwise unrecoverable.
    pub fn logout(&self) -> Result<(), PanelError> {
        self.sessions.clear()?;
        self.launcher.reload_view();
        Ok(())
    }

    fn reset_dialog_guard(&self) {
        if self.cache.set(KEY_DIALOG_OPEN, "false").is_err() {
            tracing::warn!(
                target: "voucherpilot.panel",
                "failed to reset dialog guard",
            );
        }
    }
}
