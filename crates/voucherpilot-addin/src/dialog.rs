//! Dialog-window flow: announce readiness, take the hand-off payload, submit
//! attachments for extraction, and hold the local invoice-editing state.

use std::collections::HashMap;
use std::sync::Arc;

use voucherpilot_client_core::attachment::Attachment;
use voucherpilot_client_core::handoff::{HandoffChannel, HandoffError};
use voucherpilot_client_core::host::{ModalLauncher, ReadySignal};
use voucherpilot_client_core::invoice::{InvoiceEdit, InvoiceFields, tax_excluded_amount};
use voucherpilot_client_core::master_data::MasterDataItem;
use voucherpilot_client_core::session::{
    KEY_AGENCY_CODE, KEY_AUTH_URL, KEY_FINANCE_URL, KEY_MASTER_DATA, SessionManager,
};
use voucherpilot_client_core::settings::{SettingsError, SettingsStore};
use voucherpilot_gateway::GatewayError;
use voucherpilot_gateway::finance_client::{FinanceClient, SEND_VOUCHER_PATH};

#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Handoff(#[from] HandoffError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Everything the dialog needs to render: the payload taken from the
/// hand-off channel and the agency context parked by the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogInit {
    pub attachments: Vec<Attachment>,
    pub master_data: Vec<MasterDataItem>,
    pub finance_url: Option<String>,
    pub auth_url: Option<String>,
    pub agency_code: Option<String>,
}

impl DialogInit {
    /// Full OCR submission endpoint, when an agency context is present.
    #[must_use]
    pub fn ocr_url(&self) -> Option<String> {
        self.finance_url
            .as_ref()
            .map(|base| format!("{base}{SEND_VOUCHER_PATH}"))
    }
}

pub struct DialogFlow {
    sessions: SessionManager,
    cache: Arc<dyn SettingsStore>,
    launcher: Arc<dyn ModalLauncher>,
    transient: Arc<dyn HandoffChannel>,
    persistent: Arc<dyn HandoffChannel>,
    ready: ReadySignal,
}

impl DialogFlow {
    pub fn new(
        sessions: SessionManager,
        cache: Arc<dyn SettingsStore>,
        launcher: Arc<dyn ModalLauncher>,
        transient: Arc<dyn HandoffChannel>,
        persistent: Arc<dyn HandoffChannel>,
        ready: ReadySignal,
    ) -> Self {
        Self {
            sessions,
            cache,
            launcher,
            transient,
            persistent,
            ready,
        }
    }

    /// Boots the dialog: signals readiness to the panel, then takes the
    /// hand-off payload (at most once) and the cached agency context.
    pub fn init(&self) -> Result<DialogInit, DialogError> {
        self.ready.mark_ready();

        let attachments = match self.transient.take()? {
            Some(attachments) => attachments,
            None => self.persistent.take()?.unwrap_or_default(),
        };
        if attachments.is_empty() {
            tracing::warn!(
                target: "voucherpilot.dialog",
                "no hand-off payload found at dialog init",
            );
        }

        let master_data = self
            .cache
            .get(KEY_MASTER_DATA)
            .and_then(|raw| match serde_json::from_str::<Vec<MasterDataItem>>(&raw) {
                Ok(items) => Some(items),
                Err(error) => {
                    tracing::warn!(
                        target: "voucherpilot.dialog",
                        error = %error,
                        "cached master data is unreadable",
                    );
                    None
                }
            })
            .unwrap_or_default();

        Ok(DialogInit {
            attachments,
            master_data,
            finance_url: self.cache.get(KEY_FINANCE_URL),
            auth_url: self.cache.get(KEY_AUTH_URL),
            agency_code: self.cache.get(KEY_AGENCY_CODE),
        })
    }

    /// Submits one attachment for extraction. `Ok(None)` means the session
    /// ended — either the gateway cleared it or the response was unusable —
    /// and the view reset has been requested.
    pub async fn submit(
        &self,
        finance: &FinanceClient,
        attachment: &Attachment,
    ) -> Result<Option<InvoiceFields>, DialogError> {
        match finance.send_voucher_for_ocr(attachment).await {
            Ok(Some(fields)) => Ok(Some(fields)),
            Ok(None) => {
                self.launcher.reload_view();
                Ok(None)
            }
            Err(GatewayError::MalformedResponse { message }) => {
                // An unusable extraction response is indistinguishable from
                // an invalid session for this client; treat it the same way.
                tracing::warn!(
                    target: "voucherpilot.dialog",
                    message = %message,
                    "unusable OCR response; logging out",
                );
                self.sessions.clear()?;
                self.launcher.reload_view();
                Ok(None)
            }
            Err(error) => Err(DialogError::Gateway(error)),
        }
    }
}

/// Local editing state for one extracted invoice. Edits never leave the
/// plugin; the in-scope boundary ends at display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoucherEditState {
    pub fields: InvoiceFields,
    selected_tax_codes: Vec<String>,
    custom_tax_amounts: HashMap<String, f64>,
}

impl VoucherEditState {
    #[must_use]
    pub fn new(fields: InvoiceFields) -> Self {
        Self {
            fields,
            selected_tax_codes: Vec::new(),
            custom_tax_amounts: HashMap::new(),
        }
    }

    pub fn apply(&mut self, edit: InvoiceEdit) {
        self.fields.apply_edit(edit);
    }

    pub fn toggle_tax_code(&mut self, code: &str) {
        if let Some(position) = self.selected_tax_codes.iter().position(|c| c == code) {
            self.selected_tax_codes.remove(position);
        } else {
            self.selected_tax_codes.push(code.to_string());
        }
    }

    #[must_use]
    pub fn selected_tax_codes(&self) -> &[String] {
        &self.selected_tax_codes
    }

    /// Unparseable input lands as zero, matching the form's behavior.
    pub fn set_custom_tax_amount(&mut self, code: &str, amount: f64) {
        let amount = if amount.is_nan() { 0.0 } else { amount };
        self.custom_tax_amounts.insert(code.to_string(), amount);
    }

    /// Total minus the tax amounts of the currently selected codes.
    #[must_use]
    pub fn tax_excluded(&self) -> f64 {
        tax_excluded_amount(
            self.fields.total_amount,
            &self.selected_tax_codes,
            &self.custom_tax_amounts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use voucherpilot_client_core::handoff::TransientHandoff;
    use voucherpilot_client_core::host::{DialogHandle, HostError};
    use voucherpilot_client_core::session::Session;
    use voucherpilot_client_core::settings::MemorySettingsStore;
    use voucherpilot_gateway::auth_client::{AuthApi, RefreshOutcome, TokenPair};
    use voucherpilot_gateway::secure::{JsonPoster, SecureGateway};

    struct FakeLauncher {
        reloads: AtomicUsize,
    }

    #[async_trait]
    impl ModalLauncher for FakeLauncher {
        async fn open_dialog(&self, _url: &str) -> Result<DialogHandle, HostError> {
            Err(HostError::DialogOpen {
                message: "dialogs cannot nest".to_string(),
            })
        }

        fn reload_view(&self) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct RefreshingAuth;

    #[async_trait]
    impl AuthApi for RefreshingAuth {
        async fn login(&self, _: &str, _: &str) -> Result<TokenPair, GatewayError> {
            Err(GatewayError::Credentials)
        }

        async fn refresh(&self, _: &TokenPair) -> Result<RefreshOutcome, GatewayError> {
            Ok(RefreshOutcome::Refreshed {
                access_token: "A2".to_string(),
            })
        }
    }

    struct ExpiredAuth;

    #[async_trait]
    impl AuthApi for ExpiredAuth {
        async fn login(&self, _: &str, _: &str) -> Result<TokenPair, GatewayError> {
            Err(GatewayError::Credentials)
        }

        async fn refresh(&self, _: &TokenPair) -> Result<RefreshOutcome, GatewayError> {
            Ok(RefreshOutcome::Expired)
        }
    }

    struct FixedPoster {
        body: serde_json::Value,
    }

    #[async_trait]
    impl JsonPoster for FixedPoster {
        async fn post_json(
            &self,
            _url: &str,
            _bearer: &str,
            _headers: &[(String, String)],
            _payload: &serde_json::Value,
        ) -> Result<serde_json::Value, GatewayError> {
            Ok(self.body.clone())
        }
    }

    struct Fixture {
        flow: DialogFlow,
        cache: Arc<MemorySettingsStore>,
        transient: Arc<TransientHandoff>,
        persistent: Arc<TransientHandoff>,
        launcher: Arc<FakeLauncher>,
        sessions: SessionManager,
        ready: ReadySignal,
    }

    fn fixture() -> Fixture {
        let roaming = Arc::new(MemorySettingsStore::new());
        let cache = Arc::new(MemorySettingsStore::new());
        let sessions = SessionManager::new(roaming, cache.clone());
        let launcher = Arc::new(FakeLauncher {
            reloads: AtomicUsize::new(0),
        });
        let transient = Arc::new(TransientHandoff::new());
        let persistent = Arc::new(TransientHandoff::new());
        let ready = ReadySignal::new();
        let flow = DialogFlow::new(
            sessions.clone(),
            cache.clone(),
            launcher.clone(),
            transient.clone(),
            persistent.clone(),
            ready.clone(),
        );
        Fixture {
            flow,
            cache,
            transient,
            persistent,
            launcher,
            sessions,
            ready,
        }
    }

    fn attachment(id: &str, content: &str) -> Attachment {
        Attachment {
            id: id.to_string(),
            name: format!("{id}.pdf"),
            size: content.len() as u64,
            content_type: "application/pdf".to_string(),
            file_base64: Some(content.to_string()),
        }
    }

    fn finance_over(auth: Arc<dyn AuthApi>, body: serde_json::Value, sessions: SessionManager) -> FinanceClient {
        let gateway = SecureGateway::new(auth, Arc::new(FixedPoster { body }), sessions);
        FinanceClient::new(
            gateway,
            "https://finance.example.ch",
            "https://auth.example.ch",
        )
        .expect("finance client")
    }

    fn seed_session(sessions: &SessionManager) {
        sessions
            .persist(&Session {
                access_token: "A1".to_string(),
                refresh_token: "R1".to_string(),
                user_name: "alice".to_string(),
            })
            .expect("seed session");
    }

    #[test]
    fn init_signals_ready_and_takes_payload_once() {
        let fx = fixture();
        fx.transient
            .put(vec![attachment("1", "QUJD"), attachment("2", "REVG")])
            .expect("seed payload");
        fx.cache
            .set(KEY_FINANCE_URL, "https://finance.example.ch")
            .expect("seed cache");
        fx.cache
            .set(KEY_AGENCY_CODE, "0041")
            .expect("seed cache");

        let init = fx.flow.init().expect("init");
        assert!(fx.ready.is_ready());
        assert_eq!(init.attachments.len(), 2);
        assert_eq!(init.attachments[0].file_base64.as_deref(), Some("QUJD"));
        assert_eq!(
            init.ocr_url().as_deref(),
            Some("https://finance.example.ch/Vouchers/SendVoucherForOCR")
        );
        assert_eq!(init.agency_code.as_deref(), Some("0041"));
        assert!(fx.transient.is_empty());

        // A second boot finds the channel drained.
        let again = fx.flow.init().expect("second init");
        assert!(again.attachments.is_empty());
    }

    #[test]
    fn init_falls_back_to_persistent_channel() {
        let fx = fixture();
        fx.persistent
            .put(vec![attachment("1", "QUJD")])
            .expect("seed payload");

        let init = fx.flow.init().expect("init");
        assert_eq!(init.attachments.len(), 1);
        assert!(fx.persistent.is_empty());
    }

    #[test]
    fn init_tolerates_unreadable_master_data_cache() {
        let fx = fixture();
        fx.cache
            .set(KEY_MASTER_DATA, "not json")
            .expect("seed cache");

        let init = fx.flow.init().expect("init");
        assert!(init.master_data.is_empty());
    }

    #[test]
    fn init_loads_cached_master_data() {
        let fx = fixture();
        let rows = serde_json::json!([
            {"groupe": "Suppliers", "code": "S1", "label": "Acme AG"}
        ]);
        fx.cache
            .set(KEY_MASTER_DATA, &rows.to_string())
            .expect("seed cache");

        let init = fx.flow.init().expect("init");
        assert_eq!(init.master_data.len(), 1);
        assert_eq!(init.master_data[0].code, "S1");
    }

    #[tokio::test]
    async fn submit_returns_extracted_fields() {
        let fx = fixture();
        seed_session(&fx.sessions);
        let finance = finance_over(
            Arc::new(RefreshingAuth),
            serde_json::json!({"invoiceNumber": "INV-7", "totalAmount": 119.0}),
            fx.sessions.clone(),
        );

        let fields = fx
            .flow
            .submit(&finance, &attachment("1", "QUJD"))
            .await
            .expect("submit")
            .expect("fields");
        assert_eq!(fields.invoice_number, "INV-7");
        assert_eq!(fx.launcher.reloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_after_session_end_requests_view_reset() {
        let fx = fixture();
        seed_session(&fx.sessions);
        let finance = finance_over(
            Arc::new(ExpiredAuth),
            serde_json::json!({}),
            fx.sessions.clone(),
        );

        let result = fx
            .flow
            .submit(&finance, &attachment("1", "QUJD"))
            .await
            .expect("submit");
        assert!(result.is_none());
        assert!(fx.sessions.restore().is_none());
        assert_eq!(fx.launcher.reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_treats_unusable_response_as_logout() {
        let fx = fixture();
        seed_session(&fx.sessions);
        let finance = finance_over(
            Arc::new(RefreshingAuth),
            serde_json::json!({"totalAmount": "not a number"}),
            fx.sessions.clone(),
        );

        let result = fx
            .flow
            .submit(&finance, &attachment("1", "QUJD"))
            .await
            .expect("submit");
        assert!(result.is_none());
        assert!(fx.sessions.restore().is_none());
        assert_eq!(fx.launcher.reloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn edit_state_applies_field_edits() {
        let mut state = VoucherEditState::new(InvoiceFields {
            invoice_number: "INV-7".to_string(),
            total_amount: 119.0,
            ..InvoiceFields::default()
        });

        state.apply(InvoiceEdit::CostCenter("CC-42".to_string()));
        assert_eq!(state.fields.cost_center, "CC-42");
        assert_eq!(state.fields.invoice_number, "INV-7");
    }

    #[test]
    fn edit_state_tracks_tax_selection_and_excluded_amount() {
        let mut state = VoucherEditState::new(InvoiceFields {
            total_amount: 119.0,
            ..InvoiceFields::default()
        });

        state.set_custom_tax_amount("19", 19.0);
        state.toggle_tax_code("19");
        assert_eq!(state.selected_tax_codes(), ["19".to_string()]);
        assert!((state.tax_excluded() - 100.0).abs() < f64::EPSILON);

        state.toggle_tax_code("19");
        assert!(state.selected_tax_codes().is_empty());
        assert!((state.tax_excluded() - 119.0).abs() < f64::EPSILON);
    }

    #[test]
    fn edit_state_maps_nan_amounts_to_zero() {
        let mut state = VoucherEditState::new(InvoiceFields {
            total_amount: 50.0,
            ..InvoiceFields::default()
        });
        state.set_custom_tax_amount("19", f64::NAN);
        state.toggle_tax_code("19");
        assert!((state.tax_excluded() - 50.0).abs() < f64::EPSILON);
    }
}
