#![cfg_attr(test, allow(clippy::expect_used))]

//! Outbound HTTP for the add-in: the authentication client, the secure
//! refresh-then-retry-once request gateway, and the finance/OCR client.

pub mod auth_client;
pub mod finance_client;
pub mod secure;

use reqwest::StatusCode;

pub use auth_client::{AuthApi, AuthClient, RefreshOutcome, TokenPair};
pub use finance_client::{FinanceClient, VoucherOcrRequest};
pub use secure::{HttpPoster, JsonPoster, SecureGateway};

use voucherpilot_client_core::settings::SettingsError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway_base_url_missing")]
    BaseUrlMissing,
    #[error("gateway_invalid_credentials")]
    Credentials,
    #[error("gateway_attachment_content_missing:{id}")]
    AttachmentContentMissing { id: String },
    #[error("gateway_request_failed:{message}")]
    Request { message: String },
    #[error("gateway_read_failed:{message}")]
    Read { message: String },
    #[error("gateway_http_{status}:{body}")]
    Http { status: StatusCode, body: String },
    #[error("gateway_json_decode_failed:{message}")]
    Decode { message: String },
    #[error("gateway_malformed_response:{message}")]
    MalformedResponse { message: String },
    #[error("gateway_settings_failed:{0}")]
    Settings(#[from] SettingsError),
}

pub(crate) fn normalize_base_url(base_url: &str) -> Result<String, GatewayError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::BaseUrlMissing);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

pub(crate) fn request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().simple())
}

pub(crate) async fn decode_json_response<T>(response: reqwest::Response) -> Result<T, GatewayError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let status = response.status();
    let bytes = response.bytes().await.map_err(|error| GatewayError::Read {
        message: error.to_string(),
    })?;

    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes).trim().to_string();
        let body = if body.is_empty() {
            "<empty>".to_string()
        } else {
            body
        };
        return Err(GatewayError::Http { status, body });
    }

    serde_json::from_slice::<T>(&bytes).map_err(|error| GatewayError::Decode {
        message: error.to_string(),
    })
}
