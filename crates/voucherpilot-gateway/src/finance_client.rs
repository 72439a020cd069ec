//! Finance/OCR service client: voucher submission, master-data reads, and
//! the per-agency module lookup. Every call routes through the secure
//! gateway, so any of them can end the session (`Ok(None)`).

use rand::Rng;
use serde::{Deserialize, Serialize};

use voucherpilot_client_core::attachment::Attachment;
use voucherpilot_client_core::invoice::InvoiceFields;
use voucherpilot_client_core::master_data::{MasterDataItem, ModuleContext};

use crate::secure::SecureGateway;
use crate::{GatewayError, normalize_base_url};

pub const SEND_VOUCHER_PATH: &str = "/Vouchers/SendVoucherForOCR";
pub const READ_MASTER_DATA_PATH: &str = "/Vouchers/ReadMasterDataForOCR";

const FILE_CODE_RANGE: u32 = 1_000_000;

/// One attachment as the OCR service expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherOcrRequest {
    pub file_name: String,
    pub file_code: String,
    pub file_type: u8,
    pub file_category: u8,
    pub file_extension: String,
    pub file_size: u64,
    pub file_guid: String,
    pub file_base64: String,
    pub recognized: bool,
}

impl VoucherOcrRequest {
    /// Builds the submission payload. The attachment must already carry its
    /// resolved base64 content.
    pub fn from_attachment(attachment: &Attachment) -> Result<Self, GatewayError> {
        let file_base64 = attachment.file_base64.clone().ok_or_else(|| {
            GatewayError::AttachmentContentMissing {
                id: attachment.id.clone(),
            }
        })?;

        Ok(Self {
            file_name: attachment.name.clone(),
            file_code: rand::rng().random_range(0..FILE_CODE_RANGE).to_string(),
            file_type: 0,
            file_category: 0,
            file_extension: attachment.extension(),
            file_size: attachment.size,
            file_guid: uuid::Uuid::new_v4().to_string(),
            file_base64,
            recognized: true,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserModuleRecord {
    id: i64,
    #[serde(rename = "moduleId")]
    module_id: i64,
    #[serde(rename = "edmModuleEntity")]
    edm_module_entity: i64,
    #[serde(rename = "edmAgencyCode")]
    edm_agency_code: String,
}

#[derive(Clone)]
pub struct FinanceClient {
    gateway: SecureGateway,
    finance_base: String,
    auth_base: String,
}

impl FinanceClient {
    pub fn new(
        gateway: SecureGateway,
        finance_base: &str,
        auth_base: &str,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            gateway,
            finance_base: normalize_base_url(finance_base)?,
            auth_base: normalize_base_url(auth_base)?,
        })
    }

    #[must_use]
    pub fn send_voucher_url(&self) -> String {
        format!("{}{SEND_VOUCHER_PATH}", self.finance_base)
    }

    #[must_use]
    pub fn read_master_data_url(&self) -> String {
        format!("{}{READ_MASTER_DATA_PATH}", self.finance_base)
    }

    #[must_use]
    pub fn user_modules_url(&self, agency_code: &str) -> String {
        format!(
            "{}/usermodules/GetUserModulesByModuleNameForAgency/Finance/{}",
            self.auth_base,
            agency_code.trim()
        )
    }

    /// Submits one attachment for extraction. `Ok(None)` means the session
    /// ended underneath the call.
    pub async fn send_voucher_for_ocr(
        &self,
        attachment: &Attachment,
    ) -> Result<Option<InvoiceFields>, GatewayError> {
        let request = VoucherOcrRequest::from_attachment(attachment)?;
        let payload = serde_json::to_value(&request).map_err(|error| GatewayError::Decode {
            message: error.to_string(),
        })?;

        tracing::info!(
            target: "voucherpilot.finance",
            file = %request.file_name,
            size = request.file_size,
            "submitting voucher for OCR",
        );

        let Some(body) = self
            .gateway
            .secure_post(&self.send_voucher_url(), &payload, &[])
            .await?
        else {
            return Ok(None);
        };

        let fields =
            serde_json::from_value::<InvoiceFields>(body).map_err(|error| {
                GatewayError::MalformedResponse {
                    message: format!("ocr response: {error}"),
                }
            })?;
        Ok(Some(fields))
    }

    /// Reads the reference tables for the given module context.
    pub async fn read_master_data(
        &self,
        context: &ModuleContext,
        agency_code: &str,
    ) -> Result<Option<Vec<MasterDataItem>>, GatewayError> {
        let headers = context.context_headers(agency_code);
        let Some(body) = self
            .gateway
            .secure_post(&self.read_master_data_url(), &serde_json::json!({}), &headers)
            .await?
        else {
            return Ok(None);
        };

        if !body.is_array() {
            return Err(GatewayError::MalformedResponse {
                message: "master data response is not an array".to_string(),
            });
        }
        let items = serde_json::from_value::<Vec<MasterDataItem>>(body).map_err(|error| {
            GatewayError::MalformedResponse {
                message: format!("master data response: {error}"),
            }
        })?;
        tracing::info!(
            target: "voucherpilot.finance",
            rows = items.len(),
            "master data loaded",
        );
        Ok(Some(items))
    }

    /// Resolves the module/entity identifiers for an agency. The route is
    /// GET-shaped but the service accepts it through the same secure POST
    /// path as everything else.
    pub async fn fetch_module_context(
        &self,
        agency_code: &str,
    ) -> Result<Option<ModuleContext>, GatewayError> {
        let Some(body) = self
            .gateway
            .secure_post(&self.user_modules_url(agency_code), &serde_json::json!({}), &[])
            .await?
        else {
            return Ok(None);
        };

        let record =
            serde_json::from_value::<UserModuleRecord>(body).map_err(|error| {
                GatewayError::MalformedResponse {
                    message: format!("user module response: {error}"),
                }
            })?;
        Ok(Some(ModuleContext {
            entity_id: record.id,
            module_id: record.module_id,
            edm_module_entity_id: record.edm_module_entity,
            edm_agency: record.edm_agency_code,
        }))
    }
}
