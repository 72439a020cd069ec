//! Extracted invoice fields and the local editing model.
//!
//! The record is created from the OCR response and mutated only through form
//! edits; edits never leave the plugin — the in-scope boundary ends at
//! display.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Currency display list for the form's currency picker.
pub const CURRENCIES: &[&str] = &[
    "USD", "EUR", "CHF", "GBP", "TND", "NZD", "AOA", "CFA", "GYD", "ZAR", "NAD",
];

/// Tax-rate display list used when no master data is available.
pub const TAX_CODES: &[&str] = &["0", "10", "19", "20"];

/// Structured record extracted by the OCR service. Every field defaults so a
/// partial extraction still decodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceFields {
    pub invoice_number: String,
    pub invoice_currency: String,
    pub invoice_date: String,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub due_date: String,
    pub invoice_issuer_name_only: String,
    pub invoice_title: String,
    pub invoice_detail_summary: String,
    pub voucher_tax_code: String,
    pub account_number: String,
    pub file_number: String,
    pub cost_center: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<InvoiceSuggestions>,
}

/// System-suggested corrections returned alongside the extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceSuggestions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_supplier_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_cost_center: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_tax_codes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_tax_code_list: Option<Vec<String>>,
}

/// One local form edit. Applying an edit replaces a single field in place.
#[derive(Debug, Clone, PartialEq)]
pub enum InvoiceEdit {
    InvoiceNumber(String),
    InvoiceCurrency(String),
    InvoiceDate(String),
    TaxAmount(f64),
    TotalAmount(f64),
    DueDate(String),
    InvoiceIssuerNameOnly(String),
    InvoiceTitle(String),
    InvoiceDetailSummary(String),
    VoucherTaxCode(String),
    AccountNumber(String),
    FileNumber(String),
    CostCenter(String),
}

impl InvoiceFields {
    pub fn apply_edit(&mut self, edit: InvoiceEdit) {
        match edit {
            InvoiceEdit::InvoiceNumber(value) => self.invoice_number = value,
            InvoiceEdit::InvoiceCurrency(value) => self.invoice_currency = value,
            InvoiceEdit::InvoiceDate(value) => self.invoice_date = value,
            InvoiceEdit::TaxAmount(value) => self.tax_amount = value,
            InvoiceEdit::TotalAmount(value) => self.total_amount = value,
            InvoiceEdit::DueDate(value) => self.due_date = value,
            InvoiceEdit::InvoiceIssuerNameOnly(value) => self.invoice_issuer_name_only = value,
            InvoiceEdit::InvoiceTitle(value) => self.invoice_title = value,
            InvoiceEdit::InvoiceDetailSummary(value) => self.invoice_detail_summary = value,
            InvoiceEdit::VoucherTaxCode(value) => self.voucher_tax_code = value,
            InvoiceEdit::AccountNumber(value) => self.account_number = value,
            InvoiceEdit::FileNumber(value) => self.file_number = value,
            InvoiceEdit::CostCenter(value) => self.cost_center = value,
        }
    }
}

/// Total minus the per-code tax amounts the user has ticked. Codes without a
/// custom amount contribute zero.
#[must_use]
pub fn tax_excluded_amount(
    total_amount: f64,
    selected_codes: &[String],
    custom_amounts: &HashMap<String, f64>,
) -> f64 {
    let selected_total: f64 = selected_codes
        .iter()
        .map(|code| custom_amounts.get(code).copied().unwrap_or(0.0))
        .sum();
    total_amount - selected_total
}
