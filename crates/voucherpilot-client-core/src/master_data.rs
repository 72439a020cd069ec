//! Reference ("master") data: the lookup tables the finance backend serves
//! once per session, used to resolve coded values to display labels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const GROUP_SUPPLIERS: &str = "Suppliers";
pub const GROUP_COST_CENTERS: &str = "CostCenter";
pub const GROUP_ACCOUNTS: &str = "Accounts";
pub const GROUP_TAXES: &str = "Taxes";

/// One reference row. Read-only after load. The wire field is spelled
/// `groupe` by the backend; that spelling is part of the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterDataItem {
    #[serde(rename = "groupe")]
    pub group: String,
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub text_value: String,
    #[serde(default)]
    pub double_value: f64,
    #[serde(default)]
    pub is_default: bool,
}

/// Module/entity identifiers resolved per agency; attached as headers to
/// every finance call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleContext {
    pub entity_id: i64,
    pub module_id: i64,
    pub edm_module_entity_id: i64,
    pub edm_agency: String,
}

impl ModuleContext {
    /// Header map the finance backend expects on master-data reads.
    #[must_use]
    pub fn context_headers(&self, agency_code: &str) -> Vec<(String, String)> {
        vec![
            ("edmagency".to_string(), self.edm_agency.clone()),
            (
                "edmmoduleentityid".to_string(),
                self.edm_module_entity_id.to_string(),
            ),
            ("entityid".to_string(), self.entity_id.to_string()),
            ("moduleid".to_string(), self.module_id.to_string()),
            ("agencycode".to_string(), agency_code.to_string()),
        ]
    }
}

#[must_use]
pub fn items_in_group<'a>(items: &'a [MasterDataItem], group: &str) -> Vec<&'a MasterDataItem> {
    items.iter().filter(|item| item.group == group).collect()
}

/// Tax rows grouped by their rate text, preserving a stable rate order.
#[must_use]
pub fn tax_groups(items: &[MasterDataItem]) -> BTreeMap<String, Vec<MasterDataItem>> {
    let mut grouped: BTreeMap<String, Vec<MasterDataItem>> = BTreeMap::new();
    for item in items.iter().filter(|item| item.group == GROUP_TAXES) {
        grouped
            .entry(item.text_value.clone())
            .or_default()
            .push(item.clone());
    }
    grouped
}

/// Resolves a code to its display label within a group.
#[must_use]
pub fn label_for<'a>(items: &'a [MasterDataItem], group: &str, code: &str) -> Option<&'a str> {
    items
        .iter()
        .find(|item| item.group == group && item.code == code)
        .map(|item| item.label.as_str())
}

/// The row flagged as the group's default selection, if any.
#[must_use]
pub fn default_item<'a>(items: &'a [MasterDataItem], group: &str) -> Option<&'a MasterDataItem> {
    items
        .iter()
        .find(|item| item.group == group && item.is_default)
}
