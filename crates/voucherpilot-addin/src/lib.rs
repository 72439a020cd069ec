#![cfg_attr(test, allow(clippy::expect_used))]

//! Composition of the add-in: per-agency endpoint configuration, the main
//! panel flow (login, attachment collection, dialog hand-off), the dialog
//! flow (take, OCR submission, local editing), and the reference-data
//! provider.

pub mod config;
pub mod dialog;
pub mod logging;
pub mod panel;
pub mod reference_data;

pub use config::{AgencyEndpoints, AppSettings, ConfigError};
pub use dialog::{DialogError, DialogFlow, DialogInit, VoucherEditState};
pub use panel::{HandoffReport, LoginForm, PanelError, PanelFlow};
pub use reference_data::{ReferenceDataProvider, ReferenceError};
