#![cfg_attr(test, allow(clippy::expect_used))]

//! Host-independent core of the add-in: the capability traits the host
//! runtime is consumed through, session/token state, the one-shot attachment
//! hand-off channel, and the invoice/master-data model.

pub mod attachment;
pub mod handoff;
pub mod host;
pub mod invoice;
pub mod master_data;
pub mod session;
pub mod settings;
pub mod token_codec;

pub use attachment::{Attachment, AttachmentSource, AttachmentSourceError};
pub use handoff::{HandoffBackend, HandoffChannel, PersistentHandoff, TransientHandoff};
pub use host::{DialogHandle, ModalLauncher, ReadySignal};
pub use invoice::{InvoiceFields, InvoiceSuggestions};
pub use master_data::{MasterDataItem, ModuleContext};
pub use session::{Session, SessionManager};
pub use settings::{MemorySettingsStore, SettingsError, SettingsStore};
