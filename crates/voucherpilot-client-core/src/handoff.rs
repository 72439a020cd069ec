//! One-shot attachment hand-off between the panel and the dialog window.
//!
//! Contract: the panel opens the dialog, waits (bounded) for its ready
//! signal, then writes the serialized attachment set under a fixed record
//! name; the dialog takes the record exactly once — a take is a read followed
//! by a delete, so a second reader finds the channel empty. Attachments are
//! copied across the boundary, never mutated.
//!
//! Two interchangeable backends implement the same channel: a transient
//! session-scoped store for ordinary payloads and a durable single-record
//! store for payloads too large for the session store's budget.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;
use crate::host::ReadySignal;

/// Bounded wait for the dialog's ready signal before the writer proceeds.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Session-scoped stores budget around five megabytes; above this the
/// durable backend is the safe choice.
pub const TRANSIENT_PAYLOAD_LIMIT_BYTES: usize = 4 * 1024 * 1024;

const HANDOFF_SCHEMA_VERSION: u32 = 1;
const HANDOFF_FILE_NAME: &str = "attachment-handoff.v1.json";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandoffError {
    #[error("handoff_encode_failed:{message}")]
    Encode { message: String },
    #[error("handoff_store_failed:{message}")]
    Store { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffBackend {
    Transient,
    Persistent,
}

/// Picks a backend for the given encoded payload size.
#[must_use]
pub fn choose_backend(total_payload_bytes: usize) -> HandoffBackend {
    if total_payload_bytes < TRANSIENT_PAYLOAD_LIMIT_BYTES {
        HandoffBackend::Transient
    } else {
        HandoffBackend::Persistent
    }
}

pub trait HandoffChannel: Send + Sync {
    fn put(&self, attachments: Vec<Attachment>) -> Result<(), HandoffError>;

    /// Reads and deletes the stored record. At-most-once: after a successful
    /// take the channel is empty.
    fn take(&self) -> Result<Option<Vec<Attachment>>, HandoffError>;

    fn is_empty(&self) -> bool;
}

/// Writer-side sequence: bounded ready wait, then put. Returns whether the
/// ready signal was observed before the bound elapsed.
pub async fn deliver(
    channel: &dyn HandoffChannel,
    ready: &ReadySignal,
    attachments: Vec<Attachment>,
    timeout: Duration,
) -> Result<bool, HandoffError> {
    let signaled = ready.wait(timeout).await;
    if !signaled {
        tracing::warn!(
            target: "voucherpilot.handoff",
            timeout_ms = timeout.as_millis() as u64,
            "dialog ready signal not observed in time; writing anyway",
        );
    }
    channel.put(attachments)?;
    Ok(signaled)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HandoffDocument {
    version: u32,
    stored_at: String,
    attachments: Vec<Attachment>,
}

fn encode_document(attachments: Vec<Attachment>) -> Result<String, HandoffError> {
    serde_json::to_string(&HandoffDocument {
        version: HANDOFF_SCHEMA_VERSION,
        stored_at: Utc::now().to_rfc3339(),
        attachments,
    })
    .map_err(|error| HandoffError::Encode {
        message: error.to_string(),
    })
}

fn decode_document(raw: &str) -> Option<Vec<Attachment>> {
    match serde_json::from_str::<HandoffDocument>(raw) {
        Ok(document) if document.version == HANDOFF_SCHEMA_VERSION => Some(document.attachments),
        Ok(document) => {
            tracing::warn!(
                target: "voucherpilot.handoff",
                version = document.version,
                "hand-off record has unknown schema version; dropping",
            );
            None
        }
        Err(error) => {
            tracing::warn!(
                target: "voucherpilot.handoff",
                error = %error,
                "hand-off record is corrupt; dropping",
            );
            None
        }
    }
}

/// In-memory session-scoped backend. The record lives only as long as the
/// add-in session; both windows share the instance.
#[derive(Debug, Default)]
pub struct TransientHandoff {
    record: Mutex<Option<String>>,
}

impl TransientHandoff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandoffChannel for TransientHandoff {
    fn put(&self, attachments: Vec<Attachment>) -> Result<(), HandoffError> {
        let encoded = encode_document(attachments)?;
        let mut record = self.record.lock().map_err(|_| HandoffError::Store {
            message: "hand-off mutex poisoned".to_string(),
        })?;
        *record = Some(encoded);
        Ok(())
    }

    fn take(&self) -> Result<Option<Vec<Attachment>>, HandoffError> {
        let mut record = self.record.lock().map_err(|_| HandoffError::Store {
            message: "hand-off mutex poisoned".to_string(),
        })?;
        Ok(record.take().as_deref().and_then(decode_document))
    }

    fn is_empty(&self) -> bool {
        self.record
            .lock()
            .map(|record| record.is_none())
            .unwrap_or(true)
    }
}

/// Durable single-record backend for payloads that exceed the session-store
/// budget. Corrupt files degrade to an empty channel.
#[derive(Debug, Clone)]
pub struct PersistentHandoff {
    path: PathBuf,
}

impl PersistentHandoff {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(HANDOFF_FILE_NAME),
        }
    }
}

impl HandoffChannel for PersistentHandoff {
    fn put(&self, attachments: Vec<Attachment>) -> Result<(), HandoffError> {
        let encoded = encode_document(attachments)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| HandoffError::Store {
                message: format!("hand-off mkdir failed: {error}"),
            })?;
        }
        fs::write(&self.path, encoded).map_err(|error| HandoffError::Store {
            message: format!("hand-off write failed: {error}"),
        })
    }

    fn take(&self) -> Result<Option<Vec<Attachment>>, HandoffError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(HandoffError::Store {
                    message: format!("hand-off read failed: {error}"),
                });
            }
        };

        fs::remove_file(&self.path).map_err(|error| HandoffError::Store {
            message: format!("hand-off delete failed: {error}"),
        })?;

        Ok(decode_document(&raw))
    }

    fn is_empty(&self) -> bool {
        !self.path.exists()
    }
}
