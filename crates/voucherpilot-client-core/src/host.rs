//! Dialog-window capability of the host runtime.
//!
//! The host's own window messaging is unreliable for multi-megabyte payloads,
//! so the dialog only ever signals readiness through it; the payload itself
//! travels through a hand-off channel (see `handoff`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("dialog_open_failed:{message}")]
    DialogOpen { message: String },
}

/// One-shot readiness flag set by the dialog once its runtime has booted.
/// Cloning shares the underlying signal.
#[derive(Clone, Default)]
pub struct ReadySignal {
    inner: Arc<ReadySignalInner>,
}

#[derive(Default)]
struct ReadySignalInner {
    ready: AtomicBool,
    notify: Notify,
}

impl ReadySignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        self.inner.ready.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Waits for the dialog's ready signal, bounded by `timeout`. Returns
    /// `false` when the bound elapses first; the writer proceeds either way
    /// rather than blocking the panel indefinitely.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let bounded = tokio::time::timeout(timeout, async {
            loop {
                if self.inner.ready.load(Ordering::Acquire) {
                    return;
                }
                let notified = self.inner.notify.notified();
                if self.inner.ready.load(Ordering::Acquire) {
                    return;
                }
                notified.await;
            }
        });
        bounded.await.is_ok()
    }
}

/// Handle to an open dialog window.
#[derive(Clone)]
pub struct DialogHandle {
    pub ready: ReadySignal,
}

/// Host surface for opening the secondary dialog window and resetting the
/// hosting view after a forced logout.
#[async_trait]
pub trait ModalLauncher: Send + Sync {
    async fn open_dialog(&self, url: &str) -> Result<DialogHandle, HostError>;
    fn reload_view(&self);
}
