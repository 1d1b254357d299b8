// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-save coordinator
//!
//! Pure debounce over "event recorded" signals. Each signal restarts an idle
//! timer; when it fires, the store head is compared with the last flushed
//! watermark and, if it moved, the WAL is checkpointed and the watermark
//! advanced. Auto-save never appends a `document.saved` marker.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use vellum_core::{AutoSaveConfig, DocumentId};
use vellum_storage::{EventStore, StoreError};

struct Inner {
    store: EventStore,
    document_id: DocumentId,
    watermark: tokio::sync::Mutex<Option<u64>>,
}

impl Inner {
    /// Advance the watermark to the store head; returns the head
    async fn flush(&self) -> Result<Option<u64>, StoreError> {
        let mut watermark = self.watermark.lock().await;
        let head = self.store.max_sequence(&self.document_id).await?;
        if head != *watermark {
            self.store.checkpoint().await?;
            tracing::debug!(
                document_id = %self.document_id,
                from = ?*watermark,
                to = ?head,
                "auto-save flushed"
            );
            *watermark = head;
        }
        Ok(head)
    }
}

/// Debounced flush of recorded edits for one document
pub struct AutoSave {
    inner: Arc<Inner>,
    debounce: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AutoSave {
    /// Start with everything already in the store counted as flushed
    pub async fn attach(
        store: EventStore,
        document_id: DocumentId,
        config: &AutoSaveConfig,
    ) -> Result<Self, StoreError> {
        let head = store.max_sequence(&document_id).await?;
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                document_id,
                watermark: tokio::sync::Mutex::new(head),
            }),
            debounce: config.debounce,
            timer: Mutex::new(None),
        })
    }

    /// An event was recorded: restart the idle timer
    ///
    /// Must be called from within a tokio runtime.
    pub fn notify(&self) {
        let inner = Arc::clone(&self.inner);
        let debounce = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            // Failures are retried by the next debounce cycle
            if let Err(e) = inner.flush().await {
                tracing::warn!(
                    document_id = %inner.document_id,
                    error = %e,
                    "auto-save flush failed"
                );
            }
        });

        let previous = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Cancel the pending timer and flush now, returning the store head
    pub async fn flush_pending(&self) -> Result<Option<u64>, StoreError> {
        self.cancel();
        self.inner.flush().await
    }

    /// Head sequence at the last flush
    pub async fn watermark(&self) -> Option<u64> {
        *self.inner.watermark.lock().await
    }

    /// Whether a debounce timer is still waiting to fire
    pub fn has_pending(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Drop the pending timer without flushing
    pub fn cancel(&self) {
        let pending = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = pending {
            handle.abort();
        }
    }
}

impl Drop for AutoSave {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "autosave_tests.rs"]
mod tests;
