// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual save orchestrator
//!
//! A save flushes auto-save, compares the head with the last manual save,
//! appends a `document.saved` marker, and then writes metadata together with
//! an optional snapshot in one transaction. One save runs at a time per
//! document; a second concurrent save fails immediately.

use crate::autosave::AutoSave;
use crate::navigator::Navigator;
use crate::snapshot::{SnapshotError, SnapshotManager};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use vellum_core::event::{DocumentSavedOp, HistoryRevertedOp};
use vellum_core::{Clock, DocumentId, EventKind, NewEvent, SharedTelemetry, TelemetrySample};
use vellum_storage::{EventStore, MetadataUpdate, StoreError};

const SAVED_MARKER: &str = "document.saved";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("a save is already in progress")]
    AlreadyInProgress,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Result of a manual save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved {
        /// Sequence of the `document.saved` marker
        sequence: u64,
        wrote_snapshot: bool,
    },
    SkippedNoChanges {
        sequence: Option<u64>,
    },
}

/// Proof that this caller owns the save slot; released on drop
#[derive(Debug)]
pub struct SaveGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Manual save path for one document
pub struct SaveOrchestrator {
    store: EventStore,
    document_id: DocumentId,
    in_flight: Arc<AtomicBool>,
    last_saved: Mutex<Option<u64>>,
    keep_snapshots: usize,
    telemetry: SharedTelemetry,
}

impl SaveOrchestrator {
    /// Pick up the last manual save from the newest stored marker
    pub async fn attach(
        store: EventStore,
        document_id: DocumentId,
        keep_snapshots: usize,
        telemetry: SharedTelemetry,
    ) -> Result<Self, StoreError> {
        let last_saved = store.latest_of_type(&document_id, SAVED_MARKER).await?;
        Ok(Self {
            store,
            document_id,
            in_flight: Arc::new(AtomicBool::new(false)),
            last_saved: Mutex::new(last_saved),
            keep_snapshots,
            telemetry,
        })
    }

    /// Claim the save slot without waiting
    pub fn begin(&self) -> Result<SaveGuard, SaveError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SaveError::AlreadyInProgress)?;
        Ok(SaveGuard {
            flag: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Sequence of the last manual save marker
    pub fn last_saved(&self) -> Option<u64> {
        *self.last_saved.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a save holding `guard`
    ///
    /// If the navigator is behind the head the visible state is what gets
    /// saved: a revert marker is appended before the saved marker.
    pub async fn save<C: Clock>(
        &self,
        guard: SaveGuard,
        autosave: &AutoSave,
        snapshots: &SnapshotManager<C>,
        navigator: &mut Navigator,
    ) -> Result<SaveOutcome, SaveError> {
        let started = Instant::now();
        let head = autosave.flush_pending().await?;

        if head == self.last_saved() && !navigator.is_behind_head() {
            tracing::debug!(document_id = %self.document_id, ?head, "save skipped, no changes");
            return Ok(SaveOutcome::SkippedNoChanges { sequence: head });
        }

        if navigator.is_behind_head() {
            if let Some(cursor) = navigator.cursor() {
                let revert = EventKind::HistoryReverted(HistoryRevertedOp {
                    to_sequence: cursor,
                });
                self.append(revert, navigator, snapshots).await?;
            }
        }

        let title = self.title_for(navigator).await?;
        let marker = EventKind::DocumentSaved(DocumentSavedOp {
            title: title.clone(),
        });
        let sequence = self.append(marker, navigator, snapshots).await?;

        let state = navigator.state();
        let prepared = match snapshots.prepare_manual(sequence, &state).await {
            Ok(prepared) => prepared,
            Err(SnapshotError::TooLarge { estimated, max }) => {
                tracing::warn!(sequence, estimated, max, "saving without snapshot");
                None
            }
            Err(e) => return Err(e.into()),
        };
        let (encoded, ticket) = match prepared {
            Some(p) => (Some(p.encoded), Some(p.ticket)),
            None => (None, None),
        };

        let write = self
            .store
            .save_checkpoint(
                &self.document_id,
                MetadataUpdate {
                    title,
                    modified_at: Utc::now(),
                },
                encoded,
                self.keep_snapshots,
            )
            .await?;
        let wrote_snapshot = write.is_some();
        if let (Some(ticket), Some(_)) = (ticket, write) {
            snapshots.commit_manual(ticket);
        }

        *self.last_saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(sequence);
        drop(guard);

        let duration = started.elapsed();
        tracing::info!(
            document_id = %self.document_id,
            sequence,
            wrote_snapshot,
            elapsed_ms = duration.as_millis() as u64,
            "document saved"
        );
        self.telemetry.record(TelemetrySample::SaveCompleted {
            sequence,
            duration,
            wrote_snapshot,
        });
        Ok(SaveOutcome::Saved {
            sequence,
            wrote_snapshot,
        })
    }

    async fn append<C: Clock>(
        &self,
        kind: EventKind,
        navigator: &mut Navigator,
        snapshots: &SnapshotManager<C>,
    ) -> Result<u64, StoreError> {
        let sequence = self
            .store
            .append(&self.document_id, NewEvent::now(kind.clone()))
            .await?;
        navigator.record_appended(sequence, &kind);
        snapshots.note_appended(sequence);
        Ok(sequence)
    }

    /// The document's own title, or the stored one while it has none
    async fn title_for(&self, navigator: &Navigator) -> Result<String, StoreError> {
        let state = navigator.state();
        if !state.title.is_empty() {
            return Ok(state.title.clone());
        }
        Ok(self
            .store
            .metadata()
            .await?
            .map(|m| m.title)
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "save_tests.rs"]
mod tests;
