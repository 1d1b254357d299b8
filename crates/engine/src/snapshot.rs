// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot manager
//!
//! Decides when a snapshot is due (see [`SnapshotCadence`]) and serializes
//! full document state on the blocking pool. At most one serialization is
//! in flight per document; a trigger arriving meanwhile is dropped, and the
//! growing backlog fires the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use vellum_core::{
    Clock, Compression, DocumentId, DocumentState, SharedTelemetry, SnapshotCadence,
    SnapshotConfig, SnapshotTrigger, TelemetrySample,
};
use vellum_storage::{codec, CodecError, EncodedSnapshot, EventStore, SnapshotWrite, StoreError};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot too large: estimated {estimated} bytes exceeds limit of {max}")]
    TooLarge { estimated: u64, max: u64 },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization task failed: {0}")]
    Task(String),
}

/// Where the per-document snapshot state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPhase {
    Idle,
    Pending,
    Serializing,
}

/// In-flight marker shared by background and manual snapshots
#[derive(Debug)]
struct Flight {
    busy: AtomicBool,
    phase: Mutex<SnapshotPhase>,
}

impl Flight {
    fn set_phase(&self, phase: SnapshotPhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    fn phase(&self) -> SnapshotPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exclusive right to serialize; released on drop
#[derive(Debug)]
struct Slot {
    flight: Arc<Flight>,
}

impl Slot {
    fn claim(flight: &Arc<Flight>) -> Option<Self> {
        flight
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        flight.set_phase(SnapshotPhase::Pending);
        Some(Self {
            flight: Arc::clone(flight),
        })
    }

    fn serializing(&self) {
        self.flight.set_phase(SnapshotPhase::Serializing);
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.flight.set_phase(SnapshotPhase::Idle);
        self.flight.busy.store(false, Ordering::Release);
    }
}

/// Holds the serialization slot for a manual snapshot until it is
/// committed or dropped
#[derive(Debug)]
pub struct SnapshotTicket {
    sequence: u64,
    started: Instant,
    uncompressed_bytes: u64,
    compressed_bytes: u64,
    _slot: Slot,
}

impl SnapshotTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// A manual snapshot serialized and ready to be written by the save path
#[derive(Debug)]
pub struct PreparedSnapshot {
    pub encoded: EncodedSnapshot,
    pub ticket: SnapshotTicket,
}

struct Inner<C: Clock> {
    store: EventStore,
    document_id: DocumentId,
    config: SnapshotConfig,
    cadence: Mutex<SnapshotCadence<C>>,
    flight: Arc<Flight>,
    task: Mutex<Option<JoinHandle<()>>>,
    telemetry: SharedTelemetry,
}

/// Snapshot scheduling and serialization for one document
pub struct SnapshotManager<C: Clock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for SnapshotManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock> SnapshotManager<C> {
    /// Resume cadence from the newest stored snapshot and the log head
    pub async fn attach(
        store: EventStore,
        document_id: DocumentId,
        config: SnapshotConfig,
        clock: C,
        telemetry: SharedTelemetry,
    ) -> Result<Self, SnapshotError> {
        let last_snapshot = store
            .list_snapshots(&document_id)
            .await?
            .last()
            .map(|s| s.sequence);
        let head = store.max_sequence(&document_id).await?;
        let cadence = SnapshotCadence::new(config.clone(), clock, last_snapshot, head);
        tracing::debug!(
            document_id = %document_id,
            ?last_snapshot,
            ?head,
            backlog = cadence.backlog(),
            "snapshot manager attached"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                document_id,
                config,
                cadence: Mutex::new(cadence),
                flight: Arc::new(Flight {
                    busy: AtomicBool::new(false),
                    phase: Mutex::new(SnapshotPhase::Idle),
                }),
                task: Mutex::new(None),
                telemetry,
            }),
        })
    }

    pub fn phase(&self) -> SnapshotPhase {
        self.inner.flight.phase()
    }

    /// Events recorded since the last snapshot
    pub fn backlog(&self) -> u64 {
        self.inner.cadence().backlog()
    }

    pub fn last_snapshot_sequence(&self) -> Option<u64> {
        self.inner.cadence().last_snapshot_sequence()
    }

    /// Note an appended edit; starts a background snapshot of `state` when
    /// the event-count trigger fires. Returns whether one was started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn record_event(&self, sequence: u64, state: &DocumentState) -> bool {
        let trigger = self.inner.cadence().record_event(sequence);
        match trigger {
            Some(trigger) => self.start(sequence, state, trigger),
            None => false,
        }
    }

    /// Count an appended event without considering a trigger
    pub fn note_appended(&self, sequence: u64) {
        self.inner.cadence().record_event(sequence);
    }

    /// Wall-clock tick; snapshots `state` at `sequence` when the timer is
    /// due and something changed since the last snapshot
    pub fn on_timer(&self, sequence: u64, state: &DocumentState) -> bool {
        let trigger = self.inner.cadence().timer_due();
        match trigger {
            Some(trigger) => self.start(sequence, state, trigger),
            None => false,
        }
    }

    /// Serialize a snapshot for a manual save, if the backlog warrants one
    ///
    /// Waits for a background serialization to finish first. The returned
    /// ticket keeps the slot until [`SnapshotManager::commit_manual`].
    pub async fn prepare_manual(
        &self,
        sequence: u64,
        state: &DocumentState,
    ) -> Result<Option<PreparedSnapshot>, SnapshotError> {
        let backlog = self.backlog();
        let min_backlog = self.inner.config.save_snapshot_min_backlog.max(1);
        if backlog < min_backlog {
            tracing::debug!(sequence, backlog, min_backlog, "save without snapshot");
            return Ok(None);
        }

        self.wait_idle().await;
        let Some(slot) = Slot::claim(&self.inner.flight) else {
            tracing::debug!(sequence, "snapshot in flight, save proceeds without one");
            return Ok(None);
        };
        self.inner.guard_size(sequence, state)?;

        let copy = state.clone();
        slot.serializing();
        let started = Instant::now();
        let encoded = encode(copy, sequence, self.inner.config.compression).await?;

        Ok(Some(PreparedSnapshot {
            ticket: SnapshotTicket {
                sequence,
                started,
                uncompressed_bytes: encoded.uncompressed_len,
                compressed_bytes: encoded.data.len() as u64,
                _slot: slot,
            },
            encoded,
        }))
    }

    /// Record that a prepared manual snapshot was written
    pub fn commit_manual(&self, ticket: SnapshotTicket) {
        self.inner.finish(
            ticket.sequence,
            SnapshotTrigger::Manual,
            ticket.started.elapsed(),
            ticket.uncompressed_bytes,
            ticket.compressed_bytes,
        );
    }

    /// Wait for the in-flight background serialization, if any
    pub async fn wait_idle(&self) {
        let handle = self
            .inner
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "snapshot task ended abnormally");
            }
        }
    }

    fn start(&self, sequence: u64, state: &DocumentState, trigger: SnapshotTrigger) -> bool {
        let Some(slot) = Slot::claim(&self.inner.flight) else {
            tracing::debug!(sequence, %trigger, "snapshot in flight, trigger dropped");
            return false;
        };
        if self.inner.guard_size(sequence, state).is_err() {
            return false;
        }

        // Point-in-time copy; the caller keeps mutating its own state
        let copy = state.clone();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            if let Err(e) = inner.write(copy, sequence, trigger, slot).await {
                tracing::warn!(sequence, %trigger, error = %e, "background snapshot failed");
                inner.telemetry.record(TelemetrySample::SnapshotSkipped {
                    sequence,
                    reason: e.to_string(),
                });
            }
        });
        *self.inner.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        true
    }
}

impl<C: Clock> Inner<C> {
    fn cadence(&self) -> MutexGuard<'_, SnapshotCadence<C>> {
        self.cadence.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Warn above the soft limit, refuse above the hard one
    fn guard_size(&self, sequence: u64, state: &DocumentState) -> Result<(), SnapshotError> {
        let estimated = state.estimated_size_bytes();
        if estimated > self.config.max_bytes {
            tracing::warn!(
                sequence,
                estimated,
                max = self.config.max_bytes,
                "snapshot skipped, state too large"
            );
            let err = SnapshotError::TooLarge {
                estimated,
                max: self.config.max_bytes,
            };
            self.telemetry.record(TelemetrySample::SnapshotSkipped {
                sequence,
                reason: err.to_string(),
            });
            return Err(err);
        }
        if estimated > self.config.warn_bytes {
            tracing::warn!(
                sequence,
                estimated,
                warn = self.config.warn_bytes,
                "large snapshot"
            );
        }
        Ok(())
    }

    async fn write(
        &self,
        state: DocumentState,
        sequence: u64,
        trigger: SnapshotTrigger,
        slot: Slot,
    ) -> Result<SnapshotWrite, SnapshotError> {
        slot.serializing();
        let started = Instant::now();
        let encoded = encode(state, sequence, self.config.compression).await?;
        let uncompressed = encoded.uncompressed_len;
        let compressed = encoded.data.len() as u64;

        let write = self
            .store
            .write_snapshot(&self.document_id, encoded, self.config.retained_snapshots())
            .await?;
        self.finish(sequence, trigger, started.elapsed(), uncompressed, compressed);
        drop(slot);
        Ok(write)
    }

    fn finish(
        &self,
        sequence: u64,
        trigger: SnapshotTrigger,
        duration: Duration,
        uncompressed_bytes: u64,
        compressed_bytes: u64,
    ) {
        let (activity, effective_interval, backlog) = {
            let mut cadence = self.cadence();
            cadence.mark_snapshot(sequence);
            (
                cadence.activity(),
                cadence.effective_interval(),
                cadence.backlog(),
            )
        };
        tracing::info!(
            document_id = %self.document_id,
            sequence,
            %trigger,
            %activity,
            effective_interval,
            uncompressed_bytes,
            compressed_bytes,
            elapsed_ms = duration.as_millis() as u64,
            "snapshot written"
        );
        self.telemetry.record(TelemetrySample::SnapshotWritten {
            sequence,
            duration,
            uncompressed_bytes,
            compressed_bytes,
            activity,
            effective_interval,
            backlog,
        });
    }
}

async fn encode(
    state: DocumentState,
    sequence: u64,
    compression: Compression,
) -> Result<EncodedSnapshot, SnapshotError> {
    tokio::task::spawn_blocking(move || codec::encode(&state, sequence, compression))
        .await
        .map_err(|e| SnapshotError::Task(e.to_string()))?
        .map_err(SnapshotError::from)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
