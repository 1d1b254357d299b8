// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document session
//!
//! The handle an editor holds for one open document. Edits are checked
//! against the visible state, appended to the log, and then fanned out to
//! the navigator, the snapshot manager and auto-save. A background task
//! ticks the snapshot timer every `snapshot.timer_interval` until the
//! session is closed or dropped.

use crate::autosave::AutoSave;
use crate::error::DocumentError;
use crate::load::{LoadOrchestrator, LoadReport};
use crate::navigator::{Navigator, Reconstruction, StateChanged};
use crate::save::{SaveOrchestrator, SaveOutcome};
use crate::snapshot::{SnapshotManager, SnapshotPhase};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vellum_core::event::HistoryRevertedOp;
use vellum_core::{
    ApplyError, Clock, DocumentId, DocumentState, EngineConfig, EventKind, NewEvent,
    SharedTelemetry, SystemClock, TracingTelemetry,
};
use vellum_storage::{Compaction, DocumentMetadata, EventStore, MigrationRunner};

/// Collaborators and settings for opening a session
#[derive(Clone)]
pub struct SessionOptions<C: Clock> {
    pub config: EngineConfig,
    pub clock: C,
    pub telemetry: SharedTelemetry,
    pub migrations: MigrationRunner,
}

impl SessionOptions<SystemClock> {
    /// System clock, tracing telemetry and the built-in migrations
    pub fn new(config: EngineConfig) -> Result<Self, DocumentError> {
        Ok(Self {
            config,
            clock: SystemClock,
            telemetry: Arc::new(TracingTelemetry),
            migrations: MigrationRunner::builtin()?,
        })
    }
}

impl<C: Clock> SessionOptions<C> {
    pub fn with_clock<D: Clock>(self, clock: D) -> SessionOptions<D> {
        SessionOptions {
            config: self.config,
            clock,
            telemetry: self.telemetry,
            migrations: self.migrations,
        }
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_migrations(mut self, migrations: MigrationRunner) -> Self {
        self.migrations = migrations;
        self
    }
}

/// One open document
pub struct DocumentSession<C: Clock> {
    store: EventStore,
    document_id: DocumentId,
    navigator: Arc<Mutex<Navigator>>,
    snapshots: SnapshotManager<C>,
    autosave: AutoSave,
    saver: SaveOrchestrator,
    report: LoadReport,
    timer: Option<JoinHandle<()>>,
}

impl<C: Clock> DocumentSession<C> {
    /// Write a new document file and open it
    pub async fn create(
        path: &Path,
        document_id: DocumentId,
        title: &str,
        options: SessionOptions<C>,
    ) -> Result<Self, DocumentError> {
        let metadata = DocumentMetadata::new(document_id, title, Utc::now());
        drop(EventStore::create(path, metadata).await?);
        Self::open(path, options).await
    }

    /// Load an existing document file
    pub async fn open(path: &Path, options: SessionOptions<C>) -> Result<Self, DocumentError> {
        let SessionOptions {
            config,
            clock,
            telemetry,
            migrations,
        } = options;

        let loader =
            LoadOrchestrator::new(migrations, config.navigator.clone(), Arc::clone(&telemetry));
        let loaded = loader.load(path).await?;
        let store = loaded.store;
        let document_id = loaded.metadata.document_id;

        let snapshots = SnapshotManager::attach(
            store.clone(),
            document_id.clone(),
            config.snapshot.clone(),
            clock,
            Arc::clone(&telemetry),
        )
        .await?;
        let autosave = AutoSave::attach(store.clone(), document_id.clone(), &config.autosave).await?;
        let saver = SaveOrchestrator::attach(
            store.clone(),
            document_id.clone(),
            config.snapshot.retained_snapshots(),
            telemetry,
        )
        .await?;

        let navigator = Arc::new(Mutex::new(loaded.navigator));
        let timer = spawn_timer(
            Arc::clone(&navigator),
            snapshots.clone(),
            config.snapshot.timer_interval,
        );

        Ok(Self {
            store,
            document_id,
            navigator,
            snapshots,
            autosave,
            saver,
            report: loaded.report,
            timer,
        })
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// What the load found
    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    pub fn snapshot_phase(&self) -> SnapshotPhase {
        self.snapshots.phase()
    }

    /// Record an edit by the local user
    pub async fn record(&self, kind: EventKind) -> Result<u64, DocumentError> {
        self.record_event(NewEvent::now(kind)).await
    }

    /// Record an edit; after an undo this first discards the redo future
    pub async fn record_event(&self, event: NewEvent) -> Result<u64, DocumentError> {
        if event.kind.is_reserved() {
            return Err(ApplyError::Reserved(event.kind.event_type()).into());
        }

        let mut nav = self.navigator.lock().await;
        nav.state().check(&event.kind)?;

        if nav.is_behind_head() {
            if let Some(cursor) = nav.cursor() {
                let revert = EventKind::HistoryReverted(HistoryRevertedOp {
                    to_sequence: cursor,
                });
                let sequence = self
                    .store
                    .append(&self.document_id, NewEvent::now(revert.clone()))
                    .await?;
                nav.record_appended(sequence, &revert);
                self.snapshots.note_appended(sequence);
            }
        }

        let kind = event.kind.clone();
        let sequence = self.store.append(&self.document_id, event).await?;
        nav.record_appended(sequence, &kind);
        self.snapshots.record_event(sequence, &nav.state());
        self.autosave.notify();
        Ok(sequence)
    }

    pub async fn undo(&self) -> Result<Option<Arc<DocumentState>>, DocumentError> {
        Ok(self.navigator.lock().await.undo().await?)
    }

    pub async fn redo(&self) -> Result<Option<Arc<DocumentState>>, DocumentError> {
        Ok(self.navigator.lock().await.redo().await?)
    }

    /// Scrub the timeline to `sequence`
    pub async fn navigate_to(&self, sequence: u64) -> Result<Arc<DocumentState>, DocumentError> {
        Ok(self.navigator.lock().await.navigate_to(sequence).await?)
    }

    /// State at `sequence` without moving the cursor
    pub async fn reconstruct(&self, sequence: u64) -> Result<Reconstruction, DocumentError> {
        Ok(self.navigator.lock().await.reconstruct(sequence).await?)
    }

    /// Visible state
    pub async fn state(&self) -> Arc<DocumentState> {
        self.navigator.lock().await.state()
    }

    pub async fn cursor(&self) -> Option<u64> {
        self.navigator.lock().await.cursor()
    }

    pub async fn head(&self) -> Option<u64> {
        self.navigator.lock().await.head()
    }

    pub async fn can_undo(&self) -> bool {
        self.navigator.lock().await.can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.navigator.lock().await.can_redo()
    }

    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<StateChanged> {
        self.navigator.lock().await.subscribe()
    }

    /// Manual save; a second call while one runs fails immediately
    pub async fn save(&self) -> Result<SaveOutcome, DocumentError> {
        let guard = self.saver.begin()?;
        let mut nav = self.navigator.lock().await;
        Ok(self
            .saver
            .save(guard, &self.autosave, &self.snapshots, &mut nav)
            .await?)
    }

    /// Whether anything changed since the last manual save
    pub async fn is_dirty(&self) -> bool {
        let nav = self.navigator.lock().await;
        nav.head() != self.saver.last_saved() || nav.is_behind_head()
    }

    /// Wall-clock tick for the snapshot timer; returns whether a snapshot
    /// was started
    pub async fn tick(&self) -> Result<bool, DocumentError> {
        timer_tick(&self.navigator, &self.snapshots).await
    }

    /// Drop events the oldest retained snapshot already covers
    pub async fn compact(&self) -> Result<Compaction, DocumentError> {
        let mut nav = self.navigator.lock().await;
        self.snapshots.wait_idle().await;
        let compaction = self.store.compact(&self.document_id).await?;
        nav.refresh_bounds().await?;
        tracing::info!(
            document_id = %self.document_id,
            events_removed = compaction.events_removed,
            history_floor = ?compaction.history_floor,
            "history compacted"
        );
        Ok(compaction)
    }

    /// Flush auto-save and wait for an in-flight snapshot before closing
    pub async fn close(mut self) -> Result<(), DocumentError> {
        self.stop_timer();
        self.autosave.flush_pending().await?;
        self.snapshots.wait_idle().await;
        self.autosave.cancel();
        self.store.checkpoint().await?;
        tracing::info!(document_id = %self.document_id, "document closed");
        Ok(())
    }

    fn stop_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

impl<C: Clock> Drop for DocumentSession<C> {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

async fn timer_tick<C: Clock>(
    navigator: &Mutex<Navigator>,
    snapshots: &SnapshotManager<C>,
) -> Result<bool, DocumentError> {
    let mut nav = navigator.lock().await;
    let Some(head) = nav.head() else {
        return Ok(false);
    };
    let state = nav.head_state().await?;
    Ok(snapshots.on_timer(head, &state))
}

/// Tick the snapshot timer every `period`; the first tick is one period out
///
/// Must be called from within a tokio runtime.
fn spawn_timer<C: Clock>(
    navigator: Arc<Mutex<Navigator>>,
    snapshots: SnapshotManager<C>,
    period: Duration,
) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            // A failed tick is retried on the next one
            if let Err(e) = timer_tick(&navigator, &snapshots).await {
                tracing::warn!(error = %e, "snapshot timer tick failed");
            }
        }
    }))
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
