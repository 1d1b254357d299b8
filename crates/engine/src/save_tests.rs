// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use vellum_core::event::{DocumentRenamedOp, LayerAddedOp};
use vellum_core::{AutoSaveConfig, ChannelTelemetry, FakeClock, NavigatorConfig, SnapshotConfig};
use vellum_storage::DocumentMetadata;

fn doc() -> DocumentId {
    DocumentId::new("doc")
}

struct Parts {
    _dir: TempDir,
    store: EventStore,
    autosave: AutoSave,
    snapshots: SnapshotManager<FakeClock>,
    navigator: Navigator,
    saver: SaveOrchestrator,
    samples: UnboundedReceiver<TelemetrySample>,
}

impl Parts {
    async fn edit(&mut self, kind: EventKind) -> u64 {
        let seq = self
            .store
            .append(&self.document(), NewEvent::now(kind.clone()))
            .await
            .unwrap();
        self.navigator.record_appended(seq, &kind);
        self.snapshots.record_event(seq, &self.navigator.state());
        self.autosave.notify();
        seq
    }

    fn document(&self) -> DocumentId {
        doc()
    }

    async fn save(&mut self) -> Result<SaveOutcome, SaveError> {
        let guard = self.saver.begin()?;
        self.saver
            .save(guard, &self.autosave, &self.snapshots, &mut self.navigator)
            .await
    }
}

async fn parts(config: SnapshotConfig) -> Parts {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::create(
        dir.path().join("doc.vellum"),
        DocumentMetadata::new(doc(), "Untitled", Utc::now()),
    )
    .await
    .unwrap();
    let (sink, samples) = ChannelTelemetry::new();
    let telemetry: SharedTelemetry = Arc::new(sink);

    let autosave = AutoSave::attach(
        store.clone(),
        doc(),
        &AutoSaveConfig {
            debounce: Duration::from_millis(10),
        },
    )
    .await
    .unwrap();
    let keep = config.retained_snapshots();
    let snapshots = SnapshotManager::attach(
        store.clone(),
        doc(),
        config,
        FakeClock::new(),
        Arc::clone(&telemetry),
    )
    .await
    .unwrap();
    let navigator = Navigator::open(store.clone(), doc(), &NavigatorConfig::default())
        .await
        .unwrap();
    let saver = SaveOrchestrator::attach(store.clone(), doc(), keep, telemetry)
        .await
        .unwrap();

    Parts {
        _dir: dir,
        store,
        autosave,
        snapshots,
        navigator,
        saver,
        samples,
    }
}

/// No background snapshots get in the way
fn quiet() -> SnapshotConfig {
    SnapshotConfig {
        base_interval: 10_000,
        ..SnapshotConfig::default()
    }
}

fn rename(title: &str) -> EventKind {
    EventKind::DocumentRenamed(DocumentRenamedOp {
        title: title.to_string(),
    })
}

fn layer(id: &str) -> EventKind {
    EventKind::LayerAdded(LayerAddedOp {
        layer_id: id.into(),
        name: id.to_string(),
        index: None,
    })
}

#[tokio::test]
async fn save_appends_marker_and_writes_checkpoint() {
    let mut p = parts(quiet()).await;
    p.edit(layer("bg")).await;
    p.edit(rename("Poster")).await;

    let outcome = p.save().await.unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Saved {
            sequence: 2,
            wrote_snapshot: true
        }
    );

    let metadata = p.store.metadata().await.unwrap().unwrap();
    assert_eq!(metadata.title, "Poster");
    assert_eq!(p.store.latest_of_type(&doc(), "document.saved").await.unwrap(), Some(2));
    let snapshots = p.store.list_snapshots(&doc()).await.unwrap();
    assert_eq!(snapshots.iter().map(|s| s.sequence).collect::<Vec<_>>(), vec![2]);
    assert_eq!(p.saver.last_saved(), Some(2));
    assert!(!p.saver.is_saving());

    let mut saw_save = false;
    while let Ok(sample) = p.samples.try_recv() {
        if let TelemetrySample::SaveCompleted {
            sequence,
            wrote_snapshot,
            ..
        } = sample
        {
            assert_eq!((sequence, wrote_snapshot), (2, true));
            saw_save = true;
        }
    }
    assert!(saw_save);
}

#[tokio::test]
async fn unchanged_document_is_not_saved_again() {
    let mut p = parts(quiet()).await;
    p.edit(rename("A")).await;
    p.save().await.unwrap();
    let events = p.store.event_count(&doc()).await.unwrap();
    let snapshots = p.store.list_snapshots(&doc()).await.unwrap().len();

    let outcome = p.save().await.unwrap();
    assert_eq!(outcome, SaveOutcome::SkippedNoChanges { sequence: Some(1) });
    assert_eq!(p.store.event_count(&doc()).await.unwrap(), events);
    assert_eq!(p.store.list_snapshots(&doc()).await.unwrap().len(), snapshots);
}

#[tokio::test]
async fn empty_new_document_has_nothing_to_save() {
    let mut p = parts(quiet()).await;
    assert_eq!(
        p.save().await.unwrap(),
        SaveOutcome::SkippedNoChanges { sequence: None }
    );
    assert_eq!(p.store.event_count(&doc()).await.unwrap(), 0);
}

#[tokio::test]
async fn save_slot_is_exclusive() {
    let p = parts(quiet()).await;
    let guard = p.saver.begin().unwrap();
    assert!(p.saver.is_saving());
    assert!(matches!(p.saver.begin(), Err(SaveError::AlreadyInProgress)));

    drop(guard);
    assert!(p.saver.begin().is_ok());
}

#[tokio::test]
async fn saving_after_undo_keeps_the_visible_state() {
    let mut p = parts(quiet()).await;
    for title in ["t0", "t1", "t2"] {
        p.edit(rename(title)).await;
    }
    p.navigator.undo().await.unwrap();

    let outcome = p.save().await.unwrap();
    assert!(matches!(outcome, SaveOutcome::Saved { sequence: 4, .. }));
    assert_eq!(
        p.store.latest_of_type(&doc(), "history.reverted").await.unwrap(),
        Some(3)
    );

    let reopened = Navigator::open(p.store.clone(), doc(), &NavigatorConfig::default())
        .await
        .unwrap();
    assert_eq!(reopened.state().title, "t1");
    assert_eq!(p.store.metadata().await.unwrap().unwrap().title, "t1");
}

#[tokio::test]
async fn oversized_state_saves_without_snapshot() {
    let mut p = parts(SnapshotConfig {
        warn_bytes: 10,
        max_bytes: 20,
        ..quiet()
    })
    .await;
    p.edit(rename("Big")).await;

    let outcome = p.save().await.unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Saved {
            sequence: 1,
            wrote_snapshot: false
        }
    );
    assert!(p.store.list_snapshots(&doc()).await.unwrap().is_empty());
    assert_eq!(p.store.metadata().await.unwrap().unwrap().title, "Big");
}

#[tokio::test]
async fn untitled_document_keeps_stored_title() {
    let mut p = parts(quiet()).await;
    p.edit(layer("bg")).await;
    p.save().await.unwrap();

    let marker = p.store.read(&doc(), 1, Some(1)).await.unwrap();
    assert_eq!(
        marker[0].decode().unwrap(),
        EventKind::DocumentSaved(DocumentSavedOp {
            title: "Untitled".to_string()
        })
    );
}

#[tokio::test]
async fn attach_resumes_from_last_marker() {
    let mut p = parts(quiet()).await;
    p.edit(rename("A")).await;
    p.save().await.unwrap();
    p.edit(rename("B")).await;

    let telemetry: SharedTelemetry = Arc::new(vellum_core::NoopTelemetry);
    let saver = SaveOrchestrator::attach(p.store.clone(), doc(), 2, telemetry)
        .await
        .unwrap();
    assert_eq!(saver.last_saved(), Some(1));
}
