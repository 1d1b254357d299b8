// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use tempfile::TempDir;
use vellum_core::event::DocumentRenamedOp;
use vellum_core::{EventKind, NewEvent};
use vellum_storage::DocumentMetadata;

fn doc() -> DocumentId {
    DocumentId::new("doc")
}

async fn setup(debounce: Duration) -> (TempDir, EventStore, AutoSave) {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::create(
        dir.path().join("doc.vellum"),
        DocumentMetadata::new(doc(), "Untitled", Utc::now()),
    )
    .await
    .unwrap();
    let autosave = AutoSave::attach(store.clone(), doc(), &AutoSaveConfig { debounce })
        .await
        .unwrap();
    (dir, store, autosave)
}

async fn edit(store: &EventStore) -> u64 {
    store
        .append(
            &doc(),
            NewEvent::now(EventKind::DocumentRenamed(DocumentRenamedOp {
                title: "t".to_string(),
            })),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn timer_flushes_after_quiet_period() {
    let (_dir, store, autosave) = setup(Duration::from_millis(20)).await;
    assert_eq!(autosave.watermark().await, None);

    edit(&store).await;
    autosave.notify();
    edit(&store).await;
    autosave.notify();
    assert!(autosave.has_pending());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(autosave.watermark().await, Some(1));
    assert!(!autosave.has_pending());
}

#[tokio::test]
async fn each_signal_restarts_the_timer() {
    let (_dir, store, autosave) = setup(Duration::from_millis(300)).await;
    edit(&store).await;
    autosave.notify();
    tokio::time::sleep(Duration::from_millis(150)).await;
    autosave.notify();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // 350ms after the first signal but only 200ms after the second
    assert_eq!(autosave.watermark().await, None);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(autosave.watermark().await, Some(0));
}

#[tokio::test]
async fn flush_pending_is_immediate() {
    let (_dir, store, autosave) = setup(Duration::from_secs(60)).await;
    edit(&store).await;
    edit(&store).await;
    autosave.notify();

    assert_eq!(autosave.flush_pending().await.unwrap(), Some(1));
    assert_eq!(autosave.watermark().await, Some(1));
    assert!(!autosave.has_pending());
}

#[tokio::test]
async fn flush_never_appends_events() {
    let (_dir, store, autosave) = setup(Duration::from_millis(10)).await;
    edit(&store).await;
    autosave.notify();
    tokio::time::sleep(Duration::from_millis(100)).await;
    autosave.flush_pending().await.unwrap();

    let events = store.read(&doc(), 0, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "document.renamed");
}

#[tokio::test]
async fn existing_history_counts_as_flushed() {
    let (dir, store, autosave) = setup(Duration::from_millis(10)).await;
    edit(&store).await;
    autosave.flush_pending().await.unwrap();
    drop(autosave);

    let reopened = EventStore::open(dir.path().join("doc.vellum")).await.unwrap();
    let autosave = AutoSave::attach(reopened, doc(), &AutoSaveConfig::default())
        .await
        .unwrap();
    assert_eq!(autosave.watermark().await, Some(0));
}

#[tokio::test]
async fn cancel_discards_pending_flush() {
    let (_dir, store, autosave) = setup(Duration::from_millis(20)).await;
    edit(&store).await;
    autosave.notify();
    autosave.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(autosave.watermark().await, None);
}
