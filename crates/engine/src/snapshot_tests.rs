// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use vellum_core::event::DocumentRenamedOp;
use vellum_core::{ActivityLevel, ChannelTelemetry, EventKind, FakeClock, NewEvent};
use vellum_storage::{DocumentMetadata, MetadataUpdate};

fn doc() -> DocumentId {
    DocumentId::new("doc")
}

/// Every editing rate counts as normal, so the interval is the base
fn steady(base_interval: u64) -> SnapshotConfig {
    SnapshotConfig {
        base_interval,
        burst_threshold: 1_000_000.0,
        idle_threshold: 0.0,
        ..SnapshotConfig::default()
    }
}

struct Fixture {
    _dir: TempDir,
    store: EventStore,
    clock: FakeClock,
    manager: SnapshotManager<FakeClock>,
    samples: UnboundedReceiver<TelemetrySample>,
}

async fn fixture(config: SnapshotConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::create(
        dir.path().join("doc.vellum"),
        DocumentMetadata::new(doc(), "Untitled", Utc::now()),
    )
    .await
    .unwrap();
    let clock = FakeClock::new();
    let (sink, samples) = ChannelTelemetry::new();
    let manager = SnapshotManager::attach(store.clone(), doc(), config, clock.clone(), Arc::new(sink))
        .await
        .unwrap();
    Fixture {
        _dir: dir,
        store,
        clock,
        manager,
        samples,
    }
}

fn drain(rx: &mut UnboundedReceiver<TelemetrySample>) -> Vec<TelemetrySample> {
    let mut out = Vec::new();
    while let Ok(sample) = rx.try_recv() {
        out.push(sample);
    }
    out
}

async fn stored_sequences(store: &EventStore) -> Vec<u64> {
    store
        .list_snapshots(&doc())
        .await
        .unwrap()
        .iter()
        .map(|s| s.sequence)
        .collect()
}

#[tokio::test]
async fn event_count_trigger_writes_snapshot() {
    let mut f = fixture(steady(4)).await;
    let state = DocumentState::new();

    for seq in 0..3 {
        assert!(!f.manager.record_event(seq, &state));
    }
    assert!(f.manager.record_event(3, &state));
    f.manager.wait_idle().await;

    assert_eq!(stored_sequences(&f.store).await, vec![3]);
    assert_eq!(f.manager.backlog(), 0);
    assert_eq!(f.manager.phase(), SnapshotPhase::Idle);
    assert!(matches!(
        drain(&mut f.samples).as_slice(),
        [TelemetrySample::SnapshotWritten { sequence: 3, backlog: 0, .. }]
    ));
}

#[tokio::test]
async fn sustained_burst_halves_the_interval() {
    let mut f = fixture(SnapshotConfig::default()).await;
    let state = DocumentState::new();

    let first = (0..1000u64).find(|seq| f.manager.record_event(*seq, &state));
    assert_eq!(first, Some(249));
    f.manager.wait_idle().await;

    assert_eq!(stored_sequences(&f.store).await.first(), Some(&249));
    let written = drain(&mut f.samples);
    assert!(matches!(
        written.first(),
        Some(TelemetrySample::SnapshotWritten {
            sequence: 249,
            activity: ActivityLevel::Burst,
            effective_interval: 250,
            ..
        })
    ));
}

#[tokio::test]
async fn trigger_during_serialization_is_dropped() {
    let f = fixture(steady(2)).await;
    let state = DocumentState::new();

    assert!(!f.manager.record_event(0, &state));
    let held = f.manager.prepare_manual(0, &state).await.unwrap().unwrap();
    assert_eq!(f.manager.phase(), SnapshotPhase::Serializing);

    // Backlog reached the interval, but the slot is taken
    assert!(!f.manager.record_event(1, &state));
    drop(held);
    assert_eq!(f.manager.phase(), SnapshotPhase::Idle);

    assert!(f.manager.record_event(2, &state));
    f.manager.wait_idle().await;
    assert_eq!(f.manager.last_snapshot_sequence(), Some(2));
}

#[tokio::test]
async fn timer_needs_elapsed_interval_and_new_events() {
    let f = fixture(steady(1_000)).await;
    let state = DocumentState::new();
    let interval = SnapshotConfig::default().timer_interval;

    f.clock.advance(interval);
    assert!(!f.manager.on_timer(0, &state), "no events yet");

    f.manager.record_event(0, &state);
    assert!(f.manager.on_timer(0, &state));
    f.manager.wait_idle().await;
    assert_eq!(stored_sequences(&f.store).await, vec![0]);

    f.manager.record_event(1, &state);
    assert!(!f.manager.on_timer(1, &state), "interval not yet elapsed");
    f.clock.advance(interval);
    assert!(f.manager.on_timer(1, &state));
    f.manager.wait_idle().await;
    assert_eq!(stored_sequences(&f.store).await, vec![0, 1]);

    f.clock.advance(interval * 2);
    assert!(!f.manager.on_timer(1, &state), "nothing new since the snapshot");
}

#[tokio::test]
async fn oversized_state_is_refused() {
    let mut f = fixture(SnapshotConfig {
        warn_bytes: 10,
        max_bytes: 20,
        ..steady(1)
    })
    .await;
    let state = DocumentState::new();

    assert!(!f.manager.record_event(0, &state));
    assert!(stored_sequences(&f.store).await.is_empty());
    assert!(matches!(
        drain(&mut f.samples).as_slice(),
        [TelemetrySample::SnapshotSkipped { sequence: 0, .. }]
    ));

    let err = f.manager.prepare_manual(0, &state).await.unwrap_err();
    assert!(matches!(err, SnapshotError::TooLarge { max: 20, .. }));
    assert_eq!(f.manager.phase(), SnapshotPhase::Idle);
}

#[tokio::test]
async fn manual_snapshot_respects_min_backlog() {
    let f = fixture(SnapshotConfig {
        save_snapshot_min_backlog: 5,
        ..steady(1_000)
    })
    .await;
    let state = DocumentState::new();

    f.manager.record_event(0, &state);
    assert!(f.manager.prepare_manual(0, &state).await.unwrap().is_none());
    for seq in 1..5 {
        f.manager.record_event(seq, &state);
    }
    assert!(f.manager.prepare_manual(4, &state).await.unwrap().is_some());
}

#[tokio::test]
async fn committed_manual_snapshot_resets_backlog() {
    let mut f = fixture(steady(1_000)).await;
    let state = DocumentState::new();
    for seq in 0..3 {
        f.manager.record_event(seq, &state);
    }

    let prepared = f.manager.prepare_manual(2, &state).await.unwrap().unwrap();
    assert_eq!(prepared.ticket.sequence(), 2);
    let write = f
        .store
        .save_checkpoint(
            &doc(),
            MetadataUpdate {
                title: "Untitled".to_string(),
                modified_at: Utc::now(),
            },
            Some(prepared.encoded),
            2,
        )
        .await
        .unwrap();
    assert!(write.is_some());
    f.manager.commit_manual(prepared.ticket);

    assert_eq!(f.manager.backlog(), 0);
    assert_eq!(f.manager.last_snapshot_sequence(), Some(2));
    assert_eq!(f.manager.phase(), SnapshotPhase::Idle);
    assert!(matches!(
        drain(&mut f.samples).as_slice(),
        [TelemetrySample::SnapshotWritten { sequence: 2, .. }]
    ));
}

#[tokio::test]
async fn only_newest_snapshots_are_retained() {
    let f = fixture(steady(1)).await;
    let state = DocumentState::new();
    for seq in 0..4 {
        assert!(f.manager.record_event(seq, &state));
        f.manager.wait_idle().await;
    }
    assert_eq!(stored_sequences(&f.store).await, vec![2, 3]);
}

#[tokio::test]
async fn snapshot_holds_the_state_it_was_given() {
    let f = fixture(steady(1)).await;
    let mut state = DocumentState::new();
    state
        .apply(&EventKind::DocumentRenamed(DocumentRenamedOp {
            title: "Draft".to_string(),
        }))
        .unwrap();

    assert!(f.manager.record_event(0, &state));
    state.title = "changed after handoff".to_string();
    f.manager.wait_idle().await;

    let stored = f.store.latest_snapshot_at_or_before(&doc(), 0).await.unwrap().unwrap();
    let (sequence, decoded) = codec::decode(&stored.compression, &stored.data).unwrap();
    assert_eq!(sequence, 0);
    assert_eq!(decoded.title, "Draft");
    assert_eq!(stored.compression, "gzip");
}

#[tokio::test]
async fn attach_resumes_from_stored_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::create(
        dir.path().join("doc.vellum"),
        DocumentMetadata::new(doc(), "Untitled", Utc::now()),
    )
    .await
    .unwrap();
    for i in 0..6 {
        store
            .append(
                &doc(),
                NewEvent::now(EventKind::DocumentRenamed(DocumentRenamedOp {
                    title: format!("t{}", i),
                })),
            )
            .await
            .unwrap();
    }
    let encoded = codec::encode(&DocumentState::new(), 3, Compression::None).unwrap();
    store.write_snapshot(&doc(), encoded, 2).await.unwrap();

    let manager = SnapshotManager::attach(
        store,
        doc(),
        steady(100),
        FakeClock::new(),
        Arc::new(vellum_core::NoopTelemetry),
    )
    .await
    .unwrap();
    assert_eq!(manager.last_snapshot_sequence(), Some(3));
    assert_eq!(manager.backlog(), 2);
}
