// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for CLI integration tests.
//!
//! Documents are written through the engine so the binary reads exactly
//! what an editor would leave on disk.

#![allow(dead_code)]

use assert_cmd::Command;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use vellum_core::event::{DocumentRenamedOp, LayerAddedOp, ObjectAddedOp, ObjectMovedOp};
use vellum_core::{
    DocumentId, EngineConfig, EventKind, NoopTelemetry, Shape, SnapshotConfig, Style,
    CURRENT_FORMAT_VERSION,
};
use vellum_engine::{DocumentSession, SessionOptions};
use vellum_storage::{DocumentMetadata, EventStore, StoreError};

/// A document file inside its own temp directory
pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join(name);
        Self { dir, path }
    }

    pub fn arg(&self) -> &str {
        self.path.to_str().expect("temp path is utf-8")
    }

    pub fn bytes(&self) -> Vec<u8> {
        std::fs::read(&self.path).expect("Failed to read document")
    }
}

pub fn vellum() -> Command {
    let mut cmd = Command::cargo_bin("vellum").expect("vellum binary");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Runtime::new()
        .expect("Failed to start runtime")
        .block_on(fut)
}

fn rename(title: &str) -> EventKind {
    EventKind::DocumentRenamed(DocumentRenamedOp {
        title: title.to_string(),
    })
}

/// Seven events across two saves:
///
/// | seq | event            |
/// |-----|------------------|
/// | 0   | layer.added      |
/// | 1   | object.added     |
/// | 2   | document.renamed |
/// | 3   | document.saved   |
/// | 4   | object.moved     |
/// | 5   | document.renamed |
/// | 6   | document.saved   |
///
/// Snapshots sit at 3 and 6.
pub fn poster() -> Fixture {
    let fixture = Fixture::new("poster.vellum");
    block_on(async {
        let mut config = EngineConfig::default();
        config.snapshot = SnapshotConfig {
            base_interval: 10_000,
            ..SnapshotConfig::default()
        };
        let options = SessionOptions::new(config)
            .expect("options")
            .with_telemetry(Arc::new(NoopTelemetry));
        let session = DocumentSession::create(
            &fixture.path,
            DocumentId::new("poster"),
            "Untitled",
            options,
        )
        .await
        .expect("create");

        session
            .record(EventKind::LayerAdded(LayerAddedOp {
                layer_id: "bg".into(),
                name: "Background".to_string(),
                index: None,
            }))
            .await
            .expect("layer");
        session
            .record(EventKind::ObjectAdded(ObjectAddedOp {
                object_id: "r1".into(),
                layer_id: "bg".into(),
                shape: Shape::Rect {
                    x: 0.0,
                    y: 0.0,
                    width: 40.0,
                    height: 20.0,
                },
                style: Style::default(),
            }))
            .await
            .expect("rect");
        session.record(rename("Poster")).await.expect("rename");
        session.save().await.expect("first save");

        session
            .record(EventKind::ObjectMoved(ObjectMovedOp {
                object_ids: vec!["r1".into()],
                dx: 5.0,
                dy: 5.0,
            }))
            .await
            .expect("move");
        session.record(rename("Poster v2")).await.expect("rename");
        session.save().await.expect("second save");
        session.close().await.expect("close");
    });
    fixture
}

/// An empty document written in `format_version`
pub fn with_format(format_version: u32) -> Fixture {
    let fixture = Fixture::new("legacy.vellum");
    block_on(async {
        let metadata = DocumentMetadata::new(DocumentId::new("legacy"), "Old sketch", Utc::now());
        drop(
            EventStore::create_with_format(&fixture.path, metadata, format_version)
                .await
                .expect("create"),
        );
    });
    fixture
}

/// A document claiming a format this build does not know
pub fn from_the_future() -> Fixture {
    let fixture = with_format(CURRENT_FORMAT_VERSION);
    let next = CURRENT_FORMAT_VERSION + 1;
    block_on(async {
        let store = EventStore::open(&fixture.path).await.expect("open");
        store
            .transaction(move |tx| {
                tx.execute("UPDATE metadata SET format_version = ?1", [next])?;
                tx.pragma_update(None, "user_version", next)?;
                Ok::<_, StoreError>(())
            })
            .await
            .expect("bump version");
    });
    fixture
}

pub fn garbage(dir: &Path) -> PathBuf {
    let path = dir.join("junk.vellum");
    std::fs::write(&path, vec![0x5a; 8192]).expect("Failed to write junk");
    path
}
