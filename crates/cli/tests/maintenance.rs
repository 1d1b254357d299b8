// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for migrate and compact

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use common::{poster, vellum, with_format};
use predicates::prelude::*;

#[test]
fn test_migrate_upgrades_once() {
    let doc = with_format(0);
    vellum()
        .args(["migrate", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("from format version 0 to 1"));

    vellum()
        .args(["migrate", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("already at format version 1"));

    vellum()
        .args(["info", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Format:    1 (schema 1)"));
}

#[test]
fn test_info_reports_legacy_format_without_upgrading() {
    let doc = with_format(0);
    vellum()
        .args(["info", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Format:    0 (schema 0)"))
        .stdout(predicate::str::contains("Sequences: none"));
}

#[test]
fn test_compact_drops_history_before_oldest_snapshot() {
    let doc = poster();
    vellum()
        .args(["compact", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Removed 3 event(s) and 0 snapshot(s)",
        ))
        .stdout(predicate::str::contains("history now starts at 3"));

    vellum()
        .args(["info", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sequences: 3..=6 (4 events)"));

    // Everything from the floor up still reconstructs
    vellum()
        .args(["replay", doc.arg(), "--at", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Title:    Poster"));
    vellum()
        .args(["replay", doc.arg(), "--at", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pick a sequence from 3 to 6"));
}

#[test]
fn test_compact_is_idempotent() {
    let doc = poster();
    vellum().args(["compact", doc.arg()]).assert().success();
    vellum()
        .args(["compact", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 event(s)"));
}

#[test]
fn test_history_asks_for_migration_on_legacy_files() {
    let doc = with_format(0);
    vellum()
        .args(["history", doc.arg()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("uses format version 0"))
        .stderr(predicate::str::contains("vellum migrate"));

    vellum().args(["migrate", doc.arg()]).assert().success();
    vellum()
        .args(["history", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("no events"));
}
