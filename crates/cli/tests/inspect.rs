// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for read-only inspection: info, history, verify

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use common::{poster, vellum};
use predicates::prelude::*;

#[test]
fn test_vellum_help_lists_commands() {
    vellum()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("replay"))
        .stdout(predicate::str::contains("compact"));
}

#[test]
fn test_info_shows_range_and_snapshots() {
    let doc = poster();
    vellum()
        .args(["info", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Document:  poster"))
        .stdout(predicate::str::contains("Title:     Poster v2"))
        .stdout(predicate::str::contains("Sequences: 0..=6 (7 events)"))
        .stdout(predicate::str::contains("Saved at:  6"))
        .stdout(predicate::str::contains("Snapshots: 2"));
}

#[test]
fn test_info_json() {
    let doc = poster();
    let out = vellum()
        .args(["--output", "json", "info", doc.arg()])
        .output()
        .unwrap();
    assert!(out.status.success());

    let info: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(info["format_version"], 1);
    assert_eq!(info["first_sequence"], 0);
    assert_eq!(info["last_sequence"], 6);
    let seqs: Vec<u64> = info["snapshots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(seqs, vec![3, 6]);
}

#[test]
fn test_info_does_not_modify_file() {
    let doc = poster();
    let before = doc.bytes();
    vellum().args(["info", doc.arg()]).assert().success();
    assert_eq!(doc.bytes(), before);
}

#[test]
fn test_history_range() {
    let doc = poster();
    vellum()
        .args(["history", doc.arg(), "--from", "4", "--to", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("object.moved"))
        .stdout(predicate::str::contains("document.renamed"))
        .stdout(predicate::str::contains("layer.added").not());
}

#[test]
fn test_history_json_decodes_payloads() {
    let doc = poster();
    let out = vellum()
        .args(["--output", "json", "history", doc.arg()])
        .output()
        .unwrap();
    assert!(out.status.success());

    let entries: Vec<serde_json::Value> = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(entries.len(), 7);
    assert_eq!(entries[2]["event_type"], "document.renamed");
    assert_eq!(entries[2]["payload"]["title"], "Poster");
    assert_eq!(entries[6]["event_type"], "document.saved");
}

#[test]
fn test_history_past_head_is_empty() {
    let doc = poster();
    vellum()
        .args(["history", doc.arg(), "--from", "40"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no events"));
}

#[test]
fn test_verify_healthy_document() {
    let doc = poster();
    vellum()
        .args(["verify", doc.arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains(": ok"));
}
