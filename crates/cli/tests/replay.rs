// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for time-travel reconstruction

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use common::{poster, vellum};
use predicates::prelude::*;

fn replay_json(args: &[&str]) -> serde_json::Value {
    let out = vellum()
        .args(["--output", "json", "replay"])
        .args(args)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).unwrap()
}

#[test]
fn test_replay_defaults_to_head() {
    let doc = poster();
    let summary = replay_json(&[doc.arg()]);
    assert_eq!(summary["sequence"], 6);
    assert_eq!(summary["title"], "Poster v2");
    assert_eq!(summary["objects"], 1);
    assert_eq!(summary["base_sequence"], 6);
    assert_eq!(summary["events_applied"], 0);
    assert!(summary.get("state").is_none());
}

#[test]
fn test_replay_at_earlier_sequence() {
    let doc = poster();
    let summary = replay_json(&[doc.arg(), "--at", "2"]);
    assert_eq!(summary["sequence"], 2);
    assert_eq!(summary["title"], "Poster");
    assert_eq!(summary["layers"][0]["name"], "Background");
    assert_eq!(summary["layers"][0]["objects"], 1);
}

#[test]
fn test_replay_full_state() {
    let doc = poster();
    let summary = replay_json(&[doc.arg(), "--at", "0", "--full"]);
    assert_eq!(summary["objects"], 0);
    assert_eq!(summary["state"]["layers"][0]["name"], "Background");
}

#[test]
fn test_replay_text() {
    let doc = poster();
    vellum()
        .args(["replay", doc.arg(), "--at", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sequence: 4"))
        .stdout(predicate::str::contains("Title:    Poster"))
        .stdout(predicate::str::contains("Background"));
}

#[test]
fn test_replay_outside_history_fails() {
    let doc = poster();
    vellum()
        .args(["replay", doc.arg(), "--at", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: That point in the history is not available.",
        ))
        .stderr(predicate::str::contains("Pick a sequence from 0 to 6"));
}
