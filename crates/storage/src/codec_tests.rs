// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use vellum_core::event::{LayerAddedOp, ObjectAddedOp};
use vellum_core::{EventKind, Shape, Style};
use yare::parameterized;

fn drawing(objects: usize) -> DocumentState {
    let mut state = DocumentState::new();
    state
        .apply(&EventKind::LayerAdded(LayerAddedOp {
            layer_id: "l1".into(),
            name: "Background".to_string(),
            index: None,
        }))
        .unwrap();
    for i in 0..objects {
        state
            .apply(&EventKind::ObjectAdded(ObjectAddedOp {
                object_id: format!("o{}", i).into(),
                layer_id: "l1".into(),
                shape: Shape::Rect {
                    x: i as f64,
                    y: 0.0,
                    width: 10.0,
                    height: 10.0,
                },
                style: Style::default(),
            }))
            .unwrap();
    }
    state
}

#[parameterized(
    gzip = { Compression::Gzip },
    none = { Compression::None },
)]
fn decode_restores_state_and_sequence(compression: Compression) {
    let state = drawing(5);
    let encoded = encode(&state, 42, compression).unwrap();

    let (sequence, decoded) = decode(compression.as_tag(), &encoded.data).unwrap();
    assert_eq!(sequence, 42);
    assert_eq!(decoded, state);
}

#[test]
fn gzip_shrinks_repetitive_documents() {
    let state = drawing(200);
    let encoded = encode(&state, 199, Compression::Gzip).unwrap();
    assert!((encoded.data.len() as u64) < encoded.uncompressed_len / 2);
}

#[test]
fn uncompressed_blob_is_plain_json() {
    let encoded = encode(&drawing(1), 3, Compression::None).unwrap();
    assert_eq!(encoded.data.len() as u64, encoded.uncompressed_len);
    let value: serde_json::Value = serde_json::from_slice(&encoded.data).unwrap();
    assert_eq!(value["version"], SNAPSHOT_VERSION);
    assert_eq!(value["sequence"], 3);
}

#[test]
fn unknown_compression_tag_is_rejected() {
    let encoded = encode(&drawing(1), 1, Compression::None).unwrap();
    let err = decode("zstd", &encoded.data).unwrap_err();
    assert!(matches!(err, CodecError::UnknownCompression(tag) if tag == "zstd"));
}

#[test]
fn mismatched_tag_fails_cleanly() {
    let encoded = encode(&drawing(1), 1, Compression::None).unwrap();
    assert!(decode("gzip", &encoded.data).is_err());
}

#[test]
fn newer_envelope_version_is_rejected() {
    let blob = serde_json::to_vec(&serde_json::json!({
        "version": SNAPSHOT_VERSION + 1,
        "sequence": 0,
        "state": DocumentState::new(),
    }))
    .unwrap();
    let err = decode("none", &blob).unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedVersion { .. }));
}
