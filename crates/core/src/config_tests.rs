// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn empty_document_yields_defaults() {
    let config = EngineConfig::from_toml_str("").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.snapshot.base_interval, 500);
    assert_eq!(config.snapshot.timer_interval, Duration::from_secs(600));
    assert_eq!(config.autosave.debounce, Duration::from_millis(200));
    assert_eq!(config.navigator.cache_capacity, 16);
}

#[test]
fn partial_override_keeps_other_defaults() {
    let config = EngineConfig::from_toml_str(
        r#"
        [snapshot]
        base_interval = 800
        timer_interval = "5m"
        compression = "none"

        [autosave]
        debounce = "250ms"
        "#,
    )
    .unwrap();

    assert_eq!(config.snapshot.base_interval, 800);
    assert_eq!(config.snapshot.timer_interval, Duration::from_secs(300));
    assert_eq!(config.snapshot.compression, Compression::None);
    assert_eq!(config.snapshot.burst_multiplier, 0.5);
    assert_eq!(config.autosave.debounce, Duration::from_millis(250));
}

#[test]
fn unknown_keys_are_rejected() {
    let err = EngineConfig::from_toml_str("[snapshot]\nbase_intervall = 3\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[parameterized(
    zero_interval = { "[snapshot]\nbase_interval = 0" },
    zero_timer = { "[snapshot]\ntimer_interval = \"0s\"" },
    inverted_thresholds = { "[snapshot]\nidle_threshold = 30.0\nburst_threshold = 10.0" },
    warn_above_max = { "[snapshot]\nwarn_bytes = 10\nmax_bytes = 5" },
    negative_multiplier = { "[snapshot]\nburst_multiplier = -1.0" },
)]
fn invalid_values_are_rejected(toml: &str) {
    let err = EngineConfig::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn retention_never_drops_below_two() {
    let config = SnapshotConfig {
        keep_snapshots: 0,
        ..SnapshotConfig::default()
    };
    assert_eq!(config.retained_snapshots(), 2);
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vellum.toml");
    std::fs::write(&path, "[navigator]\ncache_capacity = 4\n").unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.navigator.cache_capacity, 4);
}

#[test]
fn compression_tags_round_trip() {
    for c in [Compression::None, Compression::Gzip] {
        assert_eq!(c.as_tag().parse::<Compression>().unwrap(), c);
    }
    assert!("lz4".parse::<Compression>().is_err());
}
