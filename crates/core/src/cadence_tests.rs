// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use yare::parameterized;

fn cadence(clock: &FakeClock) -> SnapshotCadence<FakeClock> {
    SnapshotCadence::new(SnapshotConfig::default(), clock.clone(), None, None)
}

/// Record `count` events spaced `gap` apart, returning the first sequence
/// that produced a trigger
fn feed(
    cadence: &mut SnapshotCadence<FakeClock>,
    clock: &FakeClock,
    start: u64,
    count: u64,
    gap: Duration,
) -> Option<u64> {
    let mut first = None;
    for seq in start..start + count {
        clock.advance(gap);
        if cadence.record_event(seq).is_some() && first.is_none() {
            first = Some(seq);
        }
    }
    first
}

#[parameterized(
    burst = { 40, ActivityLevel::Burst, 250 },
    normal = { 100, ActivityLevel::Normal, 500 },
    idle = { 1000, ActivityLevel::Idle, 1000 },
)]
fn sustained_rate_sets_interval(gap_ms: u64, expected: ActivityLevel, interval: u64) {
    let clock = FakeClock::new();
    let mut cadence = cadence(&clock);
    feed(&mut cadence, &clock, 0, 40, Duration::from_millis(gap_ms));

    assert_eq!(cadence.activity(), expected);
    assert_eq!(cadence.effective_interval(), interval);
}

#[test]
fn burst_editing_snapshots_before_base_interval() {
    let clock = FakeClock::new();
    let mut cadence = cadence(&clock);

    let first = feed(&mut cadence, &clock, 0, 1000, Duration::from_millis(40));

    let first = first.unwrap();
    assert!(first <= 250, "first trigger at {}", first);
}

#[test]
fn backlog_counts_from_last_snapshot() {
    let clock = FakeClock::new();
    let mut cadence = cadence(&clock);
    feed(&mut cadence, &clock, 0, 10, Duration::from_secs(1));
    assert_eq!(cadence.backlog(), 10);

    cadence.mark_snapshot(9);
    assert_eq!(cadence.backlog(), 0);

    cadence.record_event(10);
    assert_eq!(cadence.backlog(), 1);
}

#[test]
fn snapshot_mid_backlog_keeps_newer_events() {
    let clock = FakeClock::new();
    let mut cadence = cadence(&clock);
    feed(&mut cadence, &clock, 0, 10, Duration::from_secs(1));

    // Events 8 and 9 arrived while the snapshot at 7 was serializing
    cadence.mark_snapshot(7);
    assert_eq!(cadence.backlog(), 2);
}

#[test]
fn timer_without_new_events_is_a_noop() {
    let clock = FakeClock::new();
    let mut cadence = SnapshotCadence::new(SnapshotConfig::default(), clock.clone(), Some(5), Some(5));

    clock.advance(Duration::from_secs(3600));
    assert_eq!(cadence.timer_due(), None);
}

#[test]
fn timer_fires_after_interval_with_new_events() {
    let clock = FakeClock::new();
    let mut cadence = SnapshotCadence::new(SnapshotConfig::default(), clock.clone(), Some(5), Some(5));
    cadence.record_event(6);

    clock.advance(Duration::from_secs(9 * 60));
    assert_eq!(cadence.timer_due(), None);

    clock.advance(Duration::from_secs(60));
    assert_eq!(cadence.timer_due(), Some(SnapshotTrigger::Timer));

    cadence.mark_snapshot(6);
    assert_eq!(cadence.timer_due(), None);
}

#[test]
fn rate_decays_once_window_passes() {
    let clock = FakeClock::new();
    let mut cadence = cadence(&clock);
    feed(&mut cadence, &clock, 0, 100, Duration::from_millis(10));
    assert_eq!(cadence.activity(), ActivityLevel::Burst);

    clock.advance(Duration::from_secs(120));
    assert_eq!(cadence.events_per_second(), 0.0);
    assert_eq!(cadence.activity(), ActivityLevel::Idle);
}

#[test]
fn existing_log_without_snapshot_counts_as_backlog() {
    let clock = FakeClock::new();
    let cadence = SnapshotCadence::new(SnapshotConfig::default(), clock, None, Some(41));
    assert_eq!(cadence.backlog(), 42);
}
