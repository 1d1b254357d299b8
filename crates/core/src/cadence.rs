// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adaptive snapshot cadence
//!
//! Pure bookkeeping for when a snapshot is due: the editing rate over a
//! rolling window, the backlog of events since the last snapshot, and the
//! wall-clock timer. Dense editing shortens the interval, sparse editing
//! lengthens it.

use crate::clock::Clock;
use crate::config::SnapshotConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Shortest span used when computing a rate, so the first few events of a
/// session don't register as an extreme burst
const MIN_RATE_SPAN: Duration = Duration::from_secs(1);

/// Classification of the recent editing rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Burst,
    Normal,
    Idle,
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityLevel::Burst => write!(f, "burst"),
            ActivityLevel::Normal => write!(f, "normal"),
            ActivityLevel::Idle => write!(f, "idle"),
        }
    }
}

/// Why a snapshot was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotTrigger {
    EventCount,
    Timer,
    Manual,
}

impl fmt::Display for SnapshotTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotTrigger::EventCount => write!(f, "event_count"),
            SnapshotTrigger::Timer => write!(f, "timer"),
            SnapshotTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Snapshot cadence for one document
#[derive(Debug, Clone)]
pub struct SnapshotCadence<C: Clock> {
    config: SnapshotConfig,
    clock: C,
    recent: VecDeque<Instant>,
    last_snapshot_at: Instant,
    last_snapshot_sequence: Option<u64>,
    last_observed_sequence: Option<u64>,
}

impl<C: Clock> SnapshotCadence<C> {
    /// Start tracking from the latest stored snapshot and log head
    pub fn new(
        config: SnapshotConfig,
        clock: C,
        last_snapshot_sequence: Option<u64>,
        max_sequence: Option<u64>,
    ) -> Self {
        let now = clock.now();
        Self {
            config,
            clock,
            recent: VecDeque::new(),
            last_snapshot_at: now,
            last_snapshot_sequence,
            last_observed_sequence: max_sequence,
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Note a newly appended event; returns a trigger when the backlog has
    /// reached the effective interval
    pub fn record_event(&mut self, sequence: u64) -> Option<SnapshotTrigger> {
        let now = self.clock.now();
        self.recent.push_back(now);
        self.prune(now);
        self.last_observed_sequence = Some(
            self.last_observed_sequence
                .map_or(sequence, |s| s.max(sequence)),
        );

        if self.backlog() >= self.effective_interval() {
            Some(SnapshotTrigger::EventCount)
        } else {
            None
        }
    }

    /// Check the wall-clock trigger; a tick with no new events is a no-op
    pub fn timer_due(&mut self) -> Option<SnapshotTrigger> {
        if self.backlog() == 0 {
            return None;
        }
        if self.clock.elapsed_since(self.last_snapshot_at) >= self.config.timer_interval {
            Some(SnapshotTrigger::Timer)
        } else {
            None
        }
    }

    /// Events recorded after the last snapshot
    pub fn backlog(&self) -> u64 {
        match (self.last_observed_sequence, self.last_snapshot_sequence) {
            (None, _) => 0,
            (Some(head), None) => head + 1,
            (Some(head), Some(snap)) => head.saturating_sub(snap),
        }
    }

    pub fn last_snapshot_sequence(&self) -> Option<u64> {
        self.last_snapshot_sequence
    }

    /// Events per second over the rolling window
    pub fn events_per_second(&mut self) -> f64 {
        let now = self.clock.now();
        self.prune(now);
        let Some(oldest) = self.recent.front() else {
            return 0.0;
        };
        let span = now.saturating_duration_since(*oldest).max(MIN_RATE_SPAN);
        self.recent.len() as f64 / span.as_secs_f64()
    }

    pub fn activity(&mut self) -> ActivityLevel {
        let rate = self.events_per_second();
        if rate >= self.config.burst_threshold {
            ActivityLevel::Burst
        } else if rate <= self.config.idle_threshold {
            ActivityLevel::Idle
        } else {
            ActivityLevel::Normal
        }
    }

    /// Snapshot interval adjusted for the current activity level
    pub fn effective_interval(&mut self) -> u64 {
        let base = self.config.base_interval as f64;
        let interval = match self.activity() {
            ActivityLevel::Burst => base * self.config.burst_multiplier,
            ActivityLevel::Idle => base * self.config.idle_multiplier,
            ActivityLevel::Normal => base,
        };
        (interval.round() as u64).max(1)
    }

    /// Record that a snapshot now covers everything up to `sequence`
    pub fn mark_snapshot(&mut self, sequence: u64) {
        self.last_snapshot_sequence = Some(
            self.last_snapshot_sequence
                .map_or(sequence, |s| s.max(sequence)),
        );
        self.last_snapshot_at = self.clock.now();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.recent.front() {
            if now.saturating_duration_since(*front) > self.config.rate_window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "cadence_tests.rs"]
mod tests;
