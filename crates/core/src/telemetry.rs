// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry sink
//!
//! Snapshot, save and load paths report numeric samples here. A sink is a
//! pure consumer: `record` must return immediately and never fail.

use crate::cadence::ActivityLevel;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A numeric observation emitted by the persistence core
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetrySample {
    SnapshotWritten {
        sequence: u64,
        duration: Duration,
        uncompressed_bytes: u64,
        compressed_bytes: u64,
        activity: ActivityLevel,
        effective_interval: u64,
        backlog: u64,
    },
    SnapshotSkipped {
        sequence: u64,
        reason: String,
    },
    SaveCompleted {
        sequence: u64,
        duration: Duration,
        wrote_snapshot: bool,
    },
    LoadCompleted {
        sequence: Option<u64>,
        duration: Duration,
        events_replayed: usize,
        was_migrated: bool,
    },
}

impl TelemetrySample {
    /// Compression ratio for written snapshots (compressed / uncompressed)
    pub fn compression_ratio(&self) -> Option<f64> {
        match self {
            TelemetrySample::SnapshotWritten {
                uncompressed_bytes,
                compressed_bytes,
                ..
            } if *uncompressed_bytes > 0 => {
                Some(*compressed_bytes as f64 / *uncompressed_bytes as f64)
            }
            _ => None,
        }
    }
}

/// Receives telemetry samples
pub trait TelemetrySink: Send + Sync {
    fn record(&self, sample: TelemetrySample);
}

/// Shared handle to a sink
pub type SharedTelemetry = Arc<dyn TelemetrySink>;

/// Discards every sample
#[derive(Debug, Clone, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record(&self, _sample: TelemetrySample) {}
}

/// Emits samples as structured `tracing` events
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, sample: TelemetrySample) {
        let ratio = sample.compression_ratio();
        match sample {
            TelemetrySample::SnapshotWritten {
                sequence,
                duration,
                uncompressed_bytes,
                compressed_bytes,
                activity,
                effective_interval,
                backlog,
            } => tracing::info!(
                sequence,
                duration_ms = duration.as_millis() as u64,
                uncompressed_bytes,
                compressed_bytes,
                ratio = ratio.unwrap_or(1.0),
                activity = %activity,
                effective_interval,
                backlog,
                "snapshot written"
            ),
            TelemetrySample::SnapshotSkipped { sequence, reason } => {
                tracing::warn!(sequence, %reason, "snapshot skipped")
            }
            TelemetrySample::SaveCompleted {
                sequence,
                duration,
                wrote_snapshot,
            } => tracing::info!(
                sequence,
                duration_ms = duration.as_millis() as u64,
                wrote_snapshot,
                "save completed"
            ),
            TelemetrySample::LoadCompleted {
                sequence,
                duration,
                events_replayed,
                was_migrated,
            } => tracing::info!(
                sequence = ?sequence,
                duration_ms = duration.as_millis() as u64,
                events_replayed,
                was_migrated,
                "load completed"
            ),
        }
    }
}

/// Forwards samples over an unbounded channel
///
/// Sending never blocks; samples are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelTelemetry {
    tx: mpsc::UnboundedSender<TelemetrySample>,
}

impl ChannelTelemetry {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TelemetrySample>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelTelemetry {
    fn record(&self, sample: TelemetrySample) {
        let _ = self.tx.send(sample);
    }
}
