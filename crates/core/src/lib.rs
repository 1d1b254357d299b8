// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vellum-core: document model and event vocabulary
//!
//! This crate provides:
//! - The closed set of document events and their stored encoding
//! - `DocumentState` with its deterministic `apply`
//! - Adaptive snapshot cadence bookkeeping
//! - Configuration, clock and telemetry abstractions shared by the engine

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod cadence;
pub mod clock;
pub mod config;
pub mod document;
pub mod event;
pub mod id;
pub mod telemetry;

pub use cadence::{ActivityLevel, SnapshotCadence, SnapshotTrigger};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    AutoSaveConfig, Compression, ConfigError, EngineConfig, NavigatorConfig, SnapshotConfig,
};
pub use document::{
    ApplyError, DocumentState, Layer, Point, Shape, Style, VectorObject, Viewport,
};
pub use event::{DecodeError, EventKind, EventRecord, NewEvent};
pub use id::{DocumentId, LayerId, ObjectId};
pub use telemetry::{
    ChannelTelemetry, NoopTelemetry, SharedTelemetry, TelemetrySample, TelemetrySink,
    TracingTelemetry,
};

/// On-disk format version this build reads and writes
pub const CURRENT_FORMAT_VERSION: u32 = 1;
