// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vellum-engine: document sessions over the event log
//!
//! Snapshot scheduling, history navigation, auto-save, and the manual
//! save and load paths, tied together by [`DocumentSession`].

mod autosave;
mod cache;
mod error;
mod load;
mod navigator;
mod save;
mod session;
mod snapshot;

pub use autosave::AutoSave;
pub use error::DocumentError;
pub use load::{LoadError, LoadOrchestrator, LoadReport, LoadedDocument};
pub use navigator::{Navigator, NavigatorError, Reconstruction, ReplayWarning, StateChanged};
pub use save::{SaveError, SaveGuard, SaveOrchestrator, SaveOutcome};
pub use session::{DocumentSession, SessionOptions};
pub use snapshot::{PreparedSnapshot, SnapshotError, SnapshotManager, SnapshotPhase, SnapshotTicket};
