// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document error taxonomy
//!
//! Every failure that crosses the save/load boundary lands in
//! [`DocumentError`]. `Display` carries the technical detail for logs;
//! [`DocumentError::user_message`] is what an editor shows.

use crate::load::LoadError;
use crate::navigator::NavigatorError;
use crate::save::SaveError;
use crate::snapshot::SnapshotError;
use thiserror::Error;
use vellum_core::ApplyError;
use vellum_storage::{MigrationError, StoreError};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("store is corrupted: {0}")]
    CorruptedStore(String),
    #[error("file format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("migration failed: {0}")]
    MigrationFailed(String),
    #[error("document metadata is missing")]
    MetadataMissing,
    #[error("snapshot too large: estimated {estimated} bytes exceeds limit of {max}")]
    SnapshotTooLarge { estimated: u64, max: u64 },
    #[error("a save is already in progress")]
    SaveAlreadyInProgress,
    #[error("sequence {sequence} already exists for document {document_id}")]
    DuplicateSequence { document_id: String, sequence: u64 },
    #[error("unknown document: {0}")]
    UnknownDocument(String),
    #[error("sequence {requested} is outside the navigable range {}", range_label(.range))]
    InvalidSequence {
        requested: u64,
        range: Option<(u64, u64)>,
    },
    #[error("event rejected: {0}")]
    InvalidEvent(#[from] ApplyError),
    #[error("internal error: {0}")]
    Internal(String),
}

fn range_label(range: &Option<(u64, u64)>) -> String {
    match range {
        Some((floor, head)) => format!("{}..={}", floor, head),
        None => "(empty history)".to_string(),
    }
}

impl DocumentError {
    /// Actionable text for the person editing the document
    pub fn user_message(&self) -> String {
        match self {
            DocumentError::StorageUnavailable(_) => {
                "The document file could not be opened. Check that it exists, that you have \
                 permission to access it, and that no other program has it locked."
                    .to_string()
            }
            DocumentError::CorruptedStore(_) => {
                "The document file is damaged and cannot be opened. Restore it from a backup."
                    .to_string()
            }
            DocumentError::UnsupportedVersion { found, supported } => format!(
                "This document was written by a newer version (format {}, this version reads up \
                 to {}). Upgrade to open it.",
                found, supported
            ),
            DocumentError::MigrationFailed(_) => {
                "The document could not be upgraded to the current format. The file was left \
                 unchanged."
                    .to_string()
            }
            DocumentError::MetadataMissing => {
                "The file is not a document or is missing its header information.".to_string()
            }
            DocumentError::SnapshotTooLarge { .. } => {
                "The document is very large; a recovery checkpoint was skipped. Your work is \
                 still being recorded."
                    .to_string()
            }
            DocumentError::SaveAlreadyInProgress => {
                "A save is already running. Try again in a moment.".to_string()
            }
            DocumentError::DuplicateSequence { .. } => {
                "Another change was recorded at the same moment. Try again.".to_string()
            }
            DocumentError::UnknownDocument(id) => {
                format!("Document {} does not exist in this file.", id)
            }
            DocumentError::InvalidSequence { .. } => {
                "That point in the history is not available.".to_string()
            }
            DocumentError::InvalidEvent(e) => format!("That change could not be applied: {}.", e),
            DocumentError::Internal(_) => {
                "An unexpected error occurred. Details were written to the log.".to_string()
            }
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DocumentError::SaveAlreadyInProgress | DocumentError::DuplicateSequence { .. }
        )
    }
}

impl From<StoreError> for DocumentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => DocumentError::StorageUnavailable(msg),
            StoreError::AlreadyExists(path) => {
                DocumentError::StorageUnavailable(format!("{} already exists", path))
            }
            StoreError::Corrupted(msg) => DocumentError::CorruptedStore(msg),
            StoreError::UnknownDocument(id) => DocumentError::UnknownDocument(id.to_string()),
            StoreError::DuplicateSequence {
                document_id,
                sequence,
            } => DocumentError::DuplicateSequence {
                document_id: document_id.to_string(),
                sequence,
            },
            other => DocumentError::Internal(other.to_string()),
        }
    }
}

impl From<MigrationError> for DocumentError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Store(
                store @ (StoreError::Unavailable(_) | StoreError::Corrupted(_)),
            ) => store.into(),
            other => DocumentError::MigrationFailed(other.to_string()),
        }
    }
}

impl From<SnapshotError> for DocumentError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::TooLarge { estimated, max } => {
                DocumentError::SnapshotTooLarge { estimated, max }
            }
            SnapshotError::Store(e) => e.into(),
            other => DocumentError::Internal(other.to_string()),
        }
    }
}

impl From<NavigatorError> for DocumentError {
    fn from(err: NavigatorError) -> Self {
        match err {
            NavigatorError::InvalidSequence { requested, range } => {
                DocumentError::InvalidSequence { requested, range }
            }
            NavigatorError::Store(e) => e.into(),
        }
    }
}

impl From<SaveError> for DocumentError {
    fn from(err: SaveError) -> Self {
        match err {
            SaveError::AlreadyInProgress => DocumentError::SaveAlreadyInProgress,
            SaveError::Store(e) => e.into(),
            SaveError::Snapshot(e) => e.into(),
        }
    }
}

impl From<LoadError> for DocumentError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Store(e) => e.into(),
            LoadError::Corrupted(problems) => DocumentError::CorruptedStore(problems.join("; ")),
            LoadError::MetadataMissing => DocumentError::MetadataMissing,
            LoadError::UnsupportedVersion { found, supported } => {
                DocumentError::UnsupportedVersion { found, supported }
            }
            LoadError::Migration(e) => e.into(),
            LoadError::Navigator(e) => e.into(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
