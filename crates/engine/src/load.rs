// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Load orchestrator
//!
//! Opens a document file, refuses it when damaged or written by a newer
//! build, upgrades older files, and reconstructs state at the head. Nothing
//! is written to a file that is refused.

use crate::navigator::{Navigator, NavigatorError, ReplayWarning};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use vellum_core::{
    DocumentId, NavigatorConfig, SharedTelemetry, TelemetrySample, CURRENT_FORMAT_VERSION,
};
use vellum_storage::{
    DocumentMetadata, EventStore, MigrationError, MigrationReport, MigrationRunner, StoreError,
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("integrity check failed: {}", .0.join("; "))]
    Corrupted(Vec<String>),
    #[error("document metadata is missing")]
    MetadataMissing,
    #[error("file format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Navigator(#[from] NavigatorError),
}

/// Summary of a successful load
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub document_id: DocumentId,
    pub title: String,
    pub format_version: u32,
    /// Head sequence, `None` for an empty history
    pub final_sequence: Option<u64>,
    pub was_migrated: bool,
    /// Version the file had before migrating
    pub migrated_from: Option<u32>,
    pub events_replayed: usize,
    /// Snapshot the head replay started from
    pub base_sequence: Option<u64>,
    pub warnings: Vec<ReplayWarning>,
}

/// An opened document, positioned at its head
pub struct LoadedDocument {
    pub store: EventStore,
    pub metadata: DocumentMetadata,
    pub navigator: Navigator,
    pub report: LoadReport,
}

/// File-level open sequence shared by sessions and tooling
#[derive(Clone)]
pub struct LoadOrchestrator {
    migrations: MigrationRunner,
    navigator: NavigatorConfig,
    telemetry: SharedTelemetry,
}

impl LoadOrchestrator {
    pub fn new(
        migrations: MigrationRunner,
        navigator: NavigatorConfig,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self {
            migrations,
            navigator,
            telemetry,
        }
    }

    /// Open, verify, migrate if needed, and reconstruct the head
    pub async fn load(&self, path: &Path) -> Result<LoadedDocument, LoadError> {
        let started = Instant::now();
        let (store, mut metadata, migration) = self.prepare(path).await?;

        let navigator =
            Navigator::open(store.clone(), metadata.document_id.clone(), &self.navigator).await?;
        let was_migrated = migration.as_ref().is_some_and(|m| !m.is_noop());
        if was_migrated {
            metadata.format_version = CURRENT_FORMAT_VERSION;
        }

        let report = LoadReport {
            document_id: metadata.document_id.clone(),
            title: metadata.title.clone(),
            format_version: metadata.format_version,
            final_sequence: navigator.head(),
            was_migrated,
            migrated_from: migration.filter(|m| !m.is_noop()).map(|m| m.from),
            events_replayed: navigator.events_applied(),
            base_sequence: navigator.base_sequence(),
            warnings: navigator.warnings().to_vec(),
        };

        let duration = started.elapsed();
        tracing::info!(
            path = %path.display(),
            document_id = %report.document_id,
            final_sequence = ?report.final_sequence,
            was_migrated,
            warnings = report.warnings.len(),
            elapsed_ms = duration.as_millis() as u64,
            "document loaded"
        );
        self.telemetry.record(TelemetrySample::LoadCompleted {
            sequence: report.final_sequence,
            duration,
            events_replayed: report.events_replayed,
            was_migrated,
        });

        Ok(LoadedDocument {
            store,
            metadata,
            navigator,
            report,
        })
    }

    /// Bring a file to the current format without reconstructing state
    pub async fn migrate(&self, path: &Path) -> Result<MigrationReport, LoadError> {
        let (_store, metadata, migration) = self.prepare(path).await?;
        Ok(migration.unwrap_or(MigrationReport {
            from: metadata.format_version,
            to: metadata.format_version,
            applied: Vec::new(),
        }))
    }

    /// Every step of a load up to and including migration
    async fn prepare(
        &self,
        path: &Path,
    ) -> Result<(EventStore, DocumentMetadata, Option<MigrationReport>), LoadError> {
        let store = EventStore::open(path).await?;

        let problems = store.integrity_check().await?;
        if !problems.is_empty() {
            tracing::warn!(path = %path.display(), ?problems, "integrity check failed");
            return Err(LoadError::Corrupted(problems));
        }

        let metadata = store.metadata().await?.ok_or(LoadError::MetadataMissing)?;

        let found = metadata.format_version;
        if found > CURRENT_FORMAT_VERSION {
            tracing::warn!(
                path = %path.display(),
                found,
                supported = CURRENT_FORMAT_VERSION,
                "refusing newer file format"
            );
            return Err(LoadError::UnsupportedVersion {
                found,
                supported: CURRENT_FORMAT_VERSION,
            });
        }

        let migration = if found < CURRENT_FORMAT_VERSION {
            let report = self
                .migrations
                .apply_migrations(&store, found, CURRENT_FORMAT_VERSION)
                .await?;
            tracing::info!(
                path = %path.display(),
                from = found,
                to = CURRENT_FORMAT_VERSION,
                steps = report.applied.len(),
                "document migrated"
            );
            Some(report)
        } else {
            None
        };

        // The file is accepted from here on
        store.enable_wal().await?;
        Ok((store, metadata, migration))
    }
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
