// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command handlers

pub mod compact;
pub mod history;
pub mod info;
pub mod migrate;
pub mod replay;
pub mod verify;

use crate::error::CliError;
use crate::output::OutputFormat;
use std::path::Path;
use std::sync::Arc;
use vellum_core::{EngineConfig, TracingTelemetry, CURRENT_FORMAT_VERSION};
use vellum_engine::{DocumentError, LoadOrchestrator};
use vellum_storage::{DocumentMetadata, EventStore, MigrationRunner};

/// Settings shared by every command
pub struct Context {
    pub config: EngineConfig,
    pub format: OutputFormat,
}

impl Context {
    /// Full load path: verify, migrate, replay to the head
    pub fn loader(&self) -> Result<LoadOrchestrator, DocumentError> {
        Ok(LoadOrchestrator::new(
            MigrationRunner::builtin()?,
            self.config.navigator.clone(),
            Arc::new(TracingTelemetry),
        ))
    }
}

/// Open a file for reading only; nothing is migrated and the journal mode is
/// left alone
pub async fn inspect(path: &Path) -> Result<(EventStore, DocumentMetadata), DocumentError> {
    tracing::debug!(path = %path.display(), "inspecting document");
    let store = EventStore::open(path).await?;
    let metadata = store.metadata().await?.ok_or(DocumentError::MetadataMissing)?;
    Ok((store, metadata))
}

/// Row-level reads need the current layout
pub fn require_current(path: &Path, metadata: &DocumentMetadata) -> anyhow::Result<()> {
    let found = metadata.format_version;
    if found > CURRENT_FORMAT_VERSION {
        return Err(DocumentError::UnsupportedVersion {
            found,
            supported: CURRENT_FORMAT_VERSION,
        }
        .into());
    }
    if found < CURRENT_FORMAT_VERSION {
        return Err(CliError::new(format!(
            "{} uses format version {}",
            path.display(),
            found
        ))
        .with_context(format!(
            "this command reads format version {}",
            CURRENT_FORMAT_VERSION
        ))
        .with_suggestion(format!("Upgrade it first: vellum migrate {}", path.display()))
        .into());
    }
    Ok(())
}

fn or_dash(value: Option<impl std::fmt::Display>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
