// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{inspect, or_dash, Context};
use crate::output;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use vellum_core::CURRENT_FORMAT_VERSION;
use vellum_engine::DocumentError;

#[derive(Args)]
pub struct InfoArgs {
    /// Document file
    pub file: PathBuf,
}

#[derive(Serialize)]
struct DocumentInfo {
    document_id: String,
    title: String,
    author: Option<String>,
    format_version: u32,
    schema_version: u32,
    created_at: String,
    modified_at: String,
    first_sequence: Option<u64>,
    last_sequence: Option<u64>,
    events: u64,
    last_saved: Option<u64>,
    /// Older layouts are not listed until migrated
    needs_migration: bool,
    snapshots: Vec<SnapshotRow>,
}

#[derive(Serialize)]
struct SnapshotRow {
    snapshot_id: i64,
    sequence: u64,
    compression: String,
    size_bytes: u64,
    created_at: String,
}

impl fmt::Display for DocumentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Document:  {}", self.document_id)?;
        writeln!(f, "Title:     {}", self.title)?;
        writeln!(f, "Author:    {}", or_dash(self.author.as_ref()))?;
        writeln!(
            f,
            "Format:    {} (schema {})",
            self.format_version, self.schema_version
        )?;
        writeln!(f, "Created:   {}", self.created_at)?;
        writeln!(f, "Modified:  {}", self.modified_at)?;
        match (self.first_sequence, self.last_sequence) {
            (Some(first), Some(last)) => writeln!(
                f,
                "Sequences: {}..={} ({} events)",
                first, last, self.events
            )?,
            _ => writeln!(f, "Sequences: none")?,
        }
        writeln!(f, "Saved at:  {}", or_dash(self.last_saved))?;
        if self.needs_migration {
            return write!(
                f,
                "Snapshots: not listed; upgrade with `vellum migrate` first"
            );
        }
        write!(f, "Snapshots: {}", self.snapshots.len())?;
        for s in &self.snapshots {
            write!(
                f,
                "\n  #{} at {}  {} bytes ({})  {}",
                s.snapshot_id, s.sequence, s.size_bytes, s.compression, s.created_at
            )?;
        }
        Ok(())
    }
}

pub async fn handle(args: InfoArgs, ctx: &Context) -> Result<()> {
    let (store, metadata) = inspect(&args.file).await?;
    let doc = &metadata.document_id;

    let needs_migration = metadata.format_version < CURRENT_FORMAT_VERSION;

    let snapshots = if needs_migration {
        Vec::new()
    } else {
        store
            .list_snapshots(doc)
            .await
            .map_err(DocumentError::from)?
            .into_iter()
            .map(|s| SnapshotRow {
                snapshot_id: s.snapshot_id,
                sequence: s.sequence,
                compression: s.compression,
                size_bytes: s.size_bytes,
                created_at: s.created_at.to_rfc3339(),
            })
            .collect()
    };

    let info = DocumentInfo {
        document_id: doc.to_string(),
        title: metadata.title.clone(),
        author: metadata.author.clone(),
        format_version: metadata.format_version,
        schema_version: store.schema_version().await.map_err(DocumentError::from)?,
        created_at: metadata.created_at.to_rfc3339(),
        modified_at: metadata.modified_at.to_rfc3339(),
        first_sequence: store.min_sequence(doc).await.map_err(DocumentError::from)?,
        last_sequence: store.max_sequence(doc).await.map_err(DocumentError::from)?,
        events: store.event_count(doc).await.map_err(DocumentError::from)?,
        last_saved: store
            .latest_of_type(doc, "document.saved")
            .await
            .map_err(DocumentError::from)?,
        needs_migration,
        snapshots,
    };
    output::print(&info, ctx.format);
    Ok(())
}
