// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{or_dash, Context};
use crate::output;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use vellum_engine::DocumentError;

#[derive(Args)]
pub struct CompactArgs {
    /// Document file; older formats are upgraded first
    pub file: PathBuf,
}

#[derive(Serialize)]
struct CompactResult {
    file: String,
    snapshots_pruned: usize,
    events_removed: u64,
    history_floor: Option<u64>,
}

impl fmt::Display for CompactResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Removed {} event(s) and {} snapshot(s) from {}; history now starts at {}",
            self.events_removed,
            self.snapshots_pruned,
            self.file,
            or_dash(self.history_floor)
        )
    }
}

pub async fn handle(args: CompactArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.loader()?.load(&args.file).await.map_err(DocumentError::from)?;
    let doc = &loaded.metadata.document_id;
    let store = &loaded.store;

    let snapshots_pruned = store
        .prune_snapshots(doc, ctx.config.snapshot.retained_snapshots())
        .await
        .map_err(DocumentError::from)?;
    let compaction = store.compact(doc).await.map_err(DocumentError::from)?;
    store.checkpoint().await.map_err(DocumentError::from)?;

    let result = CompactResult {
        file: args.file.display().to_string(),
        snapshots_pruned,
        events_removed: compaction.events_removed,
        history_floor: compaction.history_floor,
    };
    output::print(&result, ctx.format);
    Ok(())
}
