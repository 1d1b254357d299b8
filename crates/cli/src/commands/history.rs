// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{inspect, or_dash, require_current, Context};
use crate::output;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use vellum_engine::DocumentError;

#[derive(Args)]
pub struct HistoryArgs {
    /// Document file
    pub file: PathBuf,

    /// First sequence to list
    #[arg(long, default_value_t = 0)]
    pub from: u64,

    /// Last sequence to list (defaults to the head)
    #[arg(long)]
    pub to: Option<u64>,
}

#[derive(Serialize)]
struct HistoryEntry {
    sequence: u64,
    timestamp: String,
    event_type: String,
    user_id: Option<String>,
    payload: serde_json::Value,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>6}  {}  {:<20} {}",
            self.sequence,
            self.timestamp,
            self.event_type,
            or_dash(self.user_id.as_ref())
        )
    }
}

pub async fn handle(args: HistoryArgs, ctx: &Context) -> Result<()> {
    let (store, metadata) = inspect(&args.file).await?;
    require_current(&args.file, &metadata)?;
    let records = store
        .read(&metadata.document_id, args.from, args.to)
        .await
        .map_err(DocumentError::from)?;

    let entries: Vec<HistoryEntry> = records
        .into_iter()
        .map(|r| HistoryEntry {
            sequence: r.sequence,
            timestamp: r.timestamp.to_rfc3339(),
            // Unreadable payloads are listed verbatim
            payload: serde_json::from_str(&r.payload)
                .unwrap_or_else(|_| serde_json::Value::String(r.payload.clone())),
            event_type: r.event_type,
            user_id: r.user_id,
        })
        .collect();

    output::print_list(&entries, "no events", ctx.format);
    Ok(())
}
