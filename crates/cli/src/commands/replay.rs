// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{or_dash, Context};
use crate::output;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use vellum_core::DocumentState;
use vellum_engine::{DocumentError, ReplayWarning};

#[derive(Args)]
pub struct ReplayArgs {
    /// Document file; older formats are upgraded first
    pub file: PathBuf,

    /// Sequence to reconstruct (defaults to the head)
    #[arg(long)]
    pub at: Option<u64>,

    /// Include the full reconstructed state in JSON output
    #[arg(long)]
    pub full: bool,
}

#[derive(Serialize)]
struct ReplaySummary {
    sequence: Option<u64>,
    title: String,
    layers: Vec<LayerRow>,
    objects: usize,
    selected: usize,
    events_applied: usize,
    base_sequence: Option<u64>,
    warnings: Vec<WarningRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<DocumentState>,
}

#[derive(Serialize)]
struct LayerRow {
    id: String,
    name: String,
    visible: bool,
    objects: usize,
}

#[derive(Serialize)]
struct WarningRow {
    sequence: u64,
    event_type: String,
    reason: String,
}

impl From<&ReplayWarning> for WarningRow {
    fn from(w: &ReplayWarning) -> Self {
        Self {
            sequence: w.sequence,
            event_type: w.event_type.clone(),
            reason: w.reason.clone(),
        }
    }
}

impl fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sequence: {}", or_dash(self.sequence))?;
        writeln!(f, "Title:    {}", self.title)?;
        match self.base_sequence {
            Some(base) => writeln!(
                f,
                "Replayed: {} event(s) on top of the state at {}",
                self.events_applied, base
            )?,
            None => writeln!(f, "Replayed: {} event(s)", self.events_applied)?,
        }
        write!(
            f,
            "Objects:  {} ({} selected)\nLayers:   {}",
            self.objects,
            self.selected,
            self.layers.len()
        )?;
        for layer in &self.layers {
            write!(
                f,
                "\n  {} {:<16} {} object(s){}",
                layer.id,
                layer.name,
                layer.objects,
                if layer.visible { "" } else { "  (hidden)" }
            )?;
        }
        for w in &self.warnings {
            write!(
                f,
                "\nwarning: skipped {} at {}: {}",
                w.event_type, w.sequence, w.reason
            )?;
        }
        Ok(())
    }
}

pub async fn handle(args: ReplayArgs, ctx: &Context) -> Result<()> {
    let mut loaded = ctx.loader()?.load(&args.file).await.map_err(DocumentError::from)?;
    let head = loaded.navigator.head();

    let (sequence, state, warnings, events_applied, base_sequence) = match args.at {
        Some(target) if Some(target) != head => {
            let r = loaded
                .navigator
                .reconstruct(target)
                .await
                .map_err(DocumentError::from)?;
            (Some(r.sequence), r.state, r.warnings, r.events_applied, r.base_sequence)
        }
        // The load already replayed to the head
        _ => (
            head,
            loaded.navigator.state(),
            loaded.report.warnings.clone(),
            loaded.report.events_replayed,
            loaded.report.base_sequence,
        ),
    };

    let summary = ReplaySummary {
        sequence,
        title: state.title.clone(),
        layers: state
            .layers
            .iter()
            .map(|l| LayerRow {
                id: l.id.to_string(),
                name: l.name.clone(),
                visible: l.visible,
                objects: l.objects.len(),
            })
            .collect(),
        objects: state.objects.len(),
        selected: state.selection.len(),
        events_applied,
        base_sequence,
        warnings: warnings.iter().map(WarningRow::from).collect(),
        state: args.full.then(|| (*state).clone()),
    };
    output::print(&summary, ctx.format);
    Ok(())
}
