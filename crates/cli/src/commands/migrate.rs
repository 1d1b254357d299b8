// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Context;
use crate::output;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use vellum_engine::DocumentError;

#[derive(Args)]
pub struct MigrateArgs {
    /// Document file
    pub file: PathBuf,
}

#[derive(Serialize)]
struct MigrateResult {
    file: String,
    from: u32,
    to: u32,
    steps: Vec<(u32, u32)>,
}

impl fmt::Display for MigrateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            write!(f, "{} is already at format version {}", self.file, self.to)
        } else {
            write!(
                f,
                "Migrated {} from format version {} to {}",
                self.file, self.from, self.to
            )
        }
    }
}

pub async fn handle(args: MigrateArgs, ctx: &Context) -> Result<()> {
    let report = ctx
        .loader()?
        .migrate(&args.file)
        .await
        .map_err(DocumentError::from)?;

    let result = MigrateResult {
        file: args.file.display().to_string(),
        from: report.from,
        to: report.to,
        steps: report.applied,
    };
    output::print(&result, ctx.format);
    Ok(())
}
