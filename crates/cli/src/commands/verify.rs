// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Context;
use crate::error::CliError;
use crate::output;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use vellum_core::CURRENT_FORMAT_VERSION;
use vellum_engine::DocumentError;
use vellum_storage::EventStore;

#[derive(Args)]
pub struct VerifyArgs {
    /// Document file
    pub file: PathBuf,
}

#[derive(Serialize)]
struct VerifyReport {
    file: String,
    format_version: Option<u32>,
    supported_version: u32,
    problems: Vec<String>,
    healthy: bool,
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.healthy {
            return write!(f, "{}: ok", self.file);
        }
        write!(f, "{}: {} problem(s)", self.file, self.problems.len())?;
        for p in &self.problems {
            write!(f, "\n  - {}", p)?;
        }
        Ok(())
    }
}

pub async fn handle(args: VerifyArgs, ctx: &Context) -> Result<()> {
    let file = args.file.display().to_string();
    let store = EventStore::open(&args.file)
        .await
        .map_err(DocumentError::from)?;

    let mut problems = store.integrity_check().await.map_err(DocumentError::from)?;
    if problems.is_empty() {
        let schema = store.verify_schema().await.map_err(DocumentError::from)?;
        problems.extend(schema.problems());
    }

    let metadata = if problems.is_empty() {
        store.metadata().await.map_err(DocumentError::from)?
    } else {
        None
    };
    let format_version = metadata.as_ref().map(|m| m.format_version);
    match format_version {
        None if problems.is_empty() => problems.push("document metadata is missing".to_string()),
        Some(found) if found > CURRENT_FORMAT_VERSION => problems.push(format!(
            "format version {} is newer than supported version {}",
            found, CURRENT_FORMAT_VERSION
        )),
        _ => {}
    }

    let report = VerifyReport {
        file: file.clone(),
        format_version,
        supported_version: CURRENT_FORMAT_VERSION,
        healthy: problems.is_empty(),
        problems,
    };
    output::print(&report, ctx.format);

    if !report.healthy {
        return Err(CliError::unhealthy(&file, report.problems.len()).into());
    }
    Ok(())
}
