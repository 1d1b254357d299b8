// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! Document failures are shown with their user message first and the
//! technical detail as context.

use std::fmt;
use vellum_engine::DocumentError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct CliError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CliError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    /// Add context about why this error might have happened.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Add a suggestion for how to fix this error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Set the source error that caused this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Unwrap whatever a command returned into something printable
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        let err = match err.downcast::<CliError>() {
            Ok(cli) => return cli,
            Err(err) => err,
        };
        match err.downcast::<DocumentError>() {
            Ok(doc) => CliError::from(doc),
            Err(other) => CliError::new(format!("{:#}", other)),
        }
    }

    /// A file that failed `vellum verify`
    pub fn unhealthy(file: &str, problems: usize) -> Self {
        CliError::new(format!("{} failed verification", file))
            .with_context(format!("{} problem(s) found", problems))
            .with_suggestion("Restore the document from a backup")
    }
}

impl From<DocumentError> for CliError {
    fn from(err: DocumentError) -> Self {
        let mut out = CliError::new(err.user_message()).with_context(err.to_string());
        match &err {
            DocumentError::StorageUnavailable(_) => {
                out = out.with_suggestion("Check the path and the file permissions");
            }
            DocumentError::CorruptedStore(_) | DocumentError::MetadataMissing => {
                out = out.with_suggestion("Inspect the file with: vellum verify <file>");
            }
            DocumentError::MigrationFailed(_) => {
                out = out
                    .with_suggestion("Retry the upgrade with: vellum migrate <file>")
                    .with_suggestion("Inspect the file with: vellum verify <file>");
            }
            DocumentError::InvalidSequence {
                range: Some((floor, head)),
                ..
            } => {
                out = out.with_suggestion(format!("Pick a sequence from {} to {}", floor, head));
            }
            DocumentError::InvalidSequence { range: None, .. } => {
                out = out.with_context("the document has no recorded events");
            }
            _ => {}
        }
        out.with_source(err)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
