// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema migrations between format versions
//!
//! Migrations form a contiguous chain of single-step upgrades. A run applies
//! every step from the file's version to the target inside one transaction,
//! then bumps both version markers; any failure leaves the file untouched.

use crate::store::{read_user_version, EventStore, StoreError};
use rusqlite::Transaction;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid migration chain: {0}")]
    InvalidChain(String),
    #[error("cannot downgrade from version {from} to {to}")]
    DowngradeNotSupported { from: u32, to: u32 },
    #[error("no migration from version {from} to {to}")]
    MissingMigrationPath { from: u32, to: u32 },
    #[error("file is at version {found}, expected {expected}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("migration {from} -> {to} failed: {source}")]
    StepFailed {
        from: u32,
        to: u32,
        #[source]
        source: rusqlite::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for MigrationError {
    fn from(err: rusqlite::Error) -> Self {
        MigrationError::Store(err.into())
    }
}

/// One upgrade step
pub trait Migration: Send + Sync {
    fn from_version(&self) -> u32;

    fn to_version(&self) -> u32 {
        self.from_version() + 1
    }

    fn description(&self) -> &str;

    fn apply(&self, tx: &Transaction<'_>) -> rusqlite::Result<()>;
}

/// Migration expressed as a SQL batch
#[derive(Debug, Clone)]
pub struct SqlMigration {
    pub from: u32,
    pub to: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

impl Migration for SqlMigration {
    fn from_version(&self) -> u32 {
        self.from
    }

    fn to_version(&self) -> u32 {
        self.to
    }

    fn description(&self) -> &str {
        self.description
    }

    fn apply(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute_batch(self.sql)
    }
}

/// Migration backed by a closure
pub struct FnMigration<F> {
    from: u32,
    to: u32,
    description: String,
    f: F,
}

impl<F> FnMigration<F>
where
    F: Fn(&Transaction<'_>) -> rusqlite::Result<()> + Send + Sync,
{
    pub fn new(from: u32, to: u32, description: impl Into<String>, f: F) -> Self {
        Self {
            from,
            to,
            description: description.into(),
            f,
        }
    }
}

impl<F> Migration for FnMigration<F>
where
    F: Fn(&Transaction<'_>) -> rusqlite::Result<()> + Send + Sync,
{
    fn from_version(&self) -> u32 {
        self.from
    }

    fn to_version(&self) -> u32 {
        self.to
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn apply(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        (self.f)(tx)
    }
}

/// Format 0 files predate per-event authorship and snapshot compression
const V0_TO_V1: &str = r#"
ALTER TABLE events ADD COLUMN user_id TEXT;
ALTER TABLE snapshots ADD COLUMN compression TEXT NOT NULL DEFAULT 'none';
CREATE INDEX IF NOT EXISTS idx_snapshots_document ON snapshots(document_id);
"#;

/// Migrations shipped with this build
pub fn builtin_migrations() -> Vec<Arc<dyn Migration>> {
    vec![Arc::new(SqlMigration {
        from: 0,
        to: 1,
        description: "add event user_id and snapshot compression",
        sql: V0_TO_V1,
    })]
}

/// What a migration run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
    /// Steps applied, as (from, to) pairs
    pub applied: Vec<(u32, u32)>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies a validated chain of migrations
#[derive(Clone)]
pub struct MigrationRunner {
    steps: BTreeMap<u32, Arc<dyn Migration>>,
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("versions", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MigrationRunner {
    /// Validate and register a chain
    ///
    /// Every step must advance exactly one version, no version may have two
    /// steps, and the chain must have no gaps.
    pub fn new(migrations: Vec<Arc<dyn Migration>>) -> Result<Self, MigrationError> {
        let mut steps = BTreeMap::new();
        for migration in migrations {
            let (from, to) = (migration.from_version(), migration.to_version());
            if to != from + 1 {
                return Err(MigrationError::InvalidChain(format!(
                    "step {} -> {} must advance exactly one version",
                    from, to
                )));
            }
            if steps.insert(from, migration).is_some() {
                return Err(MigrationError::InvalidChain(format!(
                    "duplicate step from version {}",
                    from
                )));
            }
        }

        let versions: Vec<u32> = steps.keys().copied().collect();
        if let Some(gap) = versions.windows(2).find(|w| w[1] != w[0] + 1) {
            return Err(MigrationError::InvalidChain(format!(
                "gap between version {} and {}",
                gap[0] + 1,
                gap[1]
            )));
        }

        Ok(Self { steps })
    }

    /// Runner over [`builtin_migrations`]
    pub fn builtin() -> Result<Self, MigrationError> {
        Self::new(builtin_migrations())
    }

    /// Highest version the chain can reach
    pub fn latest_version(&self) -> Option<u32> {
        self.steps.values().map(|m| m.to_version()).max()
    }

    /// Upgrade the store from `from` to `to`
    ///
    /// Re-running after success is a no-op: the persisted version is read
    /// inside the transaction and compared against the request.
    pub async fn apply_migrations(
        &self,
        store: &EventStore,
        from: u32,
        to: u32,
    ) -> Result<MigrationReport, MigrationError> {
        if from == to {
            return Ok(MigrationReport {
                from,
                to,
                applied: Vec::new(),
            });
        }
        if from > to {
            return Err(MigrationError::DowngradeNotSupported { from, to });
        }

        let mut path = Vec::new();
        for version in from..to {
            match self.steps.get(&version) {
                Some(step) => path.push(Arc::clone(step)),
                None => {
                    return Err(MigrationError::MissingMigrationPath {
                        from: version,
                        to: version + 1,
                    })
                }
            }
        }

        let report = store
            .transaction(move |tx| -> Result<MigrationReport, MigrationError> {
                let persisted = read_user_version(tx)?;
                if persisted == to {
                    return Ok(MigrationReport {
                        from: persisted,
                        to,
                        applied: Vec::new(),
                    });
                }
                if persisted > to {
                    return Err(MigrationError::DowngradeNotSupported { from: persisted, to });
                }
                if persisted != from {
                    return Err(MigrationError::VersionMismatch {
                        expected: from,
                        found: persisted,
                    });
                }

                let mut applied = Vec::with_capacity(path.len());
                for step in &path {
                    let (step_from, step_to) = (step.from_version(), step.to_version());
                    step.apply(tx).map_err(|source| MigrationError::StepFailed {
                        from: step_from,
                        to: step_to,
                        source,
                    })?;
                    tracing::info!(
                        from = step_from,
                        to = step_to,
                        description = step.description(),
                        "applied migration"
                    );
                    applied.push((step_from, step_to));
                }

                tx.pragma_update(None, "user_version", to)?;
                tx.execute("UPDATE metadata SET format_version = ?1", [to])?;
                Ok(MigrationReport { from, to, applied })
            })
            .await?;

        Ok(report)
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
