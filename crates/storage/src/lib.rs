// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vellum-storage: SQLite persistence for documents
//!
//! One file per document holds the append-only event log, compressed
//! snapshots of materialized state and a single metadata row. Schema
//! upgrades run through a validated migration chain.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod codec;
pub mod migration;
pub mod schema;
mod store;

pub use codec::{CodecError, EncodedSnapshot};
pub use migration::{
    builtin_migrations, FnMigration, Migration, MigrationError, MigrationReport, MigrationRunner,
    SqlMigration,
};
pub use schema::SchemaReport;
pub use store::{
    Compaction, DocumentMetadata, EventStore, MetadataUpdate, SnapshotInfo, SnapshotWrite,
    StoreError, StoredSnapshot,
};
