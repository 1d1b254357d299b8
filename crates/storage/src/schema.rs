// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document file schema
//!
//! A document file holds three tables: one `metadata` row, the append-only
//! `events` log, and `snapshots` of materialized state. Both child tables
//! reference the metadata row and cascade on delete.

use rusqlite::Connection;

/// Index backing ordered reads of a document's log
pub const EVENTS_INDEX: &str = "idx_events_document_sequence";

/// Index backing snapshot lookups per document
pub const SNAPSHOTS_INDEX: &str = "idx_snapshots_document";

pub(crate) const TABLES: [&str; 3] = ["metadata", "events", "snapshots"];

/// Schema written by the current format version
pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    document_id    TEXT PRIMARY KEY NOT NULL,
    title          TEXT NOT NULL,
    format_version INTEGER NOT NULL,
    created_at     INTEGER NOT NULL,
    modified_at    INTEGER NOT NULL,
    author         TEXT
);

CREATE TABLE IF NOT EXISTS events (
    event_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id    TEXT NOT NULL REFERENCES metadata(document_id) ON DELETE CASCADE,
    event_sequence INTEGER NOT NULL,
    event_type     TEXT NOT NULL,
    event_payload  TEXT NOT NULL,
    timestamp      INTEGER NOT NULL,
    user_id        TEXT,
    UNIQUE (document_id, event_sequence)
);

CREATE INDEX IF NOT EXISTS idx_events_document_sequence
    ON events(document_id, event_sequence);

CREATE TABLE IF NOT EXISTS snapshots (
    snapshot_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id    TEXT NOT NULL REFERENCES metadata(document_id) ON DELETE CASCADE,
    event_sequence INTEGER NOT NULL,
    snapshot_data  BLOB NOT NULL,
    created_at     INTEGER NOT NULL,
    compression    TEXT NOT NULL DEFAULT 'none'
);

CREATE INDEX IF NOT EXISTS idx_snapshots_document
    ON snapshots(document_id);
"#;

/// Format 0 layout: no event author column, no compression tag, and no
/// snapshot index. Kept so older files can be produced and migrated.
pub(crate) const LEGACY_V0_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    document_id    TEXT PRIMARY KEY NOT NULL,
    title          TEXT NOT NULL,
    format_version INTEGER NOT NULL,
    created_at     INTEGER NOT NULL,
    modified_at    INTEGER NOT NULL,
    author         TEXT
);

CREATE TABLE IF NOT EXISTS events (
    event_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id    TEXT NOT NULL REFERENCES metadata(document_id) ON DELETE CASCADE,
    event_sequence INTEGER NOT NULL,
    event_type     TEXT NOT NULL,
    event_payload  TEXT NOT NULL,
    timestamp      INTEGER NOT NULL,
    UNIQUE (document_id, event_sequence)
);

CREATE INDEX IF NOT EXISTS idx_events_document_sequence
    ON events(document_id, event_sequence);

CREATE TABLE IF NOT EXISTS snapshots (
    snapshot_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id    TEXT NOT NULL REFERENCES metadata(document_id) ON DELETE CASCADE,
    event_sequence INTEGER NOT NULL,
    snapshot_data  BLOB NOT NULL,
    created_at     INTEGER NOT NULL
);
"#;

/// Result of a read-only schema check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub missing_tables: Vec<String>,
    pub missing_indexes: Vec<String>,
    /// Child tables whose document reference is absent or doesn't cascade
    pub missing_cascades: Vec<String>,
    pub foreign_keys_enabled: bool,
}

impl SchemaReport {
    pub fn is_healthy(&self) -> bool {
        self.missing_tables.is_empty()
            && self.missing_indexes.is_empty()
            && self.missing_cascades.is_empty()
            && self.foreign_keys_enabled
    }

    /// Human-readable list of problems, empty when healthy
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        for t in &self.missing_tables {
            out.push(format!("missing table {}", t));
        }
        for i in &self.missing_indexes {
            out.push(format!("missing index {}", i));
        }
        for t in &self.missing_cascades {
            out.push(format!("{} does not cascade from metadata", t));
        }
        if !self.foreign_keys_enabled {
            out.push("foreign key enforcement is off".to_string());
        }
        out
    }
}

/// Inspect the schema without modifying anything
pub(crate) fn verify(conn: &Connection) -> rusqlite::Result<SchemaReport> {
    let mut report = SchemaReport::default();

    for table in TABLES {
        if !object_exists(conn, "table", table)? {
            report.missing_tables.push(table.to_string());
        }
    }
    for index in [EVENTS_INDEX, SNAPSHOTS_INDEX] {
        if !object_exists(conn, "index", index)? {
            report.missing_indexes.push(index.to_string());
        }
    }
    for child in ["events", "snapshots"] {
        if report.missing_tables.iter().any(|t| t == child) {
            continue;
        }
        if !cascades_from_metadata(conn, child)? {
            report.missing_cascades.push(child.to_string());
        }
    }

    let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    report.foreign_keys_enabled = fk == 1;
    Ok(report)
}

/// Column names of a table, in declaration order
#[cfg(test)]
pub(crate) fn columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    conn.prepare(&format!("PRAGMA table_info({})", table))?
        .query_map([], |row| row.get::<_, String>(1))?
        .collect()
}

fn object_exists(conn: &Connection, kind: &str, name: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
        [kind, name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn cascades_from_metadata(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    // foreign_key_list columns: id, seq, table, from, to, on_update, on_delete, match
    let keys: Vec<(String, String)> = conn
        .prepare(&format!("PRAGMA foreign_key_list({})", table))?
        .query_map([], |row| Ok((row.get::<_, String>(2)?, row.get::<_, String>(6)?)))?
        .collect::<Result<_, _>>()?;
    Ok(keys
        .iter()
        .any(|(parent, on_delete)| parent == "metadata" && on_delete.eq_ignore_ascii_case("CASCADE")))
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
