// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed event log and snapshot store
//!
//! One file per document. Every write commits its own transaction with
//! `synchronous = FULL`, so a returned append survives a crash. Blocking
//! SQLite calls run on the tokio blocking pool behind a shared connection.

use crate::codec::{CodecError, EncodedSnapshot};
use crate::schema::{self, SchemaReport, LEGACY_V0_SCHEMA_SQL, SCHEMA_SQL};
use chrono::{DateTime, Utc};
use rusqlite::{
    params, Connection, ErrorCode, OpenFlags, OptionalExtension, Transaction, TransactionBehavior,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use vellum_core::event::HistoryRevertedOp;
use vellum_core::{DocumentId, EventRecord, NewEvent, CURRENT_FORMAT_VERSION};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("store is corrupted: {0}")]
    Corrupted(String),
    #[error("document file already exists: {0}")]
    AlreadyExists(String),
    #[error("cannot create format version {0}")]
    UnsupportedFormat(u32),
    #[error("unknown document: {0}")]
    UnknownDocument(DocumentId),
    #[error("sequence {sequence} already exists for document {document_id}")]
    DuplicateSequence {
        document_id: DocumentId,
        sequence: u64,
    },
    #[error("event payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("storage task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) => {
                StoreError::Corrupted(err.to_string())
            }
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::PermissionDenied
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::ReadOnly
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull,
            ) => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Sqlite(err),
        }
    }
}

/// The single metadata row of a document file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub document_id: DocumentId,
    pub title: String,
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub author: Option<String>,
}

impl DocumentMetadata {
    /// Metadata for a brand new document at the current format version
    pub fn new(document_id: DocumentId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            document_id,
            title: title.into(),
            format_version: CURRENT_FORMAT_VERSION,
            created_at: now,
            modified_at: now,
            author: None,
        }
    }
}

/// A stored snapshot including its blob
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub snapshot_id: i64,
    pub sequence: u64,
    pub compression: String,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Snapshot row without the blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub snapshot_id: i64,
    pub sequence: u64,
    pub compression: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of writing a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotWrite {
    pub snapshot_id: i64,
    pub pruned: usize,
}

/// Outcome of compacting the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compaction {
    pub events_removed: u64,
    /// Lowest sequence still stored after compaction
    pub history_floor: Option<u64>,
}

/// Metadata fields refreshed by a save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub title: String,
    pub modified_at: DateTime<Utc>,
}

/// Event log and snapshot store for a single document file
#[derive(Clone)]
pub struct EventStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore").field("path", &self.path).finish()
    }
}

impl EventStore {
    /// Open an existing document file
    ///
    /// Opening only reads. WAL journaling is switched on separately with
    /// [`EventStore::enable_wal`] once the caller has accepted the file.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let target = path.clone();
        let conn = blocking(move || {
            if !target.exists() {
                return Err(StoreError::Unavailable(format!(
                    "{} does not exist",
                    target.display()
                )));
            }
            let conn = Connection::open_with_flags(
                &target,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            configure(&conn)?;
            Ok(conn)
        })
        .await?;
        tracing::debug!(path = %path.display(), "opened document store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Create a new document file at the current format version
    pub async fn create(
        path: impl Into<PathBuf>,
        metadata: DocumentMetadata,
    ) -> Result<Self, StoreError> {
        Self::create_with_format(path, metadata, CURRENT_FORMAT_VERSION).await
    }

    /// Create a new document file laid out for `format_version`
    ///
    /// Format 0 is the legacy layout, written for compatibility checks.
    pub async fn create_with_format(
        path: impl Into<PathBuf>,
        mut metadata: DocumentMetadata,
        format_version: u32,
    ) -> Result<Self, StoreError> {
        let sql = match format_version {
            0 => LEGACY_V0_SCHEMA_SQL,
            v if v == CURRENT_FORMAT_VERSION => SCHEMA_SQL,
            other => return Err(StoreError::UnsupportedFormat(other)),
        };
        metadata.format_version = format_version;

        let path = path.into();
        let target = path.clone();
        let conn = blocking(move || {
            if target.exists() {
                return Err(StoreError::AlreadyExists(target.display().to_string()));
            }
            let mut conn = Connection::open_with_flags(
                &target,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            configure(&conn)?;
            set_wal(&conn)?;
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", format_version)?;
            insert_metadata(&tx, &metadata)?;
            tx.commit()?;
            Ok(conn)
        })
        .await?;
        tracing::info!(path = %path.display(), format_version, "created document store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Switch the file to write-ahead journaling
    pub async fn enable_wal(&self) -> Result<(), StoreError> {
        self.run(|conn| set_wal(conn)).await
    }

    /// Run `f` against the connection on the blocking pool
    async fn run<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let handle = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        });
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Task(e.to_string()).into()),
        }
    }

    /// Run `f` inside one immediate transaction; an error rolls everything back
    pub async fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::from)?;
            let out = f(&tx)?;
            tx.commit().map_err(StoreError::from)?;
            Ok(out)
        })
        .await
    }

    // -- integrity --------------------------------------------------------

    /// Problems reported by `PRAGMA integrity_check`; empty when healthy
    pub async fn integrity_check(&self) -> Result<Vec<String>, StoreError> {
        self.run(|conn| {
            let rows: Vec<String> = conn
                .prepare("PRAGMA integrity_check")?
                .query_map([], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            if rows.len() == 1 && rows[0] == "ok" {
                Ok(Vec::new())
            } else {
                Ok(rows)
            }
        })
        .await
    }

    /// Persisted schema version marker
    pub async fn schema_version(&self) -> Result<u32, StoreError> {
        self.run(|conn| Ok(read_user_version(conn)?)).await
    }

    /// Read-only schema inspection
    pub async fn verify_schema(&self) -> Result<SchemaReport, StoreError> {
        self.run(|conn| Ok(schema::verify(conn)?)).await
    }

    /// Fold the write-ahead log back into the main file without blocking readers
    pub async fn checkpoint(&self) -> Result<(), StoreError> {
        self.run(|conn| {
            conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    // -- metadata ---------------------------------------------------------

    /// The document's metadata row, or `None` when absent
    pub async fn metadata(&self) -> Result<Option<DocumentMetadata>, StoreError> {
        self.run(|conn| read_metadata(conn)).await
    }

    // -- events -----------------------------------------------------------

    /// Append an event, assigning the next sequence
    pub async fn append(
        &self,
        document_id: &DocumentId,
        event: NewEvent,
    ) -> Result<u64, StoreError> {
        let document_id = document_id.clone();
        self.run(move |conn| {
            let payload = event.kind.payload_json()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_document(&tx, &document_id)?;
            let sequence = next_sequence(&tx, &document_id)?;
            insert_event(&tx, &document_id, sequence, &event, &payload)?;
            tx.commit()?;
            Ok(sequence)
        })
        .await
    }

    /// Events with `from <= sequence <= to` in ascending order; `to = None`
    /// reads through the head
    pub async fn read(
        &self,
        document_id: &DocumentId,
        from: u64,
        to: Option<u64>,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let document_id = document_id.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT event_id, event_sequence, event_type, event_payload, timestamp, user_id
                 FROM events
                 WHERE document_id = ?1 AND event_sequence >= ?2
                   AND (?3 IS NULL OR event_sequence <= ?3)
                 ORDER BY event_sequence ASC",
            )?;
            let rows = stmt
                .query_map(
                    params![document_id.as_str(), from as i64, to.map(|t| t as i64)],
                    row_to_event,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Highest stored sequence, `None` for an empty log
    pub async fn max_sequence(&self, document_id: &DocumentId) -> Result<Option<u64>, StoreError> {
        let document_id = document_id.clone();
        self.run(move |conn| Ok(sequence_bound(conn, "MAX", &document_id)?))
            .await
    }

    /// Lowest stored sequence; above zero once the log has been compacted
    pub async fn min_sequence(&self, document_id: &DocumentId) -> Result<Option<u64>, StoreError> {
        let document_id = document_id.clone();
        self.run(move |conn| Ok(sequence_bound(conn, "MIN", &document_id)?))
            .await
    }

    /// Sequence of the newest event with the given type tag
    pub async fn latest_of_type(
        &self,
        document_id: &DocumentId,
        event_type: &str,
    ) -> Result<Option<u64>, StoreError> {
        let document_id = document_id.clone();
        let event_type = event_type.to_string();
        self.run(move |conn| {
            let value: Option<i64> = conn.query_row(
                "SELECT MAX(event_sequence) FROM events
                 WHERE document_id = ?1 AND event_type = ?2",
                params![document_id.as_str(), event_type],
                |row| row.get(0),
            )?;
            Ok(value.map(|v| v as u64))
        })
        .await
    }

    pub async fn event_count(&self, document_id: &DocumentId) -> Result<u64, StoreError> {
        let document_id = document_id.clone();
        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM events WHERE document_id = ?1",
                [document_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    // -- snapshots --------------------------------------------------------

    /// Write a snapshot and prune older ones down to `keep`, atomically
    pub async fn write_snapshot(
        &self,
        document_id: &DocumentId,
        snapshot: EncodedSnapshot,
        keep: usize,
    ) -> Result<SnapshotWrite, StoreError> {
        let document_id = document_id.clone();
        self.transaction(move |tx| {
            ensure_document(tx, &document_id)?;
            let snapshot_id = insert_snapshot(tx, &document_id, &snapshot)?;
            let pruned = prune(tx, &document_id, keep)?;
            Ok(SnapshotWrite {
                snapshot_id,
                pruned,
            })
        })
        .await
    }

    /// Snapshots ordered by sequence, oldest first
    pub async fn list_snapshots(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<SnapshotInfo>, StoreError> {
        let document_id = document_id.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT snapshot_id, event_sequence, compression, LENGTH(snapshot_data), created_at
                 FROM snapshots WHERE document_id = ?1
                 ORDER BY event_sequence ASC, snapshot_id ASC",
            )?;
            let rows = stmt
                .query_map([document_id.as_str()], row_to_snapshot_info)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Snapshots at or before `sequence`, newest first
    pub async fn snapshots_at_or_before(
        &self,
        document_id: &DocumentId,
        sequence: u64,
    ) -> Result<Vec<SnapshotInfo>, StoreError> {
        let document_id = document_id.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT snapshot_id, event_sequence, compression, LENGTH(snapshot_data), created_at
                 FROM snapshots WHERE document_id = ?1 AND event_sequence <= ?2
                 ORDER BY event_sequence DESC, snapshot_id DESC",
            )?;
            let rows = stmt
                .query_map(
                    params![document_id.as_str(), sequence as i64],
                    row_to_snapshot_info,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Load one snapshot with its blob
    pub async fn read_snapshot(&self, snapshot_id: i64) -> Result<Option<StoredSnapshot>, StoreError> {
        self.run(move |conn| {
            let snapshot = conn
                .query_row(
                    "SELECT snapshot_id, event_sequence, compression, snapshot_data, created_at
                     FROM snapshots WHERE snapshot_id = ?1",
                    [snapshot_id],
                    |row| {
                        Ok(StoredSnapshot {
                            snapshot_id: row.get(0)?,
                            sequence: row.get::<_, i64>(1)? as u64,
                            compression: row.get(2)?,
                            data: row.get(3)?,
                            created_at: from_micros(row.get(4)?),
                        })
                    },
                )
                .optional()?;
            Ok(snapshot)
        })
        .await
    }

    /// Latest snapshot whose sequence is at or before `sequence`
    pub async fn latest_snapshot_at_or_before(
        &self,
        document_id: &DocumentId,
        sequence: u64,
    ) -> Result<Option<StoredSnapshot>, StoreError> {
        let Some(info) = self
            .snapshots_at_or_before(document_id, sequence)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        self.read_snapshot(info.snapshot_id).await
    }

    /// Delete all but the `keep` newest snapshots
    pub async fn prune_snapshots(
        &self,
        document_id: &DocumentId,
        keep: usize,
    ) -> Result<usize, StoreError> {
        let document_id = document_id.clone();
        self.transaction(move |tx| prune(tx, &document_id, keep)).await
    }

    // -- save and maintenance ---------------------------------------------

    /// Refresh metadata and optionally write a snapshot in one transaction
    pub async fn save_checkpoint(
        &self,
        document_id: &DocumentId,
        update: MetadataUpdate,
        snapshot: Option<EncodedSnapshot>,
        keep: usize,
    ) -> Result<Option<SnapshotWrite>, StoreError> {
        let document_id = document_id.clone();
        self.transaction(move |tx| {
            let changed = tx.execute(
                "UPDATE metadata SET title = ?2, modified_at = ?3 WHERE document_id = ?1",
                params![
                    document_id.as_str(),
                    update.title,
                    update.modified_at.timestamp_micros()
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::UnknownDocument(document_id.clone()));
            }
            let Some(snapshot) = snapshot else {
                return Ok(None);
            };
            let snapshot_id = insert_snapshot(tx, &document_id, &snapshot)?;
            let pruned = prune(tx, &document_id, keep)?;
            Ok(Some(SnapshotWrite {
                snapshot_id,
                pruned,
            }))
        })
        .await
    }

    /// Drop events older than the oldest retained snapshot
    ///
    /// The snapshot's own event is kept so the stored range stays contiguous
    /// from the history floor to the head. Nothing is removed while a
    /// retained `history.reverted` marker targets a sequence below that
    /// snapshot, since replaying through it needs the older events.
    pub async fn compact(&self, document_id: &DocumentId) -> Result<Compaction, StoreError> {
        let document_id = document_id.clone();
        self.transaction(move |tx| {
            let oldest: Option<i64> = tx.query_row(
                "SELECT MIN(event_sequence) FROM snapshots WHERE document_id = ?1",
                [document_id.as_str()],
                |row| row.get(0),
            )?;
            let oldest = match oldest {
                Some(floor) => Some(reachable_floor(tx, &document_id, floor)?),
                None => None,
            };
            let events_removed = match oldest {
                Some(floor) => tx.execute(
                    "DELETE FROM events WHERE document_id = ?1 AND event_sequence < ?2",
                    params![document_id.as_str(), floor],
                )? as u64,
                None => 0,
            };
            let history_floor = sequence_bound(tx, "MIN", &document_id)?;
            Ok(Compaction {
                events_removed,
                history_floor,
            })
        })
        .await
    }
}

fn blocking<T, F>(f: F) -> impl std::future::Future<Output = Result<T, StoreError>>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);
    async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Task(e.to_string())),
        }
    }
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = FULL;")
}

fn set_wal(conn: &Connection) -> Result<(), StoreError> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(mode = %mode, "write-ahead journaling unavailable");
    }
    Ok(())
}

pub(crate) fn read_user_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

fn read_metadata(conn: &Connection) -> Result<Option<DocumentMetadata>, StoreError> {
    let has_table: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'metadata'",
        [],
        |row| row.get(0),
    )?;
    if has_table == 0 {
        return Ok(None);
    }

    let mut stmt = conn.prepare(
        "SELECT document_id, title, format_version, created_at, modified_at, author
         FROM metadata",
    )?;
    let mut rows = stmt
        .query_map([], |row| {
            Ok(DocumentMetadata {
                document_id: DocumentId::new(row.get::<_, String>(0)?),
                title: row.get(1)?,
                format_version: row.get(2)?,
                created_at: from_micros(row.get(3)?),
                modified_at: from_micros(row.get(4)?),
                author: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        n => Err(StoreError::Corrupted(format!(
            "expected one metadata row, found {}",
            n
        ))),
    }
}

fn insert_metadata(tx: &Transaction<'_>, metadata: &DocumentMetadata) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO metadata (document_id, title, format_version, created_at, modified_at, author)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            metadata.document_id.as_str(),
            metadata.title,
            metadata.format_version,
            metadata.created_at.timestamp_micros(),
            metadata.modified_at.timestamp_micros(),
            metadata.author,
        ],
    )?;
    Ok(())
}

fn ensure_document(conn: &Connection, document_id: &DocumentId) -> Result<(), StoreError> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM metadata WHERE document_id = ?1",
            [document_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(StoreError::UnknownDocument(document_id.clone())),
    }
}

/// Keep everything when a retained revert marker targets below `floor`
///
/// No snapshot sits below the oldest one, so such a marker can only be
/// replayed from the start of the log.
fn reachable_floor(
    conn: &Connection,
    document_id: &DocumentId,
    floor: i64,
) -> Result<i64, StoreError> {
    match lowest_revert_target(conn, document_id, floor)? {
        Some(target) if target < floor => {
            tracing::debug!(
                document_id = %document_id,
                target,
                floor,
                "revert marker reaches below oldest snapshot, keeping history"
            );
            Ok(0)
        }
        _ => Ok(floor),
    }
}

fn lowest_revert_target(
    conn: &Connection,
    document_id: &DocumentId,
    from: i64,
) -> Result<Option<i64>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT event_payload FROM events
         WHERE document_id = ?1 AND event_type = 'history.reverted' AND event_sequence >= ?2",
    )?;
    let payloads = stmt
        .query_map(params![document_id.as_str(), from], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let lowest = payloads
        .iter()
        .filter_map(|payload| serde_json::from_str::<HistoryRevertedOp>(payload).ok())
        .map(|op| op.to_sequence as i64)
        .min();
    Ok(lowest)
}

fn sequence_bound(
    conn: &Connection,
    aggregate: &str,
    document_id: &DocumentId,
) -> rusqlite::Result<Option<u64>> {
    let value: Option<i64> = conn.query_row(
        &format!(
            "SELECT {}(event_sequence) FROM events WHERE document_id = ?1",
            aggregate
        ),
        [document_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(value.map(|v| v as u64))
}

fn next_sequence(conn: &Connection, document_id: &DocumentId) -> rusqlite::Result<u64> {
    Ok(sequence_bound(conn, "MAX", document_id)?.map_or(0, |max| max + 1))
}

pub(crate) fn insert_event(
    conn: &Connection,
    document_id: &DocumentId,
    sequence: u64,
    event: &NewEvent,
    payload: &str,
) -> Result<(), StoreError> {
    let result = conn.execute(
        "INSERT INTO events (document_id, event_sequence, event_type, event_payload, timestamp, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            document_id.as_str(),
            sequence as i64,
            event.kind.event_type(),
            payload,
            event.timestamp.timestamp_micros(),
            event.user_id,
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(StoreError::DuplicateSequence {
                document_id: document_id.clone(),
                sequence,
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn insert_snapshot(
    conn: &Connection,
    document_id: &DocumentId,
    snapshot: &EncodedSnapshot,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO snapshots (document_id, event_sequence, snapshot_data, created_at, compression)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            document_id.as_str(),
            snapshot.sequence as i64,
            snapshot.data,
            Utc::now().timestamp_micros(),
            snapshot.compression.as_tag(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn prune(conn: &Connection, document_id: &DocumentId, keep: usize) -> Result<usize, StoreError> {
    let pruned = conn.execute(
        "DELETE FROM snapshots
         WHERE document_id = ?1 AND snapshot_id NOT IN (
             SELECT snapshot_id FROM snapshots WHERE document_id = ?1
             ORDER BY event_sequence DESC, snapshot_id DESC LIMIT ?2
         )",
        params![document_id.as_str(), keep as i64],
    )?;
    if pruned > 0 {
        tracing::debug!(document_id = %document_id, pruned, keep, "pruned snapshots");
    }
    Ok(pruned)
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        event_id: row.get(0)?,
        sequence: row.get::<_, i64>(1)? as u64,
        event_type: row.get(2)?,
        payload: row.get(3)?,
        timestamp: from_micros(row.get(4)?),
        user_id: row.get(5)?,
    })
}

fn row_to_snapshot_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<SnapshotInfo> {
    Ok(SnapshotInfo {
        snapshot_id: row.get(0)?,
        sequence: row.get::<_, i64>(1)? as u64,
        compression: row.get(2)?,
        size_bytes: row.get::<_, i64>(3)? as u64,
        created_at: from_micros(row.get(4)?),
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
