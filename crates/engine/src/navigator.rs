// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event replayer and history navigator
//!
//! Reconstructs document state at any stored sequence from the nearest
//! usable snapshot plus the events after it. Undo, redo and timeline
//! scrubbing move a cursor through `[floor, head]` and reconstruct there.
//!
//! A `history.reverted` marker resets state to its `to_sequence`. Replay
//! resolves markers from the target backwards: everything after the last
//! marker is set aside, the marker's target is resolved the same way, and
//! the set-aside segments are applied on top in order.

use crate::cache::StateCache;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use vellum_core::{DecodeError, DocumentId, DocumentState, EventKind, NavigatorConfig};
use vellum_storage::{codec, EventStore, SnapshotInfo, StoreError};

#[derive(Debug, Error)]
pub enum NavigatorError {
    #[error("sequence {requested} is not navigable")]
    InvalidSequence {
        requested: u64,
        /// Navigable `(floor, head)`, `None` for an empty history
        range: Option<(u64, u64)>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An event or snapshot skipped during reconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayWarning {
    pub sequence: u64,
    /// Event type tag, or `"snapshot"` for an unreadable snapshot
    pub event_type: String,
    pub reason: String,
}

/// Result of reconstructing state at one sequence
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub sequence: u64,
    pub state: Arc<DocumentState>,
    pub warnings: Vec<ReplayWarning>,
    /// Events applied on top of the base state
    pub events_applied: usize,
    /// Sequence of the snapshot or cached state replay started from
    pub base_sequence: Option<u64>,
}

/// Sent to subscribers whenever the visible state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChanged {
    pub sequence: u64,
}

struct DecodedEvent {
    sequence: u64,
    event_type: String,
    kind: Result<EventKind, DecodeError>,
}

/// Cursor over a document's history
pub struct Navigator {
    store: EventStore,
    document_id: DocumentId,
    cache: StateCache,
    cursor: Option<u64>,
    head: Option<u64>,
    floor: u64,
    state: Arc<DocumentState>,
    warnings: Vec<ReplayWarning>,
    events_applied: usize,
    base_sequence: Option<u64>,
    subscribers: Vec<mpsc::UnboundedSender<StateChanged>>,
}

impl Navigator {
    /// Open at the head of the stored history
    pub async fn open(
        store: EventStore,
        document_id: DocumentId,
        config: &NavigatorConfig,
    ) -> Result<Self, NavigatorError> {
        let mut nav = Self {
            store,
            document_id,
            cache: StateCache::new(config.cache_capacity),
            cursor: None,
            head: None,
            floor: 0,
            state: Arc::new(DocumentState::new()),
            warnings: Vec::new(),
            events_applied: 0,
            base_sequence: None,
            subscribers: Vec::new(),
        };
        nav.refresh_bounds().await?;

        if let Some(head) = nav.head {
            let rec = nav.replay_to(head).await?;
            nav.cursor = Some(head);
            nav.state = rec.state;
            nav.events_applied = rec.events_applied;
            nav.base_sequence = rec.base_sequence;
            nav.warnings = rec.warnings;
        }
        tracing::debug!(
            document_id = %nav.document_id,
            head = ?nav.head,
            floor = nav.floor,
            warnings = nav.warnings.len(),
            "navigator opened"
        );
        Ok(nav)
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn head(&self) -> Option<u64> {
        self.head
    }

    /// Lowest sequence that can still be reconstructed
    pub fn floor(&self) -> u64 {
        self.floor
    }

    /// State at the cursor
    pub fn state(&self) -> Arc<DocumentState> {
        Arc::clone(&self.state)
    }

    /// Warnings from the most recent reconstruction
    pub fn warnings(&self) -> &[ReplayWarning] {
        &self.warnings
    }

    /// Events applied by the most recent full reconstruction
    pub fn events_applied(&self) -> usize {
        self.events_applied
    }

    /// Snapshot or cached state that reconstruction started from
    pub fn base_sequence(&self) -> Option<u64> {
        self.base_sequence
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > self.floor)
    }

    pub fn can_redo(&self) -> bool {
        match (self.cursor, self.head) {
            (Some(c), Some(h)) => c < h,
            _ => false,
        }
    }

    /// True when the cursor sits below the head, so the next edit
    /// discards the redo future
    pub fn is_behind_head(&self) -> bool {
        self.can_redo()
    }

    /// Receive a notification every time the visible state changes
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StateChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Move one step back
    pub async fn undo(&mut self) -> Result<Option<Arc<DocumentState>>, NavigatorError> {
        if !self.can_undo() {
            return Ok(None);
        }
        let Some(cursor) = self.cursor else {
            return Ok(None);
        };
        self.move_to(cursor - 1).await.map(Some)
    }

    /// Move one step forward
    pub async fn redo(&mut self) -> Result<Option<Arc<DocumentState>>, NavigatorError> {
        if !self.can_redo() {
            return Ok(None);
        }
        let Some(cursor) = self.cursor else {
            return Ok(None);
        };
        self.move_to(cursor + 1).await.map(Some)
    }

    /// Jump straight to `target`; out-of-range targets leave the cursor put
    pub async fn navigate_to(&mut self, target: u64) -> Result<Arc<DocumentState>, NavigatorError> {
        self.check_range(target)?;
        self.move_to(target).await
    }

    /// Reconstruct state at `target` without moving the cursor
    pub async fn reconstruct(&mut self, target: u64) -> Result<Reconstruction, NavigatorError> {
        self.check_range(target)?;
        if Some(target) == self.cursor {
            return Ok(Reconstruction {
                sequence: target,
                state: self.state(),
                warnings: Vec::new(),
                events_applied: 0,
                base_sequence: Some(target),
            });
        }
        self.replay_to(target).await
    }

    /// State at the head, regardless of where the cursor is
    pub async fn head_state(&mut self) -> Result<Arc<DocumentState>, NavigatorError> {
        match self.head {
            None => Ok(self.state()),
            Some(head) => Ok(self.reconstruct(head).await?.state),
        }
    }

    /// Account for an event the caller just appended at `sequence`
    ///
    /// At the head the event is applied in place. A revert marker appended
    /// while the cursor is behind the head starts a new branch at the cursor.
    pub fn record_appended(&mut self, sequence: u64, event: &EventKind) -> Option<ReplayWarning> {
        let at_head = self.cursor == self.head;
        let mut warning = None;

        match event {
            EventKind::HistoryReverted(op) if Some(op.to_sequence) == self.cursor => {
                self.cache.evict_above(op.to_sequence);
                tracing::debug!(
                    document_id = %self.document_id,
                    from = ?self.head,
                    to = op.to_sequence,
                    "discarded redo history"
                );
            }
            _ if !at_head => {
                // Not the visible state; it will be replayed on demand
                self.head = Some(sequence);
                return None;
            }
            _ => {
                if let Err(e) = Arc::make_mut(&mut self.state).apply(event) {
                    let w = ReplayWarning {
                        sequence,
                        event_type: event.event_type().to_string(),
                        reason: e.to_string(),
                    };
                    tracing::warn!(sequence, reason = %w.reason, "appended event did not apply");
                    self.warnings.push(w.clone());
                    warning = Some(w);
                }
            }
        }

        self.head = Some(sequence);
        self.cursor = Some(sequence);
        self.notify(sequence);
        warning
    }

    /// Re-read the stored bounds and catch up with events appended elsewhere
    pub async fn sync_head(&mut self) -> Result<(), NavigatorError> {
        let old_head = self.head;
        let at_head = self.cursor == self.head;
        self.refresh_bounds().await?;

        if self.head == old_head {
            return Ok(());
        }
        match self.head {
            Some(head) if at_head => {
                let rec = self.replay_to(head).await?;
                self.state = rec.state;
                self.warnings = rec.warnings;
                self.cursor = Some(head);
                self.notify(head);
            }
            _ => {}
        }
        Ok(())
    }

    /// Re-read floor and head after compaction or external writes
    pub async fn refresh_bounds(&mut self) -> Result<(), NavigatorError> {
        self.head = self.store.max_sequence(&self.document_id).await?;
        self.floor = match self.store.min_sequence(&self.document_id).await? {
            None | Some(0) => 0,
            Some(min) => {
                // Below the oldest snapshot there is nothing to replay from
                let snapshots = self.store.list_snapshots(&self.document_id).await?;
                snapshots
                    .iter()
                    .map(|s| s.sequence)
                    .find(|s| *s >= min)
                    .unwrap_or(min)
            }
        };
        self.cache.evict_below(self.floor);
        if let (Some(cursor), Some(head)) = (self.cursor, self.head) {
            if cursor > head {
                self.cursor = Some(head);
            }
        }
        Ok(())
    }

    fn check_range(&self, target: u64) -> Result<(), NavigatorError> {
        match self.head {
            Some(head) if target >= self.floor && target <= head => Ok(()),
            Some(head) => Err(NavigatorError::InvalidSequence {
                requested: target,
                range: Some((self.floor, head)),
            }),
            None => Err(NavigatorError::InvalidSequence {
                requested: target,
                range: None,
            }),
        }
    }

    async fn move_to(&mut self, target: u64) -> Result<Arc<DocumentState>, NavigatorError> {
        let rec = self.replay_to(target).await?;
        if let Some(cursor) = self.cursor {
            self.cache.insert(cursor, Arc::clone(&self.state));
        }
        self.cursor = Some(target);
        self.state = Arc::clone(&rec.state);
        self.warnings = rec.warnings;
        self.notify(target);
        Ok(rec.state)
    }

    fn notify(&mut self, sequence: u64) {
        self.subscribers
            .retain(|tx| tx.send(StateChanged { sequence }).is_ok());
    }

    /// Reconstruct state at `target`, caching the result
    async fn replay_to(&mut self, target: u64) -> Result<Reconstruction, NavigatorError> {
        if let Some(state) = self.cache.get(target) {
            return Ok(Reconstruction {
                sequence: target,
                state,
                warnings: Vec::new(),
                events_applied: 0,
                base_sequence: Some(target),
            });
        }

        let mut warnings = Vec::new();
        let mut segments: Vec<Vec<DecodedEvent>> = Vec::new();
        let mut goal = target;

        let (mut state, base_sequence, mut applied) = loop {
            let (base_seq, base_state) = self.base_for(goal, &mut warnings).await?;
            let mut events = match base_seq {
                Some(s) if s >= goal => Vec::new(),
                _ => self.read_decoded(base_seq.map_or(0, |s| s + 1), goal).await?,
            };

            let marker = events.iter().enumerate().rev().find_map(|(i, e)| match &e.kind {
                Ok(EventKind::HistoryReverted(op)) => Some((i, e.sequence, op.to_sequence)),
                _ => None,
            });

            match marker {
                Some((i, marker_seq, to)) if to < marker_seq => {
                    if to < self.floor {
                        let reason = format!(
                            "revert target {} is below the history floor {}",
                            to, self.floor
                        );
                        tracing::warn!(sequence = marker_seq, reason = %reason, "revert target compacted away");
                        warnings.push(ReplayWarning {
                            sequence: marker_seq,
                            event_type: "history.reverted".to_string(),
                            reason,
                        });
                    }
                    segments.push(events.split_off(i + 1));
                    goal = to;
                }
                _ => {
                    let mut state = base_state;
                    let applied = apply_events(&mut state, events, &mut warnings);
                    break (state, base_seq, applied);
                }
            }
        };

        for segment in segments.into_iter().rev() {
            applied += apply_events(&mut state, segment, &mut warnings);
        }

        let state = Arc::new(state);
        self.cache.insert(target, Arc::clone(&state));
        Ok(Reconstruction {
            sequence: target,
            state,
            warnings,
            events_applied: applied,
            base_sequence,
        })
    }

    /// Best starting point at or before `goal`: the newer of a cached state
    /// and the newest snapshot that decodes
    async fn base_for(
        &self,
        goal: u64,
        warnings: &mut Vec<ReplayWarning>,
    ) -> Result<(Option<u64>, DocumentState), NavigatorError> {
        let cached = self.cache.best_at_or_before(goal);
        let candidates = self
            .store
            .snapshots_at_or_before(&self.document_id, goal)
            .await?;

        for info in candidates {
            if matches!(&cached, Some((seq, _)) if *seq >= info.sequence) {
                break;
            }
            match self.load_snapshot(&info).await {
                Ok(state) => return Ok((Some(info.sequence), state)),
                Err(reason) => {
                    tracing::warn!(
                        snapshot_id = info.snapshot_id,
                        sequence = info.sequence,
                        %reason,
                        "skipping unreadable snapshot"
                    );
                    warnings.push(ReplayWarning {
                        sequence: info.sequence,
                        event_type: "snapshot".to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(match cached {
            Some((seq, state)) => (Some(seq), (*state).clone()),
            None => (None, DocumentState::new()),
        })
    }

    async fn load_snapshot(&self, info: &SnapshotInfo) -> Result<DocumentState, String> {
        let stored = match self.store.read_snapshot(info.snapshot_id).await {
            Ok(Some(s)) => s,
            Ok(None) => return Err("snapshot disappeared".to_string()),
            Err(e) => return Err(e.to_string()),
        };
        let decoded =
            tokio::task::spawn_blocking(move || codec::decode(&stored.compression, &stored.data))
                .await
                .map_err(|e| e.to_string())?;
        match decoded {
            Ok((sequence, state)) if sequence == info.sequence => Ok(state),
            Ok((sequence, _)) => Err(format!(
                "snapshot claims sequence {} but is stored at {}",
                sequence, info.sequence
            )),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn read_decoded(&self, from: u64, to: u64) -> Result<Vec<DecodedEvent>, NavigatorError> {
        let records = self.store.read(&self.document_id, from, Some(to)).await?;
        Ok(records
            .into_iter()
            .map(|r| DecodedEvent {
                kind: r.decode(),
                sequence: r.sequence,
                event_type: r.event_type,
            })
            .collect())
    }
}

/// Apply events in order, skipping and recording any that fail
fn apply_events(
    state: &mut DocumentState,
    events: Vec<DecodedEvent>,
    warnings: &mut Vec<ReplayWarning>,
) -> usize {
    let mut applied = 0;
    for event in events {
        let result = match &event.kind {
            Ok(kind) => state.apply(kind).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(()) => applied += 1,
            Err(reason) => {
                tracing::warn!(
                    sequence = event.sequence,
                    event_type = %event.event_type,
                    %reason,
                    "skipping event during replay"
                );
                warnings.push(ReplayWarning {
                    sequence: event.sequence,
                    event_type: event.event_type,
                    reason,
                });
            }
        }
    }
    applied
}

#[cfg(test)]
#[path = "navigator_tests.rs"]
mod tests;
