// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document event types
//!
//! Every user edit is recorded as one [`EventKind`]. The set is closed: new
//! kinds are added by extending the enum, and each kind has exactly one
//! apply arm in [`crate::document::DocumentState::apply`].
//!
//! On disk an event is split into a dotted `event_type` tag and a JSON
//! payload holding the variant's fields.

use crate::document::{Point, Shape, Style};
use crate::id::{LayerId, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error decoding a stored event back into an [`EventKind`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event type: {0}")]
    UnknownType(String),
    #[error("corrupt payload for {event_type}: {source}")]
    CorruptPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// All state-changing edits a document can record
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    // Layer edits
    LayerAdded(LayerAddedOp),
    LayerRemoved(LayerRemovedOp),
    LayerRenamed(LayerRenamedOp),
    LayerVisibilityChanged(LayerVisibilityOp),

    // Object edits
    ObjectAdded(ObjectAddedOp),
    ObjectRemoved(ObjectRemovedOp),
    ObjectMoved(ObjectMovedOp),
    ObjectStyleChanged(ObjectStyleOp),
    ObjectPathEdited(ObjectPathOp),

    // View state
    SelectionChanged(SelectionOp),
    ViewportChanged(ViewportOp),

    // Document level
    DocumentRenamed(DocumentRenamedOp),
    /// Marker written by a manual save; no effect on state
    DocumentSaved(DocumentSavedOp),
    /// Resets state to an earlier sequence before a fresh edit after undo
    HistoryReverted(HistoryRevertedOp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerAddedOp {
    pub layer_id: LayerId,
    pub name: String,
    /// Insert position; appended on top when absent or past the end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRemovedOp {
    pub layer_id: LayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRenamedOp {
    pub layer_id: LayerId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerVisibilityOp {
    pub layer_id: LayerId,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectAddedOp {
    pub object_id: ObjectId,
    pub layer_id: LayerId,
    pub shape: Shape,
    #[serde(default)]
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRemovedOp {
    pub object_id: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMovedOp {
    pub object_ids: Vec<ObjectId>,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStyleOp {
    pub object_id: ObjectId,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPathOp {
    pub object_id: ObjectId,
    pub points: Vec<Point>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOp {
    pub object_ids: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportOp {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRenamedOp {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSavedOp {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRevertedOp {
    pub to_sequence: u64,
}

impl EventKind {
    /// Every event type tag, in declaration order
    pub const TYPES: &'static [&'static str] = &[
        "layer.added",
        "layer.removed",
        "layer.renamed",
        "layer.visibility_changed",
        "object.added",
        "object.removed",
        "object.moved",
        "object.style_changed",
        "object.path_edited",
        "selection.changed",
        "viewport.changed",
        "document.renamed",
        "document.saved",
        "history.reverted",
    ];

    /// The dotted type tag stored in the `event_type` column
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::LayerAdded(_) => "layer.added",
            EventKind::LayerRemoved(_) => "layer.removed",
            EventKind::LayerRenamed(_) => "layer.renamed",
            EventKind::LayerVisibilityChanged(_) => "layer.visibility_changed",
            EventKind::ObjectAdded(_) => "object.added",
            EventKind::ObjectRemoved(_) => "object.removed",
            EventKind::ObjectMoved(_) => "object.moved",
            EventKind::ObjectStyleChanged(_) => "object.style_changed",
            EventKind::ObjectPathEdited(_) => "object.path_edited",
            EventKind::SelectionChanged(_) => "selection.changed",
            EventKind::ViewportChanged(_) => "viewport.changed",
            EventKind::DocumentRenamed(_) => "document.renamed",
            EventKind::DocumentSaved(_) => "document.saved",
            EventKind::HistoryReverted(_) => "history.reverted",
        }
    }

    /// Serialize the variant's fields as the stored JSON payload
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            EventKind::LayerAdded(op) => serde_json::to_string(op),
            EventKind::LayerRemoved(op) => serde_json::to_string(op),
            EventKind::LayerRenamed(op) => serde_json::to_string(op),
            EventKind::LayerVisibilityChanged(op) => serde_json::to_string(op),
            EventKind::ObjectAdded(op) => serde_json::to_string(op),
            EventKind::ObjectRemoved(op) => serde_json::to_string(op),
            EventKind::ObjectMoved(op) => serde_json::to_string(op),
            EventKind::ObjectStyleChanged(op) => serde_json::to_string(op),
            EventKind::ObjectPathEdited(op) => serde_json::to_string(op),
            EventKind::SelectionChanged(op) => serde_json::to_string(op),
            EventKind::ViewportChanged(op) => serde_json::to_string(op),
            EventKind::DocumentRenamed(op) => serde_json::to_string(op),
            EventKind::DocumentSaved(op) => serde_json::to_string(op),
            EventKind::HistoryReverted(op) => serde_json::to_string(op),
        }
    }

    /// Rebuild an event from its stored type tag and payload
    pub fn decode(event_type: &str, payload: &str) -> Result<Self, DecodeError> {
        fn parse<T: for<'de> Deserialize<'de>>(
            event_type: &str,
            payload: &str,
        ) -> Result<T, DecodeError> {
            serde_json::from_str(payload).map_err(|source| DecodeError::CorruptPayload {
                event_type: event_type.to_string(),
                source,
            })
        }

        let kind = match event_type {
            "layer.added" => EventKind::LayerAdded(parse(event_type, payload)?),
            "layer.removed" => EventKind::LayerRemoved(parse(event_type, payload)?),
            "layer.renamed" => EventKind::LayerRenamed(parse(event_type, payload)?),
            "layer.visibility_changed" => {
                EventKind::LayerVisibilityChanged(parse(event_type, payload)?)
            }
            "object.added" => EventKind::ObjectAdded(parse(event_type, payload)?),
            "object.removed" => EventKind::ObjectRemoved(parse(event_type, payload)?),
            "object.moved" => EventKind::ObjectMoved(parse(event_type, payload)?),
            "object.style_changed" => EventKind::ObjectStyleChanged(parse(event_type, payload)?),
            "object.path_edited" => EventKind::ObjectPathEdited(parse(event_type, payload)?),
            "selection.changed" => EventKind::SelectionChanged(parse(event_type, payload)?),
            "viewport.changed" => EventKind::ViewportChanged(parse(event_type, payload)?),
            "document.renamed" => EventKind::DocumentRenamed(parse(event_type, payload)?),
            "document.saved" => EventKind::DocumentSaved(parse(event_type, payload)?),
            "history.reverted" => EventKind::HistoryReverted(parse(event_type, payload)?),
            other => return Err(DecodeError::UnknownType(other.to_string())),
        };
        Ok(kind)
    }

    /// Written by the persistence core itself, never recorded as an edit
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            EventKind::DocumentSaved(_) | EventKind::HistoryReverted(_)
        )
    }
}

/// An event waiting to be appended to the log
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
}

impl NewEvent {
    /// Stamp an event with the current wall-clock time
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// An immutable event as persisted in the log
///
/// The payload is kept in its stored form so a single corrupt row can be
/// reported and skipped during replay instead of failing the whole read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Row identifier assigned by storage
    pub event_id: i64,
    pub sequence: u64,
    pub event_type: String,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
}

impl EventRecord {
    /// Decode the stored payload into a typed event
    pub fn decode(&self) -> Result<EventKind, DecodeError> {
        EventKind::decode(&self.event_type, &self.payload)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
