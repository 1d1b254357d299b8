// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconstructed document state
//!
//! `DocumentState` is derived data: it is rebuilt from snapshots and events
//! and never treated as the source of truth. `apply` is the single
//! deterministic transition function used by both live recording and replay.

use crate::event::EventKind;
use crate::id::{LayerId, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Error applying an event to document state
///
/// A failed apply leaves the state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("layer not found: {0}")]
    UnknownLayer(LayerId),
    #[error("object not found: {0}")]
    UnknownObject(ObjectId),
    #[error("layer already exists: {0}")]
    LayerExists(LayerId),
    #[error("object already exists: {0}")]
    ObjectExists(ObjectId),
    #[error("object {0} is not a path")]
    NotAPath(ObjectId),
    #[error("invalid viewport: {0}")]
    InvalidViewport(String),
    #[error("history revert to {0} must be resolved by the replayer")]
    UnresolvedRevert(u64),
    #[error("{0} events are written by the persistence core, not recorded as edits")]
    Reserved(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Geometry of a drawable object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
    },
    Path {
        points: Vec<Point>,
        #[serde(default)]
        closed: bool,
    },
}

impl Shape {
    fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Shape::Rect { x, y, .. } => {
                *x += dx;
                *y += dy;
            }
            Shape::Ellipse { cx, cy, .. } => {
                *cx += dx;
                *cy += dy;
            }
            Shape::Path { points, .. } => {
                for p in points.iter_mut() {
                    p.x += dx;
                    p.y += dy;
                }
            }
        }
    }

    fn point_count(&self) -> usize {
        match self {
            Shape::Path { points, .. } => points.len(),
            _ => 0,
        }
    }
}

/// Paint attributes of an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub stroke: Option<String>,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: Some("#000000".to_string()),
            stroke_width: 1.0,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    /// Object ids in paint order (bottom first)
    pub objects: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorObject {
    pub id: ObjectId,
    pub layer_id: LayerId,
    pub shape: Shape,
    pub style: Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// Full in-memory model of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub title: String,
    /// Layers in stacking order (bottom first)
    pub layers: Vec<Layer>,
    pub objects: BTreeMap<ObjectId, VectorObject>,
    pub selection: BTreeSet<ObjectId>,
    pub viewport: Viewport,
}

impl DocumentState {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| &l.id == id)
    }

    pub fn object(&self, id: &ObjectId) -> Option<&VectorObject> {
        self.objects.get(id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn layer_index(&self, id: &LayerId) -> Result<usize, ApplyError> {
        self.layers
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| ApplyError::UnknownLayer(id.clone()))
    }

    fn require_object(&self, id: &ObjectId) -> Result<(), ApplyError> {
        if self.objects.contains_key(id) {
            Ok(())
        } else {
            Err(ApplyError::UnknownObject(id.clone()))
        }
    }

    /// Check that `event` applies cleanly without changing anything
    pub fn check(&self, event: &EventKind) -> Result<(), ApplyError> {
        match event {
            EventKind::LayerAdded(op) => {
                if self.layer(&op.layer_id).is_some() {
                    return Err(ApplyError::LayerExists(op.layer_id.clone()));
                }
            }
            EventKind::LayerRemoved(op) => {
                self.layer_index(&op.layer_id)?;
            }
            EventKind::LayerRenamed(op) => {
                self.layer_index(&op.layer_id)?;
            }
            EventKind::LayerVisibilityChanged(op) => {
                self.layer_index(&op.layer_id)?;
            }
            EventKind::ObjectAdded(op) => {
                if self.objects.contains_key(&op.object_id) {
                    return Err(ApplyError::ObjectExists(op.object_id.clone()));
                }
                self.layer_index(&op.layer_id)?;
            }
            EventKind::ObjectRemoved(op) => self.require_object(&op.object_id)?,
            EventKind::ObjectStyleChanged(op) => self.require_object(&op.object_id)?,
            EventKind::ObjectMoved(op) => {
                for id in &op.object_ids {
                    self.require_object(id)?;
                }
            }
            EventKind::SelectionChanged(op) => {
                for id in &op.object_ids {
                    self.require_object(id)?;
                }
            }
            EventKind::ObjectPathEdited(op) => match self.objects.get(&op.object_id) {
                None => return Err(ApplyError::UnknownObject(op.object_id.clone())),
                Some(object) if !matches!(object.shape, Shape::Path { .. }) => {
                    return Err(ApplyError::NotAPath(op.object_id.clone()))
                }
                Some(_) => {}
            },
            EventKind::ViewportChanged(op) => {
                if !(op.zoom.is_finite() && op.zoom > 0.0) {
                    return Err(ApplyError::InvalidViewport(format!("zoom {}", op.zoom)));
                }
                if !(op.pan_x.is_finite() && op.pan_y.is_finite()) {
                    return Err(ApplyError::InvalidViewport("non-finite pan".to_string()));
                }
            }
            EventKind::DocumentRenamed(_) | EventKind::DocumentSaved(_) => {}
            EventKind::HistoryReverted(op) => {
                return Err(ApplyError::UnresolvedRevert(op.to_sequence));
            }
        }
        Ok(())
    }

    /// Apply a single event
    ///
    /// Pure and deterministic: the result depends only on the prior state and
    /// the event. A rejected event leaves the state untouched.
    pub fn apply(&mut self, event: &EventKind) -> Result<(), ApplyError> {
        self.check(event)?;

        match event {
            EventKind::LayerAdded(op) => {
                let layer = Layer {
                    id: op.layer_id.clone(),
                    name: op.name.clone(),
                    visible: true,
                    objects: Vec::new(),
                };
                let index = op.index.unwrap_or(self.layers.len()).min(self.layers.len());
                self.layers.insert(index, layer);
            }

            EventKind::LayerRemoved(op) => {
                if let Some(index) = self.layers.iter().position(|l| l.id == op.layer_id) {
                    let layer = self.layers.remove(index);
                    for object_id in &layer.objects {
                        self.objects.remove(object_id);
                        self.selection.remove(object_id);
                    }
                }
            }

            EventKind::LayerRenamed(op) => {
                if let Some(layer) = self.layers.iter_mut().find(|l| l.id == op.layer_id) {
                    layer.name = op.name.clone();
                }
            }

            EventKind::LayerVisibilityChanged(op) => {
                if let Some(layer) = self.layers.iter_mut().find(|l| l.id == op.layer_id) {
                    layer.visible = op.visible;
                }
            }

            EventKind::ObjectAdded(op) => {
                if let Some(layer) = self.layers.iter_mut().find(|l| l.id == op.layer_id) {
                    layer.objects.push(op.object_id.clone());
                }
                self.objects.insert(
                    op.object_id.clone(),
                    VectorObject {
                        id: op.object_id.clone(),
                        layer_id: op.layer_id.clone(),
                        shape: op.shape.clone(),
                        style: op.style.clone(),
                    },
                );
            }

            EventKind::ObjectRemoved(op) => {
                if let Some(object) = self.objects.remove(&op.object_id) {
                    if let Some(layer) = self.layers.iter_mut().find(|l| l.id == object.layer_id)
                    {
                        layer.objects.retain(|id| id != &op.object_id);
                    }
                }
                self.selection.remove(&op.object_id);
            }

            EventKind::ObjectMoved(op) => {
                for id in &op.object_ids {
                    if let Some(object) = self.objects.get_mut(id) {
                        object.shape.translate(op.dx, op.dy);
                    }
                }
            }

            EventKind::ObjectStyleChanged(op) => {
                if let Some(object) = self.objects.get_mut(&op.object_id) {
                    object.style = op.style.clone();
                }
            }

            EventKind::ObjectPathEdited(op) => {
                if let Some(VectorObject {
                    shape: Shape::Path { points, closed },
                    ..
                }) = self.objects.get_mut(&op.object_id)
                {
                    *points = op.points.clone();
                    *closed = op.closed;
                }
            }

            EventKind::SelectionChanged(op) => {
                self.selection = op.object_ids.iter().cloned().collect();
            }

            EventKind::ViewportChanged(op) => {
                self.viewport = Viewport {
                    zoom: op.zoom,
                    pan_x: op.pan_x,
                    pan_y: op.pan_y,
                };
            }

            EventKind::DocumentRenamed(op) => {
                self.title = op.title.clone();
            }

            EventKind::DocumentSaved(_) | EventKind::HistoryReverted(_) => {}
        }

        Ok(())
    }

    /// Rough uncompressed serialized size, used by snapshot memory guards
    /// before paying for a real serialization.
    pub fn estimated_size_bytes(&self) -> u64 {
        const BASE: u64 = 256;
        const PER_LAYER: u64 = 96;
        const PER_OBJECT: u64 = 192;
        const PER_POINT: u64 = 40;
        const PER_SELECTED: u64 = 48;

        let layers: u64 = self
            .layers
            .iter()
            .map(|l| PER_LAYER + l.name.len() as u64 + l.objects.len() as u64 * 24)
            .sum();
        let objects: u64 = self
            .objects
            .values()
            .map(|o| PER_OBJECT + o.shape.point_count() as u64 * PER_POINT)
            .sum();

        BASE + self.title.len() as u64
            + layers
            + objects
            + self.selection.len() as u64 * PER_SELECTED
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
