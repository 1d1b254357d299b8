// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recently reconstructed states, keyed by sequence

use std::collections::VecDeque;
use std::sync::Arc;
use vellum_core::DocumentState;

/// Small LRU of reconstructed states
#[derive(Debug)]
pub(crate) struct StateCache {
    capacity: usize,
    // Least recently used at the front
    entries: VecDeque<(u64, Arc<DocumentState>)>,
}

impl StateCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn get(&mut self, sequence: u64) -> Option<Arc<DocumentState>> {
        let pos = self.entries.iter().position(|(s, _)| *s == sequence)?;
        let entry = self.entries.remove(pos)?;
        let state = Arc::clone(&entry.1);
        self.entries.push_back(entry);
        Some(state)
    }

    /// Newest cached state at or before `sequence`
    pub(crate) fn best_at_or_before(&self, sequence: u64) -> Option<(u64, Arc<DocumentState>)> {
        self.entries
            .iter()
            .filter(|(s, _)| *s <= sequence)
            .max_by_key(|(s, _)| *s)
            .map(|(s, state)| (*s, Arc::clone(state)))
    }

    pub(crate) fn insert(&mut self, sequence: u64, state: Arc<DocumentState>) {
        if self.capacity == 0 {
            return;
        }
        self.entries.retain(|(s, _)| *s != sequence);
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((sequence, state));
    }

    /// Drop every state after `sequence`
    pub(crate) fn evict_above(&mut self, sequence: u64) {
        self.entries.retain(|(s, _)| *s <= sequence);
    }

    /// Drop every state before `sequence`
    pub(crate) fn evict_below(&mut self, sequence: u64) {
        self.entries.retain(|(s, _)| *s >= sequence);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
