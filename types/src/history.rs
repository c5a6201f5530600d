//! Linear undo/redo log over document snapshots.
//!
//! Every canonical document value passes through [`DocumentHistory::record`],
//! whether it came from a hand edit, a clear, or a successful generation
//! round trip. Undo/redo move a cursor over the recorded snapshots.

use serde::{Deserialize, Serialize};

/// Undo/redo log for the diagram document.
///
/// The log is linear: recording a new snapshot while the cursor sits before
/// the newest entry discards everything past the cursor (the redo branch is
/// pruned, not forked).
///
/// # Invariant
///
/// `entries` is never empty and `index < entries.len()`; `entries[index]` is
/// always the current canonical document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHistory {
    entries: Vec<String>,
    index: usize,
    record_unchanged: bool,
}

impl DocumentHistory {
    /// Create a history seeded with the initial document.
    ///
    /// `record_unchanged` controls whether recording a snapshot identical to
    /// the current entry appends a duplicate (the observed behavior of the
    /// editor) or is skipped. Defaults to duplicating; see config.
    #[must_use]
    pub fn new(seed: impl Into<String>, record_unchanged: bool) -> Self {
        Self {
            entries: vec![seed.into()],
            index: 0,
            record_unchanged,
        }
    }

    /// The snapshot at the cursor.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.entries[self.index]
    }

    /// Cursor position, `0 <= index < len`.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a new canonical snapshot.
    ///
    /// Truncates the redo branch, appends, and moves the cursor to the new
    /// entry. Recording text identical to the current entry still appends a
    /// duplicate unless `record_unchanged` was disabled.
    pub fn record(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !self.record_unchanged && self.current() == text {
            return;
        }
        self.entries.truncate(self.index + 1);
        self.entries.push(text);
        self.index = self.entries.len() - 1;
    }

    /// Step back one snapshot. No-op at the earliest entry.
    pub fn undo(&mut self) -> Option<&str> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(&self.entries[self.index])
    }

    /// Step forward one snapshot. No-op at the newest entry.
    pub fn redo(&mut self) -> Option<&str> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(&self.entries[self.index])
    }

    /// Clearing is itself a recorded, undoable edit, not a history reset.
    pub fn clear(&mut self) {
        self.record(String::new());
    }
}
