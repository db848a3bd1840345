//! History state machine
//!
//! [`HistoryState`] pairs the undo and redo stacks and enforces the linear
//! history discipline: recording a new level clears the redo stack, undo
//! moves a record to the redo stack, redo moves it back. It also carries the
//! suppression flag and the open-batch buffer for explicit multi-change
//! levels.
//!
//! ```text
//! record(c4)
//! ┌─────────────────────────────────────┐
//! │ Undo: [c1, c2, c3, c4]   Redo: []   │
//! └─────────────────────────────────────┘
//! pop_undo() + push_undone(c4)
//! ┌─────────────────────────────────────┐
//! │ Undo: [c1, c2, c3]       Redo: [c4] │
//! └─────────────────────────────────────┘
//! record(c5)              <-- clears redo
//! ┌─────────────────────────────────────┐
//! │ Undo: [c1, c2, c3, c5]   Redo: []   │
//! └─────────────────────────────────────┘
//! ```
//!
//! The split pop/push surface exists because inversion happens in the
//! owning collection: a record only moves to the opposite stack after its
//! inversion succeeded, and is restored in place when it failed.

use crate::bounded::BoundedStack;

/// Undo and redo stacks plus recording state for one collection.
#[derive(Debug)]
pub struct HistoryState<C> {
    undo: BoundedStack<C>,
    redo: BoundedStack<C>,
    suppressed: bool,
    batch: Option<Vec<C>>,
}

impl<C> HistoryState<C> {
    /// Create a history with the given depth and suppression setting.
    pub fn new(history_levels: usize, suppressed: bool) -> Self {
        Self {
            undo: BoundedStack::new(history_levels),
            redo: BoundedStack::new(history_levels),
            suppressed,
            batch: None,
        }
    }

    /// Whether recording is currently suppressed.
    pub fn suppressed(&self) -> bool {
        self.suppressed
    }

    /// Enable or disable recording.
    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    /// Offer a change to the open batch.
    ///
    /// Returns the change back when no batch is open; returns `None` after
    /// buffering it.
    pub fn try_buffer(&mut self, change: C) -> Option<C> {
        match &mut self.batch {
            Some(buffer) => {
                buffer.push(change);
                None
            }
            None => Some(change),
        }
    }

    /// Record a new undo level. Clears the redo stack: new forward history
    /// invalidates anything previously undone.
    pub fn record(&mut self, change: C) {
        self.undo.push(change);
        self.redo.clear();
    }

    /// Put a record back on the undo stack after a failed inversion,
    /// leaving the redo stack untouched.
    pub fn restore_undo(&mut self, change: C) {
        self.undo.push(change);
    }

    /// Move a successfully undone record onto the redo stack.
    pub fn push_undone(&mut self, change: C) {
        self.redo.push(change);
    }

    /// Move a successfully redone record back onto the undo stack, without
    /// clearing the redo stack.
    pub fn push_redone(&mut self, change: C) {
        self.undo.push(change);
    }

    /// Remove and return the most recent undo record.
    pub fn pop_undo(&mut self) -> Option<C> {
        self.undo.pop()
    }

    /// Remove and return the most recent redo record.
    pub fn pop_redo(&mut self) -> Option<C> {
        self.redo.pop()
    }

    /// Whether a level is available to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether a level is available to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of retained undo levels.
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Number of retained redo levels.
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Current history depth limit.
    pub fn limit(&self) -> usize {
        self.undo.limit()
    }

    /// Change the history depth limit for both stacks, truncating oldest
    /// entries immediately.
    pub fn set_limit(&mut self, limit: usize) {
        self.undo.set_limit(limit);
        self.redo.set_limit(limit);
    }

    /// Drop every redo record.
    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    /// Drop all history, both directions.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Open an explicit batch. Subsequent records buffer until
    /// [`end_batch`](Self::end_batch). Returns `false` when a batch was
    /// already open.
    pub fn begin_batch(&mut self) -> bool {
        if self.batch.is_some() {
            return false;
        }
        self.batch = Some(Vec::new());
        true
    }

    /// Whether an explicit batch is open.
    pub fn batch_open(&self) -> bool {
        self.batch.is_some()
    }

    /// Close the open batch and fold its buffered changes into one record.
    ///
    /// A single buffered change is returned as-is; two or more are wrapped
    /// with `wrap`. Returns `None` when no batch was open or nothing was
    /// buffered.
    pub fn end_batch(&mut self, wrap: impl FnOnce(Vec<C>) -> C) -> Option<C> {
        let mut buffer = self.batch.take()?;
        match buffer.len() {
            0 => None,
            1 => buffer.pop(),
            _ => Some(wrap(buffer)),
        }
    }
}
