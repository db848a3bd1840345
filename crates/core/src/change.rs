//! Change records for undoable collections
//!
//! A change record describes one committed, invertible mutation. Records are
//! immutable once constructed and are owned by exactly one history stack
//! (undo or redo) at a time. Sequence-shaped and map-shaped collections each
//! get their own closed enum so that inversion logic is exhaustively checked
//! at compile time.
//!
//! Edits committed by a captured child collection cross the parent boundary
//! type-erased: the parent stores a [`ChildEdit`] command that knows how to
//! revert and reapply itself against the child, without the parent knowing
//! the child's element types.

use crate::context::ContextId;
use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Replay surface for an edit committed by a captured child.
///
/// Implementations hold a weak reference to the child so a parent's history
/// never keeps a dropped child alive; replay on a dead child is a no-op.
pub trait EditReplay: Send + Sync {
    /// Context that committed the edit.
    fn origin(&self) -> ContextId;

    /// Apply the inverse of the recorded changes to the child.
    fn revert(&self) -> Result<()>;

    /// Re-apply the recorded changes to the child.
    fn reapply(&self) -> Result<()>;
}

/// A type-erased, cheaply clonable edit committed by a captured child.
#[derive(Clone)]
pub struct ChildEdit {
    replay: Arc<dyn EditReplay>,
}

impl ChildEdit {
    /// Wrap a replay implementation.
    pub fn new(replay: Arc<dyn EditReplay>) -> Self {
        Self { replay }
    }

    /// Context that committed the edit.
    pub fn origin(&self) -> ContextId {
        self.replay.origin()
    }

    /// Apply the inverse of the recorded changes to the child.
    pub fn revert(&self) -> Result<()> {
        self.replay.revert()
    }

    /// Re-apply the recorded changes to the child.
    pub fn reapply(&self) -> Result<()> {
        self.replay.reapply()
    }
}

impl fmt::Debug for ChildEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildEdit")
            .field("origin", &self.origin())
            .finish()
    }
}

/// One invertible mutation of a sequence-shaped collection.
///
/// Indexes refer to the container state at the moment the change was
/// committed, which is exactly the state inversion runs against.
#[derive(Debug, Clone)]
pub enum ListChange<T> {
    /// One item inserted at `index`.
    Insert {
        /// Index the item was inserted at.
        index: usize,
        /// The inserted item.
        item: T,
    },
    /// A run of items inserted starting at `index`.
    InsertMany {
        /// Index of the first inserted item.
        index: usize,
        /// The inserted items, in insertion order.
        items: Vec<T>,
    },
    /// One item removed from `index`.
    Remove {
        /// Index the item was removed from.
        index: usize,
        /// The removed item.
        item: T,
    },
    /// The item at `index` replaced in place.
    Replace {
        /// Index of the replaced slot.
        index: usize,
        /// Value before the replacement.
        old: T,
        /// Value after the replacement.
        new: T,
    },
    /// All items removed at once.
    Clear {
        /// The cleared items, in their original order.
        items: Vec<T>,
    },
    /// An edit committed by a captured child collection.
    Child(ChildEdit),
    /// Several changes committed as one undo level.
    Batch(Vec<ListChange<T>>),
}

/// One invertible mutation of a map-shaped collection.
///
/// Map changes carry no stable position; observers receive reset
/// notifications for all of them.
#[derive(Debug, Clone)]
pub enum MapChange<K, V> {
    /// A new key inserted.
    Insert {
        /// The inserted key.
        key: K,
        /// The inserted value.
        value: V,
    },
    /// A key removed.
    Remove {
        /// The removed key.
        key: K,
        /// The value it held.
        value: V,
    },
    /// The value of an existing key replaced.
    Replace {
        /// The key whose value changed.
        key: K,
        /// Value before the replacement.
        old: V,
        /// Value after the replacement.
        new: V,
    },
    /// All entries removed at once.
    Clear {
        /// The cleared entries.
        entries: Vec<(K, V)>,
    },
    /// An edit committed by a captured child collection.
    Child(ChildEdit),
    /// Several changes committed as one undo level.
    Batch(Vec<MapChange<K, V>>),
}
