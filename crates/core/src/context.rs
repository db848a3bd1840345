//! Undo context identity and parent handles
//!
//! Every collection owns one undo context, identified by a process-unique
//! `ContextId`. Capturing a child collection into a parent stores a weak
//! `UndoHandle` back-reference on the child: committed edits are forwarded
//! through the handle, and the child's own `undo`/`redo` delegate to it.
//!
//! The back-reference is weak so a parent that contains its children (strong
//! references through the container) never forms a reference cycle with them.

use crate::change::ChildEdit;
use crate::error::Result;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Process-unique identifier for an undo context.
///
/// Allocated from a monotonically increasing atomic counter; never reused
/// within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate the next context identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The parent-side surface of an undo context.
///
/// Implemented by every collection's shared state. A captured child uses it
/// to forward committed edits and to delegate undo/redo; the delegation
/// bubbles to the outermost uncaptured ancestor because each level re-enters
/// through its own capture state.
pub trait UndoContext: Send + Sync {
    /// Identifier of this context.
    fn context_id(&self) -> ContextId;

    /// Record an edit committed by a captured child as one undo level.
    fn record_child_edit(&self, edit: ChildEdit);

    /// Undo the most recent level. No-op when the history is empty.
    fn undo(&self) -> Result<()>;

    /// Redo the most recently undone level. No-op when nothing was undone.
    fn redo(&self) -> Result<()>;

    /// Whether a level is available to undo.
    fn can_undo(&self) -> bool;

    /// Whether a level is available to redo.
    fn can_redo(&self) -> bool;
}

/// Weak handle to a parent undo context.
///
/// Cloning is cheap. `upgrade` fails once the parent has been dropped, in
/// which case the holder behaves as if it were not captured.
#[derive(Clone)]
pub struct UndoHandle {
    id: ContextId,
    target: Weak<dyn UndoContext>,
}

impl UndoHandle {
    /// Build a handle from a context identifier and its weak target.
    pub fn new(id: ContextId, target: Weak<dyn UndoContext>) -> Self {
        Self { id, target }
    }

    /// Identifier of the referenced context.
    pub fn context_id(&self) -> ContextId {
        self.id
    }

    /// Resolve the handle to a live context, if the parent still exists.
    pub fn upgrade(&self) -> Option<Arc<dyn UndoContext>> {
        self.target.upgrade()
    }
}

impl fmt::Debug for UndoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoHandle")
            .field("id", &self.id)
            .field("alive", &(self.target.strong_count() > 0))
            .finish()
    }
}
