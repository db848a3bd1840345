//! Capture surface for undoable items
//!
//! Items stored in a collection participate in parent/child undo history by
//! implementing [`UndoableItem`]. A captured item stops recording history
//! locally and instead forwards committed edits through the parent's
//! [`UndoHandle`](crate::context::UndoHandle); its own `undo`/`redo`
//! delegate to the parent for as long as the capture lasts.

use crate::context::{ContextId, UndoHandle};
use crate::error::Result;

/// An item whose edits can be recorded by a parent undo context.
///
/// An item is captured by at most one parent at a time. Capturing twice
/// under the same parent is idempotent; capturing under a different parent
/// fails with [`Error::AlreadyCaptured`](crate::error::Error::AlreadyCaptured).
pub trait UndoableItem: Send + Sync {
    /// Capture this item into `parent`'s undo context.
    fn capture_into(&self, parent: UndoHandle) -> Result<()>;

    /// Release this item from the undo context identified by `parent`.
    ///
    /// Fails with [`Error::NotCaptured`](crate::error::Error::NotCaptured)
    /// when `parent` does not currently hold the item.
    fn release_from(&self, parent: ContextId) -> Result<()>;

    /// Context currently holding this item, if any.
    fn captured_by(&self) -> Option<ContextId>;

    /// Whether a level is available to undo.
    fn can_undo(&self) -> bool;

    /// Whether a level is available to redo.
    fn can_redo(&self) -> bool;

    /// Undo the most recent level, delegating to the parent while captured.
    fn undo(&self) -> Result<()>;

    /// Redo the most recently undone level, delegating to the parent while
    /// captured.
    fn redo(&self) -> Result<()>;
}
