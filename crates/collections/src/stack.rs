//! Observable LIFO stack with undo/redo support
//!
//! `ObservableStack` adapts the list engine to stack semantics: `push`
//! records an insertion at the top, `pop` a removal from the top. The
//! emptiness probe in `pop` is atomic with the removal, so concurrent
//! callers never pop the same slot twice.

use crate::list::ObservableList;
use rewind_core::config::UndoConfig;
use rewind_core::context::{ContextId, UndoHandle};
use rewind_core::error::Result;
use rewind_core::events::{CollectionEvent, Dispatcher, PropertyChanged, SubscriptionId};
use rewind_core::traits::UndoableItem;
use std::fmt;

/// Observable LIFO stack with bounded undo/redo history.
///
/// # Example
///
/// ```
/// use rewind_collections::ObservableStack;
///
/// let stack = ObservableStack::new();
/// stack.push(1).unwrap();
/// stack.push(2).unwrap();
/// assert_eq!(stack.pop(), Some(2));
/// stack.undo().unwrap();
/// assert_eq!(stack.peek(), Some(2));
/// ```
pub struct ObservableStack<T> {
    inner: ObservableList<T>,
}

impl<T> Clone for ObservableStack<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableStack<T> {
    /// Create an empty stack with the default configuration.
    pub fn new() -> Self {
        Self::with_config(UndoConfig::default())
    }

    /// Create an empty stack with an explicit configuration.
    pub fn with_config(config: UndoConfig) -> Self {
        Self {
            inner: ObservableList::with_config(config),
        }
    }

    pub(crate) fn build(config: UndoConfig, dispatcher: Option<Dispatcher>) -> Self {
        Self {
            inner: ObservableList::build(config, dispatcher, None),
        }
    }

    /// Push an item on top of the stack.
    pub fn push(&self, item: T) -> Result<()> {
        self.inner.push(item).map(|_| ())
    }

    /// Remove and return the top item; `None` when empty.
    pub fn pop(&self) -> Option<T> {
        self.inner.remove_last()
    }

    /// Clone of the top item without removing it.
    pub fn peek(&self) -> Option<T> {
        self.inner.last()
    }

    /// Remove every item, recording one undo level holding them all.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the stack holds no items.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether `item` is present.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.inner.contains(item)
    }

    /// Snapshot of the current contents, bottom first.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.to_vec()
    }

    /// Iterate over a snapshot of the current contents, bottom first.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.inner.iter()
    }

    /// Undo the most recent level; no-op when the history is empty.
    pub fn undo(&self) -> Result<()> {
        self.inner.undo()
    }

    /// Redo the most recently undone level; no-op when nothing was undone.
    pub fn redo(&self) -> Result<()> {
        self.inner.redo()
    }

    /// Whether a level is available to undo.
    pub fn can_undo(&self) -> bool {
        self.inner.can_undo()
    }

    /// Whether a level is available to redo.
    pub fn can_redo(&self) -> bool {
        self.inner.can_redo()
    }

    /// Current history depth limit.
    pub fn history_levels(&self) -> usize {
        self.inner.history_levels()
    }

    /// Change the history depth limit, truncating oldest levels
    /// immediately.
    pub fn set_history_levels(&self, levels: usize) {
        self.inner.set_history_levels(levels);
    }

    /// Open an explicit batch; returns `false` when one was already open.
    pub fn begin_batch(&self) -> bool {
        self.inner.begin_batch()
    }

    /// Close the open batch, committing its changes as one level.
    pub fn end_batch(&self) {
        self.inner.end_batch();
    }

    /// Handle other collections use to capture this stack as a child.
    pub fn undo_handle(&self) -> UndoHandle {
        self.inner.undo_handle()
    }

    /// Subscribe to structural change events.
    pub fn subscribe(
        &self,
        callback: impl Fn(&CollectionEvent<T>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.subscribe(callback)
    }

    /// Remove a structural-change subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    /// Subscribe to property change events.
    pub fn subscribe_properties(
        &self,
        callback: impl Fn(&PropertyChanged) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.subscribe_properties(callback)
    }

    /// Remove a property-change subscription.
    pub fn unsubscribe_properties(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe_properties(id)
    }
}

impl<T: UndoableItem + Clone + Send + Sync + 'static> ObservableStack<T> {
    /// Create a stack that captures pushed items as undoable children.
    pub fn of_undoables() -> Self {
        Self {
            inner: ObservableList::of_undoables(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> UndoableItem for ObservableStack<T> {
    fn capture_into(&self, parent: UndoHandle) -> Result<()> {
        self.inner.capture_into(parent)
    }

    fn release_from(&self, parent: ContextId) -> Result<()> {
        self.inner.release_from(parent)
    }

    fn captured_by(&self) -> Option<ContextId> {
        UndoableItem::captured_by(&self.inner)
    }

    fn can_undo(&self) -> bool {
        self.inner.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.inner.can_redo()
    }

    fn undo(&self) -> Result<()> {
        self.inner.undo()
    }

    fn redo(&self) -> Result<()> {
        self.inner.redo()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ObservableStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Debug for ObservableStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableStack")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifo_order() {
        let stack = ObservableStack::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.push(3).unwrap();
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_peek_is_top() {
        let stack = ObservableStack::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.peek(), Some(2));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_undo_restores_popped_item() {
        let stack = ObservableStack::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.pop(), Some(2));
        stack.undo().unwrap();
        assert_eq!(stack.to_vec(), vec![1, 2]);
        stack.redo().unwrap();
        assert_eq!(stack.to_vec(), vec![1]);
    }

    #[test]
    fn test_undo_removes_pushed_item() {
        let stack = ObservableStack::new();
        stack.push(7).unwrap();
        stack.undo().unwrap();
        assert!(stack.is_empty());
        stack.redo().unwrap();
        assert_eq!(stack.peek(), Some(7));
    }

    #[test]
    fn test_pop_empty_is_noop() {
        let stack: ObservableStack<i32> = ObservableStack::new();
        assert_eq!(stack.pop(), None);
        assert!(!stack.can_undo());
    }
}
