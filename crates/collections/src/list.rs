//! Observable list with undo/redo support
//!
//! `ObservableList` is a cheap-`Clone` handle over shared state guarded by
//! one `parking_lot::RwLock`. Every mutating operation follows the same
//! protocol: validate preconditions, mutate the backing `Vec` under the
//! write lock, stage a change record, drop the guard, then broadcast
//! notifications. Undo and redo pop a record, apply its inverse (or forward
//! effect) exhaustively by variant, and move the record to the opposite
//! stack.
//!
//! Lists built with [`ObservableList::of_undoables`] additionally capture
//! inserted items into the list's own undo context: edits committed by a
//! captured item surface in the list's history as one `Child` level, and
//! undoing the list reverts the item's edit rather than the list's own
//! structure.

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use rewind_core::change::{ChildEdit, EditReplay, ListChange};
use rewind_core::config::UndoConfig;
use rewind_core::context::{ContextId, UndoContext, UndoHandle};
use rewind_core::error::{Error, Result};
use rewind_core::events::{
    CollectionEvent, Dispatcher, Notifier, PropertyChanged, SubscriptionId,
};
use rewind_core::position::Position;
use rewind_core::traits::UndoableItem;
use rewind_history::{with_capture, CaptureState, HistoryState, SubItemHooks};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

pub(crate) struct ListState<T> {
    items: Vec<T>,
    history: HistoryState<ListChange<T>>,
    capture: CaptureState,
    hooks: Option<SubItemHooks<T>>,
}

/// Routing decision for a committed change, resolved under the write lock
/// and acted on after it is dropped.
pub(crate) enum Staged {
    Dropped,
    Buffered,
    Recorded,
    Forwarded(Arc<dyn UndoContext>, ChildEdit),
}

pub(crate) struct ListShared<T> {
    id: ContextId,
    self_weak: Weak<ListShared<T>>,
    state: RwLock<ListState<T>>,
    events: Notifier<CollectionEvent<T>>,
    props: Notifier<PropertyChanged>,
}

impl<T: Clone + Send + Sync + 'static> ListShared<T> {
    fn handle(&self) -> UndoHandle {
        let target: Weak<dyn UndoContext> = self.self_weak.clone();
        UndoHandle::new(self.id, target)
    }

    /// Capture `item` into this list's context, tolerating an existing
    /// capture by this same context.
    fn capture_child(&self, st: &ListState<T>, item: &T) -> Result<()> {
        if let Some(hooks) = st.hooks {
            hooks.capture(item, &self.handle())?;
        }
        Ok(())
    }

    /// Release `item` from this list's context; an item this context does
    /// not hold is left alone.
    fn release_child(&self, st: &ListState<T>, item: &T) {
        if let Some(hooks) = st.hooks {
            if let Err(err) = hooks.release(item, self.id) {
                trace!(ctx = %self.id, %err, "skipping release of unheld item");
            }
        }
    }

    /// Push-undo-level procedure: route a committed change to the batch
    /// buffer, the capturing parent, or the local undo stack.
    fn stage(&self, st: &mut ListState<T>, change: ListChange<T>) -> Staged {
        if st.history.suppressed() {
            return Staged::Dropped;
        }
        let change = match st.history.try_buffer(change) {
            None => return Staged::Buffered,
            Some(change) => change,
        };
        let parent = st.capture.holder().and_then(|handle| handle.upgrade());
        if st.capture.is_captured() && parent.is_none() {
            // the capturing parent is gone; fall back to local history
            st.capture.clear();
        }
        if let Some(parent) = parent {
            st.history.clear_redo();
            let edit = ChildEdit::new(Arc::new(ListReplay {
                origin: self.id,
                child: self.self_weak.clone(),
                changes: vec![change],
            }));
            return Staged::Forwarded(parent, edit);
        }
        st.history.record(change);
        Staged::Recorded
    }

    /// Notification epilogue, run strictly after the write guard is gone.
    fn finish(&self, staged: Staged, events: Vec<CollectionEvent<T>>, count_changed: bool) {
        for event in events {
            self.events.emit(event);
        }
        if count_changed {
            self.props.emit(PropertyChanged::Count);
        }
        let recorded = match staged {
            Staged::Dropped | Staged::Buffered => false,
            Staged::Recorded => true,
            Staged::Forwarded(parent, edit) => {
                parent.record_child_edit(edit);
                true
            }
        };
        if recorded {
            self.props.emit(PropertyChanged::CanUndo);
            self.props.emit(PropertyChanged::CanRedo);
        }
    }

    fn apply_inverse(
        &self,
        st: &mut ListState<T>,
        change: &ListChange<T>,
        events: &mut Vec<CollectionEvent<T>>,
    ) -> Result<()> {
        match change {
            ListChange::Insert { index, item } => {
                st.items.remove(*index);
                self.release_child(st, item);
                events.push(CollectionEvent::Removed {
                    index: Position::At(*index),
                    items: vec![item.clone()],
                });
            }
            ListChange::InsertMany { index, items } => {
                st.items.drain(*index..*index + items.len());
                for item in items {
                    self.release_child(st, item);
                }
                events.push(CollectionEvent::Removed {
                    index: Position::At(*index),
                    items: items.clone(),
                });
            }
            ListChange::Remove { index, item } => {
                st.items.insert(*index, item.clone());
                self.capture_child(st, item)?;
                events.push(CollectionEvent::Added {
                    index: Position::At(*index),
                    items: vec![item.clone()],
                });
            }
            ListChange::Replace { index, old, new } => {
                st.items[*index] = old.clone();
                self.release_child(st, new);
                self.capture_child(st, old)?;
                events.push(CollectionEvent::Replaced {
                    index: Position::At(*index),
                    old: new.clone(),
                    new: old.clone(),
                });
            }
            ListChange::Clear { items } => {
                st.items = items.clone();
                for item in items {
                    self.capture_child(st, item)?;
                }
                events.push(CollectionEvent::Reset);
            }
            ListChange::Child(edit) => {
                // reached only inside a batch; top-level child edits are
                // reverted outside the lock
                edit.revert()?;
            }
            ListChange::Batch(changes) => {
                for nested in changes.iter().rev() {
                    self.apply_inverse(st, nested, events)?;
                }
            }
        }
        Ok(())
    }

    fn apply_forward(
        &self,
        st: &mut ListState<T>,
        change: &ListChange<T>,
        events: &mut Vec<CollectionEvent<T>>,
    ) -> Result<()> {
        match change {
            ListChange::Insert { index, item } => {
                st.items.insert(*index, item.clone());
                self.capture_child(st, item)?;
                events.push(CollectionEvent::Added {
                    index: Position::At(*index),
                    items: vec![item.clone()],
                });
            }
            ListChange::InsertMany { index, items } => {
                for (offset, item) in items.iter().enumerate() {
                    st.items.insert(index + offset, item.clone());
                    self.capture_child(st, item)?;
                }
                events.push(CollectionEvent::Added {
                    index: Position::At(*index),
                    items: items.clone(),
                });
            }
            ListChange::Remove { index, item } => {
                st.items.remove(*index);
                self.release_child(st, item);
                events.push(CollectionEvent::Removed {
                    index: Position::At(*index),
                    items: vec![item.clone()],
                });
            }
            ListChange::Replace { index, old, new } => {
                st.items[*index] = new.clone();
                self.release_child(st, old);
                self.capture_child(st, new)?;
                events.push(CollectionEvent::Replaced {
                    index: Position::At(*index),
                    old: old.clone(),
                    new: new.clone(),
                });
            }
            ListChange::Clear { items } => {
                for item in items {
                    self.release_child(st, item);
                }
                st.items.clear();
                events.push(CollectionEvent::Reset);
            }
            ListChange::Child(edit) => {
                edit.reapply()?;
            }
            ListChange::Batch(changes) => {
                for nested in changes {
                    self.apply_forward(st, nested, events)?;
                }
            }
        }
        Ok(())
    }

    fn delegate_target(&self) -> Option<Arc<dyn UndoContext>> {
        let st = self.state.read();
        st.capture.holder().and_then(|handle| handle.upgrade())
    }

    fn undo_impl(&self) -> Result<()> {
        if let Some(parent) = self.delegate_target() {
            trace!(ctx = %self.id, "undo delegated to capturing parent");
            return parent.undo();
        }
        let mut events = Vec::new();
        let mut deferred: Option<ChildEdit> = None;
        {
            let guard = self.state.upgradable_read();
            if !guard.history.can_undo() {
                return Ok(());
            }
            let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
            let st = &mut *guard;
            let Some(change) = st.history.pop_undo() else {
                return Ok(());
            };
            match change {
                ListChange::Child(edit) => {
                    st.history.push_undone(ListChange::Child(edit.clone()));
                    deferred = Some(edit);
                }
                change => {
                    if let Err(err) = self.apply_inverse(st, &change, &mut events) {
                        st.history.restore_undo(change);
                        return Err(err);
                    }
                    st.history.push_undone(change);
                }
            }
        }
        if let Some(edit) = deferred {
            debug!(ctx = %self.id, child = %edit.origin(), "undoing child edit");
            if let Err(err) = edit.revert() {
                let mut st = self.state.write();
                if let Some(change) = st.history.pop_redo() {
                    st.history.restore_undo(change);
                }
                return Err(err);
            }
        }
        debug!(ctx = %self.id, "undo applied");
        self.emit_after_history(events);
        Ok(())
    }

    fn redo_impl(&self) -> Result<()> {
        if let Some(parent) = self.delegate_target() {
            trace!(ctx = %self.id, "redo delegated to capturing parent");
            return parent.redo();
        }
        let mut events = Vec::new();
        let mut deferred: Option<ChildEdit> = None;
        {
            let guard = self.state.upgradable_read();
            if !guard.history.can_redo() {
                return Ok(());
            }
            let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
            let st = &mut *guard;
            let Some(change) = st.history.pop_redo() else {
                return Ok(());
            };
            match change {
                ListChange::Child(edit) => {
                    st.history.push_redone(ListChange::Child(edit.clone()));
                    deferred = Some(edit);
                }
                change => {
                    if let Err(err) = self.apply_forward(st, &change, &mut events) {
                        st.history.push_undone(change);
                        return Err(err);
                    }
                    st.history.push_redone(change);
                }
            }
        }
        if let Some(edit) = deferred {
            debug!(ctx = %self.id, child = %edit.origin(), "redoing child edit");
            if let Err(err) = edit.reapply() {
                let mut st = self.state.write();
                if let Some(change) = st.history.pop_undo() {
                    st.history.push_undone(change);
                }
                return Err(err);
            }
        }
        debug!(ctx = %self.id, "redo applied");
        self.emit_after_history(events);
        Ok(())
    }

    fn emit_after_history(&self, events: Vec<CollectionEvent<T>>) {
        let count_changed = events.iter().any(|event| {
            matches!(
                event,
                CollectionEvent::Added { .. }
                    | CollectionEvent::Removed { .. }
                    | CollectionEvent::Reset
            )
        });
        for event in events {
            self.events.emit(event);
        }
        if count_changed {
            self.props.emit(PropertyChanged::Count);
        }
        self.props.emit(PropertyChanged::CanUndo);
        self.props.emit(PropertyChanged::CanRedo);
    }

    /// Apply the inverse of `changes` without touching the history stacks.
    fn undo_changes_impl(&self, changes: &[ListChange<T>]) -> Result<()> {
        let mut events = Vec::new();
        {
            let mut st = self.state.write();
            let st = &mut *st;
            for change in changes.iter().rev() {
                self.apply_inverse(st, change, &mut events)?;
            }
        }
        self.emit_after_history(events);
        Ok(())
    }

    /// Re-apply `changes` without touching the history stacks.
    fn redo_changes_impl(&self, changes: &[ListChange<T>]) -> Result<()> {
        let mut events = Vec::new();
        {
            let mut st = self.state.write();
            let st = &mut *st;
            for change in changes {
                self.apply_forward(st, change, &mut events)?;
            }
        }
        self.emit_after_history(events);
        Ok(())
    }
}

impl<T: Clone + Send + Sync + 'static> UndoContext for ListShared<T> {
    fn context_id(&self) -> ContextId {
        self.id
    }

    fn record_child_edit(&self, edit: ChildEdit) {
        trace!(ctx = %self.id, child = %edit.origin(), "recording child edit");
        let staged = {
            let mut st = self.state.write();
            self.stage(&mut st, ListChange::Child(edit))
        };
        self.finish(staged, Vec::new(), false);
    }

    fn undo(&self) -> Result<()> {
        self.undo_impl()
    }

    fn redo(&self) -> Result<()> {
        self.redo_impl()
    }

    fn can_undo(&self) -> bool {
        self.state.read().history.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.state.read().history.can_redo()
    }
}

struct ListReplay<T> {
    origin: ContextId,
    child: Weak<ListShared<T>>,
    changes: Vec<ListChange<T>>,
}

impl<T: Clone + Send + Sync + 'static> EditReplay for ListReplay<T> {
    fn origin(&self) -> ContextId {
        self.origin
    }

    fn revert(&self) -> Result<()> {
        match self.child.upgrade() {
            Some(child) => child.undo_changes_impl(&self.changes),
            None => Ok(()),
        }
    }

    fn reapply(&self) -> Result<()> {
        match self.child.upgrade() {
            Some(child) => child.redo_changes_impl(&self.changes),
            None => Ok(()),
        }
    }
}

/// Observable list with bounded undo/redo history.
///
/// Handles are cheap to clone and share one backing store; the type is
/// `Send + Sync` whenever `T` is.
///
/// # Example
///
/// ```
/// use rewind_collections::ObservableList;
///
/// let list = ObservableList::new();
/// list.push(1).unwrap();
/// list.push(2).unwrap();
/// list.undo().unwrap();
/// assert_eq!(list.to_vec(), vec![1]);
/// list.redo().unwrap();
/// assert_eq!(list.to_vec(), vec![1, 2]);
/// ```
pub struct ObservableList<T> {
    shared: Arc<ListShared<T>>,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableList<T> {
    /// Create an empty list with the default configuration.
    pub fn new() -> Self {
        Self::with_config(UndoConfig::default())
    }

    /// Create an empty list with an explicit configuration.
    pub fn with_config(config: UndoConfig) -> Self {
        Self::build(config, None, None)
    }

    pub(crate) fn build(
        config: UndoConfig,
        dispatcher: Option<Dispatcher>,
        hooks: Option<SubItemHooks<T>>,
    ) -> Self {
        let shared = Arc::new_cyclic(|weak| ListShared {
            id: ContextId::next(),
            self_weak: weak.clone(),
            state: RwLock::new(ListState {
                items: Vec::new(),
                history: HistoryState::new(config.history_levels, config.suppress_undo),
                capture: CaptureState::new(),
                hooks,
            }),
            events: Notifier::with_dispatcher(dispatcher.clone()),
            props: Notifier::with_dispatcher(dispatcher),
        });
        Self { shared }
    }

    // ========== Mutation ==========

    /// Append an item, returning its index.
    pub fn push(&self, item: T) -> Result<usize> {
        let shared = &self.shared;
        let (index, staged) = {
            let mut st = shared.state.write();
            let st = &mut *st;
            let index = st.items.len();
            if let Some(hooks) = st.hooks {
                let items = [item.clone()];
                with_capture(&items, &shared.handle(), hooks, || {
                    st.items.push(item.clone());
                    Ok(())
                })?;
            } else {
                st.items.push(item.clone());
            }
            let staged = shared.stage(
                st,
                ListChange::Insert {
                    index,
                    item: item.clone(),
                },
            );
            (index, staged)
        };
        trace!(ctx = %shared.id, index, "push");
        shared.finish(
            staged,
            vec![CollectionEvent::Added {
                index: Position::At(index),
                items: vec![item],
            }],
            true,
        );
        Ok(index)
    }

    /// Insert an item at `index`.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfBounds`] when `index > len`.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        let shared = &self.shared;
        let staged = {
            let mut st = shared.state.write();
            let st = &mut *st;
            if index > st.items.len() {
                return Err(Error::IndexOutOfBounds {
                    index,
                    len: st.items.len(),
                });
            }
            if let Some(hooks) = st.hooks {
                let items = [item.clone()];
                with_capture(&items, &shared.handle(), hooks, || {
                    st.items.insert(index, item.clone());
                    Ok(())
                })?;
            } else {
                st.items.insert(index, item.clone());
            }
            shared.stage(
                st,
                ListChange::Insert {
                    index,
                    item: item.clone(),
                },
            )
        };
        trace!(ctx = %shared.id, index, "insert");
        shared.finish(
            staged,
            vec![CollectionEvent::Added {
                index: Position::At(index),
                items: vec![item],
            }],
            true,
        );
        Ok(())
    }

    /// Append every item of `items` as a single undo level.
    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return Ok(());
        }
        let shared = &self.shared;
        let (index, staged) = {
            let mut st = shared.state.write();
            let st = &mut *st;
            let index = st.items.len();
            if let Some(hooks) = st.hooks {
                with_capture(&items, &shared.handle(), hooks, || {
                    st.items.extend(items.iter().cloned());
                    Ok(())
                })?;
            } else {
                st.items.extend(items.iter().cloned());
            }
            let staged = shared.stage(
                st,
                ListChange::InsertMany {
                    index,
                    items: items.clone(),
                },
            );
            (index, staged)
        };
        trace!(ctx = %shared.id, index, count = items.len(), "extend");
        shared.finish(
            staged,
            vec![CollectionEvent::Added {
                index: Position::At(index),
                items,
            }],
            true,
        );
        Ok(())
    }

    /// Replace the item at `index`, returning the previous value.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfBounds`] when `index >= len`.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        let shared = &self.shared;
        let (old, staged) = {
            let mut st = shared.state.write();
            let st = &mut *st;
            if index >= st.items.len() {
                return Err(Error::IndexOutOfBounds {
                    index,
                    len: st.items.len(),
                });
            }
            let old = st.items[index].clone();
            if let Some(hooks) = st.hooks {
                let items = [item.clone()];
                with_capture(&items, &shared.handle(), hooks, || {
                    st.items[index] = item.clone();
                    Ok(())
                })?;
                shared.release_child(st, &old);
            } else {
                st.items[index] = item.clone();
            }
            let staged = shared.stage(
                st,
                ListChange::Replace {
                    index,
                    old: old.clone(),
                    new: item.clone(),
                },
            );
            (old, staged)
        };
        trace!(ctx = %shared.id, index, "set");
        shared.finish(
            staged,
            vec![CollectionEvent::Replaced {
                index: Position::At(index),
                old: old.clone(),
                new: item,
            }],
            false,
        );
        self.shared.props.emit(PropertyChanged::Item);
        Ok(old)
    }

    /// Remove and return the item at `index`; `None` when out of range.
    ///
    /// The out-of-range probe runs under an upgradable read lock so no-op
    /// calls never contend with readers.
    pub fn remove_at(&self, index: usize) -> Option<T> {
        let shared = &self.shared;
        let (item, staged) = {
            let guard = shared.state.upgradable_read();
            if index >= guard.items.len() {
                return None;
            }
            let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
            let st = &mut *guard;
            let item = st.items.remove(index);
            shared.release_child(st, &item);
            let staged = shared.stage(
                st,
                ListChange::Remove {
                    index,
                    item: item.clone(),
                },
            );
            (item, staged)
        };
        trace!(ctx = %shared.id, index, "remove_at");
        shared.finish(
            staged,
            vec![CollectionEvent::Removed {
                index: Position::At(index),
                items: vec![item.clone()],
            }],
            true,
        );
        Some(item)
    }

    /// Remove and return the last item; `None` when empty.
    ///
    /// The emptiness probe and the removal happen under one upgradable
    /// read lock, so concurrent callers never remove the same slot twice.
    pub fn remove_last(&self) -> Option<T> {
        let shared = &self.shared;
        let (index, item, staged) = {
            let guard = shared.state.upgradable_read();
            if guard.items.is_empty() {
                return None;
            }
            let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
            let st = &mut *guard;
            let index = st.items.len() - 1;
            let item = st.items.remove(index);
            shared.release_child(st, &item);
            let staged = shared.stage(
                st,
                ListChange::Remove {
                    index,
                    item: item.clone(),
                },
            );
            (index, item, staged)
        };
        trace!(ctx = %shared.id, index, "remove_last");
        shared.finish(
            staged,
            vec![CollectionEvent::Removed {
                index: Position::At(index),
                items: vec![item.clone()],
            }],
            true,
        );
        Some(item)
    }

    /// Remove every item, recording one undo level holding them all.
    pub fn clear(&self) {
        let shared = &self.shared;
        let staged = {
            let mut st = shared.state.write();
            let st = &mut *st;
            if st.items.is_empty() {
                return;
            }
            let items = std::mem::take(&mut st.items);
            for item in &items {
                shared.release_child(st, item);
            }
            shared.stage(st, ListChange::Clear { items })
        };
        trace!(ctx = %shared.id, "clear");
        shared.finish(staged, vec![CollectionEvent::Reset], true);
    }

    /// Remove the first occurrence of `item`; `true` when something was
    /// removed.
    pub fn remove_item(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let index = {
            let st = self.shared.state.read();
            st.items.iter().position(|candidate| candidate == item)
        };
        match index {
            Some(index) => self.remove_at(index).is_some(),
            None => false,
        }
    }

    // ========== Reads ==========

    /// Clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.shared.state.read().items.get(index).cloned()
    }

    /// Clone of the last item.
    pub fn last(&self) -> Option<T> {
        self.shared.state.read().items.last().cloned()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.shared.state.read().items.len()
    }

    /// Whether the list holds no items.
    pub fn is_empty(&self) -> bool {
        self.shared.state.read().items.is_empty()
    }

    /// Whether `item` is present.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.shared.state.read().items.contains(item)
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.shared.state.read().items.clone()
    }

    /// Iterate over a snapshot of the current contents.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    // ========== Undo / redo ==========

    /// Undo the most recent level; no-op when the history is empty.
    ///
    /// While captured, delegates to the capturing parent.
    pub fn undo(&self) -> Result<()> {
        self.shared.undo_impl()
    }

    /// Redo the most recently undone level; no-op when nothing was undone.
    pub fn redo(&self) -> Result<()> {
        self.shared.redo_impl()
    }

    /// Whether a level is available to undo.
    pub fn can_undo(&self) -> bool {
        self.shared.state.read().history.can_undo()
    }

    /// Whether a level is available to redo.
    pub fn can_redo(&self) -> bool {
        self.shared.state.read().history.can_redo()
    }

    /// Current history depth limit.
    pub fn history_levels(&self) -> usize {
        self.shared.state.read().history.limit()
    }

    /// Change the history depth limit, truncating oldest levels
    /// immediately.
    pub fn set_history_levels(&self, levels: usize) {
        self.shared.state.write().history.set_limit(levels);
        self.shared.props.emit(PropertyChanged::CanUndo);
        self.shared.props.emit(PropertyChanged::CanRedo);
    }

    /// Open an explicit batch; subsequent mutations fold into one undo
    /// level. Returns `false` when a batch was already open.
    pub fn begin_batch(&self) -> bool {
        self.shared.state.write().history.begin_batch()
    }

    /// Close the open batch, committing its changes as one level.
    pub fn end_batch(&self) {
        let staged = {
            let mut st = self.shared.state.write();
            let st = &mut *st;
            match st.history.end_batch(ListChange::Batch) {
                Some(change) => self.shared.stage(st, change),
                None => Staged::Dropped,
            }
        };
        self.shared.finish(staged, Vec::new(), false);
    }

    /// Apply the inverse of `changes` without recording history.
    pub fn undo_changes(&self, changes: &[ListChange<T>]) -> Result<()> {
        self.shared.undo_changes_impl(changes)
    }

    /// Re-apply `changes` without recording history.
    pub fn redo_changes(&self, changes: &[ListChange<T>]) -> Result<()> {
        self.shared.redo_changes_impl(changes)
    }

    /// Handle other collections use to capture children into this list's
    /// undo context.
    pub fn undo_handle(&self) -> UndoHandle {
        self.shared.handle()
    }

    // ========== Notifications ==========

    /// Subscribe to structural change events.
    pub fn subscribe(
        &self,
        callback: impl Fn(&CollectionEvent<T>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.events.subscribe(callback)
    }

    /// Remove a structural-change subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Subscribe to property change events.
    pub fn subscribe_properties(
        &self,
        callback: impl Fn(&PropertyChanged) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.props.subscribe(callback)
    }

    /// Remove a property-change subscription.
    pub fn unsubscribe_properties(&self, id: SubscriptionId) -> bool {
        self.shared.props.unsubscribe(id)
    }
}

impl<T: UndoableItem + Clone + Send + Sync + 'static> ObservableList<T> {
    /// Create a list that captures inserted items as undoable children.
    pub fn of_undoables() -> Self {
        Self::of_undoables_with_config(UndoConfig::default())
    }

    /// Create a child-capturing list with an explicit configuration.
    ///
    /// Capture is skipped when the configuration disables
    /// `capture_children`.
    pub fn of_undoables_with_config(config: UndoConfig) -> Self {
        let hooks = config
            .capture_children
            .then(SubItemHooks::<T>::for_undoable);
        Self::build(config, None, hooks)
    }

    pub(crate) fn build_of_undoables(
        config: UndoConfig,
        dispatcher: Option<Dispatcher>,
    ) -> Self {
        let hooks = config
            .capture_children
            .then(SubItemHooks::<T>::for_undoable);
        Self::build(config, dispatcher, hooks)
    }
}

impl<T: Clone + Send + Sync + 'static> UndoableItem for ObservableList<T> {
    fn capture_into(&self, parent: UndoHandle) -> Result<()> {
        self.shared.state.write().capture.attach(&parent).map(|_| ())
    }

    fn release_from(&self, parent: ContextId) -> Result<()> {
        self.shared.state.write().capture.detach(parent)
    }

    fn captured_by(&self) -> Option<ContextId> {
        self.shared.state.read().capture.holder_id()
    }

    fn can_undo(&self) -> bool {
        ObservableList::can_undo(self)
    }

    fn can_redo(&self) -> bool {
        ObservableList::can_redo(self)
    }

    fn undo(&self) -> Result<()> {
        ObservableList::undo(self)
    }

    fn redo(&self) -> Result<()> {
        ObservableList::redo(self)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.shared.state.read();
        f.debug_struct("ObservableList")
            .field("id", &self.shared.id)
            .field("len", &st.items.len())
            .field("undo_depth", &st.history.undo_depth())
            .field("redo_depth", &st.history.redo_depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_push_undo_redo_round_trip() {
        let list = ObservableList::new();
        list.push(1).unwrap();
        list.push(2).unwrap();
        list.push(3).unwrap();
        assert_eq!(list.to_vec(), vec![1, 2, 3]);

        list.undo().unwrap();
        assert_eq!(list.to_vec(), vec![1, 2]);
        list.undo().unwrap();
        assert_eq!(list.to_vec(), vec![1]);
        list.redo().unwrap();
        assert_eq!(list.to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_new_mutation_clears_redo() {
        let list = ObservableList::new();
        list.push(1).unwrap();
        list.undo().unwrap();
        assert!(list.can_redo());
        list.push(2).unwrap();
        assert!(!list.can_redo());
    }

    #[test]
    fn test_insert_bounds_checked() {
        let list = ObservableList::new();
        list.push(1).unwrap();
        let err = list.insert(5, 9).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { index: 5, len: 1 }));
        assert_eq!(list.to_vec(), vec![1], "no partial mutation");
    }

    #[test]
    fn test_set_records_replace() {
        let list = ObservableList::new();
        list.push(1).unwrap();
        let old = list.set(0, 9).unwrap();
        assert_eq!(old, 1);
        list.undo().unwrap();
        assert_eq!(list.to_vec(), vec![1]);
        list.redo().unwrap();
        assert_eq!(list.to_vec(), vec![9]);
    }

    #[test]
    fn test_remove_at_out_of_range_is_noop() {
        let list: ObservableList<i32> = ObservableList::new();
        assert_eq!(list.remove_at(0), None);
        assert!(!list.can_undo());
    }

    #[test]
    fn test_clear_restores_order_on_undo() {
        let list = ObservableList::new();
        list.extend([3, 1, 2]).unwrap();
        list.clear();
        assert!(list.is_empty());
        list.undo().unwrap();
        assert_eq!(list.to_vec(), vec![3, 1, 2]);
    }

    #[test]
    fn test_extend_is_single_level() {
        let list = ObservableList::new();
        list.push(0).unwrap();
        list.extend([1, 2, 3]).unwrap();
        list.undo().unwrap();
        assert_eq!(list.to_vec(), vec![0]);
        list.redo().unwrap();
        assert_eq!(list.to_vec(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_suppressed_config_records_nothing() {
        let list = ObservableList::with_config(UndoConfig::default().with_undo_suppressed(true));
        list.push(1).unwrap();
        assert!(!list.can_undo());
    }

    #[test]
    fn test_history_limit_truncates() {
        let list = ObservableList::with_config(UndoConfig::default().with_history_levels(2));
        for i in 0..5 {
            list.push(i).unwrap();
        }
        list.undo().unwrap();
        list.undo().unwrap();
        list.undo().unwrap(); // beyond the retained depth: no-op
        assert_eq!(list.to_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn test_set_history_levels_truncates_immediately() {
        let list = ObservableList::new();
        for i in 0..10 {
            list.push(i).unwrap();
        }
        list.set_history_levels(3);
        for _ in 0..10 {
            list.undo().unwrap();
        }
        assert_eq!(list.len(), 7, "only three levels were retained");
    }

    #[test]
    fn test_batch_is_one_level() {
        let list = ObservableList::new();
        assert!(list.begin_batch());
        list.push(1).unwrap();
        list.push(2).unwrap();
        list.push(3).unwrap();
        list.end_batch();
        assert_eq!(list.to_vec(), vec![1, 2, 3]);
        list.undo().unwrap();
        assert!(list.is_empty());
        list.redo().unwrap();
        assert_eq!(list.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_events_emitted_after_mutation() {
        let list = ObservableList::new();
        let added = Arc::new(AtomicUsize::new(0));
        let added2 = Arc::clone(&added);
        list.subscribe(move |event| {
            if let CollectionEvent::Added { items, .. } = event {
                added2.fetch_add(items.len(), Ordering::SeqCst);
            }
        });
        list.push(1).unwrap();
        list.extend([2, 3]).unwrap();
        assert_eq!(added.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_property_events_on_history_change() {
        let list = ObservableList::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        list.subscribe_properties(move |prop| {
            if matches!(prop, PropertyChanged::CanUndo) {
                seen2.fetch_add(1, Ordering::SeqCst);
            }
        });
        list.push(1).unwrap();
        assert!(seen.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_clone_shares_state() {
        let list = ObservableList::new();
        let alias = list.clone();
        list.push(7).unwrap();
        assert_eq!(alias.to_vec(), vec![7]);
        alias.undo().unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_item_by_value() {
        let list = ObservableList::new();
        list.extend([1, 2, 3]).unwrap();
        assert!(list.remove_item(&2));
        assert!(!list.remove_item(&9));
        assert_eq!(list.to_vec(), vec![1, 3]);
        list.undo().unwrap();
        assert_eq!(list.to_vec(), vec![1, 2, 3]);
    }
}
