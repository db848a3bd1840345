//! Observable map with undo/redo support
//!
//! `ObservableMap` follows the same mutation protocol as
//! [`ObservableList`](crate::ObservableList), backed by a `HashMap`. Map
//! entries have no stable position, so every structural change is broadcast
//! as a [`CollectionEvent::Reset`] and the property epilogue additionally
//! reports `Keys`, `Values`, and `Item`.

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use rewind_core::change::{ChildEdit, EditReplay, MapChange};
use rewind_core::config::UndoConfig;
use rewind_core::context::{ContextId, UndoContext, UndoHandle};
use rewind_core::error::{Error, Result};
use rewind_core::events::{
    CollectionEvent, Dispatcher, Notifier, PropertyChanged, SubscriptionId,
};
use rewind_core::traits::UndoableItem;
use rewind_history::{with_capture, CaptureState, HistoryState, SubItemHooks};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

pub(crate) struct MapState<K, V> {
    pub(crate) entries: HashMap<K, V>,
    pub(crate) history: HistoryState<MapChange<K, V>>,
    pub(crate) capture: CaptureState,
    pub(crate) hooks: Option<SubItemHooks<V>>,
}

pub(crate) enum Staged {
    Dropped,
    Buffered,
    Recorded,
    Forwarded(Arc<dyn UndoContext>, ChildEdit),
}

pub(crate) struct MapShared<K, V> {
    pub(crate) id: ContextId,
    self_weak: Weak<MapShared<K, V>>,
    pub(crate) state: RwLock<MapState<K, V>>,
    events: Notifier<CollectionEvent<(K, V)>>,
    props: Notifier<PropertyChanged>,
}

impl<K, V> MapShared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn handle(&self) -> UndoHandle {
        let target: Weak<dyn UndoContext> = self.self_weak.clone();
        UndoHandle::new(self.id, target)
    }

    pub(crate) fn capture_value(&self, st: &MapState<K, V>, value: &V) -> Result<()> {
        if let Some(hooks) = st.hooks {
            hooks.capture(value, &self.handle())?;
        }
        Ok(())
    }

    pub(crate) fn release_value(&self, st: &MapState<K, V>, value: &V) {
        if let Some(hooks) = st.hooks {
            if let Err(err) = hooks.release(value, self.id) {
                trace!(ctx = %self.id, %err, "skipping release of unheld value");
            }
        }
    }

    pub(crate) fn stage(&self, st: &mut MapState<K, V>, change: MapChange<K, V>) -> Staged {
        if st.history.suppressed() {
            return Staged::Dropped;
        }
        let change = match st.history.try_buffer(change) {
            None => return Staged::Buffered,
            Some(change) => change,
        };
        let parent = st.capture.holder().and_then(|handle| handle.upgrade());
        if st.capture.is_captured() && parent.is_none() {
            st.capture.clear();
        }
        if let Some(parent) = parent {
            st.history.clear_redo();
            let edit = ChildEdit::new(Arc::new(MapReplay {
                origin: self.id,
                child: self.self_weak.clone(),
                changes: vec![change],
            }));
            return Staged::Forwarded(parent, edit);
        }
        st.history.record(change);
        Staged::Recorded
    }

    /// Notification epilogue; map structural changes always reset, and the
    /// contents hook reports the derived properties too.
    pub(crate) fn finish(&self, staged: Staged, structural: bool, count_changed: bool) {
        if structural {
            self.events.emit(CollectionEvent::Reset);
            if count_changed {
                self.props.emit(PropertyChanged::Count);
            }
            self.props.emit(PropertyChanged::Keys);
            self.props.emit(PropertyChanged::Values);
            self.props.emit(PropertyChanged::Item);
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
        st: &mut MapState<K, V>,
        change: &MapChange<K, V>,
        structural: &mut bool,
    ) -> Result<()> {
        match change {
            MapChange::Insert { key, value } => {
                st.entries.remove(key);
                self.release_value(st, value);
                *structural = true;
            }
            MapChange::Remove { key, value } => {
                st.entries.insert(key.clone(), value.clone());
                self.capture_value(st, value)?;
                *structural = true;
            }
            MapChange::Replace { key, old, new } => {
                st.entries.insert(key.clone(), old.clone());
                self.release_value(st, new);
                self.capture_value(st, old)?;
                *structural = true;
            }
            MapChange::Clear { entries } => {
                st.entries = entries.iter().cloned().collect();
                for (_, value) in entries {
                    self.capture_value(st, value)?;
                }
                *structural = true;
            }
            MapChange::Child(edit) => {
                edit.revert()?;
            }
            MapChange::Batch(changes) => {
                for nested in changes.iter().rev() {
                    self.apply_inverse(st, nested, structural)?;
                }
            }
        }
        Ok(())
    }

    fn apply_forward(
        &self,
        st: &mut MapState<K, V>,
        change: &MapChange<K, V>,
        structural: &mut bool,
    ) -> Result<()> {
        match change {
            MapChange::Insert { key, value } => {
                st.entries.insert(key.clone(), value.clone());
                self.capture_value(st, value)?;
                *structural = true;
            }
            MapChange::Remove { key, value } => {
                st.entries.remove(key);
                self.release_value(st, value);
                *structural = true;
            }
            MapChange::Replace { key, old, new } => {
                st.entries.insert(key.clone(), new.clone());
                self.release_value(st, old);
                self.capture_value(st, new)?;
                *structural = true;
            }
            MapChange::Clear { entries } => {
                for (_, value) in entries {
                    self.release_value(st, value);
                }
                st.entries.clear();
                *structural = true;
            }
            MapChange::Child(edit) => {
                edit.reapply()?;
            }
            MapChange::Batch(changes) => {
                for nested in changes {
                    self.apply_forward(st, nested, structural)?;
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
        let mut structural = false;
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
                MapChange::Child(edit) => {
                    st.history.push_undone(MapChange::Child(edit.clone()));
                    deferred = Some(edit);
                }
                change => {
                    if let Err(err) = self.apply_inverse(st, &change, &mut structural) {
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
        self.emit_after_history(structural);
        Ok(())
    }

    fn redo_impl(&self) -> Result<()> {
        if let Some(parent) = self.delegate_target() {
            trace!(ctx = %self.id, "redo delegated to capturing parent");
            return parent.redo();
        }
        let mut structural = false;
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
                MapChange::Child(edit) => {
                    st.history.push_redone(MapChange::Child(edit.clone()));
                    deferred = Some(edit);
                }
                change => {
                    if let Err(err) = self.apply_forward(st, &change, &mut structural) {
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
        self.emit_after_history(structural);
        Ok(())
    }

    fn emit_after_history(&self, structural: bool) {
        if structural {
            self.events.emit(CollectionEvent::Reset);
            self.props.emit(PropertyChanged::Count);
            self.props.emit(PropertyChanged::Keys);
            self.props.emit(PropertyChanged::Values);
            self.props.emit(PropertyChanged::Item);
        }
        self.props.emit(PropertyChanged::CanUndo);
        self.props.emit(PropertyChanged::CanRedo);
    }

    fn undo_changes_impl(&self, changes: &[MapChange<K, V>]) -> Result<()> {
        let mut structural = false;
        {
            let mut st = self.state.write();
            let st = &mut *st;
            for change in changes.iter().rev() {
                self.apply_inverse(st, change, &mut structural)?;
            }
        }
        self.emit_after_history(structural);
        Ok(())
    }

    fn redo_changes_impl(&self, changes: &[MapChange<K, V>]) -> Result<()> {
        let mut structural = false;
        {
            let mut st = self.state.write();
            let st = &mut *st;
            for change in changes {
                self.apply_forward(st, change, &mut structural)?;
            }
        }
        self.emit_after_history(structural);
        Ok(())
    }
}

impl<K, V> UndoContext for MapShared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn context_id(&self) -> ContextId {
        self.id
    }

    fn record_child_edit(&self, edit: ChildEdit) {
        trace!(ctx = %self.id, child = %edit.origin(), "recording child edit");
        let staged = {
            let mut st = self.state.write();
            self.stage(&mut st, MapChange::Child(edit))
        };
        self.finish(staged, false, false);
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

struct MapReplay<K, V> {
    origin: ContextId,
    child: Weak<MapShared<K, V>>,
    changes: Vec<MapChange<K, V>>,
}

impl<K, V> EditReplay for MapReplay<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
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

/// Observable hash map with bounded undo/redo history.
///
/// # Example
///
/// ```
/// use rewind_collections::ObservableMap;
///
/// let map = ObservableMap::new();
/// map.insert("a", 1).unwrap();
/// map.insert("a", 2).unwrap();
/// map.undo().unwrap();
/// assert_eq!(map.get(&"a"), Some(1));
/// ```
pub struct ObservableMap<K, V> {
    shared: Arc<MapShared<K, V>>,
}

impl<K, V> Clone for ObservableMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty map with the default configuration.
    pub fn new() -> Self {
        Self::with_config(UndoConfig::default())
    }

    /// Create an empty map with an explicit configuration.
    pub fn with_config(config: UndoConfig) -> Self {
        Self::build(config, None, None)
    }

    pub(crate) fn build(
        config: UndoConfig,
        dispatcher: Option<Dispatcher>,
        hooks: Option<SubItemHooks<V>>,
    ) -> Self {
        let shared = Arc::new_cyclic(|weak| MapShared {
            id: ContextId::next(),
            self_weak: weak.clone(),
            state: RwLock::new(MapState {
                entries: HashMap::new(),
                history: HistoryState::new(config.history_levels, config.suppress_undo),
                capture: CaptureState::new(),
                hooks,
            }),
            events: Notifier::with_dispatcher(dispatcher.clone()),
            props: Notifier::with_dispatcher(dispatcher),
        });
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<MapShared<K, V>> {
        &self.shared
    }

    // ========== Mutation ==========

    /// Insert or replace the value for `key`, returning the previous value.
    ///
    /// Inserting a new key and replacing an existing value each record one
    /// undo level.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>> {
        let shared = &self.shared;
        let (previous, staged) = {
            let mut st = shared.state.write();
            let st = &mut *st;
            let previous = st.entries.get(&key).cloned();
            if let Some(hooks) = st.hooks {
                let values = [value.clone()];
                with_capture(&values, &shared.handle(), hooks, || {
                    st.entries.insert(key.clone(), value.clone());
                    Ok(())
                })?;
            } else {
                st.entries.insert(key.clone(), value.clone());
            }
            let change = match &previous {
                Some(old) => {
                    shared.release_value(st, old);
                    MapChange::Replace {
                        key: key.clone(),
                        old: old.clone(),
                        new: value.clone(),
                    }
                }
                None => MapChange::Insert {
                    key: key.clone(),
                    value: value.clone(),
                },
            };
            let staged = shared.stage(st, change);
            (previous, staged)
        };
        trace!(ctx = %shared.id, replaced = previous.is_some(), "insert");
        let count_changed = previous.is_none();
        shared.finish(staged, true, count_changed);
        Ok(previous)
    }

    /// Insert a new key, failing when it is already present.
    ///
    /// # Errors
    ///
    /// [`Error::KeyAlreadyExists`] when `key` is in the map; nothing is
    /// mutated in that case.
    pub fn try_insert(&self, key: K, value: V) -> Result<()> {
        let shared = &self.shared;
        let staged = {
            let mut st = shared.state.write();
            let st = &mut *st;
            if st.entries.contains_key(&key) {
                return Err(Error::KeyAlreadyExists);
            }
            if let Some(hooks) = st.hooks {
                let values = [value.clone()];
                with_capture(&values, &shared.handle(), hooks, || {
                    st.entries.insert(key.clone(), value.clone());
                    Ok(())
                })?;
            } else {
                st.entries.insert(key.clone(), value.clone());
            }
            shared.stage(
                st,
                MapChange::Insert {
                    key: key.clone(),
                    value: value.clone(),
                },
            )
        };
        trace!(ctx = %shared.id, "try_insert");
        shared.finish(staged, true, true);
        Ok(())
    }

    /// Remove `key`, returning its value; `None` when absent.
    ///
    /// The absent-key probe runs under an upgradable read lock so no-op
    /// calls never contend with readers.
    pub fn remove(&self, key: &K) -> Option<V> {
        let shared = &self.shared;
        let (value, staged) = {
            let guard = shared.state.upgradable_read();
            if !guard.entries.contains_key(key) {
                return None;
            }
            let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
            let st = &mut *guard;
            let value = st.entries.remove(key)?;
            shared.release_value(st, &value);
            let staged = shared.stage(
                st,
                MapChange::Remove {
                    key: key.clone(),
                    value: value.clone(),
                },
            );
            (value, staged)
        };
        trace!(ctx = %shared.id, "remove");
        shared.finish(staged, true, true);
        Some(value)
    }

    /// Remove every entry, recording one undo level holding them all.
    pub fn clear(&self) {
        let shared = &self.shared;
        let staged = {
            let mut st = shared.state.write();
            let st = &mut *st;
            if st.entries.is_empty() {
                return;
            }
            let entries: Vec<(K, V)> = st.entries.drain().collect();
            for (_, value) in &entries {
                shared.release_value(st, value);
            }
            shared.stage(st, MapChange::Clear { entries })
        };
        trace!(ctx = %shared.id, "clear");
        shared.finish(staged, true, true);
    }

    // ========== Reads ==========

    /// Clone of the value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.shared.state.read().entries.get(key).cloned()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.shared.state.read().entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.shared.state.read().entries.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.state.read().entries.is_empty()
    }

    /// Snapshot of the current keys, in arbitrary order.
    pub fn keys(&self) -> Vec<K> {
        self.shared.state.read().entries.keys().cloned().collect()
    }

    /// Snapshot of the current values, in arbitrary order.
    pub fn values(&self) -> Vec<V> {
        self.shared.state.read().entries.values().cloned().collect()
    }

    /// Snapshot of the current entries, in arbitrary order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.shared
            .state
            .read()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ========== Undo / redo ==========

    /// Undo the most recent level; no-op when the history is empty.
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

    /// Open an explicit batch; returns `false` when one was already open.
    pub fn begin_batch(&self) -> bool {
        self.shared.state.write().history.begin_batch()
    }

    /// Close the open batch, committing its changes as one level.
    pub fn end_batch(&self) {
        let staged = {
            let mut st = self.shared.state.write();
            let st = &mut *st;
            match st.history.end_batch(MapChange::Batch) {
                Some(change) => self.shared.stage(st, change),
                None => Staged::Dropped,
            }
        };
        self.shared.finish(staged, false, false);
    }

    /// Apply the inverse of `changes` without recording history.
    pub fn undo_changes(&self, changes: &[MapChange<K, V>]) -> Result<()> {
        self.shared.undo_changes_impl(changes)
    }

    /// Re-apply `changes` without recording history.
    pub fn redo_changes(&self, changes: &[MapChange<K, V>]) -> Result<()> {
        self.shared.redo_changes_impl(changes)
    }

    /// Handle other collections use to capture children into this map's
    /// undo context.
    pub fn undo_handle(&self) -> UndoHandle {
        self.shared.handle()
    }

    // ========== Notifications ==========

    /// Subscribe to structural change events.
    pub fn subscribe(
        &self,
        callback: impl Fn(&CollectionEvent<(K, V)>) + Send + Sync + 'static,
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

impl<K, V> ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: UndoableItem + Clone + Send + Sync + 'static,
{
    /// Create a map that captures inserted values as undoable children.
    pub fn of_undoables() -> Self {
        Self::of_undoables_with_config(UndoConfig::default())
    }

    /// Create a child-capturing map with an explicit configuration.
    pub fn of_undoables_with_config(config: UndoConfig) -> Self {
        let hooks = config
            .capture_children
            .then(SubItemHooks::<V>::for_undoable);
        Self::build(config, None, hooks)
    }
}

impl<K, V> UndoableItem for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
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
        ObservableMap::can_undo(self)
    }

    fn can_redo(&self) -> bool {
        ObservableMap::can_redo(self)
    }

    fn undo(&self) -> Result<()> {
        ObservableMap::undo(self)
    }

    fn redo(&self) -> Result<()> {
        ObservableMap::redo(self)
    }
}

impl<K, V> Default for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.shared.state.read();
        f.debug_struct("ObservableMap")
            .field("id", &self.shared.id)
            .field("len", &st.entries.len())
            .field("undo_depth", &st.history.undo_depth())
            .finish()
    }
}
