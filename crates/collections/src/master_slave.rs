//! Master/slave composite list
//!
//! `MasterSlaveList` presents one mutable master list plus any number of
//! read-only slave sources as a single observable sequence: the master
//! occupies the front, slaves follow in registration order. Mutation and
//! undo always target the master; slave sources are only observed.
//!
//! Structural changes in a slave have no stable index in the composite, so
//! they surface as reset notifications. A suppression counter silences
//! slave resets that would arrive while a master operation is already
//! notifying for the same logical change.

use crate::list::ObservableList;
use rewind_core::config::UndoConfig;
use rewind_core::error::Result;
use rewind_core::events::{CollectionEvent, Dispatcher, Notifier, PropertyChanged, SubscriptionId};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use parking_lot::RwLock;
use tracing::trace;

/// Token identifying a registered slave source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlaveKey(u64);

struct SlaveEntry<T: Clone + Send + Sync + 'static> {
    key: SlaveKey,
    source: ObservableList<T>,
    subscription: SubscriptionId,
}

struct CompositeShared<T: Clone + Send + Sync + 'static> {
    master: ObservableList<T>,
    master_events: SubscriptionId,
    master_props: SubscriptionId,
    slaves: RwLock<Vec<SlaveEntry<T>>>,
    next_slave_key: AtomicU64,
    ignore_reset: AtomicUsize,
    events: Notifier<CollectionEvent<T>>,
    props: Notifier<PropertyChanged>,
}

impl<T: Clone + Send + Sync + 'static> Drop for CompositeShared<T> {
    fn drop(&mut self) {
        self.master.unsubscribe(self.master_events);
        self.master.unsubscribe_properties(self.master_props);
        for entry in self.slaves.read().iter() {
            entry.source.unsubscribe(entry.subscription);
        }
    }
}

/// Guard that holds the slave-reset suppression counter raised while a
/// master operation notifies.
struct ResetGuard<'a>(&'a AtomicUsize);

impl<'a> ResetGuard<'a> {
    fn raise(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Composite of one mutable master list and read-only slave sources.
///
/// # Example
///
/// ```
/// use rewind_collections::{MasterSlaveList, ObservableList};
///
/// let composite = MasterSlaveList::new();
/// composite.push(1).unwrap();
///
/// let slave = ObservableList::new();
/// slave.push(10).unwrap();
/// composite.add_slave(slave);
///
/// assert_eq!(composite.to_vec(), vec![1, 10]);
/// composite.undo().unwrap();
/// assert_eq!(composite.to_vec(), vec![10]);
/// ```
pub struct MasterSlaveList<T: Clone + Send + Sync + 'static> {
    shared: Arc<CompositeShared<T>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for MasterSlaveList<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> MasterSlaveList<T> {
    /// Create a composite with an empty master and the default
    /// configuration.
    pub fn new() -> Self {
        Self::with_config(UndoConfig::default())
    }

    /// Create a composite with an explicit master configuration.
    pub fn with_config(config: UndoConfig) -> Self {
        Self::build(config, None)
    }

    pub(crate) fn build(config: UndoConfig, dispatcher: Option<Dispatcher>) -> Self {
        let master = ObservableList::build(config, dispatcher.clone(), None);
        let shared = Arc::new_cyclic(|weak: &Weak<CompositeShared<T>>| {
            let forward = weak.clone();
            let master_events = master.subscribe(move |event| {
                if let Some(shared) = forward.upgrade() {
                    shared.events.emit(event.clone());
                }
            });
            let forward_props = weak.clone();
            let master_props = master.subscribe_properties(move |prop| {
                if let Some(shared) = forward_props.upgrade() {
                    shared.props.emit(*prop);
                }
            });
            CompositeShared {
                master: master.clone(),
                master_events,
                master_props,
                slaves: RwLock::new(Vec::new()),
                next_slave_key: AtomicU64::new(1),
                ignore_reset: AtomicUsize::new(0),
                events: Notifier::with_dispatcher(dispatcher.clone()),
                props: Notifier::with_dispatcher(dispatcher),
            }
        });
        Self { shared }
    }

    // ========== Slave management ==========

    /// Register a read-only slave source appended after the master and any
    /// previously registered slaves.
    pub fn add_slave(&self, source: ObservableList<T>) -> SlaveKey {
        let shared = &self.shared;
        let key = SlaveKey(shared.next_slave_key.fetch_add(1, Ordering::Relaxed));
        let weak = Arc::downgrade(shared);
        let subscription = source.subscribe(move |_event| {
            if let Some(shared) = weak.upgrade() {
                if shared.ignore_reset.load(Ordering::SeqCst) == 0 {
                    shared.events.emit(CollectionEvent::Reset);
                    shared.props.emit(PropertyChanged::Count);
                }
            }
        });
        shared.slaves.write().push(SlaveEntry {
            key,
            source,
            subscription,
        });
        trace!(?key, "slave added");
        shared.events.emit(CollectionEvent::Reset);
        shared.props.emit(PropertyChanged::Count);
        key
    }

    /// Remove a previously registered slave source.
    ///
    /// Returns `false` when `key` is unknown.
    pub fn remove_slave(&self, key: SlaveKey) -> bool {
        let shared = &self.shared;
        let removed = {
            let mut slaves = shared.slaves.write();
            match slaves.iter().position(|entry| entry.key == key) {
                Some(index) => Some(slaves.remove(index)),
                None => None,
            }
        };
        match removed {
            Some(entry) => {
                entry.source.unsubscribe(entry.subscription);
                trace!(?key, "slave removed");
                shared.events.emit(CollectionEvent::Reset);
                shared.props.emit(PropertyChanged::Count);
                true
            }
            None => false,
        }
    }

    /// Number of registered slave sources.
    pub fn slave_count(&self) -> usize {
        self.shared.slaves.read().len()
    }

    /// Handle to the mutable master list.
    pub fn master(&self) -> &ObservableList<T> {
        &self.shared.master
    }

    // ========== Mutation (master only) ==========

    /// Append an item to the master, returning its composite index.
    pub fn push(&self, item: T) -> Result<usize> {
        let _guard = ResetGuard::raise(&self.shared.ignore_reset);
        self.shared.master.push(item)
    }

    /// Insert an item into the master at a master-relative index.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        let _guard = ResetGuard::raise(&self.shared.ignore_reset);
        self.shared.master.insert(index, item)
    }

    /// Replace the master item at a master-relative index.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        let _guard = ResetGuard::raise(&self.shared.ignore_reset);
        self.shared.master.set(index, item)
    }

    /// Remove the master item at a master-relative index.
    pub fn remove_at(&self, index: usize) -> Option<T> {
        let _guard = ResetGuard::raise(&self.shared.ignore_reset);
        self.shared.master.remove_at(index)
    }

    /// Remove the first master occurrence of `item`.
    pub fn remove_item(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let _guard = ResetGuard::raise(&self.shared.ignore_reset);
        self.shared.master.remove_item(item)
    }

    /// Remove every master item as one undo level.
    pub fn clear(&self) {
        let _guard = ResetGuard::raise(&self.shared.ignore_reset);
        self.shared.master.clear();
    }

    /// Append every item of `items` to the master as one undo level.
    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        let _guard = ResetGuard::raise(&self.shared.ignore_reset);
        self.shared.master.extend(items)
    }

    // ========== Reads (master then slaves) ==========

    /// Clone of the item at a composite index.
    pub fn get(&self, index: usize) -> Option<T> {
        let master_len = self.shared.master.len();
        if index < master_len {
            return self.shared.master.get(index);
        }
        let mut offset = index - master_len;
        let slaves = self.shared.slaves.read();
        for entry in slaves.iter() {
            let len = entry.source.len();
            if offset < len {
                return entry.source.get(offset);
            }
            offset -= len;
        }
        None
    }

    /// Total number of items across the master and every slave.
    pub fn len(&self) -> usize {
        let slaves = self.shared.slaves.read();
        self.shared.master.len() + slaves.iter().map(|entry| entry.source.len()).sum::<usize>()
    }

    /// Whether the composite holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `item` is present in the master or any slave.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        if self.shared.master.contains(item) {
            return true;
        }
        let slaves = self.shared.slaves.read();
        slaves.iter().any(|entry| entry.source.contains(item))
    }

    /// Snapshot of the composite contents, master first.
    pub fn to_vec(&self) -> Vec<T> {
        let mut items = self.shared.master.to_vec();
        let slaves = self.shared.slaves.read();
        for entry in slaves.iter() {
            items.extend(entry.source.to_vec());
        }
        items
    }

    /// Iterate over a snapshot of the composite contents.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    // ========== Undo / redo (master history) ==========

    /// Undo the master's most recent level.
    pub fn undo(&self) -> Result<()> {
        let _guard = ResetGuard::raise(&self.shared.ignore_reset);
        self.shared.master.undo()
    }

    /// Redo the master's most recently undone level.
    pub fn redo(&self) -> Result<()> {
        let _guard = ResetGuard::raise(&self.shared.ignore_reset);
        self.shared.master.redo()
    }

    /// Whether the master has a level available to undo.
    pub fn can_undo(&self) -> bool {
        self.shared.master.can_undo()
    }

    /// Whether the master has a level available to redo.
    pub fn can_redo(&self) -> bool {
        self.shared.master.can_redo()
    }

    // ========== Notifications ==========

    /// Subscribe to composite structural change events.
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

    /// Subscribe to composite property change events.
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

impl<T: Clone + Send + Sync + 'static> Default for MasterSlaveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Debug for MasterSlaveList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSlaveList")
            .field("master_len", &self.shared.master.len())
            .field("slaves", &self.slave_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_reads_span_master_then_slaves() {
        let composite = MasterSlaveList::new();
        composite.extend([1, 2]).unwrap();

        let slave_a = ObservableList::new();
        slave_a.extend([10, 11]).unwrap();
        composite.add_slave(slave_a);

        let slave_b = ObservableList::new();
        slave_b.push(20).unwrap();
        composite.add_slave(slave_b);

        assert_eq!(composite.len(), 5);
        assert_eq!(composite.to_vec(), vec![1, 2, 10, 11, 20]);
        assert_eq!(composite.get(0), Some(1));
        assert_eq!(composite.get(2), Some(10));
        assert_eq!(composite.get(4), Some(20));
        assert_eq!(composite.get(5), None);
        assert!(composite.contains(&11));
    }

    #[test]
    fn test_mutation_targets_master() {
        let composite = MasterSlaveList::new();
        let slave = ObservableList::new();
        slave.push(10).unwrap();
        composite.add_slave(slave.clone());

        composite.push(1).unwrap();
        assert_eq!(composite.to_vec(), vec![1, 10]);
        assert_eq!(slave.to_vec(), vec![10], "slave is untouched");
    }

    #[test]
    fn test_undo_targets_master_history() {
        let composite = MasterSlaveList::new();
        let slave = ObservableList::new();
        slave.push(10).unwrap();
        composite.add_slave(slave);

        composite.push(1).unwrap();
        composite.undo().unwrap();
        assert_eq!(composite.to_vec(), vec![10]);
        composite.redo().unwrap();
        assert_eq!(composite.to_vec(), vec![1, 10]);
    }

    #[test]
    fn test_slave_changes_emit_reset() {
        let composite: MasterSlaveList<i32> = MasterSlaveList::new();
        let slave = ObservableList::new();
        composite.add_slave(slave.clone());

        let resets = Arc::new(AtomicUsize::new(0));
        let resets2 = Arc::clone(&resets);
        composite.subscribe(move |event| {
            if matches!(event, CollectionEvent::Reset) {
                resets2.fetch_add(1, Ordering::SeqCst);
            }
        });

        slave.push(10).unwrap();
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_slave_detaches_subscription() {
        let composite: MasterSlaveList<i32> = MasterSlaveList::new();
        let slave = ObservableList::new();
        let key = composite.add_slave(slave.clone());

        let resets = Arc::new(AtomicUsize::new(0));
        let resets2 = Arc::clone(&resets);
        composite.subscribe(move |event| {
            if matches!(event, CollectionEvent::Reset) {
                resets2.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(composite.remove_slave(key));
        assert!(!composite.remove_slave(key));
        let after_removal = resets.load(Ordering::SeqCst);

        slave.push(10).unwrap();
        assert_eq!(
            resets.load(Ordering::SeqCst),
            after_removal,
            "detached slave no longer notifies"
        );
        assert_eq!(composite.len(), 0);
    }

    #[test]
    fn test_master_events_forwarded_positionally() {
        let composite = MasterSlaveList::new();
        let adds = Arc::new(AtomicUsize::new(0));
        let adds2 = Arc::clone(&adds);
        composite.subscribe(move |event| {
            if matches!(event, CollectionEvent::Added { .. }) {
                adds2.fetch_add(1, Ordering::SeqCst);
            }
        });
        composite.push(1).unwrap();
        assert_eq!(adds.load(Ordering::SeqCst), 1);
    }
}
