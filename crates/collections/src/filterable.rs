//! Filterable observable list
//!
//! `FilterableList` layers a mutable predicate over a base list. While a
//! filter is set, reads (`len`, `iter`, `contains`) consult a cached
//! filtered snapshot; the cache is invalidated whenever the filter changes
//! or the base structure changes, and rebuilt lazily on the next read.
//! Mutation and undo write through to the base list unfiltered.

use crate::list::ObservableList;
use rewind_core::config::UndoConfig;
use rewind_core::error::Result;
use rewind_core::events::{CollectionEvent, Dispatcher, Notifier, PropertyChanged, SubscriptionId};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Predicate deciding which items the filtered view exposes.
pub type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct FilterShared<T: Clone + Send + Sync + 'static> {
    base: ObservableList<T>,
    base_events: SubscriptionId,
    base_props: SubscriptionId,
    filter: RwLock<Option<Filter<T>>>,
    cache: RwLock<Option<Vec<T>>>,
    events: Notifier<CollectionEvent<T>>,
    props: Notifier<PropertyChanged>,
}

impl<T: Clone + Send + Sync + 'static> Drop for FilterShared<T> {
    fn drop(&mut self) {
        self.base.unsubscribe(self.base_events);
        self.base.unsubscribe_properties(self.base_props);
    }
}

impl<T: Clone + Send + Sync + 'static> FilterShared<T> {
    /// Rebuild the filtered snapshot if it was invalidated.
    fn filtered_snapshot(&self, filter: &Filter<T>) -> Vec<T> {
        if let Some(cached) = self.cache.read().as_ref() {
            return cached.clone();
        }
        let rebuilt: Vec<T> = self
            .base
            .to_vec()
            .into_iter()
            .filter(|item| filter(item))
            .collect();
        *self.cache.write() = Some(rebuilt.clone());
        rebuilt
    }
}

/// Observable list view filtered by a mutable predicate.
///
/// # Example
///
/// ```
/// use rewind_collections::FilterableList;
/// use std::sync::Arc;
///
/// let list = FilterableList::new();
/// list.extend([1, 2, 3, 4]).unwrap();
/// list.set_filter(Some(Arc::new(|item: &i32| item % 2 == 0)));
/// assert_eq!(list.to_vec(), vec![2, 4]);
/// list.set_filter(None);
/// assert_eq!(list.len(), 4);
/// ```
pub struct FilterableList<T: Clone + Send + Sync + 'static> {
    shared: Arc<FilterShared<T>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for FilterableList<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> FilterableList<T> {
    /// Create an empty filterable list with the default configuration.
    pub fn new() -> Self {
        Self::with_config(UndoConfig::default())
    }

    /// Create an empty filterable list with an explicit configuration.
    pub fn with_config(config: UndoConfig) -> Self {
        Self::build(config, None)
    }

    pub(crate) fn build(config: UndoConfig, dispatcher: Option<Dispatcher>) -> Self {
        let base = ObservableList::build(config, dispatcher.clone(), None);
        let shared = Arc::new_cyclic(|weak: &Weak<FilterShared<T>>| {
            let forward = weak.clone();
            let base_events = base.subscribe(move |event| {
                if let Some(shared) = forward.upgrade() {
                    // any structural change invalidates the filtered view
                    *shared.cache.write() = None;
                    if shared.filter.read().is_some() {
                        shared.events.emit(CollectionEvent::Reset);
                        shared.props.emit(PropertyChanged::Count);
                    } else {
                        shared.events.emit(event.clone());
                    }
                }
            });
            let forward_props = weak.clone();
            let base_props = base.subscribe_properties(move |prop| {
                if let Some(shared) = forward_props.upgrade() {
                    shared.props.emit(*prop);
                }
            });
            FilterShared {
                base,
                base_events,
                base_props,
                filter: RwLock::new(None),
                cache: RwLock::new(None),
                events: Notifier::with_dispatcher(dispatcher.clone()),
                props: Notifier::with_dispatcher(dispatcher),
            }
        });
        Self { shared }
    }

    // ========== Filter management ==========

    /// Install or clear the filter predicate.
    ///
    /// Changing the filter invalidates the cached view and notifies
    /// observers with a reset.
    pub fn set_filter(&self, filter: Option<Filter<T>>) {
        {
            *self.shared.filter.write() = filter;
            *self.shared.cache.write() = None;
        }
        trace!("filter changed");
        self.shared.events.emit(CollectionEvent::Reset);
        self.shared.props.emit(PropertyChanged::Count);
    }

    /// Whether a filter predicate is currently installed.
    pub fn is_filtered(&self) -> bool {
        self.shared.filter.read().is_some()
    }

    // ========== Mutation (writes through to the base) ==========

    /// Append an item to the base list.
    pub fn push(&self, item: T) -> Result<usize> {
        self.shared.base.push(item)
    }

    /// Insert an item into the base list.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.shared.base.insert(index, item)
    }

    /// Replace the base item at `index`.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        self.shared.base.set(index, item)
    }

    /// Remove the base item at `index`.
    pub fn remove_at(&self, index: usize) -> Option<T> {
        self.shared.base.remove_at(index)
    }

    /// Remove the first base occurrence of `item`.
    pub fn remove_item(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.shared.base.remove_item(item)
    }

    /// Remove every base item as one undo level.
    pub fn clear(&self) {
        self.shared.base.clear();
    }

    /// Append every item of `items` to the base as one undo level.
    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        self.shared.base.extend(items)
    }

    // ========== Reads (filtered when a filter is set) ==========

    /// Number of visible items.
    pub fn len(&self) -> usize {
        let filter = self.shared.filter.read().clone();
        match filter {
            Some(filter) => self.shared.filtered_snapshot(&filter).len(),
            None => self.shared.base.len(),
        }
    }

    /// Whether the visible view holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `item` is visible through the current filter.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let filter = self.shared.filter.read().clone();
        match filter {
            Some(filter) => self.shared.filtered_snapshot(&filter).contains(item),
            None => self.shared.base.contains(item),
        }
    }

    /// Snapshot of the visible contents.
    pub fn to_vec(&self) -> Vec<T> {
        let filter = self.shared.filter.read().clone();
        match filter {
            Some(filter) => self.shared.filtered_snapshot(&filter),
            None => self.shared.base.to_vec(),
        }
    }

    /// Iterate over a snapshot of the visible contents.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    /// Number of items in the base list, ignoring the filter.
    pub fn unfiltered_len(&self) -> usize {
        self.shared.base.len()
    }

    /// Handle to the unfiltered base list.
    pub fn base(&self) -> &ObservableList<T> {
        &self.shared.base
    }

    // ========== Undo / redo (base history) ==========

    /// Undo the base list's most recent level.
    pub fn undo(&self) -> Result<()> {
        self.shared.base.undo()
    }

    /// Redo the base list's most recently undone level.
    pub fn redo(&self) -> Result<()> {
        self.shared.base.redo()
    }

    /// Whether a level is available to undo.
    pub fn can_undo(&self) -> bool {
        self.shared.base.can_undo()
    }

    /// Whether a level is available to redo.
    pub fn can_redo(&self) -> bool {
        self.shared.base.can_redo()
    }

    // ========== Notifications ==========

    /// Subscribe to view-level structural change events.
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

impl<T: Clone + Send + Sync + 'static> Default for FilterableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Debug for FilterableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterableList")
            .field("unfiltered_len", &self.unfiltered_len())
            .field("filtered", &self.is_filtered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn evens() -> Filter<i32> {
        Arc::new(|item: &i32| item % 2 == 0)
    }

    #[test]
    fn test_unfiltered_passthrough() {
        let list = FilterableList::new();
        list.extend([1, 2, 3]).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.to_vec(), vec![1, 2, 3]);
        assert!(!list.is_filtered());
    }

    #[test]
    fn test_filter_narrows_reads() {
        let list = FilterableList::new();
        list.extend([1, 2, 3, 4, 5]).unwrap();
        list.set_filter(Some(evens()));
        assert_eq!(list.len(), 2);
        assert_eq!(list.to_vec(), vec![2, 4]);
        assert!(list.contains(&2));
        assert!(!list.contains(&3), "filtered out");
        assert_eq!(list.unfiltered_len(), 5);
    }

    #[test]
    fn test_clearing_filter_restores_full_view() {
        let list = FilterableList::new();
        list.extend([1, 2]).unwrap();
        list.set_filter(Some(evens()));
        assert_eq!(list.len(), 1);
        list.set_filter(None);
        assert_eq!(list.to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_cache_invalidated_by_mutation() {
        let list = FilterableList::new();
        list.extend([2, 4]).unwrap();
        list.set_filter(Some(evens()));
        assert_eq!(list.len(), 2);

        list.push(6).unwrap();
        assert_eq!(list.to_vec(), vec![2, 4, 6]);

        list.push(7).unwrap();
        assert_eq!(list.to_vec(), vec![2, 4, 6], "odd item stays hidden");
        assert_eq!(list.unfiltered_len(), 4);
    }

    #[test]
    fn test_cache_invalidated_by_undo() {
        let list = FilterableList::new();
        list.extend([2, 4]).unwrap();
        list.set_filter(Some(evens()));
        list.push(6).unwrap();
        assert_eq!(list.len(), 3);
        list.undo().unwrap();
        assert_eq!(list.to_vec(), vec![2, 4]);
    }

    #[test]
    fn test_filter_change_emits_reset() {
        let list: FilterableList<i32> = FilterableList::new();
        let resets = Arc::new(AtomicUsize::new(0));
        let resets2 = Arc::clone(&resets);
        list.subscribe(move |event| {
            if matches!(event, CollectionEvent::Reset) {
                resets2.fetch_add(1, Ordering::SeqCst);
            }
        });
        list.set_filter(Some(evens()));
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_filtered_mutation_notifies_reset() {
        let list = FilterableList::new();
        list.set_filter(Some(evens()));
        let resets = Arc::new(AtomicUsize::new(0));
        let resets2 = Arc::clone(&resets);
        list.subscribe(move |event| {
            if matches!(event, CollectionEvent::Reset) {
                resets2.fetch_add(1, Ordering::SeqCst);
            }
        });
        list.push(2).unwrap();
        assert_eq!(
            resets.load(Ordering::SeqCst),
            1,
            "positional events collapse to reset while filtered"
        );
    }
}
