//! Collection factory
//!
//! `CollectionBuilder` carries one [`UndoConfig`] plus an optional
//! notification [`Dispatcher`] and stamps them onto every collection it
//! constructs. Callers that want process-wide defaults keep a single
//! builder and construct through it; there is no ambient global state.

use crate::filterable::FilterableList;
use crate::list::ObservableList;
use crate::map::ObservableMap;
use crate::master_slave::MasterSlaveList;
use crate::queue::ObservableQueue;
use crate::stack::ObservableStack;
use rewind_core::config::UndoConfig;
use rewind_core::events::Dispatcher;
use rewind_core::traits::UndoableItem;
use std::fmt;
use std::hash::Hash;

/// Factory that applies one configuration to every collection it builds.
///
/// # Example
///
/// ```
/// use rewind_collections::CollectionBuilder;
/// use rewind_core::UndoConfig;
///
/// let builder = CollectionBuilder::new()
///     .with_config(UndoConfig::default().with_history_levels(10));
///
/// let list = builder.list::<i32>();
/// let map = builder.map::<String, i32>();
/// assert_eq!(list.history_levels(), 10);
/// assert_eq!(map.history_levels(), 10);
/// ```
#[derive(Clone, Default)]
pub struct CollectionBuilder {
    config: UndoConfig,
    dispatcher: Option<Dispatcher>,
}

impl CollectionBuilder {
    /// Create a builder with the default configuration and inline
    /// notification delivery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: UndoConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the history depth on the carried configuration.
    #[must_use]
    pub fn with_history_levels(mut self, levels: usize) -> Self {
        self.config.history_levels = levels;
        self
    }

    /// Post notification batches through `dispatcher` instead of running
    /// them inline.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// The carried configuration.
    pub fn config(&self) -> &UndoConfig {
        &self.config
    }

    /// Build an observable list.
    pub fn list<T: Clone + Send + Sync + 'static>(&self) -> ObservableList<T> {
        ObservableList::build(self.config.clone(), self.dispatcher.clone(), None)
    }

    /// Build an observable list that captures undoable children.
    pub fn list_of_undoables<T: UndoableItem + Clone + Send + Sync + 'static>(
        &self,
    ) -> ObservableList<T> {
        ObservableList::build_of_undoables(self.config.clone(), self.dispatcher.clone())
    }

    /// Build an observable map.
    pub fn map<K, V>(&self) -> ObservableMap<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        ObservableMap::build(self.config.clone(), self.dispatcher.clone(), None)
    }

    /// Build an observable queue.
    pub fn queue<T: Clone + Send + Sync + 'static>(&self) -> ObservableQueue<T> {
        ObservableQueue::build(self.config.clone(), self.dispatcher.clone())
    }

    /// Build an observable stack.
    pub fn stack<T: Clone + Send + Sync + 'static>(&self) -> ObservableStack<T> {
        ObservableStack::build(self.config.clone(), self.dispatcher.clone())
    }

    /// Build a master/slave composite list.
    pub fn master_slave<T: Clone + Send + Sync + 'static>(&self) -> MasterSlaveList<T> {
        MasterSlaveList::build(self.config.clone(), self.dispatcher.clone())
    }

    /// Build a filterable list.
    pub fn filterable<T: Clone + Send + Sync + 'static>(&self) -> FilterableList<T> {
        FilterableList::build(self.config.clone(), self.dispatcher.clone())
    }
}

impl fmt::Debug for CollectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionBuilder")
            .field("config", &self.config)
            .field("dispatched", &self.dispatcher.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::config::DEFAULT_HISTORY_LEVELS;

    #[test]
    fn test_default_builder() {
        let builder = CollectionBuilder::new();
        assert_eq!(builder.config().history_levels, DEFAULT_HISTORY_LEVELS);
    }

    #[test]
    fn test_config_applies_to_all_collections() {
        let builder = CollectionBuilder::new().with_history_levels(5);
        assert_eq!(builder.list::<i32>().history_levels(), 5);
        assert_eq!(builder.map::<&str, i32>().history_levels(), 5);
        assert_eq!(builder.queue::<i32>().history_levels(), 5);
        assert_eq!(builder.stack::<i32>().history_levels(), 5);
    }

    #[test]
    fn test_suppressed_config_propagates() {
        let builder = CollectionBuilder::new()
            .with_config(UndoConfig::default().with_undo_suppressed(true));
        let list = builder.list::<i32>();
        list.push(1).unwrap();
        assert!(!list.can_undo());
    }
}
