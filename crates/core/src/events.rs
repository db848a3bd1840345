//! Change-notification broadcasting
//!
//! Collections broadcast two event streams: structural changes
//! ([`CollectionEvent`]) and property changes ([`PropertyChanged`]).
//! Subscribers register callbacks on a [`Notifier`] and receive every event
//! emitted after registration.
//!
//! Emission always happens after the owning collection has dropped its lock,
//! so a callback never observes the collection mid-mutation. When a
//! [`Dispatcher`] is configured, the callback batch is handed to it instead
//! of running inline; dispatched batches may land out of order relative to
//! lock release.

use crate::position::Position;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A structural change observed on a collection.
#[derive(Debug, Clone)]
pub enum CollectionEvent<T> {
    /// Items were added.
    Added {
        /// Where the items landed, when a stable index exists.
        index: Position,
        /// The added items, in order.
        items: Vec<T>,
    },
    /// Items were removed.
    Removed {
        /// Where the items were removed from, when a stable index exists.
        index: Position,
        /// The removed items, in order.
        items: Vec<T>,
    },
    /// An item was replaced in place.
    Replaced {
        /// The affected slot, when a stable index exists.
        index: Position,
        /// Value before the replacement.
        old: T,
        /// Value after the replacement.
        new: T,
    },
    /// The collection should be treated as wholly replaced.
    Reset,
}

/// A property whose value may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyChanged {
    /// The number of items changed.
    Count,
    /// The key set of a map changed.
    Keys,
    /// The value set of a map changed.
    Values,
    /// Indexed access results changed.
    Item,
    /// Availability of undo changed.
    CanUndo,
    /// Availability of redo changed.
    CanRedo,
}

/// Token returned by [`Notifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Sink that notification batches are posted through.
///
/// The default is inline synchronous execution; supplying a dispatcher
/// covers consumers that need events marshalled onto a specific thread or
/// queue.
pub type Dispatcher = Arc<dyn Fn(Box<dyn FnOnce() + Send>) + Send + Sync>;

type Subscriber<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Subscription registry for one event stream.
pub struct Notifier<E> {
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber<E>)>>,
    next_id: AtomicU64,
    dispatcher: Option<Dispatcher>,
}

impl<E> Notifier<E> {
    /// Create a notifier that runs callbacks inline.
    pub fn new() -> Self {
        Self::with_dispatcher(None)
    }

    /// Create a notifier that posts callback batches through `dispatcher`.
    pub fn with_dispatcher(dispatcher: Option<Dispatcher>) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            dispatcher,
        }
    }

    /// Register a callback for every subsequently emitted event.
    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove a previously registered callback.
    ///
    /// Returns `false` if the subscription was not present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl<E: Clone + Send + 'static> Notifier<E> {
    /// Broadcast one event to every subscriber.
    pub fn emit(&self, event: E) {
        let subs: Vec<Subscriber<E>> = {
            let guard = self.subscribers.read();
            if guard.is_empty() {
                return;
            }
            guard.iter().map(|(_, s)| Arc::clone(s)).collect()
        };
        match &self.dispatcher {
            None => {
                for sub in subs {
                    sub(&event);
                }
            }
            Some(dispatch) => {
                dispatch(Box::new(move || {
                    for sub in subs {
                        sub(&event);
                    }
                }));
            }
        }
    }
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .field("dispatched", &self.dispatcher.is_some())
            .finish()
    }
}
