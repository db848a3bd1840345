//! Rewind - Observable collections with bounded undo/redo history
//!
//! Rewind provides collection types (list, map, queue, stack, composite and
//! filtered views) that broadcast change notifications and keep a bounded,
//! strictly linear undo/redo history. Collections can be captured into a
//! parent collection's undo context, so undoing the parent replays the
//! child's edits.
//!
//! # Quick Start
//!
//! ```
//! use rewind::{ObservableList, UndoConfig};
//!
//! let list = ObservableList::with_config(UndoConfig::default().with_history_levels(10));
//! list.push(1).unwrap();
//! list.push(2).unwrap();
//!
//! list.undo().unwrap();
//! assert_eq!(list.to_vec(), vec![1]);
//! list.redo().unwrap();
//! assert_eq!(list.to_vec(), vec![1, 2]);
//! ```
//!
//! # Architecture
//!
//! Change records, events, and configuration live in `rewind-core`; the
//! bounded stacks and capture transactions in `rewind-history`; the
//! collection types in `rewind-collections`. This crate re-exports the
//! public surface of all three.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use rewind_collections::{
    CollectionBuilder, Filter, FilterableList, MasterSlaveList, ObservableList, ObservableMap,
    ObservableQueue, ObservableStack, SlaveKey,
};
pub use rewind_core::{
    ChildEdit, CollectionEvent, ContextId, Dispatcher, EditReplay, Error, ListChange, MapChange,
    Notifier, Position, PropertyChanged, Result, SubscriptionId, UndoConfig, UndoContext,
    UndoHandle, UndoableItem, DEFAULT_HISTORY_LEVELS,
};
pub use rewind_history::{BoundedStack, CaptureState, HistoryState, SubItemHooks};
