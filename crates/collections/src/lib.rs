//! Observable collections with bounded undo/redo history
//!
//! Every collection in this crate is a cheap-`Clone` handle over shared
//! state guarded by one reader-writer lock. Mutating operations validate
//! preconditions, mutate under the write lock, record an invertible change,
//! and broadcast notifications strictly after the lock is released.
//!
//! - `ObservableList`: the base engine with positional change records
//! - `ObservableMap`: keyed storage with reset notifications
//! - `ObservableQueue` / `ObservableStack`: adapters over the list engine
//! - `MasterSlaveList`: one mutable master plus read-only slave sources
//! - `FilterableList`: predicate-filtered cached view over a list
//! - `CollectionBuilder`: factory applying one configuration everywhere
//!
//! Maps additionally carry the contended-access operations `get_or_add`,
//! `create_or_change_state`, and `remove_then_act`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
mod concurrent;
pub mod filterable;
pub mod list;
pub mod map;
pub mod master_slave;
pub mod queue;
pub mod stack;

pub use builder::CollectionBuilder;
pub use filterable::{Filter, FilterableList};
pub use list::ObservableList;
pub use map::ObservableMap;
pub use master_slave::{MasterSlaveList, SlaveKey};
pub use queue::ObservableQueue;
pub use stack::ObservableStack;
