//! Core types and traits for rewind
//!
//! This crate defines the foundational types used throughout the system:
//! - `ListChange` / `MapChange`: closed change-record sum types
//! - `ChildEdit` / `EditReplay`: type-erased edits from captured children
//! - `Position`: tagged index replacing sentinel values
//! - `UndoConfig`: explicit per-collection undo configuration
//! - `CollectionEvent` / `PropertyChanged` / `Notifier`: change broadcasting
//! - `ContextId` / `UndoContext` / `UndoHandle`: undo-context identity
//! - `UndoableItem`: capture surface for parent/child histories
//! - `Error`: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod change;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod position;
pub mod traits;

// Re-export commonly used types and traits
pub use change::{ChildEdit, EditReplay, ListChange, MapChange};
pub use config::{UndoConfig, DEFAULT_HISTORY_LEVELS};
pub use context::{ContextId, UndoContext, UndoHandle};
pub use error::{Error, Result};
pub use events::{CollectionEvent, Dispatcher, Notifier, PropertyChanged, SubscriptionId};
pub use position::Position;
pub use traits::UndoableItem;
