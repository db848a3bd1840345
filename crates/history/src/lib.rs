//! Undo engine for rewind collections
//!
//! This crate holds the pieces of the undo machinery that are independent of
//! any concrete container:
//! - `BoundedStack`: fixed-capacity push-down stack with oldest-entry
//!   eviction
//! - `HistoryState`: paired undo/redo stacks with linear-history discipline,
//!   suppression, and explicit batching
//! - `CaptureState` and the `with_capture` / `with_release` transactions:
//!   parent/child capture bookkeeping with rollback on failure
//! - `SubItemHooks`: compile-time capability record for child capture

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bounded;
pub mod capture;
pub mod state;

pub use bounded::BoundedStack;
pub use capture::{with_capture, with_release, CaptureState, SubItemHooks};
pub use state::HistoryState;
