//! Error types for rewind collections
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::context::ContextId;
use thiserror::Error;

/// Result type alias for rewind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for rewind collections
///
/// Preconditions are validated before any mutation begins, so every error
/// here is raised fail-fast with no partial state change left behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Item is already captured by a different parent undo context
    #[error("item already captured by undo context {held_by}, cannot capture into {requested_by}")]
    AlreadyCaptured {
        /// Context currently holding the item
        held_by: ContextId,
        /// Context that attempted the capture
        requested_by: ContextId,
    },

    /// Item is not captured by the undo context attempting to release it
    #[error("item is not captured by undo context {expected}")]
    NotCaptured {
        /// Context that attempted the release
        expected: ContextId,
    },

    /// Index is out of bounds for the collection
    #[error("index {index} out of bounds for collection of length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Collection length at the time of the check
        len: usize,
    },

    /// Key already present in the map
    #[error("key already exists in map")]
    KeyAlreadyExists,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_already_captured() {
        let err = Error::AlreadyCaptured {
            held_by: ContextId::next(),
            requested_by: ContextId::next(),
        };
        let msg = err.to_string();
        assert!(msg.contains("already captured"));
    }

    #[test]
    fn test_error_display_not_captured() {
        let err = Error::NotCaptured {
            expected: ContextId::next(),
        };
        let msg = err.to_string();
        assert!(msg.contains("not captured"));
    }

    #[test]
    fn test_error_display_index_out_of_bounds() {
        let err = Error::IndexOutOfBounds { index: 7, len: 3 };
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_error_display_key_already_exists() {
        let err = Error::KeyAlreadyExists;
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }

        fn returns_error() -> Result<i32> {
            Err(Error::KeyAlreadyExists)
        }

        assert_eq!(returns_result().unwrap(), 42);
        assert!(returns_error().is_err());
    }

    #[test]
    fn test_error_pattern_matching() {
        let err = Error::IndexOutOfBounds { index: 1, len: 0 };
        match err {
            Error::IndexOutOfBounds { index, len } => {
                assert_eq!(index, 1);
                assert_eq!(len, 0);
            }
            _ => panic!("wrong error variant"),
        }
    }
}
