//! Undo behavior configuration
//!
//! Configuration is explicit: every collection takes an [`UndoConfig`] (or
//! the default) at construction time. There is no ambient process-wide
//! state; callers that want shared defaults keep one config value (or a
//! builder, see the collections crate) and hand it to each constructor.

/// Default number of undo levels retained per collection.
pub const DEFAULT_HISTORY_LEVELS: usize = 50;

/// Per-collection undo behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoConfig {
    /// Maximum retained undo levels; the oldest level is evicted beyond
    /// this. Zero disables history entirely.
    pub history_levels: usize,
    /// When set, committed changes are not recorded at all.
    pub suppress_undo: bool,
    /// When set, collections built for undoable items capture children
    /// automatically as they are inserted.
    pub capture_children: bool,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            history_levels: DEFAULT_HISTORY_LEVELS,
            suppress_undo: false,
            capture_children: true,
        }
    }
}

impl UndoConfig {
    /// Set the retained history depth.
    #[must_use]
    pub fn with_history_levels(mut self, levels: usize) -> Self {
        self.history_levels = levels;
        self
    }

    /// Suppress recording of undo levels.
    #[must_use]
    pub fn with_undo_suppressed(mut self, suppressed: bool) -> Self {
        self.suppress_undo = suppressed;
        self
    }

    /// Control automatic capture of undoable children.
    #[must_use]
    pub fn with_capture_children(mut self, capture: bool) -> Self {
        self.capture_children = capture;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UndoConfig::default();
        assert_eq!(config.history_levels, DEFAULT_HISTORY_LEVELS);
        assert!(!config.suppress_undo);
        assert!(config.capture_children);
    }

    #[test]
    fn test_builder_methods() {
        let config = UndoConfig::default()
            .with_history_levels(3)
            .with_undo_suppressed(true)
            .with_capture_children(false);
        assert_eq!(config.history_levels, 3);
        assert!(config.suppress_undo);
        assert!(!config.capture_children);
    }
}
