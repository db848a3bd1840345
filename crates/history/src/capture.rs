//! Capture bookkeeping and capture/release transactions
//!
//! Inserting or removing an undoable child must be atomic with the
//! surrounding container mutation: if the mutation fails after the child was
//! captured, the capture has to be unwound or the parent would keep a
//! dangling claim on the child. [`with_capture`] and [`with_release`] run
//! the mutation inside a closure and roll their side effects back on error.
//!
//! [`SubItemHooks`] is the capability record that makes child capture a
//! compile-time property: collections constructed for undoable items carry
//! one, built from the `UndoableItem` bound; everything else carries none
//! and skips the capture paths entirely.

use rewind_core::context::{ContextId, UndoHandle};
use rewind_core::error::{Error, Result};
use rewind_core::traits::UndoableItem;
use smallvec::SmallVec;
use std::fmt;
use tracing::debug;

/// The nullable parent back-reference of one capturable collection.
///
/// A collection is held by at most one parent at a time; attaching under
/// the same parent twice is idempotent.
#[derive(Default)]
pub struct CaptureState {
    parent: Option<(ContextId, UndoHandle)>,
}

impl CaptureState {
    /// Create an uncaptured state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to `parent`.
    ///
    /// Returns `Ok(true)` when newly attached, `Ok(false)` when already
    /// attached to the same parent, and [`Error::AlreadyCaptured`] when a
    /// different parent holds the item.
    pub fn attach(&mut self, parent: &UndoHandle) -> Result<bool> {
        match &self.parent {
            Some((held, _)) if *held != parent.context_id() => Err(Error::AlreadyCaptured {
                held_by: *held,
                requested_by: parent.context_id(),
            }),
            Some(_) => Ok(false),
            None => {
                self.parent = Some((parent.context_id(), parent.clone()));
                Ok(true)
            }
        }
    }

    /// Detach from the context identified by `parent`.
    ///
    /// Fails with [`Error::NotCaptured`] when that context does not hold
    /// the item.
    pub fn detach(&mut self, parent: ContextId) -> Result<()> {
        match &self.parent {
            Some((held, _)) if *held == parent => {
                self.parent = None;
                Ok(())
            }
            _ => Err(Error::NotCaptured { expected: parent }),
        }
    }

    /// Drop the back-reference unconditionally.
    pub fn clear(&mut self) {
        self.parent = None;
    }

    /// Handle of the holding parent, if any.
    pub fn holder(&self) -> Option<&UndoHandle> {
        self.parent.as_ref().map(|(_, handle)| handle)
    }

    /// Identifier of the holding parent, if any.
    pub fn holder_id(&self) -> Option<ContextId> {
        self.parent.as_ref().map(|(id, _)| *id)
    }

    /// Whether a parent currently holds the item.
    pub fn is_captured(&self) -> bool {
        self.parent.is_some()
    }
}

impl fmt::Debug for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureState")
            .field("holder", &self.holder_id())
            .finish()
    }
}

/// Capability record for capturing items of type `T` as undoable children.
pub struct SubItemHooks<T> {
    capture: fn(&T, &UndoHandle) -> Result<bool>,
    release: fn(&T, ContextId) -> Result<()>,
    captured_by: fn(&T) -> Option<ContextId>,
}

impl<T> Clone for SubItemHooks<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SubItemHooks<T> {}

impl<T> fmt::Debug for SubItemHooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SubItemHooks")
    }
}

impl<T: UndoableItem> SubItemHooks<T> {
    /// Build hooks from the `UndoableItem` implementation of `T`.
    pub fn for_undoable() -> Self {
        fn capture<T: UndoableItem>(item: &T, parent: &UndoHandle) -> Result<bool> {
            if item.captured_by() == Some(parent.context_id()) {
                return Ok(false);
            }
            item.capture_into(parent.clone())?;
            Ok(true)
        }
        fn release<T: UndoableItem>(item: &T, parent: ContextId) -> Result<()> {
            item.release_from(parent)
        }
        fn captured_by<T: UndoableItem>(item: &T) -> Option<ContextId> {
            item.captured_by()
        }
        Self {
            capture: capture::<T>,
            release: release::<T>,
            captured_by: captured_by::<T>,
        }
    }
}

impl<T> SubItemHooks<T> {
    /// Capture `item` into `parent`; `Ok(true)` when newly captured.
    pub fn capture(&self, item: &T, parent: &UndoHandle) -> Result<bool> {
        (self.capture)(item, parent)
    }

    /// Release `item` from the context identified by `parent`.
    pub fn release(&self, item: &T, parent: ContextId) -> Result<()> {
        (self.release)(item, parent)
    }

    /// Context currently holding `item`, if any.
    pub fn captured_by(&self, item: &T) -> Option<ContextId> {
        (self.captured_by)(item)
    }
}

/// Capture `items` into `parent`, run `op`, and roll the captures back when
/// either step fails.
///
/// Items that were already held by this same parent are left attached on
/// rollback; only captures made by this call are unwound.
pub fn with_capture<T, R>(
    items: &[T],
    parent: &UndoHandle,
    hooks: SubItemHooks<T>,
    op: impl FnOnce() -> Result<R>,
) -> Result<R> {
    let mut newly: SmallVec<[usize; 4]> = SmallVec::new();
    for (i, item) in items.iter().enumerate() {
        match hooks.capture(item, parent) {
            Ok(true) => newly.push(i),
            Ok(false) => {}
            Err(e) => {
                debug!(parent = %parent.context_id(), captured = newly.len(), "capture failed, rolling back");
                for &j in newly.iter().rev() {
                    let _ = hooks.release(&items[j], parent.context_id());
                }
                return Err(e);
            }
        }
    }
    match op() {
        Ok(value) => Ok(value),
        Err(e) => {
            debug!(parent = %parent.context_id(), captured = newly.len(), "mutation failed, releasing captures");
            for &j in newly.iter().rev() {
                let _ = hooks.release(&items[j], parent.context_id());
            }
            Err(e)
        }
    }
}

/// Release `items` from `parent`, run `op`, and re-capture on failure.
pub fn with_release<T, R>(
    items: &[T],
    parent: &UndoHandle,
    hooks: SubItemHooks<T>,
    op: impl FnOnce() -> Result<R>,
) -> Result<R> {
    let mut released: SmallVec<[usize; 4]> = SmallVec::new();
    for (i, item) in items.iter().enumerate() {
        match hooks.release(item, parent.context_id()) {
            Ok(()) => released.push(i),
            Err(e) => {
                debug!(parent = %parent.context_id(), released = released.len(), "release failed, re-capturing");
                for &j in released.iter().rev() {
                    let _ = hooks.capture(&items[j], parent);
                }
                return Err(e);
            }
        }
    }
    match op() {
        Ok(value) => Ok(value),
        Err(e) => {
            debug!(parent = %parent.context_id(), released = released.len(), "mutation failed, re-capturing");
            for &j in released.iter().rev() {
                let _ = hooks.capture(&items[j], parent);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rewind_core::change::ChildEdit;
    use rewind_core::context::UndoContext;
    use std::sync::Arc;

    struct Parent {
        id: ContextId,
    }

    impl UndoContext for Parent {
        fn context_id(&self) -> ContextId {
            self.id
        }
        fn record_child_edit(&self, _edit: ChildEdit) {}
        fn undo(&self) -> Result<()> {
            Ok(())
        }
        fn redo(&self) -> Result<()> {
            Ok(())
        }
        fn can_undo(&self) -> bool {
            false
        }
        fn can_redo(&self) -> bool {
            false
        }
    }

    fn parent_handle() -> (Arc<dyn UndoContext>, UndoHandle) {
        let ctx: Arc<dyn UndoContext> = Arc::new(Parent {
            id: ContextId::next(),
        });
        let handle = UndoHandle::new(ctx.context_id(), Arc::downgrade(&ctx));
        (ctx, handle)
    }

    #[derive(Clone)]
    struct Item {
        captured: Arc<Mutex<Option<ContextId>>>,
    }

    impl Item {
        fn new() -> Self {
            Self {
                captured: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl UndoableItem for Item {
        fn capture_into(&self, parent: UndoHandle) -> Result<()> {
            let mut held = self.captured.lock();
            match *held {
                Some(existing) if existing != parent.context_id() => Err(Error::AlreadyCaptured {
                    held_by: existing,
                    requested_by: parent.context_id(),
                }),
                _ => {
                    *held = Some(parent.context_id());
                    Ok(())
                }
            }
        }

        fn release_from(&self, parent: ContextId) -> Result<()> {
            let mut held = self.captured.lock();
            if *held == Some(parent) {
                *held = None;
                Ok(())
            } else {
                Err(Error::NotCaptured { expected: parent })
            }
        }

        fn captured_by(&self) -> Option<ContextId> {
            *self.captured.lock()
        }

        fn can_undo(&self) -> bool {
            false
        }
        fn can_redo(&self) -> bool {
            false
        }
        fn undo(&self) -> Result<()> {
            Ok(())
        }
        fn redo(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_capture_state_attach_detach() {
        let (_keep, handle) = parent_handle();
        let mut state = CaptureState::new();
        assert!(!state.is_captured());
        assert!(state.attach(&handle).unwrap());
        assert!(!state.attach(&handle).unwrap(), "same parent is idempotent");
        assert_eq!(state.holder_id(), Some(handle.context_id()));
        state.detach(handle.context_id()).unwrap();
        assert!(!state.is_captured());
    }

    #[test]
    fn test_capture_state_rejects_second_parent() {
        let (_a, first) = parent_handle();
        let (_b, second) = parent_handle();
        let mut state = CaptureState::new();
        state.attach(&first).unwrap();
        let err = state.attach(&second).unwrap_err();
        assert!(matches!(err, Error::AlreadyCaptured { .. }));
    }

    #[test]
    fn test_capture_state_detach_wrong_parent() {
        let (_a, first) = parent_handle();
        let (_b, second) = parent_handle();
        let mut state = CaptureState::new();
        state.attach(&first).unwrap();
        let err = state.detach(second.context_id()).unwrap_err();
        assert!(matches!(err, Error::NotCaptured { .. }));
    }

    #[test]
    fn test_with_capture_success_keeps_captures() {
        let (_keep, handle) = parent_handle();
        let items = vec![Item::new(), Item::new()];
        let hooks = SubItemHooks::<Item>::for_undoable();

        with_capture(&items, &handle, hooks, || Ok(())).unwrap();
        for item in &items {
            assert_eq!(item.captured_by(), Some(handle.context_id()));
        }
    }

    #[test]
    fn test_with_capture_failure_rolls_back() {
        let (_keep, handle) = parent_handle();
        let items = vec![Item::new(), Item::new()];
        let hooks = SubItemHooks::<Item>::for_undoable();

        let result: Result<()> = with_capture(&items, &handle, hooks, || {
            Err(Error::KeyAlreadyExists)
        });
        assert!(result.is_err());
        for item in &items {
            assert_eq!(item.captured_by(), None, "capture must be unwound");
        }
    }

    #[test]
    fn test_with_capture_conflict_releases_partial() {
        let (_a, ours) = parent_handle();
        let (_b, other) = parent_handle();
        let first = Item::new();
        let second = Item::new();
        // second item is already owned elsewhere
        second.capture_into(other.clone()).unwrap();

        let hooks = SubItemHooks::<Item>::for_undoable();
        let items = vec![first.clone(), second.clone()];
        let result: Result<()> = with_capture(&items, &ours, hooks, || Ok(()));

        assert!(matches!(result, Err(Error::AlreadyCaptured { .. })));
        assert_eq!(first.captured_by(), None, "partial capture must be unwound");
        assert_eq!(second.captured_by(), Some(other.context_id()));
    }

    #[test]
    fn test_with_capture_preexisting_capture_survives_rollback() {
        let (_keep, handle) = parent_handle();
        let item = Item::new();
        item.capture_into(handle.clone()).unwrap();

        let hooks = SubItemHooks::<Item>::for_undoable();
        let items = vec![item.clone()];
        let result: Result<()> = with_capture(&items, &handle, hooks, || {
            Err(Error::KeyAlreadyExists)
        });
        assert!(result.is_err());
        assert_eq!(
            item.captured_by(),
            Some(handle.context_id()),
            "captures made before the transaction stay attached"
        );
    }

    #[test]
    fn test_with_release_success() {
        let (_keep, handle) = parent_handle();
        let item = Item::new();
        item.capture_into(handle.clone()).unwrap();

        let hooks = SubItemHooks::<Item>::for_undoable();
        let items = vec![item.clone()];
        with_release(&items, &handle, hooks, || Ok(())).unwrap();
        assert_eq!(item.captured_by(), None);
    }

    #[test]
    fn test_with_release_failure_recaptures() {
        let (_keep, handle) = parent_handle();
        let item = Item::new();
        item.capture_into(handle.clone()).unwrap();

        let hooks = SubItemHooks::<Item>::for_undoable();
        let items = vec![item.clone()];
        let result: Result<()> = with_release(&items, &handle, hooks, || {
            Err(Error::KeyAlreadyExists)
        });
        assert!(result.is_err());
        assert_eq!(
            item.captured_by(),
            Some(handle.context_id()),
            "release must be rolled back"
        );
    }

    #[test]
    fn test_with_release_not_captured_fails_fast() {
        let (_keep, handle) = parent_handle();
        let item = Item::new();
        let hooks = SubItemHooks::<Item>::for_undoable();
        let items = vec![item];
        let result: Result<()> = with_release(&items, &handle, hooks, || Ok(()));
        assert!(matches!(result, Err(Error::NotCaptured { .. })));
    }
}
