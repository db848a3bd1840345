//! Parent/child undo-context capture across collections.

use rewind::{Error, ListChange, ObservableList, ObservableMap, UndoableItem};

#[test]
fn inserted_child_is_captured_by_parent() {
    let parent: ObservableList<ObservableList<i32>> = ObservableList::of_undoables();
    let child: ObservableList<i32> = ObservableList::new();

    assert_eq!(UndoableItem::captured_by(&child), None);
    parent.push(child.clone()).unwrap();
    assert_eq!(
        UndoableItem::captured_by(&child),
        Some(parent.undo_handle().context_id())
    );
}

#[test]
fn capture_by_second_parent_fails() {
    let first: ObservableList<ObservableList<i32>> = ObservableList::of_undoables();
    let second: ObservableList<ObservableList<i32>> = ObservableList::of_undoables();
    let child: ObservableList<i32> = ObservableList::new();

    first.push(child.clone()).unwrap();
    let err = second.push(child.clone()).unwrap_err();
    assert!(matches!(err, Error::AlreadyCaptured { .. }));
    assert!(
        second.is_empty(),
        "failed capture must not leave the item in the second parent"
    );
    assert_eq!(
        UndoableItem::captured_by(&child),
        Some(first.undo_handle().context_id())
    );
}

#[test]
fn release_from_wrong_parent_fails() {
    let parent: ObservableList<ObservableList<i32>> = ObservableList::of_undoables();
    let other: ObservableList<ObservableList<i32>> = ObservableList::of_undoables();
    let child: ObservableList<i32> = ObservableList::new();

    parent.push(child.clone()).unwrap();
    let err = child
        .release_from(other.undo_handle().context_id())
        .unwrap_err();
    assert!(matches!(err, Error::NotCaptured { .. }));
}

#[test]
fn removal_releases_the_child() {
    let parent: ObservableList<ObservableList<i32>> = ObservableList::of_undoables();
    let child: ObservableList<i32> = ObservableList::new();

    parent.push(child.clone()).unwrap();
    parent.remove_at(0).unwrap();
    assert_eq!(UndoableItem::captured_by(&child), None);

    // undoing the removal re-captures
    parent.undo().unwrap();
    assert_eq!(
        UndoableItem::captured_by(&child),
        Some(parent.undo_handle().context_id())
    );
}

#[test]
fn child_edit_lands_in_parent_history() {
    let parent: ObservableList<ObservableList<i32>> = ObservableList::of_undoables();
    let child: ObservableList<i32> = ObservableList::new();
    parent.push(child.clone()).unwrap();

    child.push(42).unwrap();
    assert!(!child.can_undo(), "captured child records nothing locally");
    assert_eq!(child.to_vec(), vec![42]);

    // the parent's most recent level is the child's edit
    parent.undo().unwrap();
    assert!(child.is_empty(), "parent undo reverted the child's edit");
    assert_eq!(parent.len(), 1, "parent structure untouched");

    parent.redo().unwrap();
    assert_eq!(child.to_vec(), vec![42]);

    // one more undo peels the child edit again, the next one the insertion
    parent.undo().unwrap();
    parent.undo().unwrap();
    assert!(parent.is_empty());
    assert_eq!(UndoableItem::captured_by(&child), None);
}

#[test]
fn captured_child_undo_delegates_to_parent() {
    let parent: ObservableList<ObservableList<i32>> = ObservableList::of_undoables();
    let child: ObservableList<i32> = ObservableList::new();
    parent.push(child.clone()).unwrap();

    child.push(7).unwrap();
    // the child's own undo bubbles to the parent, which undoes the child's
    // edit because it is the most recent level
    child.undo().unwrap();
    assert!(child.is_empty());

    child.redo().unwrap();
    assert_eq!(child.to_vec(), vec![7]);
}

#[test]
fn released_child_records_locally_again() {
    let parent: ObservableList<ObservableList<i32>> = ObservableList::of_undoables();
    let child: ObservableList<i32> = ObservableList::new();
    parent.push(child.clone()).unwrap();

    child
        .release_from(parent.undo_handle().context_id())
        .unwrap();
    child.push(1).unwrap();
    assert!(child.can_undo(), "uncaptured child keeps its own history");
    child.undo().unwrap();
    assert!(child.is_empty());
}

#[test]
fn map_values_participate_in_capture() {
    let parent: ObservableMap<&str, ObservableList<i32>> = ObservableMap::of_undoables();
    let child: ObservableList<i32> = ObservableList::new();

    parent.insert("child", child.clone()).unwrap();
    assert_eq!(
        UndoableItem::captured_by(&child),
        Some(parent.undo_handle().context_id())
    );

    child.push(5).unwrap();
    parent.undo().unwrap();
    assert!(child.is_empty(), "map parent undoes the child's edit");

    parent.undo().unwrap();
    assert!(parent.is_empty());
    assert_eq!(UndoableItem::captured_by(&child), None);
}

#[test]
fn explicit_replay_application_bypasses_history() {
    let list = ObservableList::new();
    list.push(1).unwrap();

    let change = ListChange::Insert { index: 1, item: 2 };
    list.redo_changes(&[change.clone()]).unwrap();
    assert_eq!(list.to_vec(), vec![1, 2]);
    assert!(
        list.can_undo(),
        "replay application does not disturb recorded history"
    );

    list.undo_changes(&[change]).unwrap();
    assert_eq!(list.to_vec(), vec![1]);

    list.undo().unwrap();
    assert!(list.is_empty());
}
