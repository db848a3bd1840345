//! End-to-end undo/redo behavior on the observable list.

use rewind::{CollectionEvent, ObservableList, PropertyChanged, UndoConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn add_undo_redo_walkthrough() {
    let list = ObservableList::new();
    list.push(1).unwrap();
    list.push(2).unwrap();
    list.push(3).unwrap();
    assert_eq!(list.to_vec(), vec![1, 2, 3]);
    assert!(list.can_undo());
    assert!(!list.can_redo());

    list.undo().unwrap();
    assert_eq!(list.to_vec(), vec![1, 2]);
    assert!(list.can_undo());
    assert!(list.can_redo());

    list.undo().unwrap();
    assert_eq!(list.to_vec(), vec![1]);
    assert!(list.can_undo());
    assert!(list.can_redo());

    list.redo().unwrap();
    assert_eq!(list.to_vec(), vec![1, 2]);
    assert!(list.can_undo());
    assert!(list.can_redo());
}

#[test]
fn undo_on_empty_history_is_noop() {
    let list: ObservableList<i32> = ObservableList::new();
    list.undo().unwrap();
    list.redo().unwrap();
    assert!(list.is_empty());
    assert!(!list.can_undo());
    assert!(!list.can_redo());
}

#[test]
fn remove_and_clear_round_trip() {
    let list = ObservableList::new();
    list.extend([1, 2, 3, 4]).unwrap();

    list.remove_at(1);
    assert_eq!(list.to_vec(), vec![1, 3, 4]);
    list.undo().unwrap();
    assert_eq!(list.to_vec(), vec![1, 2, 3, 4]);
    list.redo().unwrap();
    assert_eq!(list.to_vec(), vec![1, 3, 4]);

    list.clear();
    assert!(list.is_empty());
    list.undo().unwrap();
    assert_eq!(list.to_vec(), vec![1, 3, 4]);
}

#[test]
fn replace_round_trip_keeps_count() {
    let list = ObservableList::new();
    list.extend([1, 2, 3]).unwrap();
    list.set(1, 9).unwrap();
    assert_eq!(list.to_vec(), vec![1, 9, 3]);
    list.undo().unwrap();
    assert_eq!(list.to_vec(), vec![1, 2, 3]);
    list.redo().unwrap();
    assert_eq!(list.to_vec(), vec![1, 9, 3]);
}

#[test]
fn any_mutation_clears_redo() {
    let list = ObservableList::new();
    list.push(1).unwrap();
    list.push(2).unwrap();
    list.undo().unwrap();
    assert!(list.can_redo());

    list.push(3).unwrap();
    assert!(!list.can_redo(), "new history invalidates old redo");
    assert_eq!(list.to_vec(), vec![1, 3]);
    list.redo().unwrap();
    assert_eq!(list.to_vec(), vec![1, 3], "redo stayed empty");
}

#[test]
fn shrinking_history_levels_discards_oldest() {
    let list = ObservableList::new();
    for i in 0..6 {
        list.push(i).unwrap();
    }
    list.set_history_levels(2);
    list.undo().unwrap();
    list.undo().unwrap();
    list.undo().unwrap();
    assert_eq!(
        list.to_vec(),
        vec![0, 1, 2, 3],
        "only the two most recent levels could be undone"
    );
}

#[test]
fn zero_history_levels_disables_undo() {
    let list = ObservableList::with_config(UndoConfig::default().with_history_levels(0));
    list.push(1).unwrap();
    assert!(!list.can_undo());
    list.undo().unwrap();
    assert_eq!(list.to_vec(), vec![1]);
}

#[test]
fn batched_mutations_undo_as_one_level() {
    let list = ObservableList::new();
    list.push(0).unwrap();

    assert!(list.begin_batch());
    list.push(1).unwrap();
    list.set(0, 5).unwrap();
    list.push(2).unwrap();
    list.end_batch();

    assert_eq!(list.to_vec(), vec![5, 1, 2]);
    list.undo().unwrap();
    assert_eq!(list.to_vec(), vec![0]);
    list.redo().unwrap();
    assert_eq!(list.to_vec(), vec![5, 1, 2]);
}

#[test]
fn notifications_track_mutations_and_undo() {
    let list = ObservableList::new();
    let events = Arc::new(AtomicUsize::new(0));
    let can_undo_props = Arc::new(AtomicUsize::new(0));

    let events2 = Arc::clone(&events);
    list.subscribe(move |event| {
        if !matches!(event, CollectionEvent::Reset) {
            events2.fetch_add(1, Ordering::SeqCst);
        }
    });
    let props2 = Arc::clone(&can_undo_props);
    list.subscribe_properties(move |prop| {
        if matches!(prop, PropertyChanged::CanUndo) {
            props2.fetch_add(1, Ordering::SeqCst);
        }
    });

    list.push(1).unwrap(); // Added
    list.undo().unwrap(); // Removed
    list.redo().unwrap(); // Added

    assert_eq!(events.load(Ordering::SeqCst), 3);
    assert_eq!(can_undo_props.load(Ordering::SeqCst), 3);
}

#[test]
fn unsubscribed_observer_stops_receiving() {
    let list = ObservableList::new();
    let count = Arc::new(AtomicUsize::new(0));
    let count2 = Arc::clone(&count);
    let id = list.subscribe(move |_| {
        count2.fetch_add(1, Ordering::SeqCst);
    });

    list.push(1).unwrap();
    assert!(list.unsubscribe(id));
    list.push(2).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
