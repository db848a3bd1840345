//! Contended-access operations for `ObservableMap`
//!
//! Double-checked locking over the map's reader-writer lock: a cheap shared
//! probe first, then an upgradable read that re-probes before generating or
//! mutating. Upgradable reads are mutually exclusive, so a generator runs at
//! most once per missing key no matter how many callers race on it.

use crate::map::ObservableMap;
use parking_lot::RwLockUpgradableReadGuard;
use rewind_core::change::MapChange;
use rewind_core::error::Result;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, trace};

impl<K, V> ObservableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Return the value for `key`, generating and inserting it when absent.
    ///
    /// The generator is invoked at most once per missing key under
    /// contention; every racing caller observes the same resulting value.
    /// It runs while the map's lock is held and must not touch the map.
    pub fn get_or_add(&self, key: K, generator: impl FnOnce() -> V) -> V {
        {
            let st = self.shared().state.read();
            if let Some(value) = st.entries.get(&key) {
                return value.clone();
            }
        }
        let shared = Arc::clone(self.shared());
        let (value, staged) = {
            let guard = shared.state.upgradable_read();
            // re-probe: a writer may have won between the two locks
            if let Some(value) = guard.entries.get(&key) {
                trace!(ctx = %shared.id, "get_or_add lost the race, reusing value");
                return value.clone();
            }
            let value = generator();
            let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
            let st = &mut *guard;
            st.entries.insert(key.clone(), value.clone());
            if let Err(err) = shared.capture_value(st, &value) {
                debug!(ctx = %shared.id, %err, "generated value could not be captured");
            }
            let staged = shared.stage(
                st,
                MapChange::Insert {
                    key,
                    value: value.clone(),
                },
            );
            (value, staged)
        };
        trace!(ctx = %shared.id, "get_or_add generated");
        shared.finish(staged, true, true);
        value
    }

    /// Insert `value` for `key`, or replace the current value, returning the
    /// previous one.
    ///
    /// The presence probe runs under an upgradable read so the decision
    /// between insert and replace is race-free; one undo level is recorded
    /// either way.
    pub fn create_or_change_state(&self, key: K, value: V) -> Result<Option<V>> {
        let shared = Arc::clone(self.shared());
        let (previous, staged) = {
            let guard = shared.state.upgradable_read();
            let previous = guard.entries.get(&key).cloned();
            let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
            let st = &mut *guard;
            st.entries.insert(key.clone(), value.clone());
            shared.capture_value(st, &value)?;
            let change = match &previous {
                Some(old) => {
                    shared.release_value(st, old);
                    MapChange::Replace {
                        key,
                        old: old.clone(),
                        new: value,
                    }
                }
                None => MapChange::Insert { key, value },
            };
            let staged = shared.stage(st, change);
            (previous, staged)
        };
        trace!(ctx = %shared.id, replaced = previous.is_some(), "create_or_change_state");
        let count_changed = previous.is_none();
        shared.finish(staged, true, count_changed);
        Ok(previous)
    }

    /// Remove `key` and run `action` on the removed value outside the lock.
    ///
    /// Returns `None` without invoking `action` when the key is absent.
    pub fn remove_then_act<R>(&self, key: &K, action: impl FnOnce(V) -> R) -> Option<R> {
        let value = self.remove(key)?;
        Some(action(value))
    }
}
