//! # Undo Journal
//!
//! Each launchpad call is all-or-nothing. Rather than snapshotting the whole
//! engine, every stateful component keeps an undo log for the duration of a
//! call: the first time an entry is written, its prior value is recorded.
//! Rollback restores exactly those entries, so its cost follows what the call
//! touched, not how large the engine has grown.
//!
//! Outside a call the logs are closed and recording is a no-op, so direct
//! setup through [`Launchpad::ledger_mut`](crate::launchpad::Launchpad::ledger_mut)
//! is never journaled.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

/// A component whose writes during one call can be undone.
pub trait Journaled {
    /// Opens a transaction. Prior values are recorded from now on.
    fn begin(&mut self);

    /// Keeps every write since [`begin`](Self::begin) and closes the
    /// transaction.
    fn commit(&mut self);

    /// Restores every entry written since [`begin`](Self::begin) and closes
    /// the transaction.
    fn rollback(&mut self);
}

/// Keyed storage an [`UndoLog`] can restore into.
pub trait Restore<K, V> {
    fn put(&mut self, key: K, value: V);
    fn take_out(&mut self, key: &K);
}

impl<K: Eq + Hash, V> Restore<K, V> for HashMap<K, V> {
    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn take_out(&mut self, key: &K) {
        self.remove(key);
    }
}

impl<K: Ord, V> Restore<K, V> for BTreeMap<K, V> {
    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn take_out(&mut self, key: &K) {
        self.remove(key);
    }
}

impl<K: Eq + Hash> Restore<K, ()> for HashSet<K> {
    fn put(&mut self, key: K, _: ()) {
        self.insert(key);
    }

    fn take_out(&mut self, key: &K) {
        self.remove(key);
    }
}

/// Prior values of the entries written during the open transaction.
/// `None` means the entry did not exist.
#[derive(Debug, Clone)]
pub struct UndoLog<K, V> {
    open: bool,
    prior: HashMap<K, Option<V>>,
}

impl<K, V> Default for UndoLog<K, V> {
    fn default() -> Self {
        Self {
            open: false,
            prior: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> UndoLog<K, V> {
    pub fn begin(&mut self) {
        self.open = true;
        self.prior.clear();
    }

    pub fn commit(&mut self) {
        self.open = false;
        self.prior.clear();
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of entries recorded in the open transaction.
    pub fn len(&self) -> usize {
        self.prior.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prior.is_empty()
    }

    /// Records the value `key` holds before its first write in this
    /// transaction. `current` runs only when something must be recorded.
    pub fn record(&mut self, key: &K, current: impl FnOnce() -> Option<V>) {
        if self.open && !self.prior.contains_key(key) {
            self.prior.insert(key.clone(), current());
        }
    }

    /// Closes the transaction and hands back the recorded prior values.
    pub fn drain(&mut self) -> HashMap<K, Option<V>> {
        self.open = false;
        std::mem::take(&mut self.prior)
    }

    /// Closes the transaction and restores the recorded entries of `store`.
    pub fn rollback_into<S: Restore<K, V>>(&mut self, store: &mut S) {
        for (key, prior) in self.drain() {
            match prior {
                Some(value) => store.put(key, value),
                None => store.take_out(&key),
            }
        }
    }
}
