//! # Replay store: latest event per key, in arrival order.
//!
//! Holds the events a late registrant must receive before any live event.
//!
//! ## Architecture
//! ```text
//! dispatch_event(e)  ──► store(key(e), e)   remove-then-insert: key moves to the end
//! dispatch_and_remove ─► remove(key(e))
//! remove_event(k)    ──► remove(k)
//! add_listener       ──► replay_snapshot()  converts each entry once, clones replay forms
//! ```
//!
//! ## Rules
//! - At most one entry per key; a newer event under the same key replaces the
//!   old one and is ordered as if newly arrived ("refresh", not "append").
//! - The replay form of an entry is computed at most once and shared by every
//!   later registrant.
//! - The store owns no lock. The dispatcher guards it with its replay lock:
//!   exclusive for `store`/`remove`, shared for `replay_snapshot`. Registrations
//!   that snapshot are serialized by the registry write lock, so the memoized
//!   conversion never races with itself.

use std::hash::Hash;
use std::sync::OnceLock;

use indexmap::IndexMap;

/// A stored event and its lazily computed replay form.
struct ReplayEntry<E> {
    /// Event as originally dispatched.
    event: E,
    /// Replay form, set the first time a registrant observes this entry.
    replay: OnceLock<E>,
}

impl<E> ReplayEntry<E> {
    fn new(event: E) -> Self {
        Self {
            event,
            replay: OnceLock::new(),
        }
    }

    #[cfg(test)]
    fn is_replay_form(&self) -> bool {
        self.replay.get().is_some()
    }

    /// Returns the memoized replay form, converting on first use.
    fn replay_event<F>(&self, convert: F) -> Option<&E>
    where
        F: FnOnce(&E) -> Option<E>,
    {
        if let Some(ev) = self.replay.get() {
            return Some(ev);
        }
        let converted = convert(&self.event)?;
        Some(self.replay.get_or_init(|| converted))
    }
}

/// Insertion-ordered mapping from event key to the latest stored event.
pub(crate) struct ReplayStore<K, E> {
    entries: IndexMap<K, ReplayEntry<E>>,
}

impl<K, E> ReplayStore<K, E>
where
    K: Eq + Hash + Clone,
    E: Clone,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Stores `event` under `key` in fresh (non-replay) form, at the end of the order.
    pub fn store(&mut self, key: K, event: E) {
        self.entries.shift_remove(&key);
        self.entries.insert(key, ReplayEntry::new(event));
    }

    /// Removes the entry under `key`; returns whether one existed.
    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    /// Returns the replay forms of all entries in store order.
    ///
    /// Entries not yet in replay form are converted through `convert`. If it
    /// yields `None` for some entry, that entry's key is returned as the error;
    /// entries converted before it keep their (valid) replay form.
    pub fn replay_snapshot<F>(&self, mut convert: F) -> Result<Vec<E>, K>
    where
        F: FnMut(&E) -> Option<E>,
    {
        let mut out = Vec::with_capacity(self.entries.len());
        for (key, entry) in &self.entries {
            match entry.replay_event(&mut convert) {
                Some(ev) => out.push(ev.clone()),
                None => return Err(key.clone()),
            }
        }
        Ok(out)
    }

    /// Returns true if the entry under `key` was already converted to replay form.
    #[cfg(test)]
    pub fn is_replay_form(&self, key: &K) -> Option<bool> {
        self.entries.get(key).map(ReplayEntry::is_replay_form)
    }

    /// Returns the stored keys in store order.
    pub fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
