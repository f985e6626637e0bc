//! # Listener registry - keyed, ordered set of live registrations.
//!
//! Registry owns every [`ListenerEntry`] and the lock that guards the mapping:
//! - `add_listener` → `write()` + `vacant()` + `insert()` (check-and-insert under one guard)
//! - `dispatch_event` → `read()` + `snapshot()` (registration order)
//! - `call_listener` → `is_current()` right before each call
//! - `TimeoutMonitor` → `ListenerEntry::blacklist()` on overrun (no registry lock)
//!
//! ## Architecture
//! ```text
//! Dispatcher ──► RwLock<ListenerMap>
//!                   └─► IndexMap<key, Arc<ListenerEntry>>
//!                              ├─ id          (unique per registration)
//!                              ├─ listener    (policy-defined handle)
//!                              ├─ gate        (per-listener RwLock: replay writes, calls read)
//!                              └─ blacklist   (set once, cleared by removal)
//! ```
//!
//! ## Rules
//! - One entry per key; insertion is a strict check-and-insert.
//! - The registry lock is never held while listener code runs.
//! - An entry's gate is write-locked only by its own registration, before the
//!   entry becomes visible. Live calls take it shared, so a listener may
//!   dispatch from inside its callback without waiting on itself.
//! - Blacklisting is a flag flip on the exact entry that made the call: a late
//!   timeout never touches a newer registration under the same key.
//! - Removing an entry drops its blacklist state with it.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use indexmap::IndexMap;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::DispatchError;
use crate::policies::BlacklistReason;

/// Global counter for registration ids.
static ENTRY_SEQ: AtomicU64 = AtomicU64::new(0);

/// State of one registration.
pub(crate) struct ListenerEntry<K, L> {
    /// Unique id of this registration (differs across re-registrations of a key).
    id: u64,
    /// Key the listener was registered under.
    key: K,
    /// Listener handle, invoked through the event policy.
    listener: L,
    /// Held exclusively for the replay, shared by live calls.
    gate: RwLock<()>,
    /// Set once when the listener is taken out of rotation.
    blacklist: OnceLock<BlacklistReason>,
}

impl<K, L> ListenerEntry<K, L> {
    /// Creates a fresh, unblacklisted entry with a new id.
    pub fn new(key: K, listener: L) -> Self {
        Self {
            id: ENTRY_SEQ.fetch_add(1, AtomicOrdering::Relaxed) + 1,
            key,
            listener,
            gate: RwLock::new(()),
            blacklist: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Exclusive delivery rights, taken by registration for the whole replay.
    pub async fn replay_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    /// Shared delivery rights for a live call; waits while the replay runs.
    pub async fn call_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().await
    }

    pub fn blacklist_reason(&self) -> Option<BlacklistReason> {
        self.blacklist.get().copied()
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklist.get().is_some()
    }

    /// Marks the entry blacklisted; returns false if it already was.
    pub fn blacklist(&self, reason: BlacklistReason) -> bool
    where
        K: std::fmt::Debug,
    {
        let flipped = self.blacklist.set(reason).is_ok();
        if flipped {
            tracing::warn!(listener = ?self.key, reason = reason.as_str(), "listener blacklisted");
        }
        flipped
    }
}

/// The mapping guarded by the registry lock.
pub(crate) struct ListenerMap<K, L> {
    entries: IndexMap<K, Arc<ListenerEntry<K, L>>>,
}

impl<K, L> ListenerMap<K, L>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Fails with `ListenerAlreadyRegistered` if `key` has a live entry.
    pub fn vacant(&self, key: &K) -> Result<(), DispatchError> {
        if self.entries.contains_key(key) {
            return Err(DispatchError::already_registered(key));
        }
        Ok(())
    }

    /// Inserts `entry` under its key; the caller checked `vacant` under the same guard.
    pub fn insert(&mut self, entry: Arc<ListenerEntry<K, L>>) {
        self.entries.insert(entry.key().clone(), entry);
    }

    /// Returns the current entries in registration order.
    pub fn snapshot(&self) -> Vec<Arc<ListenerEntry<K, L>>> {
        self.entries.values().cloned().collect()
    }

    fn get(&self, key: &K) -> Option<&Arc<ListenerEntry<K, L>>> {
        self.entries.get(key)
    }
}

/// Lock-guarded registry of listener entries.
pub(crate) struct ListenerRegistry<K, L> {
    map: RwLock<ListenerMap<K, L>>,
}

impl<K, L> ListenerRegistry<K, L>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Creates a new registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            map: RwLock::new(ListenerMap {
                entries: IndexMap::new(),
            }),
        })
    }

    /// Shared access to the mapping (dispatch snapshot).
    pub async fn read(&self) -> RwLockReadGuard<'_, ListenerMap<K, L>> {
        self.map.read().await
    }

    /// Exclusive access to the mapping (registration).
    pub async fn write(&self) -> RwLockWriteGuard<'_, ListenerMap<K, L>> {
        self.map.write().await
    }

    /// Returns true if `entry` is still the registration for its key and not blacklisted.
    pub async fn is_current(&self, entry: &ListenerEntry<K, L>) -> bool {
        let map = self.map.read().await;
        map.get(entry.key())
            .is_some_and(|e| e.id() == entry.id() && !e.is_blacklisted())
    }

    /// Removes the entry for `key`; returns whether it existed.
    pub async fn remove(&self, key: &K) -> bool {
        let removed = self.map.write().await.entries.shift_remove(key);
        if removed.is_some() {
            tracing::debug!(listener = ?key, "listener removed");
        }
        removed.is_some()
    }

    /// Blacklists the registration `entry_id` of `key`, if it is still live.
    ///
    /// Returns true if this call flipped the flag.
    pub async fn blacklist(&self, key: &K, entry_id: u64, reason: BlacklistReason) -> bool {
        let map = self.map.read().await;
        map.get(key)
            .filter(|e| e.id() == entry_id)
            .is_some_and(|e| e.blacklist(reason))
    }

    /// Returns why `key` is blacklisted, if it has a live, blacklisted entry.
    pub async fn blacklist_reason(&self, key: &K) -> Option<BlacklistReason> {
        self.map
            .read()
            .await
            .get(key)
            .and_then(|e| e.blacklist_reason())
    }

    /// Returns registered keys in registration order.
    pub async fn keys(&self) -> Vec<K> {
        self.map.read().await.entries.keys().cloned().collect()
    }

    /// Number of registered listeners (blacklisted ones included).
    pub async fn len(&self) -> usize {
        self.map.read().await.entries.len()
    }
}
