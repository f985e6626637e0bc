//! # Dispatcher: live delivery, replay to late joiners, listener health.
//!
//! The [`Dispatcher`] owns the replay store, the listener registry and (for a
//! positive call timeout) the timeout monitor, and implements the protocol
//! that keeps registration, dispatch and removal atomic with respect to each
//! other.
//!
//! ## Key responsibilities
//! - keep the latest event per key for replay, in arrival order
//! - deliver each dispatched event to every listener registered at commit time
//! - replay stored events to a new listener before any live event reaches it
//! - isolate listener failures: errors go to the [`ExceptionHandler`], overruns blacklist
//!
//! ## Lock domains
//! ```text
//! registry lock (RwLock)   ── ListenerMap: insert / remove / snapshot / membership
//! replay lock   (RwLock)   ── ReplayStore: store / remove / replay snapshot
//! gate          (RwLock)   ── one per ListenerEntry: exclusive for replay, shared for live calls
//!
//! order: gate(new listener) → registry → replay      (never the other way round)
//! ```
//!
//! ## Protocol
//! ```text
//! add_listener(key, l):
//!   gate(new).write ──────────────────────────────────────────────┐ held until replay is done
//!     registry.write ─┐                                            │
//!       vacant(key)?  │ ListenerAlreadyRegistered → nothing changed│
//!       replay.read ─┐│                                            │
//!         snapshot   ││ converts entries to replay form once       │
//!       insert(entry)││                                            │
//!     release both ──┘┘                                            │
//!     for ev in snapshot: invoke(entry, ev)                        │
//!   ───────────────────────────────────────────────────────────────┘
//!
//! dispatch_event(e):
//!   closed? → Closed
//!   registry.read ─┐
//!     replay.write ┤ remove(key); store(key, e) unless and-remove
//!     snapshot     │ listeners registered at commit time
//!   release both ──┘
//!   for entry in snapshot: gate(entry).read → invoke(entry, e)
//!
//! invoke(entry, ev):
//!   still registered (same entry) and not blacklisted? else skip
//!   CallGuard (monitor) → policy.invoke_listener → Err / panic → handler, maybe blacklist
//! ```
//!
//! Committing the store mutation and taking the listener snapshot under the
//! same pair of guards is what rules out duplicates: a registrant either sees
//! the event in its replay snapshot or in the dispatch snapshot, never both.
//!
//! ## Re-entrancy
//! A listener may dispatch, register or remove from inside its callback,
//! including a dispatch that delivers back to itself. A gate is write-locked
//! only before its entry is inserted, so once a listener receives live events
//! no writer can be queued on its gate and nested shared acquisitions never wait.
//! Concurrent dispatches may therefore call the same listener concurrently.
//!
//! The one exception is the replay itself: while a listener is being replayed to,
//! its gate is held exclusively, so a replay callback must not await a dispatch
//! that would deliver to that same listener.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::RwLock;

use crate::core::builder::DispatcherBuilder;
use crate::core::config::DispatcherConfig;
use crate::core::monitor::TimeoutMonitor;
use crate::core::registry::{ListenerEntry, ListenerRegistry};
use crate::core::replay::ReplayStore;
use crate::error::{DispatchError, HandlerFailure, ListenerError};
use crate::handlers::ExceptionHandler;
use crate::policies::{BlacklistReason, EventPolicy};

type Entry<P> = ListenerEntry<<P as EventPolicy>::ListenerKey, <P as EventPolicy>::Listener>;

/// Shared exception handler for a policy's key and event types.
pub type HandlerRef<P> =
    Arc<dyn ExceptionHandler<<P as EventPolicy>::ListenerKey, <P as EventPolicy>::Event>>;

/// In-process event dispatcher with replay for late listeners.
///
/// Built with [`Dispatcher::builder`]; shared as `Arc<Dispatcher<P>>`.
///
/// ### Guarantees
/// - A new listener receives every stored event once, in store order, in replay
///   form, before any live event.
/// - Each dispatch reaches every listener registered when it committed, in
///   registration order; `dispatch_event(..).await` returns after all of them.
/// - Replay to a listener completes before any live call to it starts.
/// - Listener errors and panics never reach the caller.
pub struct Dispatcher<P: EventPolicy> {
    policy: P,
    handler: HandlerRef<P>,
    cfg: DispatcherConfig,
    call_timeout: Duration,
    replay: RwLock<ReplayStore<P::EventKey, P::Event>>,
    registry: Arc<ListenerRegistry<P::ListenerKey, P::Listener>>,
    monitor: Option<Arc<TimeoutMonitor<P::ListenerKey, P::Listener>>>,
    closed: AtomicBool,
}

impl<P: EventPolicy> Dispatcher<P> {
    /// Starts building a dispatcher around `policy`.
    pub fn builder(policy: P) -> DispatcherBuilder<P> {
        DispatcherBuilder::new(policy)
    }

    /// Assembles a dispatcher from validated parts (see [`DispatcherBuilder::build`]).
    pub(crate) fn new_internal(
        policy: P,
        handler: HandlerRef<P>,
        cfg: DispatcherConfig,
        call_timeout: Duration,
        monitor: Option<Arc<TimeoutMonitor<P::ListenerKey, P::Listener>>>,
    ) -> Self {
        Self {
            policy,
            handler,
            cfg,
            call_timeout,
            replay: RwLock::new(ReplayStore::new()),
            registry: ListenerRegistry::new(),
            monitor,
            closed: AtomicBool::new(false),
        }
    }

    /// Registers `listener` under `key` and replays every stored event to it.
    ///
    /// Resolves after the replay delivery. Live events dispatched meanwhile
    /// queue behind it.
    ///
    /// ### Errors
    /// - [`DispatchError::ListenerAlreadyRegistered`]: `key` is taken; nothing changed.
    /// - [`DispatchError::MissingReplayEvent`]: the policy produced no replay form; nothing registered.
    /// - [`DispatchError::Closed`]: closed and `registration_after_close` is off.
    pub async fn add_listener(
        &self,
        key: P::ListenerKey,
        listener: P::Listener,
    ) -> Result<(), DispatchError> {
        if self.is_closed() && !self.cfg.registration_after_close {
            return Err(DispatchError::Closed);
        }

        let entry = Arc::new(ListenerEntry::new(key, listener));
        let _replay_gate = entry.replay_guard().await;

        let replay = {
            let mut listeners = self.registry.write().await;
            listeners.vacant(entry.key())?;

            let store = self.replay.read().await;
            let events = store
                .replay_snapshot(|ev| self.policy.create_replay_event(ev))
                .map_err(|event_key| DispatchError::MissingReplayEvent {
                    event_key: format!("{event_key:?}"),
                })?;

            listeners.insert(Arc::clone(&entry));
            events
        };

        tracing::debug!(
            listener = ?entry.key(),
            replay = replay.len(),
            "listener registered"
        );

        for event in &replay {
            self.invoke(&entry, event).await;
        }
        Ok(())
    }

    /// Stores `event` for replay and delivers it to the current listeners.
    ///
    /// Replaces any stored event with the same key; the new one is ordered last.
    ///
    /// ### Errors
    /// - [`DispatchError::Closed`]: the dispatcher was closed; nothing changed.
    pub async fn dispatch_event(&self, event: P::Event) -> Result<(), DispatchError> {
        self.dispatch_internal(event, false).await
    }

    /// Delivers `event` to the current listeners and drops any stored event with its key.
    ///
    /// ### Errors
    /// - [`DispatchError::Closed`]: the dispatcher was closed; nothing changed.
    pub async fn dispatch_and_remove_event(&self, event: P::Event) -> Result<(), DispatchError> {
        self.dispatch_internal(event, true).await
    }

    /// Removes the stored event under `key`; returns whether one existed.
    ///
    /// Already registered listeners are unaffected.
    pub async fn remove_event(&self, key: &P::EventKey) -> bool {
        self.replay.write().await.remove(key)
    }

    /// Removes the listener under `key` (and its blacklist state); returns whether it existed.
    pub async fn remove_listener(&self, key: &P::ListenerKey) -> bool {
        self.registry.remove(key).await
    }

    /// Returns true while `key` has a live, blacklisted registration.
    pub async fn is_listener_blacklisted(&self, key: &P::ListenerKey) -> bool {
        self.registry.blacklist_reason(key).await.is_some()
    }

    /// Returns why `key` is blacklisted, if it is.
    pub async fn listener_blacklist_reason(&self, key: &P::ListenerKey) -> Option<BlacklistReason> {
        self.registry.blacklist_reason(key).await
    }

    /// Configured listener call timeout (`Duration::ZERO` = not enforced).
    pub fn listener_call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Registered listener keys, in registration order.
    pub async fn listener_keys(&self) -> Vec<P::ListenerKey> {
        self.registry.keys().await
    }

    /// Number of registered listeners, blacklisted ones included.
    pub async fn listener_count(&self) -> usize {
        self.registry.len().await
    }

    /// Keys of the stored (replayable) events, in store order.
    pub async fn stored_event_keys(&self) -> Vec<P::EventKey> {
        self.replay.read().await.keys()
    }

    /// Number of stored (replayable) events.
    pub async fn stored_event_count(&self) -> usize {
        self.replay.read().await.len()
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    /// Closes the dispatcher (idempotent).
    ///
    /// Subsequent dispatches fail with [`DispatchError::Closed`] and the timeout
    /// monitor stops. Removal stays legal; registration stays legal unless
    /// `registration_after_close` is off. Calls already in flight complete.
    pub fn close(&self) {
        if self.closed.swap(true, AtomicOrdering::AcqRel) {
            return;
        }
        if let Some(monitor) = &self.monitor {
            monitor.shutdown();
        }
        tracing::debug!("dispatcher closed");
    }

    /// Closes the dispatcher and waits until the timeout monitor thread has exited.
    pub async fn shutdown(&self) {
        self.close();
        if let Some(monitor) = &self.monitor {
            monitor.join();
        }
    }

    // ---------------------------
    // Internals
    // ---------------------------

    async fn dispatch_internal(
        &self,
        event: P::Event,
        remove_after_dispatch: bool,
    ) -> Result<(), DispatchError> {
        if self.is_closed() {
            return Err(DispatchError::Closed);
        }
        let key = self.policy.event_key(&event);

        let listeners = {
            let listeners = self.registry.read().await;
            let mut store = self.replay.write().await;
            if remove_after_dispatch {
                store.remove(&key);
            } else {
                store.store(key, event.clone());
            }
            listeners.snapshot()
        };

        for entry in &listeners {
            self.call_listener(entry, &event).await;
        }
        Ok(())
    }

    /// Live delivery: waits until the listener's replay is done, then invokes.
    async fn call_listener(&self, entry: &Arc<Entry<P>>, event: &P::Event) {
        let _gate = entry.call_guard().await;
        self.invoke(entry, event).await;
    }

    /// Invokes the listener; the caller holds `entry`'s gate.
    async fn invoke(&self, entry: &Arc<Entry<P>>, event: &P::Event) {
        if !self.registry.is_current(entry).await {
            return;
        }

        let outcome = {
            let _call = self
                .monitor
                .as_ref()
                .map(|m| m.start_call(entry));
            AssertUnwindSafe(self.policy.invoke_listener(entry.listener(), event))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ListenerError::from_panic(panic)))
        };

        if let Err(err) = outcome {
            self.report_failure(entry, event, err).await;
        }
    }

    /// Routes a failed call to the handler and applies the blacklist policy.
    async fn report_failure(&self, entry: &Entry<P>, event: &P::Event, err: ListenerError) {
        let handled = AssertUnwindSafe(self.handler.handle(entry.key(), event, &err))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ListenerError::from_panic(panic)));

        if self.cfg.blacklist.blacklists_on_error() {
            self.registry
                .blacklist(entry.key(), entry.id(), BlacklistReason::Error)
                .await;
        }

        if let Err(suppressed) = handled {
            let failure = HandlerFailure {
                primary: err,
                suppressed,
            };
            tracing::error!(
                listener = ?entry.key(),
                event = ?event,
                handler = self.handler.name(),
                error = %failure,
                "exception handler failed"
            );
        }
    }
}

impl<P: EventPolicy> Drop for Dispatcher<P> {
    fn drop(&mut self) {
        if let Some(monitor) = &self.monitor {
            monitor.shutdown();
        }
    }
}

impl<P: EventPolicy> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("call_timeout", &self.call_timeout)
            .field("blacklist", &self.cfg.blacklist)
            .field("monitor", &self.monitor.is_some())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
