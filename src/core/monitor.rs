//! # Timeout monitor: detects listener calls that overrun the call timeout.
//!
//! One dedicated thread per dispatcher (started only for a positive timeout)
//! watches in-flight listener calls and blacklists the listener of any call
//! that runs longer than the configured timeout. Running outside the async
//! runtime means a listener that blocks its executor thread is still caught.
//!
//! ## Architecture
//! ```text
//! Dispatcher::invoke ── start_call(entry) ──► VecDeque<CallRecord>  (FIFO by start)
//!        │                                          ▲
//!        └── CallGuard dropped ── call_ended(id) ───┘
//!
//! run() on "replaybus-monitor":
//!   loop {
//!     ├─ queue empty         → Idle:   wait on condvar
//!     ├─ front not yet due   → Armed:  wait on condvar until the deadline
//!     └─ front due           → Blacklisting: pop record, entry.blacklist(Timeout)
//!   }
//!   token cancelled → Stopped
//! ```
//!
//! ## Rules
//! - All calls share one timeout, so the earliest-started record always has
//!   the earliest deadline; only the front of the queue is inspected.
//! - Every wake-up re-reads the queue: spurious and stale wake-ups are harmless.
//! - The due check and the removal happen under one queue lock, so a call that
//!   ends concurrently is never blacklisted after it was removed.
//! - The blacklist action only flips a flag on the exact registration that made
//!   the call; the monitor never waits on a listener or on the registry.
//! - A running call is never cancelled; its listener is only excluded from now on.

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::core::registry::ListenerEntry;
use crate::policies::BlacklistReason;

/// Upper bound for the enforced timeout; keeps `started + timeout` from overflowing.
const MAX_TIMEOUT: Duration = Duration::from_secs(86_400 * 365 * 30);

/// One in-flight listener call.
struct CallRecord<K, L> {
    /// Monitor-local id, returned to the caller through [`CallGuard`].
    id: u64,
    /// Registration that is being called.
    entry: Arc<ListenerEntry<K, L>>,
    /// When the call started.
    started: Instant,
}

/// Watches listener calls and blacklists overrunning listeners.
pub(crate) struct TimeoutMonitor<K, L> {
    timeout: Duration,
    calls: Mutex<VecDeque<CallRecord<K, L>>>,
    next_id: AtomicU64,
    wake: Condvar,
    token: CancellationToken,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<K, L> TimeoutMonitor<K, L>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    L: Send + Sync + 'static,
{
    /// Creates a stopped monitor; call [`spawn`](Self::spawn) to start it.
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            timeout: timeout.min(MAX_TIMEOUT),
            calls: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(0),
            wake: Condvar::new(),
            token: CancellationToken::new(),
            thread: Mutex::new(None),
        })
    }

    /// Starts the monitor loop on its own thread.
    pub fn spawn(self: &Arc<Self>) -> std::io::Result<()> {
        let me = Arc::clone(self);
        let join = thread::Builder::new()
            .name("replaybus-monitor".into())
            .spawn(move || me.run())?;
        *self.thread.lock() = Some(join);
        Ok(())
    }

    /// Records the start of a call; the record lives as long as the returned guard.
    pub fn start_call(self: &Arc<Self>, entry: &Arc<ListenerEntry<K, L>>) -> CallGuard<K, L> {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let was_idle = {
            let mut calls = self.calls.lock();
            let was_idle = calls.is_empty();
            calls.push_back(CallRecord {
                id,
                entry: Arc::clone(entry),
                started: Instant::now(),
            });
            was_idle
        };
        if was_idle {
            self.wake.notify_one();
        }
        CallGuard {
            monitor: Arc::clone(self),
            id,
        }
    }

    /// Forgets the record `id`; no-op if the monitor already fired for it.
    fn call_ended(&self, id: u64) {
        let mut calls = self.calls.lock();
        if let Some(pos) = calls.iter().position(|c| c.id == id) {
            calls.remove(pos);
        }
    }

    /// Stops the loop (idempotent). A parked loop wakes up immediately.
    pub fn shutdown(&self) {
        self.token.cancel();
        // Notify under the queue lock so the wake-up cannot slip in between
        // the loop's cancellation check and its wait.
        let _calls = self.calls.lock();
        self.wake.notify_all();
    }

    /// Waits for the loop thread to exit after [`shutdown`](Self::shutdown).
    ///
    /// The loop never waits on listener code, so this returns promptly.
    pub fn join(&self) {
        let join = self.thread.lock().take();
        if let Some(join) = join {
            let _ = join.join();
        }
    }

    /// Returns true once the loop thread has exited (or was never started).
    #[cfg(test)]
    pub fn is_stopped(&self) -> bool {
        self.thread.lock().as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Number of calls currently tracked.
    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn run(self: Arc<Self>) {
        tracing::debug!(timeout = ?self.timeout, "timeout monitor started");

        let mut calls = self.calls.lock();
        while !self.token.is_cancelled() {
            let now = Instant::now();
            match calls.front().map(|c| c.started + self.timeout) {
                None => self.wake.wait(&mut calls),
                Some(deadline) if deadline > now => {
                    self.wake.wait_until(&mut calls, deadline);
                }
                Some(_) => {
                    if let Some(call) = calls.pop_front() {
                        MutexGuard::unlocked(&mut calls, || self.expire(call));
                    }
                }
            }
        }
        drop(calls);

        tracing::debug!("timeout monitor stopped");
    }

    fn expire(&self, call: CallRecord<K, L>) {
        tracing::debug!(
            listener = ?call.entry.key(),
            elapsed = ?call.started.elapsed(),
            "listener call timed out"
        );
        call.entry.blacklist(BlacklistReason::Timeout);
    }
}

/// Keeps a call record alive; dropping it ends the call.
///
/// Dropping also covers a dispatch future that is itself dropped mid-call.
pub(crate) struct CallGuard<K, L>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    L: Send + Sync + 'static,
{
    monitor: Arc<TimeoutMonitor<K, L>>,
    id: u64,
}

impl<K, L> Drop for CallGuard<K, L>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    L: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.monitor.call_ended(self.id);
    }
}
