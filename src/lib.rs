//! # replaybus
//!
//! **replaybus** is an in-process event dispatcher with replay for late listeners.
//!
//! Every dispatched event is delivered to the listeners registered at that
//! moment, and the latest event per key is kept so that a listener registering
//! later receives it first (in "replay form"). Components can be wired together
//! without asking "has the interesting event already happened?".
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   dispatch_event(e)          add_listener(key, l)          remove_*(key)
//!          │                          │                            │
//!          ▼                          ▼                            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher                                                       │
//! │  - EventPolicy     (event keys, replay transform, invocation)     │
//! │  - ReplayStore     (latest event per key, arrival order)          │
//! │  - ListenerRegistry(entries + per-listener gate + blacklist flag) │
//! │  - ExceptionHandler(listener errors; LogHandler by default)       │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ listener │       │ listener │       │ listener │   replay first, then live calls
//!   │   "a"    │       │   "b"    │       │   "c"    │
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        │ start/end        │                  │
//!        ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TimeoutMonitor (own thread, only for a positive timeout)         │
//! │  call overran listener_call_timeout ──► blacklist(listener)       │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle of a listener
//! ```text
//! add_listener ──► replay stored events (replay form, store order)
//!              ──► live events (original form, dispatch order)
//!                    ├─ Err / panic ─► ExceptionHandler  (blacklist only with OnTimeoutOrError)
//!                    └─ overrun     ─► blacklisted: skipped from now on, still registered
//! remove_listener ──► entry and blacklist state dropped; the key can be registered again
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                        |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------|
//! | **Dispatch**      | Live delivery plus replay of the latest event per key.        | [`Dispatcher`]                            |
//! | **Policies**      | Domain meaning of events/listeners; blacklist trigger.        | [`EventPolicy`], [`BlacklistPolicy`]      |
//! | **Failures**      | Listener errors routed away from the dispatching caller.      | [`ExceptionHandler`], [`LogHandler`]      |
//! | **Errors**        | Typed errors for the caller-visible conditions.               | [`DispatchError`], [`ListenerError`]      |
//! | **Configuration** | Call timeout, blacklist policy, close semantics.              | [`DispatcherConfig`], [`DispatcherBuilder`] |
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use async_trait::async_trait;
//! use replaybus::{Dispatcher, EventPolicy, ListenerError};
//!
//! type Sink = Arc<Mutex<Vec<i64>>>;
//!
//! struct Negate;
//!
//! #[async_trait]
//! impl EventPolicy for Negate {
//!     type Event = i64;
//!     type EventKey = i64;
//!     type Listener = Sink;
//!     type ListenerKey = &'static str;
//!
//!     fn event_key(&self, event: &i64) -> i64 { event.abs() }
//!     fn create_replay_event(&self, original: &i64) -> Option<i64> { Some(-original) }
//!
//!     async fn invoke_listener(&self, sink: &Sink, event: &i64) -> Result<(), ListenerError> {
//!         sink.lock().unwrap().push(*event);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Dispatcher::builder(Negate).build()?;
//!
//!     bus.dispatch_event(1).await?;
//!     bus.dispatch_event(2).await?;
//!     bus.dispatch_event(3).await?;
//!     bus.remove_event(&2).await;
//!
//!     let sink = Sink::default();
//!     bus.add_listener("late", sink.clone()).await?;
//!     bus.dispatch_event(4).await?;
//!
//!     assert_eq!(*sink.lock().unwrap(), vec![-1, -3, 4]);
//!
//!     bus.shutdown().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod handlers;
mod policies;

// ---- Public re-exports ----

pub use core::{
    DEFAULT_LISTENER_CALL_TIMEOUT_MS, Dispatcher, DispatcherBuilder, DispatcherConfig, HandlerRef,
};
pub use error::{DispatchError, HandlerFailure, ListenerError};
pub use handlers::{ExceptionHandler, LogHandler};
pub use policies::{BlacklistPolicy, BlacklistReason, EventPolicy};
