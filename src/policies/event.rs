//! # Event policy: the domain half of the dispatcher.
//!
//! [`EventPolicy`] tells the dispatcher everything it needs to know about the
//! events and listeners it moves around, without the core ever inspecting them:
//! - [`EventPolicy::event_key`] which stored event a new one replaces;
//! - [`EventPolicy::create_replay_event`] how a stored event looks when replayed;
//! - [`EventPolicy::invoke_listener`] how a listener is actually called.
//!
//! ## Rules
//! - `event_key` must be pure and deterministic: equal keys mean "replaces".
//! - `create_replay_event` is called at most once per stored event, the first
//!   time a registrant observes it. Returning `None` fails that registration
//!   with [`DispatchError::MissingReplayEvent`](crate::DispatchError::MissingReplayEvent).
//! - `invoke_listener` should only forward; errors and panics are routed to the
//!   [`ExceptionHandler`](crate::ExceptionHandler), never to the dispatch caller.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use replaybus::{EventPolicy, ListenerError};
//!
//! type Sink = Arc<dyn Fn(i64) + Send + Sync>;
//!
//! /// Integer events keyed by their absolute value; replays are negated.
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
//!
//!     fn create_replay_event(&self, original: &i64) -> Option<i64> { Some(-original) }
//!
//!     async fn invoke_listener(&self, listener: &Sink, event: &i64) -> Result<(), ListenerError> {
//!         listener(*event);
//!         Ok(())
//!     }
//! }
//!
//! assert_eq!(Negate.event_key(&-3), 3);
//! assert_eq!(Negate.create_replay_event(&3), Some(-3));
//! ```

use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;

use crate::error::ListenerError;

/// Domain policy plugged into a [`Dispatcher`](crate::Dispatcher).
///
/// ### Implementation requirements
/// - Keys must hash and compare consistently (`Eq + Hash`).
/// - `Debug` on events and keys is used for logging only.
/// - `invoke_listener` runs inline in the dispatching task; slow listeners
///   stall that dispatch (and trip the call timeout, when configured).
#[async_trait]
pub trait EventPolicy: Send + Sync + 'static {
    /// Event payload. Cloned into the replay store on dispatch.
    type Event: Clone + Debug + Send + Sync + 'static;
    /// Identity of an event for replacement in the replay store.
    type EventKey: Eq + Hash + Clone + Debug + Send + Sync + 'static;
    /// Listener handle stored for the lifetime of its registration.
    type Listener: Send + Sync + 'static;
    /// Identity of a registration.
    type ListenerKey: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    /// Derives the replacement key of `event`.
    fn event_key(&self, event: &Self::Event) -> Self::EventKey;

    /// Builds the replay form of a stored event.
    ///
    /// Return a clone of `original` when replayed and live events look the same.
    fn create_replay_event(&self, original: &Self::Event) -> Option<Self::Event>;

    /// Forwards `event` to `listener`.
    async fn invoke_listener(
        &self,
        listener: &Self::Listener,
        event: &Self::Event,
    ) -> Result<(), ListenerError>;
}
