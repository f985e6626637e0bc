//! Event and blacklist policies.
//!
//! This module groups the knobs that define **what** the dispatcher moves
//! around and **when** it stops calling a listener.
//!
//! ## Contents
//! - [`EventPolicy`]     event keys, replay transform, listener invocation
//! - [`BlacklistPolicy`] which failures take a listener out of rotation
//! - [`BlacklistReason`] why a given listener was blacklisted
//!
//! ## Quick wiring
//! ```text
//! DispatcherBuilder::new(policy: impl EventPolicy)
//!      └─► core::dispatcher::Dispatcher uses:
//!           - policy.event_key(&event)          to replace stored events
//!           - policy.create_replay_event(&ev)   once per stored event, on first registration
//!           - policy.invoke_listener(&l, &ev)   for every live and replayed call
//!           - cfg.blacklist                     to react to failed calls
//! ```
//!
//! ## Defaults
//! - `BlacklistPolicy::TimeoutOnly`: errors are reported, only overruns blacklist.

mod blacklist;
mod event;

pub use blacklist::{BlacklistPolicy, BlacklistReason};
pub use event::EventPolicy;
