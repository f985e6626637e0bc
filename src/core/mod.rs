//! Dispatcher core: stores, locking protocol and listener health.
//!
//! This module contains the embedded implementation of the event bus.
//! The public API from this module is [`Dispatcher`], built through
//! [`DispatcherBuilder`] from a [`DispatcherConfig`].
//!
//! Internal modules:
//! - [`dispatcher`]: registration, dispatch and removal protocol;
//! - [`replay`]: latest event per key, converted to replay form once;
//! - [`registry`]: keyed listener entries with per-listener locks and blacklist state;
//! - [`monitor`]: background detection of overrunning listener calls;
//! - [`builder`]: validated construction, monitor startup;
//! - [`config`]: settings and sentinel helpers.

mod builder;
mod config;
mod dispatcher;
mod monitor;
mod registry;
mod replay;

pub use builder::DispatcherBuilder;
pub use config::{DEFAULT_LISTENER_CALL_TIMEOUT_MS, DispatcherConfig};
pub use dispatcher::{Dispatcher, HandlerRef};
