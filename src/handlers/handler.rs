//! # Exception handler trait.
//!
//! Provides [`ExceptionHandler`] an extension point for reacting to listener
//! failures (reporting, metrics, alerting) without those failures ever
//! reaching the caller of a dispatch.
//!
//! ## Architecture
//! ```text
//! Dispatcher::call_listener ──► policy.invoke_listener() ──► Err / panic
//!                                                         └─► handler.handle(key, event, error)
//!                                                                  └─► Err / panic → logged as HandlerFailure
//! ```
//!
//! ## Rules
//! - Called inline, in the task that performed the failed call, while that
//!   call still holds the listener's gate (exclusively during replay).
//! - Errors and panics raised here are logged together with the original
//!   error and then dropped.
//! - Blacklisting is not the handler's job; see [`BlacklistPolicy`](crate::BlacklistPolicy).
//!
//! ## Example
//! ```rust
//! use std::sync::Mutex;
//! use async_trait::async_trait;
//! use replaybus::{ExceptionHandler, ListenerError};
//!
//! #[derive(Default)]
//! struct Collect(Mutex<Vec<String>>);
//!
//! #[async_trait]
//! impl ExceptionHandler<&'static str, i64> for Collect {
//!     async fn handle(
//!         &self,
//!         listener: &&'static str,
//!         _event: &i64,
//!         error: &ListenerError,
//!     ) -> Result<(), ListenerError> {
//!         self.0.lock().unwrap().push(format!("{listener}: {error}"));
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &'static str { "collect" }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ListenerError;

/// Receives errors raised by listener calls.
///
/// ### Implementation requirements
/// - Keep it short: the listener stays locked until the handler returns.
/// - Report problems by returning `Err`; do not panic.
#[async_trait]
pub trait ExceptionHandler<K, E>: Send + Sync + 'static
where
    K: Send + Sync,
    E: Send + Sync,
{
    /// Handles a failed call of listener `listener_key` with `event`.
    ///
    /// Returning `Err` marks the handler itself as failed; the dispatcher logs
    /// both errors and carries on.
    async fn handle(
        &self,
        listener_key: &K,
        event: &E,
        error: &ListenerError,
    ) -> Result<(), ListenerError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
