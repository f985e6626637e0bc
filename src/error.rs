//! Error types used by the dispatcher and by listener calls.
//!
//! This module defines three types:
//!
//! - [`DispatchError`]: errors returned to the direct caller of a dispatcher operation.
//! - [`ListenerError`]: errors raised by a listener call (returned or panicked).
//! - [`HandlerFailure`]: a listener error whose exception handler failed too.
//!
//! Only [`DispatchError`] ever crosses the dispatcher API boundary. Listener and
//! handler failures are caught at the call site and are observable through logs
//! and [`Dispatcher::is_listener_blacklisted`](crate::Dispatcher::is_listener_blacklisted).

use thiserror::Error;

/// # Errors produced by dispatcher operations.
///
/// These represent conditions the caller can act on: a registration conflict,
/// a dispatch after shutdown, or a construction that cannot proceed.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A listener with the same key is already registered.
    #[error("listener {listener} is already registered")]
    ListenerAlreadyRegistered {
        /// Debug rendering of the conflicting listener key.
        listener: String,
    },

    /// The dispatcher was closed; no further events are accepted.
    #[error("dispatcher is closed")]
    Closed,

    /// Construction parameters are invalid (e.g. a negative call timeout).
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// The event policy did not produce a replay form for a stored event.
    #[error("event policy returned no replay event for key {event_key}")]
    MissingReplayEvent {
        /// Debug rendering of the stored event's key.
        event_key: String,
    },

    /// The operating system refused to start the timeout monitor thread.
    #[error("failed to start timeout monitor: {reason}")]
    MonitorUnavailable {
        /// Error reported by the thread spawn.
        reason: String,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use replaybus::DispatchError;
    ///
    /// assert_eq!(DispatchError::Closed.as_label(), "dispatcher_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::ListenerAlreadyRegistered { .. } => "listener_already_registered",
            DispatchError::Closed => "dispatcher_closed",
            DispatchError::InvalidConfiguration { .. } => "invalid_configuration",
            DispatchError::MissingReplayEvent { .. } => "missing_replay_event",
            DispatchError::MonitorUnavailable { .. } => "monitor_unavailable",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            DispatchError::ListenerAlreadyRegistered { listener } => {
                format!("duplicate listener key: {listener}")
            }
            DispatchError::Closed => "dispatch rejected: dispatcher closed".to_string(),
            DispatchError::InvalidConfiguration { reason } => format!("configuration: {reason}"),
            DispatchError::MissingReplayEvent { event_key } => {
                format!("no replay event for key={event_key}")
            }
            DispatchError::MonitorUnavailable { reason } => format!("monitor thread: {reason}"),
        }
    }

    pub(crate) fn already_registered(listener: &impl std::fmt::Debug) -> Self {
        DispatchError::ListenerAlreadyRegistered {
            listener: format!("{listener:?}"),
        }
    }
}

/// # Errors raised by a single listener call.
///
/// Returned by [`EventPolicy::invoke_listener`](crate::EventPolicy::invoke_listener)
/// or synthesized by the dispatcher when the call panics. Routed to the
/// [`ExceptionHandler`](crate::ExceptionHandler), never to the dispatch caller.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The listener reported a failure.
    #[error("listener failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The listener panicked; the panic was caught at the call site.
    #[error("listener panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text, when it was a string.
        info: String,
    },
}

impl ListenerError {
    /// Shorthand for [`ListenerError::Failed`].
    ///
    /// # Example
    /// ```
    /// use replaybus::ListenerError;
    ///
    /// let err = ListenerError::fail("Dropped");
    /// assert_eq!(err.to_string(), "listener failed: Dropped");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        ListenerError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Failed { .. } => "listener_failed",
            ListenerError::Panicked { .. } => "listener_panicked",
        }
    }

    /// Builds a [`ListenerError::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let info = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ListenerError::Panicked { info }
    }
}

/// # A listener failure whose exception handler failed as well.
///
/// `primary` is the listener's error; `suppressed` is what the handler raised
/// while processing it. The dispatcher only logs this value; the suppressed
/// error never changes control flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{primary} (exception handler failed: {suppressed})")]
pub struct HandlerFailure {
    /// Error raised by the listener call.
    pub primary: ListenerError,
    /// Error raised by the exception handler while handling `primary`.
    #[source]
    pub suppressed: ListenerError,
}
