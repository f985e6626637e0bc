//! # Dispatcher configuration.
//!
//! Provides [`DispatcherConfig`] centralized settings for a [`Dispatcher`](crate::Dispatcher).
//!
//! Config is consumed once, by [`DispatcherBuilder::build`](crate::DispatcherBuilder::build),
//! which validates it and decides whether the timeout monitor is started.
//!
//! ## Sentinel values
//! - `listener_call_timeout_ms = 0` → no timeout enforcement (monitor not started)
//! - `listener_call_timeout_ms < 0` → invalid, `build()` fails

use std::time::Duration;

use crate::error::DispatchError;
use crate::policies::BlacklistPolicy;

/// Default listener call timeout in milliseconds.
pub const DEFAULT_LISTENER_CALL_TIMEOUT_MS: i64 = 5_000;

/// Configuration for a dispatcher.
///
/// Defines:
/// - **Health monitoring**: listener call timeout
/// - **Failure reaction**: which failures blacklist a listener
/// - **Shutdown boundary**: whether registration stays legal after `close()`
///
/// ## Field semantics
/// - `listener_call_timeout_ms`: Max duration of one listener call (`0` = unlimited, negative = invalid)
/// - `blacklist`: Blacklisting trigger (timeout only by default)
/// - `registration_after_close`: Accept `add_listener` after `close()` (`true` by default)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Maximum duration of a single listener call, in milliseconds.
    ///
    /// - `0` = no timeout; a hung listener blocks the dispatch that called it
    /// - `n > 0` = a call running longer than `n` ms blacklists its listener
    ///
    /// Signed so that a negative value can be rejected at construction.
    pub listener_call_timeout_ms: i64,

    /// Which listener failures blacklist the listener.
    pub blacklist: BlacklistPolicy,

    /// Whether `add_listener` is still accepted after `close()`.
    ///
    /// Event dispatch is always rejected after close; removals are always accepted.
    pub registration_after_close: bool,
}

impl DispatcherConfig {
    /// Returns the validated listener call timeout.
    ///
    /// Fails with [`DispatchError::InvalidConfiguration`] for negative values.
    pub fn listener_call_timeout(&self) -> Result<Duration, DispatchError> {
        u64::try_from(self.listener_call_timeout_ms)
            .map(Duration::from_millis)
            .map_err(|_| DispatchError::InvalidConfiguration {
                reason: format!(
                    "listener call timeout must not be negative, got {}ms",
                    self.listener_call_timeout_ms
                ),
            })
    }

    /// Returns the timeout the monitor should enforce as an `Option`.
    ///
    /// - `None` → no monitor (zero or invalid timeout)
    /// - `Some(d)` → calls longer than `d` blacklist their listener
    #[inline]
    pub fn monitor_timeout(&self) -> Option<Duration> {
        self.listener_call_timeout()
            .ok()
            .filter(|d| *d > Duration::ZERO)
    }

    /// Checks every field; used by the builder before anything is allocated.
    pub fn validate(&self) -> Result<(), DispatchError> {
        self.listener_call_timeout().map(|_| ())
    }

    /// Returns a copy with the timeout set from a [`Duration`] (saturating).
    pub fn with_listener_call_timeout(mut self, timeout: Duration) -> Self {
        self.listener_call_timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        self
    }
}

impl Default for DispatcherConfig {
    /// Default configuration:
    ///
    /// - `listener_call_timeout_ms = 5000`
    /// - `blacklist = BlacklistPolicy::TimeoutOnly`
    /// - `registration_after_close = true`
    fn default() -> Self {
        Self {
            listener_call_timeout_ms: DEFAULT_LISTENER_CALL_TIMEOUT_MS,
            blacklist: BlacklistPolicy::default(),
            registration_after_close: true,
        }
    }
}
