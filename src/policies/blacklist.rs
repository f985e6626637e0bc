//! # Blacklist policy for misbehaving listeners.
//!
//! [`BlacklistPolicy`] decides which listener failures take a listener out of
//! rotation. A blacklisted listener stays registered but receives no further
//! live or replayed events until it is removed; re-registering under the same
//! key starts clean.
//!
//! - [`BlacklistPolicy::TimeoutOnly`] only a call overrunning the configured timeout blacklists (default).
//! - [`BlacklistPolicy::OnTimeoutOrError`] a failed or panicking call blacklists as well.
//!
//! ## Choosing the right policy
//! ```text
//! Listener errors are expected and transient   → TimeoutOnly
//! Any listener error means the listener is bad → OnTimeoutOrError
//! ```
//!
//! With a zero call timeout the monitor is not running, so `TimeoutOnly`
//! never blacklists anything.

use std::fmt;

/// Policy controlling which listener failures lead to blacklisting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlacklistPolicy {
    /// Only timeout overruns blacklist (default).
    #[default]
    TimeoutOnly,
    /// Timeout overruns and listener errors (including panics) blacklist.
    OnTimeoutOrError,
}

impl BlacklistPolicy {
    /// Returns true if a failed listener call should blacklist the listener.
    #[inline]
    pub fn blacklists_on_error(self) -> bool {
        matches!(self, BlacklistPolicy::OnTimeoutOrError)
    }
}

/// Why a listener was blacklisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlacklistReason {
    /// A call exceeded the listener call timeout.
    Timeout,
    /// A call failed or panicked under [`BlacklistPolicy::OnTimeoutOrError`].
    Error,
}

impl BlacklistReason {
    /// Returns the cause as used in log fields (`"timeout"` / `"error"`).
    pub fn as_str(self) -> &'static str {
        match self {
            BlacklistReason::Timeout => "timeout",
            BlacklistReason::Error => "error",
        }
    }
}

impl fmt::Display for BlacklistReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
