//! # LogHandler: default exception handler
//!
//! Writes every listener failure to the `tracing` error stream. Used when a
//! dispatcher is built without an explicit [`ExceptionHandler`].
//!
//! ## Example output
//! ```text
//! ERROR replaybus::handlers::log: listener call failed listener="audit" event=4 label="listener_failed" error=listener failed: disk full
//! ```

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::ListenerError;
use crate::handlers::ExceptionHandler;

/// Exception handler that logs and never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogHandler;

impl LogHandler {
    /// Construct a new [`LogHandler`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<K, E> ExceptionHandler<K, E> for LogHandler
where
    K: Debug + Send + Sync + 'static,
    E: Debug + Send + Sync + 'static,
{
    async fn handle(
        &self,
        listener_key: &K,
        event: &E,
        error: &ListenerError,
    ) -> Result<(), ListenerError> {
        tracing::error!(
            listener = ?listener_key,
            event = ?event,
            label = error.as_label(),
            error = %error,
            "listener call failed"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LogHandler"
    }
}
