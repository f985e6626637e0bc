use std::sync::Arc;
use std::time::Duration;

use super::{
    config::DispatcherConfig,
    dispatcher::{Dispatcher, HandlerRef},
    monitor::TimeoutMonitor,
};
use crate::{
    error::DispatchError,
    handlers::LogHandler,
    policies::{BlacklistPolicy, EventPolicy},
};

/// Builder for constructing a Dispatcher with optional features.
pub struct DispatcherBuilder<P: EventPolicy> {
    policy: P,
    cfg: DispatcherConfig,
    handler: Option<HandlerRef<P>>,
}

impl<P: EventPolicy> DispatcherBuilder<P> {
    /// Creates a new builder with the default configuration.
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            cfg: DispatcherConfig::default(),
            handler: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, cfg: DispatcherConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the listener call timeout (`Duration::ZERO` disables the monitor).
    pub fn with_listener_call_timeout(mut self, timeout: Duration) -> Self {
        self.cfg = self.cfg.with_listener_call_timeout(timeout);
        self
    }

    /// Sets which listener failures blacklist a listener.
    pub fn with_blacklist_policy(mut self, policy: BlacklistPolicy) -> Self {
        self.cfg.blacklist = policy;
        self
    }

    /// Sets the handler that receives listener errors.
    ///
    /// Without one, errors are logged through [`LogHandler`].
    pub fn with_exception_handler(mut self, handler: HandlerRef<P>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Builds and returns the Dispatcher instance.
    ///
    /// This consumes the builder and initializes all runtime components:
    /// - Listener registry and replay store
    /// - Timeout monitor thread (only for a positive timeout)
    ///
    /// No tokio runtime is required to build; the monitor runs on its own thread.
    ///
    /// ### Errors
    /// - [`DispatchError::InvalidConfiguration`]: negative call timeout.
    /// - [`DispatchError::MonitorUnavailable`]: the monitor thread could not be started.
    pub fn build(self) -> Result<Arc<Dispatcher<P>>, DispatchError> {
        self.cfg.validate()?;
        let call_timeout = self.cfg.listener_call_timeout()?;

        let monitor = match self.cfg.monitor_timeout() {
            Some(timeout) => {
                let monitor = TimeoutMonitor::new(timeout);
                monitor
                    .spawn()
                    .map_err(|e| DispatchError::MonitorUnavailable {
                        reason: e.to_string(),
                    })?;
                Some(monitor)
            }
            None => None,
        };

        let handler = self
            .handler
            .unwrap_or_else(|| Arc::new(LogHandler::new()) as HandlerRef<P>);

        Ok(Arc::new(Dispatcher::new_internal(
            self.policy,
            handler,
            self.cfg,
            call_timeout,
            monitor,
        )))
    }
}
