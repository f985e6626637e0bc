//! # Listener failure handling.
//!
//! This module provides the [`ExceptionHandler`] trait and the default
//! [`LogHandler`] used when a dispatcher is built without one.
//!
//! ## Architecture
//! ```text
//! listener call ──► Err / panic ──► ExceptionHandler::handle(&key, &event, &error)
//!                                        │
//!                                   ┌────┴─────┬──────────┐
//!                                   ▼          ▼          ▼
//!                               LogHandler  Metrics    Custom ...
//! ```

mod handler;
mod log;

pub use handler::ExceptionHandler;
pub use log::LogHandler;
