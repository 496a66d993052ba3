//! Application-wide error types.
//!
//! These cover process-level failures only (startup, config, listener).
//! Failures inside a command invocation travel as
//! [`crate::slack::Failure`] and never reach this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("server error: {0}")]
    Server(String),
}
