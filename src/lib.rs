//! Jimothy — a Slack slash-command webhook.
//!
//! Library root; the binary entry point is `src/main.rs`. Exposed as a
//! library so integration tests can drive the router directly.

pub mod bootstrap;
pub mod commands;
pub mod core;
pub mod server;
pub mod slack;

pub use self::bootstrap::logger;
pub use self::core::{config, error};
