//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path given with `-f`), then applies `JIMOTHY_BIND`,
//! `JIMOTHY_LOG_LEVEL` and `JIMOTHY_MODE` env overrides.
//!
//! Slack secrets (`SLACK_TOKEN`, `SLACK_OAUTH_TOKEN`) are only ever read from
//! the environment and are required: loading fails if either is missing.
//!
//! # Module layout
//!
//! - **types** — resolved configuration structs handed to the server.
//! - **raw** — TOML deserialization shapes with serde defaults; private.
//! - **load** — `load`, `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from, Overrides, Secrets};
pub use types::*;

#[cfg(test)]
impl Config {
    /// Safe `Config` for unit tests — fixed tokens, no external calls.
    pub fn test_default() -> Self {
        Self {
            server: ServerConfig {
                bind: raw::default_bind(),
                log_level: "info".into(),
                log_file: None,
                mode: crate::slack::BuildMode::Development,
            },
            slack: SlackConfig {
                api_base_url: "http://127.0.0.1:0/api".into(),
                timeout_seconds: 1,
                verification_token: "T".into(),
                oauth_token: "xoxb-test".into(),
            },
        }
    }
}
