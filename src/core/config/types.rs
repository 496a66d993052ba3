//! Resolved configuration types.

use std::path::PathBuf;

use crate::slack::BuildMode;

/// HTTP listener and process-wide settings (`[server]`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the webhook listens on.
    pub bind: String,
    pub log_level: String,
    /// Append logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    /// Whether error responses carry source locations.
    pub mode: BuildMode,
}

/// Slack platform settings (`[slack]` plus env secrets).
#[derive(Clone)]
pub struct SlackConfig {
    /// Base URL of the Web API, without a trailing slash.
    pub api_base_url: String,
    /// Per-request timeout for outbound calls.
    pub timeout_seconds: u64,
    /// Verification token from `SLACK_TOKEN`. Never sourced from TOML.
    pub verification_token: String,
    /// Bot OAuth token from `SLACK_OAUTH_TOKEN`. Never sourced from TOML.
    pub oauth_token: String,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("api_base_url", &self.api_base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("verification_token", &"<redacted>")
            .field("oauth_token", &"<redacted>")
            .finish()
    }
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub slack: SlackConfig,
}
