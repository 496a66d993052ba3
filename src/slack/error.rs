//! Slack domain errors.

use std::collections::BTreeSet;

use thiserror::Error;

use super::trace::{DomainError, Failure};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlackError {
    #[error("Invalid token")]
    InvalidToken,

    #[error(
        "Invalid channel `{channel}`. Command should be invoked from one of these channels:\n{}",
        bullet_list(.allowed)
    )]
    InvalidChannel {
        channel: String,
        allowed: BTreeSet<String>,
    },

    #[error("Missing parameter for `{key}`")]
    MissingParameter { key: String },

    #[error("Invalid parameter `{value}` for `{key}`. Expected {expected}.")]
    InvalidParameter {
        key: String,
        value: String,
        expected: String,
    },

    /// The Web API answered with `ok: false`.
    #[error("Slack API error: {0}")]
    Api(String),
}

fn bullet_list(items: &BTreeSet<String>) -> String {
    items
        .iter()
        .map(|item| format!("* `{item}`"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl DomainError for SlackError {
    fn domain(&self) -> &'static str {
        "slack"
    }

    fn identifier(&self) -> &'static str {
        match self {
            SlackError::InvalidToken => "invalid_token",
            SlackError::InvalidChannel { .. } => "invalid_channel",
            SlackError::MissingParameter { .. } => "missing_parameter",
            SlackError::InvalidParameter { .. } => "invalid_parameter",
            SlackError::Api(_) => "api",
        }
    }

    fn reason(&self) -> String {
        self.to_string()
    }
}

impl From<SlackError> for Failure {
    fn from(e: SlackError) -> Self {
        Failure::domain(e)
    }
}
