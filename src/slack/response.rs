//! Wire shapes exchanged with Slack.
//!
//! [`Response`] answers a slash-command request (directly, or later via the
//! invocation's `response_url`). [`Message`] is a proactive post through
//! `chat.postMessage` and never answers a request.

use serde::{Deserialize, Serialize};

use super::trace::{BuildMode, TracedError};

/// Who sees a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only the user who triggered the command.
    #[default]
    Ephemeral,
    /// Every member of the channel the command was triggered in.
    InChannel,
}

/// Reply to a slash-command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub text: String,
    pub attachments: Option<Vec<Attachment>>,
    #[serde(rename = "response_type")]
    pub visibility: Visibility,
}

impl Response {
    /// Private response with no attachments.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: None,
            visibility: Visibility::Ephemeral,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Private, error-styled response for a translated failure.
    ///
    /// The text is whatever the error renders to for the current build mode.
    /// Only development builds label the attachment with the identifier;
    /// production shows [`FAILURE_LABEL`] so no internal names reach users.
    pub fn error(error: &TracedError, mode: BuildMode) -> Self {
        let label = match mode {
            BuildMode::Development => error.identifier(),
            BuildMode::Production => FAILURE_LABEL,
        };
        Self::new(error.to_string()).with_attachments(vec![Attachment::error(label)])
    }
}

/// Proactive post to a channel through the Web API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "channel")]
    pub channel_id: String,
    pub text: String,
    pub attachments: Option<Vec<Attachment>>,
}

impl Message {
    pub fn new(channel_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            text: text.into(),
            attachments: None,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = Some(attachments);
        self
    }
}

pub const SUCCESS_COLOR: &str = "36a64f";
pub const WARNING_COLOR: &str = "fff000";
pub const ERROR_COLOR: &str = "ff0000";

/// Attachment text of error responses in production builds.
pub const FAILURE_LABEL: &str = "Command failed";

/// Coloured side-block rendered under a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub text: String,
    pub color: String,
}

impl Attachment {
    pub fn new(text: impl Into<String>, color: impl Into<String>) -> Self {
        Self { text: text.into(), color: color.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(text, SUCCESS_COLOR)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, WARNING_COLOR)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, ERROR_COLOR)
    }
}
