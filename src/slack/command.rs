//! Slash commands, their invocation metadata, and sub-command resolution.
//!
//! A [`Command`] is built once at startup and shared read-only between
//! concurrent invocations. Sub-commands are selected by the first word of
//! the invocation text; the remaining words are handed to the sub-command
//! as its own text.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use super::response::Response;
use super::service::SlackService;
use super::trace::Failure;

// ── Metadata ──────────────────────────────────────────────────────────────────

/// One incoming invocation, as posted by Slack.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawMetadata")]
pub struct Metadata {
    token: String,
    channel_name: String,
    command: String,
    text: String,
    words: Vec<String>,
    response_url: Option<String>,
}

#[derive(Deserialize)]
struct RawMetadata {
    token: String,
    channel_name: String,
    command: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    response_url: Option<String>,
}

impl From<RawMetadata> for Metadata {
    fn from(raw: RawMetadata) -> Self {
        Metadata::new(raw.token, raw.channel_name, raw.command, raw.text, raw.response_url)
    }
}

impl Metadata {
    pub fn new(
        token: impl Into<String>,
        channel_name: impl Into<String>,
        command: impl Into<String>,
        text: impl Into<String>,
        response_url: Option<String>,
    ) -> Self {
        let text = text.into();
        let words = text.split_whitespace().map(str::to_string).collect();
        Self {
            token: token.into(),
            channel_name: channel_name.into(),
            command: command.into(),
            text,
            words,
            response_url: response_url.filter(|url| !url.is_empty()),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whitespace-separated words of [`Metadata::text`], in order.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn response_url(&self) -> Option<&str> {
        self.response_url.as_deref()
    }

    /// Drop the first word; everything else carries over unchanged.
    fn shifted(&self) -> Self {
        Metadata::new(
            self.token.clone(),
            self.channel_name.clone(),
            self.command.clone(),
            self.words.iter().skip(1).cloned().collect::<Vec<_>>().join(" "),
            self.response_url.clone(),
        )
    }
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// Boxed future returned by a command handler.
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<Response, Failure>> + Send + 'static>>;

/// Type-erased command handler.
pub type Handler = Arc<dyn Fn(Metadata, CommandContext) -> HandlerFuture + Send + Sync>;

/// What a handler gets besides the invocation itself.
#[derive(Clone)]
pub struct CommandContext {
    pub slack: SlackService,
}

// ── Command ───────────────────────────────────────────────────────────────────

pub struct Command {
    name: String,
    base_help: String,
    help: String,
    allowed_channels: BTreeSet<String>,
    sub_commands: Vec<Command>,
    handler: Handler,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("allowed_channels", &self.allowed_channels)
            .field("sub_commands", &self.sub_commands)
            .finish_non_exhaustive()
    }
}

/// Outcome of matching an invocation against a command tree.
pub enum Resolution<'a> {
    /// Answer with this help text; no handler runs.
    Help(&'a str),
    /// Run `command`'s handler with `metadata` (text already reduced past
    /// any sub-command names).
    Run {
        command: &'a Command,
        metadata: Metadata,
    },
}

impl Command {
    pub fn new<F, Fut>(name: impl Into<String>, help: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Metadata, CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Failure>> + Send + 'static,
    {
        let help = help.into();
        Self {
            name: name.into(),
            base_help: help.clone(),
            help,
            allowed_channels: BTreeSet::new(),
            sub_commands: Vec::new(),
            handler: Arc::new(move |metadata, ctx| Box::pin(handler(metadata, ctx))),
        }
    }

    /// Restrict the command to these channels. Empty means everywhere.
    pub fn allowed_in<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Attach sub-commands and append their index to the help text.
    pub fn with_sub_commands(mut self, sub_commands: Vec<Command>) -> Self {
        self.sub_commands = sub_commands;
        self.help = if self.sub_commands.is_empty() {
            self.base_help.clone()
        } else {
            let index = self
                .sub_commands
                .iter()
                .map(|sub| format!("- {}", sub.name))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "{}\n\nSub-commands:\n{index}\n\nRun `/{} <sub-command> help` for help on a sub-command.",
                self.base_help, self.name
            )
        };
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn allowed_channels(&self) -> &BTreeSet<String> {
        &self.allowed_channels
    }

    pub fn sub_commands(&self) -> &[Command] {
        &self.sub_commands
    }

    pub fn allows_channel(&self, channel: &str) -> bool {
        self.allowed_channels.is_empty() || self.allowed_channels.contains(channel)
    }

    /// Walk the sub-command tree for `metadata`.
    ///
    /// A sub-command matches only when it equals the first word exactly, so
    /// `deploying` never selects `deploy`.
    pub fn resolve(&self, metadata: Metadata) -> Resolution<'_> {
        if metadata.text() == "help" {
            return Resolution::Help(&self.help);
        }

        let matched = metadata
            .words()
            .first()
            .and_then(|first| self.sub_commands.iter().find(|sub| sub.name == *first));

        match matched {
            None => Resolution::Run { command: self, metadata },
            Some(sub) if metadata.words().get(1).map(String::as_str) == Some("help") => {
                Resolution::Help(&sub.help)
            }
            Some(sub) => sub.resolve(metadata.shifted()),
        }
    }

    /// Future running this command's handler.
    ///
    /// The handler is only called on first poll, so everything it does,
    /// including building its own future, happens wherever the returned
    /// future is driven.
    pub fn invoke(&self, metadata: Metadata, ctx: CommandContext) -> HandlerFuture {
        let handler = Arc::clone(&self.handler);
        Box::pin(async move { handler(metadata, ctx).await })
    }
}
