//! Slack slash-command plumbing.
//!
//! - **trace** — failure → [`TracedError`] translation and the `here!` macro.
//! - **error** — the Slack domain error taxonomy.
//! - **command** — [`Command`] trees, [`Metadata`], sub-command resolution.
//! - **option** — `key:value` options in invocation text.
//! - **response** — wire shapes for replies and proactive posts.
//! - **gateway** — outbound HTTP transport.
//! - **service** — validation, dispatch and deferred replies.

pub mod command;
pub mod error;
pub mod gateway;
pub mod option;
pub mod response;
pub mod service;
pub mod trace;

pub use command::{Command, CommandContext, Handler, HandlerFuture, Metadata, Resolution};
pub use error::SlackError;
pub use gateway::{HttpTransport, Transport, TransportFuture, TransportReply};
pub use option::CommandOption;
pub use response::{Attachment, FAILURE_LABEL, Message, Response, Visibility};
pub use service::{PostedMessage, SlackService};
pub use trace::{
    BuildMode, DomainError, EmptyValue, ErrorTranslator, Failure, SourceLocation, TracedError,
};
