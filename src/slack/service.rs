//! Command service — validates invocations, dispatches them, and turns every
//! outcome into exactly one [`Response`].
//!
//! ```text
//! Received ─▶ Validated ─▶ Help ──────┐
//!                  │                  ├─▶ Responded
//!                  └────▶ Dispatched ─┘
//! ```
//!
//! Validation failures, help, handler success and handler failure all end
//! in a `Response`; failures are translated and rendered private and
//! error-styled. Handlers that outlive Slack's response-time limit use
//! [`SlackService::reply_later`].
//!
//! Handlers and deferred replies run on tasks owned by the service's
//! [`TaskTracker`]. A panic on any of them surfaces as a `JoinError` and is
//! answered like any other failure. [`SlackService::drain`] waits for the
//! ones still in flight at shutdown.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::SlackConfig;
use crate::here;

use super::command::{Command, CommandContext, Metadata, Resolution};
use super::error::SlackError;
use super::gateway::Transport;
use super::response::{Message, Response};
use super::trace::{BuildMode, ErrorTranslator, Failure, SourceLocation, TracedError};

/// `chat.postMessage` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: Option<String>,
    pub ts: Option<String>,
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Cheap to clone — all state lives behind an `Arc`.
#[derive(Clone)]
pub struct SlackService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    verification_token: String,
    oauth_token: String,
    api_base_url: String,
    translator: ErrorTranslator,
    transport: Arc<dyn Transport>,
    tasks: TaskTracker,
}

impl SlackService {
    pub fn new(config: &SlackConfig, mode: BuildMode, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                verification_token: config.verification_token.clone(),
                oauth_token: config.oauth_token.clone(),
                api_base_url: config.api_base_url.clone(),
                translator: ErrorTranslator::new(mode),
                transport,
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Wait for every handler and deferred reply spawned so far, including
    /// the POST of each deferred result. Call once the server has stopped.
    pub async fn drain(&self) {
        let tasks = &self.inner.tasks;
        tasks.close();
        if !tasks.is_empty() {
            info!(pending = tasks.len(), "waiting for in-flight commands");
        }
        tasks.wait().await;
    }

    /// Serve one invocation of `command`.
    pub async fn handle(&self, command: &Command, metadata: Metadata) -> Response {
        let channel = metadata.channel_name().to_string();
        match self.dispatch(command, metadata).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    command = %command.name(),
                    %channel,
                    identifier = %e.identifier(),
                    reason = %e.reason(),
                    "command failed"
                );
                self.render(&e)
            }
        }
    }

    /// Render a failure that happened before dispatch (e.g. an undecodable
    /// body) the same way handler failures are rendered.
    pub fn reject(&self, failure: Failure, at: SourceLocation) -> Response {
        let e = self.inner.translator.translate(failure, at);
        warn!(identifier = %e.identifier(), reason = %e.reason(), "invocation rejected");
        self.render(&e)
    }

    fn render(&self, error: &TracedError) -> Response {
        Response::error(error, self.inner.translator.mode())
    }

    async fn dispatch(
        &self,
        command: &Command,
        metadata: Metadata,
    ) -> Result<Response, TracedError> {
        let translator = self.inner.translator;
        translator.check(here!(), self.validate(command, &metadata))?;

        match command.resolve(metadata) {
            Resolution::Help(text) => {
                debug!(command = %command.name(), "help requested");
                Ok(Response::new(text))
            }
            Resolution::Run { command: target, metadata } => {
                translator.check(here!(), check_channel(target, metadata.channel_name()))?;
                debug!(
                    command = %command.name(),
                    target = %target.name(),
                    text = %metadata.text(),
                    "dispatching"
                );

                let ctx = CommandContext { slack: self.clone() };
                let task = self.inner.tasks.spawn(target.invoke(metadata, ctx));
                translator.run(here!(), settled(task)).await
            }
        }
    }

    fn validate(&self, command: &Command, metadata: &Metadata) -> Result<(), Failure> {
        if metadata.token() != self.inner.verification_token {
            return Err(SlackError::InvalidToken.into());
        }
        check_channel(command, metadata.channel_name())
    }

    /// Return `now` immediately and deliver the outcome of `later` to
    /// `response_url` once it settles.
    ///
    /// A failed or panicking `later` is delivered as an error-styled
    /// response. Failures of the delivery itself can only be logged. Without
    /// a `response_url` the computation still runs to completion and only
    /// its failure is logged.
    pub fn reply_later<F>(&self, now: Response, response_url: Option<&str>, later: F) -> Response
    where
        F: Future<Output = Result<Response, Failure>> + Send + 'static,
    {
        let translator = self.inner.translator;
        let at = here!();
        let computation = self.inner.tasks.spawn(later);

        match response_url {
            None => {
                debug!("no response_url; deferred result will not be delivered");
                self.inner.tasks.spawn(async move {
                    if let Err(e) = translator.run(at, settled(computation)).await {
                        warn!(
                            identifier = %e.identifier(),
                            reason = %e.reason(),
                            "deferred command failed with nowhere to report it"
                        );
                    }
                });
            }
            Some(url) => {
                let url = url.to_string();
                let service = self.clone();
                self.inner.tasks.spawn(async move {
                    let response = match translator.run(at, settled(computation)).await {
                        Ok(response) => response,
                        Err(e) => {
                            warn!(
                                identifier = %e.identifier(),
                                reason = %e.reason(),
                                "deferred command failed"
                            );
                            service.render(&e)
                        }
                    };
                    if let Err(e) = service.post_response(&url, &response).await {
                        error!(
                            response_url = %url,
                            identifier = %e.identifier(),
                            reason = %e.reason(),
                            "deferred reply could not be delivered"
                        );
                    }
                });
            }
        }

        now
    }

    /// POST `response` to an invocation's `response_url`. Unauthenticated.
    pub async fn post_response(&self, url: &str, response: &Response) -> Result<(), TracedError> {
        self.inner
            .translator
            .run(here!(), async {
                let body = serde_json::to_value(response)?;
                self.inner.transport.post_json(url, None, body).await?;
                debug!(response_url = %url, "deferred reply delivered");
                Ok::<_, Failure>(())
            })
            .await
    }

    /// Post `message` through `chat.postMessage` with the bot token.
    pub async fn post_message(&self, message: &Message) -> Result<PostedMessage, TracedError> {
        self.inner
            .translator
            .run(here!(), async {
                let body = serde_json::to_value(message)?;
                let url = format!("{}/chat.postMessage", self.inner.api_base_url);
                let reply = self
                    .inner
                    .transport
                    .post_json(&url, Some(&self.inner.oauth_token), body)
                    .await?;

                let envelope: ApiEnvelope = serde_json::from_str(&reply.body)?;
                if !envelope.ok {
                    let reason = envelope.error.unwrap_or_else(|| "unknown error".into());
                    return Err(SlackError::Api(reason).into());
                }
                Ok::<_, Failure>(PostedMessage { channel: envelope.channel, ts: envelope.ts })
            })
            .await
    }
}

/// Outcome of a spawned computation, with a panic or abort as a failure.
async fn settled(
    task: tokio::task::JoinHandle<Result<Response, Failure>>,
) -> Result<Response, Failure> {
    match task.await {
        Ok(outcome) => outcome,
        Err(join_error) => Err(Failure::from(join_error)),
    }
}

fn check_channel(command: &Command, channel: &str) -> Result<(), Failure> {
    if command.allows_channel(channel) {
        Ok(())
    } else {
        Err(SlackError::InvalidChannel {
            channel: channel.to_string(),
            allowed: command.allowed_channels().clone(),
        }
        .into())
    }
}

#[cfg(test)]
impl SlackService {
    /// Service with token `"T"` whose outbound calls go nowhere.
    pub(crate) fn for_tests() -> Self {
        let (transport, _) = super::gateway::testing::RecordingTransport::ok();
        Self::new(
            &crate::config::Config::test_default().slack,
            BuildMode::Development,
            Arc::new(transport),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::slack::command::HandlerFuture;
    use crate::slack::gateway::testing::{Posted, RecordingTransport};
    use crate::slack::gateway::TransportReply;
    use crate::slack::response::{Attachment, ERROR_COLOR, FAILURE_LABEL, Visibility};

    fn service_with(transport: RecordingTransport, mode: BuildMode) -> SlackService {
        let config = crate::config::Config::test_default();
        SlackService::new(&config.slack, mode, Arc::new(transport))
    }

    fn recording(mode: BuildMode) -> (SlackService, mpsc::UnboundedReceiver<Posted>) {
        let (transport, rx) = RecordingTransport::ok();
        (service_with(transport, mode), rx)
    }

    fn meta(token: &str, channel: &str, text: &str) -> Metadata {
        Metadata::new(token, channel, "/deploy", text, None)
    }

    fn counting(name: &str, help: &str, calls: Arc<AtomicUsize>) -> Command {
        Command::new(name, help, move |m: Metadata, _| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Response::new(format!("ran {}", m.text())))
            }
        })
    }

    #[tokio::test]
    async fn invalid_token_never_reaches_handler() {
        let (svc, _rx) = recording(BuildMode::Production);
        let calls = Arc::new(AtomicUsize::new(0));
        let cmd = counting("ping", "pong help", calls.clone());

        for text in ["", "help", "anything"] {
            let r = svc.handle(&cmd, meta("wrong", "general", text)).await;
            assert_eq!(r.text, "Invalid token");
            assert_eq!(r.visibility, Visibility::Ephemeral);
            assert_eq!(r.attachments, Some(vec![Attachment::error(FAILURE_LABEL)]));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn help_returns_own_help_privately() {
        let (svc, _rx) = recording(BuildMode::Development);
        let calls = Arc::new(AtomicUsize::new(0));
        let cmd = counting("ping", "pong help", calls.clone());

        let r = svc.handle(&cmd, meta("T", "general", "help")).await;
        assert_eq!(r, Response::new("pong help"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sub_command_help_skips_its_handler() {
        let (svc, _rx) = recording(BuildMode::Development);
        let calls = Arc::new(AtomicUsize::new(0));
        let cmd = counting("deploy", "Deploys.", calls.clone())
            .with_sub_commands(vec![counting("beta", "beta help text", calls.clone())]);

        let r = svc.handle(&cmd, meta("T", "general", "beta help")).await;
        assert_eq!(r.text, "beta help text");
        assert_eq!(r.visibility, Visibility::Ephemeral);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn channel_outside_allow_list_is_rejected() {
        let (svc, _rx) = recording(BuildMode::Production);
        let calls = Arc::new(AtomicUsize::new(0));
        let cmd = counting("ship", "", calls.clone()).allowed_in(["releases"]);

        let r = svc.handle(&cmd, meta("T", "general", "now")).await;
        assert!(r.text.contains("releases"));
        assert!(r.text.contains("general"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let r = svc.handle(&cmd, meta("T", "releases", "now")).await;
        assert_eq!(r.text, "ran now");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sub_command_allow_list_is_enforced() {
        let (svc, _rx) = recording(BuildMode::Production);
        let calls = Arc::new(AtomicUsize::new(0));
        let cmd = counting("deploy", "", calls.clone())
            .with_sub_commands(vec![counting("store", "", calls.clone()).allowed_in(["releases"])]);

        let r = svc.handle(&cmd, meta("T", "general", "store 1.0")).await;
        assert!(r.text.contains("`releases`"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_failure_becomes_private_error_response() {
        let (svc, _rx) = recording(BuildMode::Development);
        let cmd = Command::new("jim", "", |_, _| async {
            Err::<Response, _>(SlackError::MissingParameter { key: "workflow".into() }.into())
        });

        let r = svc.handle(&cmd, meta("T", "general", "")).await;
        assert_eq!(r.visibility, Visibility::Ephemeral);
        assert!(r.text.starts_with("slack.missing_parameter: Missing parameter for `workflow`"));
        assert!(r.text.contains("service.rs"), "{}", r.text);
        assert_eq!(r.attachments.unwrap()[0].color, ERROR_COLOR);
    }

    #[tokio::test]
    async fn production_hides_location() {
        let (svc, _rx) = recording(BuildMode::Production);
        let cmd = Command::new("jim", "", |_, _| async {
            Err::<Response, _>(SlackError::MissingParameter { key: "workflow".into() }.into())
        });

        let r = svc.handle(&cmd, meta("T", "general", "")).await;
        assert_eq!(r.text, "Missing parameter for `workflow`");
    }

    #[tokio::test]
    async fn panicking_handler_still_yields_a_response() {
        let (svc, _rx) = recording(BuildMode::Production);
        let cmd = Command::new("boom", "", |_, _| async {
            if true {
                panic!("handler blew up");
            }
            Ok(Response::new("unreachable"))
        });

        let r = svc.handle(&cmd, meta("T", "general", "")).await;
        assert!(r.text.contains("panic"), "{}", r.text);
        assert_eq!(r.visibility, Visibility::Ephemeral);
    }

    fn panics_before_returning_a_future(_: Metadata, _: CommandContext) -> HandlerFuture {
        panic!("handler blew up while starting");
    }

    #[tokio::test]
    async fn handler_panicking_before_its_future_exists_still_yields_a_response() {
        let (svc, _rx) = recording(BuildMode::Development);
        let cmd = Command::new("boom", "", panics_before_returning_a_future);

        let r = svc.handle(&cmd, meta("T", "general", "")).await;
        assert_eq!(r.visibility, Visibility::Ephemeral);
        assert!(r.text.contains("JoinError"), "{}", r.text);
        assert_eq!(r.attachments.unwrap()[0].color, ERROR_COLOR);
    }

    #[tokio::test]
    async fn reply_later_returns_placeholder_before_settling_then_posts_once() {
        let (svc, mut rx) = recording(BuildMode::Development);
        let (release, gate) = oneshot::channel::<()>();

        let now = svc.reply_later(
            Response::new("working on it"),
            Some("https://hooks.test/r/1"),
            async move {
                gate.await.ok();
                Ok(Response::new("done").with_visibility(Visibility::InChannel))
            },
        );
        assert_eq!(now.text, "working on it");
        assert!(rx.try_recv().is_err());

        release.send(()).unwrap();
        let posted = rx.recv().await.unwrap();
        assert_eq!(posted.url, "https://hooks.test/r/1");
        assert_eq!(posted.bearer, None);
        assert_eq!(posted.body["text"], "done");
        assert_eq!(posted.body["response_type"], "in_channel");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reply_later_posts_translated_failure() {
        let (svc, mut rx) = recording(BuildMode::Production);
        svc.reply_later(Response::new("queued"), Some("https://hooks.test/r/2"), async {
            Err(SlackError::InvalidParameter {
                key: "version".into(),
                value: "x".into(),
                expected: "a number".into(),
            }
            .into())
        });

        let posted = rx.recv().await.unwrap();
        assert_eq!(posted.body["text"], "Invalid parameter `x` for `version`. Expected a number.");
        assert_eq!(posted.body["response_type"], "ephemeral");
        assert_eq!(posted.body["attachments"][0]["color"], ERROR_COLOR);
    }

    #[tokio::test]
    async fn reply_later_posts_exactly_one_error_when_computation_panics() {
        let (svc, mut rx) = recording(BuildMode::Production);
        let now = svc.reply_later(Response::new("queued"), Some("https://hooks.test/r/9"), async {
            if true {
                panic!("deferred work blew up");
            }
            Ok(Response::new("unreachable"))
        });
        assert_eq!(now.text, "queued");

        let posted = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("deferred error reply was never posted")
            .unwrap();
        assert_eq!(posted.url, "https://hooks.test/r/9");
        assert_eq!(posted.body["response_type"], "ephemeral");
        assert_eq!(posted.body["attachments"][0]["color"], ERROR_COLOR);
        assert_eq!(posted.body["attachments"][0]["text"], FAILURE_LABEL);

        svc.drain().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn drain_waits_for_pending_deferred_replies() {
        let (svc, mut rx) = recording(BuildMode::Development);
        svc.reply_later(Response::new("queued"), Some("https://hooks.test/r/3"), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Response::new("done late"))
        });
        assert!(rx.try_recv().is_err());

        svc.drain().await;
        let posted = rx.try_recv().expect("reply delivered before drain returned");
        assert_eq!(posted.body["text"], "done late");
    }

    #[tokio::test]
    async fn reply_later_without_url_still_runs_but_posts_nothing() {
        let (svc, mut rx) = recording(BuildMode::Development);
        let (done_tx, done_rx) = oneshot::channel();

        let now = svc.reply_later(Response::new("ok"), None, async move {
            let _ = done_tx.send(());
            Ok(Response::new("ignored"))
        });
        assert_eq!(now.text, "ok");

        done_rx.await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_delivery_is_swallowed() {
        let (transport, mut rx) = RecordingTransport::replying(Err("HTTP 404".into()));
        let svc = service_with(transport, BuildMode::Development);

        let now = svc.reply_later(Response::new("queued"), Some("https://hooks.test/gone"), async {
            Ok(Response::new("done"))
        });
        assert_eq!(now.text, "queued");
        assert_eq!(rx.recv().await.unwrap().url, "https://hooks.test/gone");
    }

    #[tokio::test]
    async fn post_message_sends_bearer_and_checks_envelope() {
        let (transport, mut rx) = RecordingTransport::replying(Ok(TransportReply {
            status: 200,
            body: r#"{"ok":true,"channel":"C1","ts":"1700.01"}"#.into(),
        }));
        let svc = service_with(transport, BuildMode::Development);

        let message =
            Message::new("C1", "hello").with_attachments(vec![Attachment::success("built")]);
        let ack = svc
            .post_message(&message)
            .await
            .unwrap();
        assert_eq!(ack.ts.as_deref(), Some("1700.01"));

        let posted = rx.recv().await.unwrap();
        assert_eq!(posted.url, "http://127.0.0.1:0/api/chat.postMessage");
        assert_eq!(posted.bearer.as_deref(), Some("xoxb-test"));
        assert_eq!(posted.body["channel"], "C1");
        assert_eq!(posted.body["attachments"][0]["text"], "built");
    }

    #[tokio::test]
    async fn post_message_surfaces_api_error() {
        let (transport, _rx) = RecordingTransport::replying(Ok(TransportReply {
            status: 200,
            body: r#"{"ok":false,"error":"channel_not_found"}"#.into(),
        }));
        let svc = service_with(transport, BuildMode::Production);

        let err = svc.post_message(&Message::new("C404", "hi")).await.unwrap_err();
        assert_eq!(err.identifier(), "slack.api");
        assert_eq!(err.reason(), "Slack API error: channel_not_found");
        assert!(err.location().is_none());
    }

    #[test]
    fn reject_renders_decode_failure() {
        let svc = SlackService::for_tests();
        let failure: Failure = serde_json::from_str::<Metadata>("{").unwrap_err().into();
        let r = svc.reject(failure, here!());
        assert!(r.text.starts_with("serde_json::error::Error"), "{}", r.text);
    }
}
