//! Outbound HTTP to Slack.
//!
//! [`Transport`] is the only seam between the command service and the
//! network: one JSON `POST`, optionally bearer-authenticated. The service
//! uses it for `chat.postMessage` and for deferred replies to an
//! invocation's `response_url`. [`HttpTransport`] is the reqwest-backed
//! implementation used in production.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::AppError;

use super::error::SlackError;
use super::trace::Failure;

/// Boxed future returned by [`Transport::post_json`].
pub type TransportFuture =
    Pin<Box<dyn Future<Output = Result<TransportReply, Failure>> + Send + 'static>>;

/// Status and raw body of a successful (2xx) reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

pub trait Transport: Send + Sync + 'static {
    /// POST `body` as JSON to `url`, sending `Authorization: Bearer` when a
    /// token is given. Non-2xx replies are failures.
    fn post_json(&self, url: &str, bearer: Option<&str>, body: Value) -> TransportFuture;
}

/// reqwest-backed [`Transport`].
///
/// Cheap to clone; `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout_seconds: u64) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, bearer: Option<&str>, body: Value) -> TransportFuture {
        let mut req = self.client.post(url).json(&body);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let url = url.to_string();

        Box::pin(async move {
            debug!(%url, "posting to slack");
            let response = req.send().await.map_err(|e| {
                error!(%url, error = %e, "slack request failed (transport)");
                e
            })?;

            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                error!(%url, %status, "slack request returned HTTP error");
                return Err(SlackError::Api(format!("HTTP {status}: {body}")).into());
            }

            Ok(TransportReply { status: status.as_u16(), body })
        })
    }
}
