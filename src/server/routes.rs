//! Axum handlers.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;

use crate::here;
use crate::slack::{Command, Failure, Metadata, Response, SlackService};

/// GET /
pub(super) async fn liveness() -> &'static str {
    "It works!"
}

/// POST /{name} — always answers 200 with a [`Response`] body, including
/// for bodies that fail to decode.
pub(super) async fn invoke(
    State(service): State<SlackService>,
    command: Arc<Command>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Response> {
    let metadata = match decode_metadata(&headers, &body) {
        Ok(metadata) => metadata,
        Err(failure) => return Json(service.reject(failure, here!())),
    };
    Json(service.handle(&command, metadata).await)
}

/// Slack posts form-encoded bodies; JSON is accepted for tooling.
fn decode_metadata(headers: &HeaderMap, body: &[u8]) -> Result<Metadata, Failure> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        Ok(serde_json::from_slice(body)?)
    } else {
        Ok(serde_urlencoded::from_bytes(body)?)
    }
}
