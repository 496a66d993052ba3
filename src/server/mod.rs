//! Axum HTTP front end — one `POST /{name}` route per command plus a
//! liveness check.
//!
//! ## URL layout
//!
//! ```text
//! GET  /          → "It works!"
//! POST /{name}    → slash-command invocation for command `name`
//! ```
//!
//! Shutdown is cooperative: cancelling the [`CancellationToken`] passed to
//! [`serve`] lets in-flight requests finish before the listener closes.

mod routes;

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::AppError;
use crate::slack::{Command, SlackService};

/// Build the router. Commands are moved behind `Arc`s and never mutated.
pub fn build_router(service: SlackService, commands: Vec<Command>) -> Router {
    let mut router = Router::new().route("/", get(routes::liveness));

    for command in commands {
        let path = format!("/{}", command.name());
        debug!(%path, "registering command route");
        let command = Arc::new(command);
        router = router.route(
            &path,
            post(move |state: State<SlackService>, headers: HeaderMap, body: Bytes| {
                routes::invoke(state, command.clone(), headers, body)
            }),
        );
    }

    router.with_state(service)
}

/// Bind `bind_addr` and serve `router` until `shutdown` is cancelled.
pub async fn serve(
    bind_addr: &str,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "listening for slash commands");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

    info!("server shut down");
    Ok(())
}
