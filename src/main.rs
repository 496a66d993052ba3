//! Jimothy — slash-command webhook entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config (fails fast without `SLACK_TOKEN` / `SLACK_OAUTH_TOKEN`)
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the Slack service and command table
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Serve until shutdown
//!   8. Wait for deferred replies still in flight

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use jimothy::slack::{HttpTransport, SlackService};
use jimothy::{commands, config, error, logger, server};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.server.log_level.as_str());
    logger::init(
        effective_log_level,
        args.log_level.is_some(),
        config.server.log_file.as_deref(),
    )?;

    info!(
        bind = %config.server.bind,
        mode = ?config.server.mode,
        api_base_url = %config.slack.api_base_url,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let transport = HttpTransport::new(config.slack.timeout_seconds)?;
    let service = SlackService::new(&config.slack, config.server.mode, Arc::new(transport));

    let commands = commands::all();
    let names: Vec<&str> = commands.iter().map(|c| c.name()).collect();
    info!(commands = ?names, "commands registered");

    let router = server::build_router(service.clone(), commands);

    // Shared shutdown token — Ctrl-C cancels it and the server drains.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let served = server::serve(&config.server.bind, router, shutdown).await;

    // Handlers already dispatched run to completion; their deferred replies
    // are still posted before the runtime goes away.
    service.drain().await;
    info!("all in-flight commands settled");

    served
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: jimothy [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                println!();
                println!("Environment:");
                println!("  SLACK_TOKEN                Slash-command verification token (required)");
                println!("  SLACK_OAUTH_TOKEN          Bot user OAuth token (required)");
                println!("  JIMOTHY_BIND, JIMOTHY_LOG_LEVEL, JIMOTHY_MODE override the config file");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    // Each -v raises verbosity one tier:
    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug  (routing, dispatch, deferred replies)
    //   -vvvv+  → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
