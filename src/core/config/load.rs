//! Configuration loading with env-var overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::logger::check_level;
use crate::slack::BuildMode;

use super::raw::RawConfig;
use super::types::*;

/// Values that take precedence over the TOML file.
///
/// [`load`] fills these from the environment; tests build them directly
/// instead of mutating env vars.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub bind: Option<String>,
    pub log_level: Option<String>,
    pub mode: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            bind: env::var("JIMOTHY_BIND").ok(),
            log_level: env::var("JIMOTHY_LOG_LEVEL").ok(),
            mode: env::var("JIMOTHY_MODE").ok(),
        }
    }
}

/// Slack credentials. Env-only.
#[derive(Default, Clone)]
pub struct Secrets {
    pub verification_token: Option<String>,
    pub oauth_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            verification_token: env::var("SLACK_TOKEN").ok(),
            oauth_token: env::var("SLACK_OAUTH_TOKEN").ok(),
        }
    }
}

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides. If no path is given and `config/default.toml` does not
/// exist, the built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();
    let secrets = Secrets::from_env();

    if let Some(path) = config_path {
        return load_from(Some(Path::new(path)), &overrides, secrets);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(Some(default_path), &overrides, secrets)
    } else {
        load_from(None, &overrides, secrets)
    }
}

/// Internal loader — accepts an explicit path (or `None` for built-in
/// defaults), overrides and secrets.
pub fn load_from(
    path: Option<&Path>,
    overrides: &Overrides,
    secrets: Secrets,
) -> Result<Config, AppError> {
    let parsed = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
            toml::from_str::<RawConfig>(&raw)
                .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?
        }
        None => RawConfig::default(),
    };

    let verification_token = require_secret("SLACK_TOKEN", secrets.verification_token)?;
    let oauth_token = require_secret("SLACK_OAUTH_TOKEN", secrets.oauth_token)?;

    let s = parsed.server;
    let mode_str = overrides.mode.as_deref().unwrap_or(&s.mode);
    let mode: BuildMode = mode_str
        .parse()
        .map_err(|e| AppError::Config(format!("invalid server mode: {e}")))?;

    let log_level = overrides.log_level.clone().unwrap_or(s.log_level);
    check_level(&log_level).map_err(|e| AppError::Config(format!("server.log_level: {e}")))?;

    if parsed.slack.timeout_seconds == 0 {
        return Err(AppError::Config("slack.timeout_seconds must be greater than zero".into()));
    }

    Ok(Config {
        server: ServerConfig {
            bind: overrides.bind.clone().unwrap_or(s.bind),
            log_level,
            log_file: s.log_file.as_deref().map(expand_home),
            mode,
        },
        slack: SlackConfig {
            api_base_url: parsed.slack.api_base_url.trim_end_matches('/').to_string(),
            timeout_seconds: parsed.slack.timeout_seconds,
            verification_token,
            oauth_token,
        },
    })
}

fn require_secret(name: &str, value: Option<String>) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{name} is not set")))
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[server]
bind = "0.0.0.0:9000"
log_level = "debug"
mode = "production"

[slack]
api_base_url = "https://example.test/api/"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn secrets() -> Secrets {
        Secrets {
            verification_token: Some("verify".into()),
            oauth_token: Some("xoxb-1".into()),
        }
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(Some(f.path()), &Overrides::default(), secrets()).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.server.log_level, "debug");
        assert_eq!(cfg.server.mode, BuildMode::Production);
        assert_eq!(cfg.slack.api_base_url, "https://example.test/api");
        assert_eq!(cfg.slack.timeout_seconds, 10);
        assert_eq!(cfg.slack.verification_token, "verify");
    }

    #[test]
    fn defaults_without_file() {
        let cfg = load_from(None, &Overrides::default(), secrets()).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
        assert_eq!(cfg.server.mode, BuildMode::Development);
        assert_eq!(cfg.slack.api_base_url, "https://slack.com/api");
    }

    #[test]
    fn missing_verification_token_fails_fast() {
        let secrets = Secrets {
            verification_token: None,
            oauth_token: Some("xoxb-1".into()),
        };
        let msg = load_from(None, &Overrides::default(), secrets)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("SLACK_TOKEN"));
    }

    #[test]
    fn blank_oauth_token_fails_fast() {
        let secrets = Secrets {
            verification_token: Some("verify".into()),
            oauth_token: Some("  ".into()),
        };
        let msg = load_from(None, &Overrides::default(), secrets)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("SLACK_OAUTH_TOKEN"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(
            Some(Path::new("/nonexistent/config.toml")),
            &Overrides::default(),
            secrets(),
        );
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_overrides_win() {
        let f = write_toml(MINIMAL_TOML);
        let overrides = Overrides {
            bind: Some("127.0.0.1:1".into()),
            log_level: Some("trace".into()),
            mode: Some("development".into()),
        };
        let cfg = load_from(Some(f.path()), &overrides, secrets()).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:1");
        assert_eq!(cfg.server.log_level, "trace");
        assert_eq!(cfg.server.mode, BuildMode::Development);
    }

    #[test]
    fn unknown_mode_errors() {
        let overrides = Overrides {
            mode: Some("staging".into()),
            ..Overrides::default()
        };
        let msg = load_from(None, &overrides, secrets()).unwrap_err().to_string();
        assert!(msg.contains("staging"));
    }

    #[test]
    fn misspelled_log_level_rejected() {
        let overrides = Overrides {
            log_level: Some("verbose".into()),
            ..Overrides::default()
        };
        let msg = load_from(None, &overrides, secrets()).unwrap_err().to_string();
        assert!(msg.contains("server.log_level"), "{msg}");
        assert!(msg.contains("verbose"), "{msg}");
    }

    #[test]
    fn log_filter_directives_accepted() {
        let f = write_toml("[server]\nlog_level = \"jimothy=debug,tower=warn\"\n");
        let cfg = load_from(Some(f.path()), &Overrides::default(), secrets()).unwrap();
        assert_eq!(cfg.server.log_level, "jimothy=debug,tower=warn");
    }

    #[test]
    fn zero_timeout_rejected() {
        let f = write_toml("[slack]\ntimeout_seconds = 0\n");
        assert!(load_from(Some(f.path()), &Overrides::default(), secrets()).is_err());
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let cfg = load_from(None, &Overrides::default(), secrets()).unwrap();
        let dbg = format!("{:?}", cfg.slack);
        assert!(!dbg.contains("xoxb-1"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/var/log/jimothy.log"), PathBuf::from("/var/log/jimothy.log"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/jimothy.log");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with("jimothy.log"));
    }
}
