//! Error translation — turns any failure raised while serving an invocation
//! into a [`TracedError`] the user can be shown.
//!
//! Every fallible step of a command (validation, the handler future, outbound
//! platform calls) returns `Result<_, Failure>`. The [`ErrorTranslator`]
//! converts a [`Failure`] at a capture point produced by [`here!`]:
//!
//! 1. an already-traced error keeps its identifier, reason and the earliest
//!    recorded location;
//! 2. a [`DomainError`] contributes `"<domain>.<identifier>"` and its reason,
//!    plus its own location if it recorded one;
//! 3. anything else is opaque: the identifier is its type name and the reason
//!    its `Display` output.
//!
//! In [`BuildMode::Production`] the location is dropped entirely.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use thiserror::Error;

// ── Build mode ────────────────────────────────────────────────────────────────

/// Controls whether translated errors carry a [`SourceLocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn keeps_locations(self) -> bool {
        matches!(self, BuildMode::Development)
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "debug" => Ok(BuildMode::Development),
            "production" | "prod" | "release" => Ok(BuildMode::Production),
            other => Err(format!(
                "unknown mode '{other}' (expected 'development' or 'production')"
            )),
        }
    }
}

// ── Source location ───────────────────────────────────────────────────────────

/// Where a failure was captured. Debugging aid only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: &'static str,
    pub function: &'static str,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: &'static str, function: &'static str, line: u32, column: u32) -> Self {
        Self { file, function, line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{} in {}", self.file, self.line, self.column, self.function)
    }
}

/// Strip the probe suffix and any async closure frames from a type name
/// obtained inside [`here!`].
#[doc(hidden)]
pub fn function_name(probe: &'static str) -> &'static str {
    let mut name = probe.strip_suffix("::probe").unwrap_or(probe);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name
}

/// Capture the current file, enclosing function, line and column.
#[macro_export]
macro_rules! here {
    () => {{
        fn probe() {}
        $crate::slack::SourceLocation::new(
            file!(),
            $crate::slack::trace::function_name(::std::any::type_name_of_val(&probe)),
            line!(),
            column!(),
        )
    }};
}

// ── Domain errors ─────────────────────────────────────────────────────────────

/// A recognised failure with a stable identifier.
///
/// The translator prefixes [`DomainError::identifier`] with
/// [`DomainError::domain`] so identifiers from different domains never clash.
pub trait DomainError: StdError + Send + Sync + 'static {
    /// Name of the owning domain, e.g. `"slack"`.
    fn domain(&self) -> &'static str;

    /// Stable identifier within the domain, used for grouping and alerting.
    fn identifier(&self) -> &'static str;

    /// Human-readable reason shown to the invoking user.
    fn reason(&self) -> String;

    /// Location recorded by the error itself, if any.
    fn location(&self) -> Option<SourceLocation> {
        None
    }
}

/// A nullable operation produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unexpected empty value")]
pub struct EmptyValue;

impl DomainError for EmptyValue {
    fn domain(&self) -> &'static str {
        "core"
    }

    fn identifier(&self) -> &'static str {
        "unexpected_empty_value"
    }

    fn reason(&self) -> String {
        self.to_string()
    }
}

// ── Traced error ──────────────────────────────────────────────────────────────

/// A translated, user-presentable error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedError {
    identifier: String,
    reason: String,
    location: Option<SourceLocation>,
}

impl TracedError {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }
}

impl fmt::Display for TracedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(at) => write!(f, "{}: {}\n({at})", self.identifier, self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

impl StdError for TracedError {}

// ── Failure ───────────────────────────────────────────────────────────────────

/// Error channel for handlers and outbound calls, before translation.
#[derive(Debug)]
pub enum Failure {
    Traced(TracedError),
    Domain(Box<dyn DomainError>),
    Opaque {
        type_name: &'static str,
        error: Box<dyn StdError + Send + Sync>,
    },
}

impl Failure {
    pub fn domain<E: DomainError>(error: E) -> Self {
        Failure::Domain(Box::new(error))
    }

    /// Wrap an unrecognised error, remembering its concrete type name.
    pub fn opaque<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Failure::Opaque {
            type_name: std::any::type_name::<E>(),
            error: Box::new(error),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Traced(e) => write!(f, "{e}"),
            Failure::Domain(e) => f.write_str(&e.reason()),
            Failure::Opaque { error, .. } => write!(f, "{error}"),
        }
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Failure::Traced(_) | Failure::Domain(_) => None,
            Failure::Opaque { error, .. } => Some(error.as_ref()),
        }
    }
}

impl From<TracedError> for Failure {
    fn from(e: TracedError) -> Self {
        Failure::Traced(e)
    }
}

impl From<EmptyValue> for Failure {
    fn from(e: EmptyValue) -> Self {
        Failure::domain(e)
    }
}

impl From<reqwest::Error> for Failure {
    fn from(e: reqwest::Error) -> Self {
        Failure::opaque(e)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(e: serde_json::Error) -> Self {
        Failure::opaque(e)
    }
}

impl From<serde_urlencoded::de::Error> for Failure {
    fn from(e: serde_urlencoded::de::Error) -> Self {
        Failure::opaque(e)
    }
}

impl From<tokio::task::JoinError> for Failure {
    fn from(e: tokio::task::JoinError) -> Self {
        Failure::opaque(e)
    }
}

// ── Translator ────────────────────────────────────────────────────────────────

/// Converts [`Failure`]s into [`TracedError`]s according to the build mode.
///
/// `Copy` so it can be handed to every spawned task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator {
    mode: BuildMode,
}

impl ErrorTranslator {
    pub fn new(mode: BuildMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn translate(&self, failure: Failure, at: SourceLocation) -> TracedError {
        let (identifier, reason, location) = match failure {
            Failure::Traced(traced) => {
                let location = traced.location.unwrap_or(at);
                (traced.identifier, traced.reason, location)
            }
            Failure::Domain(e) => (
                format!("{}.{}", e.domain(), e.identifier()),
                e.reason(),
                e.location().unwrap_or(at),
            ),
            Failure::Opaque { type_name, error } => {
                (type_name.to_string(), error.to_string(), at)
            }
        };

        TracedError {
            identifier,
            reason,
            location: self.mode.keeps_locations().then_some(location),
        }
    }

    /// Translate the failure of a synchronous step.
    pub fn check<T>(
        &self,
        at: SourceLocation,
        result: Result<T, Failure>,
    ) -> Result<T, TracedError> {
        result.map_err(|f| self.translate(f, at))
    }

    /// Like [`ErrorTranslator::check`], treating `Ok(None)` as [`EmptyValue`].
    pub fn attempt<T>(
        &self,
        at: SourceLocation,
        result: Result<Option<T>, Failure>,
    ) -> Result<T, TracedError> {
        result
            .and_then(|value| value.ok_or_else(|| Failure::from(EmptyValue)))
            .map_err(|f| self.translate(f, at))
    }

    /// Await `operation` and translate its failure. Success values pass
    /// through untouched.
    pub async fn run<T, F>(&self, at: SourceLocation, operation: F) -> Result<T, TracedError>
    where
        F: Future<Output = Result<T, Failure>>,
    {
        operation.await.map_err(|f| self.translate(f, at))
    }
}
