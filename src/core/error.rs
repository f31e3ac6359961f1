//! Defines the custom error types for the `core` module.

use std::fmt;
use thiserror::Error;

/// The coarse reason a pattern was rejected.
///
/// The UI only ever shows a single generic notice; the reason is kept so that
/// callers and tests can tell the cases apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternRejection {
    Empty,
    Malformed,
    Duplicate,
}

/// Raised by the pattern validator when user input cannot enter the settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidPatternError {
    /// The pattern was empty after trimming.
    #[error("Pattern is empty")]
    Empty,

    /// The pattern failed to compile as a glob.
    #[error("Invalid glob pattern '{pattern}': {message}")]
    Malformed { pattern: String, message: String },

    /// The trimmed pattern already exists in the target list.
    #[error("Pattern '{0}' already exists")]
    Duplicate(String),
}

impl InvalidPatternError {
    pub fn reason(&self) -> PatternRejection {
        match self {
            Self::Empty => PatternRejection::Empty,
            Self::Malformed { .. } => PatternRejection::Malformed,
            Self::Duplicate(_) => PatternRejection::Duplicate,
        }
    }

    /// The single, deliberately coarse message shown to the user.
    pub fn user_message(&self) -> &'static str {
        "Pattern is empty, invalid, or a duplicate"
    }
}

/// Which remote operation a transport error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    Load,
    Save,
    AiFilter,
}

impl fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::Load => "load",
            Self::Save => "save",
            Self::AiFilter => "AI filter",
        };
        f.write_str(phase)
    }
}

/// The low-level failure reported by a `SettingsTransport` implementation.
#[derive(Debug, Error)]
pub enum TransportFailure {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status code.
    #[error("Backend returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// The response body was not valid JSON.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Any other failure, mostly produced by test doubles.
    #[error("{0}")]
    Other(String),
}

/// A transport failure tagged with the operation that produced it.
#[derive(Debug, Error)]
#[error("Failed to {phase} settings: {cause}")]
pub struct TransportError {
    pub phase: TransportPhase,
    #[source]
    pub cause: TransportFailure,
}

impl TransportError {
    pub fn new(phase: TransportPhase, cause: TransportFailure) -> Self {
        Self { phase, cause }
    }
}

/// Errors returned by the remote operations of the settings store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another save or AI filter run is still in flight for this repository.
    #[error("Another settings operation is still in progress")]
    Busy,

    #[error(transparent)]
    Transport(#[from] TransportError),
}
