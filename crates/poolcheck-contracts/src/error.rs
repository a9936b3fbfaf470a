//! Error types for pools and for verification bodies.
//!
//! Pool operations return `HarnessResult<T>`. Verification bodies return
//! `StepResult<T>`, whose error side (`Uncaught`) remembers where the error
//! escaped so the fault classifier can report a file and line.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unified error type for pools and the harness.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// A driver cannot run because a runtime requirement is missing.
    #[error("driver '{driver}' is unavailable: {reason}")]
    DriverCheck { driver: String, reason: String },

    /// A driver could not reach or authenticate against its backend.
    #[error("driver '{driver}' failed to connect: {reason}")]
    DriverConnect { driver: String, reason: String },

    /// A caller passed an argument the pool refuses (bad key, unsupported pattern).
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The pool does not implement the requested operation.
    #[error("method '{method}' is not supported by this pool")]
    UnsupportedMethod { method: String },

    /// Backend or process I/O failed.
    #[error("I/O error: {reason}")]
    Io { reason: String },

    /// The pool reached an inconsistent internal state.
    #[error("logic error: {reason}")]
    Logic { reason: String },

    /// A fixture or option is missing or malformed.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl HarnessError {
    /// Stable, qualified variant name used when reporting an uncaught error.
    pub fn class_name(&self) -> &'static str {
        match self {
            HarnessError::DriverCheck { .. } => "HarnessError::DriverCheck",
            HarnessError::DriverConnect { .. } => "HarnessError::DriverConnect",
            HarnessError::InvalidArgument { .. } => "HarnessError::InvalidArgument",
            HarnessError::UnsupportedMethod { .. } => "HarnessError::UnsupportedMethod",
            HarnessError::Io { .. } => "HarnessError::Io",
            HarnessError::Logic { .. } => "HarnessError::Logic",
            HarnessError::Config { .. } => "HarnessError::Config",
        }
    }

    /// The error's own message, without the variant prefix `Display` adds.
    ///
    /// Empty when the error was raised without a reason.
    pub fn reason(&self) -> Cow<'_, str> {
        match self {
            HarnessError::DriverCheck { reason, .. }
            | HarnessError::DriverConnect { reason, .. }
            | HarnessError::InvalidArgument { reason }
            | HarnessError::Io { reason }
            | HarnessError::Logic { reason }
            | HarnessError::Config { reason } => Cow::Borrowed(reason),
            HarnessError::UnsupportedMethod { method } if method.is_empty() => Cow::Borrowed(""),
            HarnessError::UnsupportedMethod { .. } => Cow::Owned(self.to_string()),
        }
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(e: std::io::Error) -> Self {
        HarnessError::Io { reason: e.to_string() }
    }
}

/// Convenience alias used by pools and fixture loaders.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// A file/line pair pointing at Rust source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self { file: file.into(), line }
    }

    /// The location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(loc: &Location<'_>) -> Self {
        Self::new(loc.file(), loc.line())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// An error that escaped a verification body, with the `?` site that let it out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} (at {location})")]
pub struct Uncaught {
    pub error: HarnessError,
    pub location: SourceLocation,
}

impl From<HarnessError> for Uncaught {
    #[track_caller]
    fn from(error: HarnessError) -> Self {
        Self {
            error,
            location: SourceLocation::caller(),
        }
    }
}

/// Result type of verification bodies run inside a session.
pub type StepResult<T> = Result<T, Uncaught>;
