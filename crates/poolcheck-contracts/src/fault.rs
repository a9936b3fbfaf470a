//! Runtime fault and uncaught-error outcome types.
//!
//! A `FaultRecord` is raised by pool code for conditions that are not
//! errors (notices, deprecations) or that are fatal without unwinding the
//! verification body. An `ExceptionOutcome` is what the classifier makes of
//! an error or panic that escaped a verification body.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SourceLocation;

/// Severity of a runtime fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Fatal,
    RecoverableWarning,
    Notice,
    Strict,
    Deprecated,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Fatal,
        Severity::RecoverableWarning,
        Severity::Notice,
        Severity::Strict,
        Severity::Deprecated,
    ];

    /// Bracketed label embedded in fault messages.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Fatal => "[FATAL ERROR]",
            Severity::RecoverableWarning => "[WARNING]",
            Severity::Notice => "[NOTICE]",
            Severity::Strict => "[STRICT]",
            Severity::Deprecated => "[DEPRECATED]",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Severity::Fatal => 1,
            Severity::RecoverableWarning => 1 << 1,
            Severity::Notice => 1 << 2,
            Severity::Strict => 1 << 3,
            Severity::Deprecated => 1 << 4,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The set of severities a fault handler reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeverityMask(u8);

impl SeverityMask {
    /// Every severity is visible.
    pub const FULL: SeverityMask = SeverityMask(0b1_1111);

    /// Everything except notices.
    pub const WITHOUT_NOTICES: SeverityMask = SeverityMask(0b1_1011);

    pub fn contains(self, severity: Severity) -> bool {
        self.0 & severity.bit() != 0
    }

    pub fn without(self, severity: Severity) -> Self {
        SeverityMask(self.0 & !severity.bit())
    }

    pub fn with(self, severity: Severity) -> Self {
        SeverityMask(self.0 | severity.bit())
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        SeverityMask(bits & Self::FULL.0)
    }
}

impl Default for SeverityMask {
    fn default() -> Self {
        Self::FULL
    }
}

/// A single runtime fault, consumed once by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
}

/// What the classifier made of an error that escaped a verification body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionOutcome {
    /// A driver lacks a runtime requirement. Recorded as a skip.
    DriverUnavailable { message: String },

    /// A driver failed to connect or authenticate. Recorded as a skip.
    DriverConnectFailure { message: String },

    /// Anything else. Recorded as a failure.
    UncaughtOther {
        class: String,
        message: String,
        location: Option<SourceLocation>,
    },
}

impl ExceptionOutcome {
    /// True for the outcomes recorded as skips rather than failures.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            ExceptionOutcome::DriverUnavailable { .. } | ExceptionOutcome::DriverConnectFailure { .. }
        )
    }
}
