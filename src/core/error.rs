//! Error types for nvdb-mapper
//!
//! Provides the error taxonomy for fetching, mapping and validating road references,
//! plus the per-item issue records collected in mapping and job reports.

use std::fmt;

use serde::Serialize;

use crate::core::position::LinkSequenceId;

/// Main error type for nvdb-mapper operations
#[derive(Debug)]
pub enum Error {
    /// A network fetch failed (non-2xx, transport failure or timeout)
    FetchError {
        /// What was being fetched, e.g. "link sequence 1878200"
        target: String,
        /// Human readable failure reason
        reason: String,
        /// Whether retrying the same request may succeed
        transient: bool,
    },

    /// Boundary resolution matched zero or more than one segment
    AmbiguousMapping {
        link_sequence_id: LinkSequenceId,
        position: f64,
        matches: usize,
    },

    /// Malformed input or fetched record
    ValidationError(String),

    /// Missing or malformed configuration / credentials
    ConfigError(String),

    /// File I/O error
    IoError(std::io::Error),

    /// JSON (de)serialization error
    JsonError(serde_json::Error),
}

impl Error {
    /// Create a non-transient fetch error
    pub fn fetch(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::FetchError {
            target: target.into(),
            reason: reason.into(),
            transient: false,
        }
    }

    /// Create a transient fetch error, eligible for retry
    pub fn transient(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::FetchError {
            target: target.into(),
            reason: reason.into(),
            transient: true,
        }
    }

    /// Whether the error is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::FetchError { transient: true, .. })
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::FetchError { .. } => "fetch",
            Error::AmbiguousMapping { .. } => "ambiguous-mapping",
            Error::ValidationError(_) => "validation",
            Error::ConfigError(_) => "config",
            Error::IoError(_) => "io",
            Error::JsonError(_) => "json",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FetchError { target, reason, .. } => {
                write!(f, "Can't fetch {target}: {reason}")
            }
            Error::AmbiguousMapping {
                link_sequence_id,
                position,
                matches,
            } => {
                write!(
                    f,
                    "Expected exactly one segment matching position {position} @ link sequence {link_sequence_id}, found {matches}"
                )
            }
            Error::ValidationError(msg) => {
                write!(f, "Invalid input: {msg}")
            }
            Error::ConfigError(msg) => {
                write!(f, "Configuration error: {msg}")
            }
            Error::IoError(err) => {
                write!(f, "I/O error: {err}")
            }
            Error::JsonError(err) => {
                write!(f, "JSON error: {err}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            Error::JsonError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let target = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "remote resource".to_string());
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Error::transient(target, err.to_string())
        } else {
            Error::fetch(target, err.to_string())
        }
    }
}

/// Convenience result type for nvdb-mapper operations
pub type Result<T> = std::result::Result<T, Error>;

/// How serious a recorded issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Work continued with a best-effort result
    Warning,
    /// The affected item was skipped
    Error,
}

/// A per-item problem recorded instead of aborting the whole job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    /// The item concerned, e.g. "link sequence 1878200" or "query chunk 2"
    pub subject: String,
    /// Error kind, see [`Error::kind`]
    pub kind: &'static str,
    pub message: String,
}

impl Issue {
    pub fn warning(subject: impl Into<String>, error: &Error) -> Self {
        Self::new(Severity::Warning, subject, error)
    }

    pub fn error(subject: impl Into<String>, error: &Error) -> Self {
        Self::new(Severity::Error, subject, error)
    }

    fn new(severity: Severity, subject: impl Into<String>, error: &Error) -> Self {
        let issue = Self {
            severity,
            subject: subject.into(),
            kind: error.kind(),
            message: error.to_string(),
        };
        match severity {
            Severity::Warning => log::warn!("{}: {}", issue.subject, issue.message),
            Severity::Error => log::error!("{}: {}", issue.subject, issue.message),
        }
        issue
    }
}
