//! Error types for guardian-core.
//!
//! Every error that can cross the store boundary maps to a machine-readable
//! [`ErrorCode`] and a human-readable message, with the underlying cause kept
//! as the error `source` for diagnostics.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::{RunStatus, SyncRunId};

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "conflict")]
    Conflict,
    #[serde(rename = "internal")]
    Internal,
    #[serde(rename = "invalid")]
    Invalid,
    #[serde(rename = "notFound")]
    NotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Conflict => "conflict",
            ErrorCode::Internal => "internal",
            ErrorCode::Invalid => "invalid",
            ErrorCode::NotFound => "notFound",
        }
    }

    /// Message shown when an error carries no message of its own.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Conflict => "Conflict",
            ErrorCode::Invalid => "Invalid",
            ErrorCode::NotFound => "Not found",
            ErrorCode::Internal => {
                "An internal error has occurred. Please contact technical support."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A required field of a job or run is empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("<invalid> {field} must be set")]
pub struct ValidationError {
    pub field: &'static str,
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self { field }
    }
}

/// An illegal lifecycle move was requested.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("sync run {id} is already {status}; terminal status is final")]
    AlreadyTerminal { id: SyncRunId, status: RunStatus },

    #[error("sync run {id} cannot move from {from} to {to}")]
    Illegal {
        id: SyncRunId,
        from: RunStatus,
        to: RunStatus,
    },
}

/// All errors a run store can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The run failed validation and was never written.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("<notFound> sync run {id} not found")]
    NotFound { id: SyncRunId },

    #[error("<conflict> sync run {id} already exists")]
    Conflict { id: SyncRunId },

    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored document could not be encoded or decoded.
    #[error("failed to parse sync run at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Invalid(_) => ErrorCode::Invalid,
            StoreError::NotFound { .. } => ErrorCode::NotFound,
            StoreError::Conflict { .. } => ErrorCode::Conflict,
            StoreError::Io { .. } | StoreError::Parse { .. } | StoreError::Backend(_) => {
                ErrorCode::Internal
            }
        }
    }

    /// Human-readable message. Internal failures never leak their cause here;
    /// use the `Display` impl or `source()` chain for diagnostics.
    pub fn message(&self) -> String {
        match self {
            StoreError::Invalid(err) => format!("{} must be set", err.field),
            StoreError::NotFound { .. } | StoreError::Conflict { .. } => self.to_string(),
            _ => self.code().default_message().to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
