//! Error types for carryover.
//!
//! Every variant maps to exactly one [`ErrorKind`] through [`Error::kind`].
//! That table is the only place deciding whether a failure is retried, skips
//! a single item, or aborts the whole session.

use std::io;
use thiserror::Error;

/// Result type alias for carryover operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while transferring items.
///
/// Error codes follow the pattern `CARRY-XXX` for easy grepping in logs.
#[derive(Error, Debug)]
pub enum Error {
    /// Transient network or server failure (CARRY-001).
    #[error("[CARRY-001] Transient failure: {0}")]
    Transient(String),

    /// Rate limit signalled by a remote system (CARRY-002).
    #[error("[CARRY-002] Rate limited: {0}")]
    RateLimited(String),

    /// Credentials rejected (CARRY-003).
    #[error("[CARRY-003] Authentication failed: {0}")]
    Authentication(String),

    /// Remote system refused the operation (CARRY-004).
    #[error("[CARRY-004] Permission denied: {0}")]
    PermissionDenied(String),

    /// Item could not be read or parsed from the source (CARRY-005).
    #[error("[CARRY-005] Malformed item '{id}': {message}")]
    MalformedItem {
        /// Source item identifier.
        id: String,
        /// What was wrong with it.
        message: String,
    },

    /// Destination rejected the item content (CARRY-006).
    #[error("[CARRY-006] Destination rejected item '{id}': {message}")]
    Rejected {
        /// Source item identifier.
        id: String,
        /// Reason given by the destination.
        message: String,
    },

    /// Destination accepted the upload but did not confirm durable receipt (CARRY-007).
    #[error("[CARRY-007] Destination did not confirm item '{0}'")]
    NotCommitted(String),

    /// Destination cannot be reached at all (CARRY-008).
    #[error("[CARRY-008] Destination unreachable: {0}")]
    DestinationUnreachable(String),

    /// Checkpoint could not be written (CARRY-009).
    #[error("[CARRY-009] Checkpoint error: {0}")]
    Checkpoint(String),

    /// Invalid or missing configuration (CARRY-010).
    #[error("[CARRY-010] Configuration error: {0}")]
    Config(String),

    /// Retryable operation kept failing (CARRY-011).
    #[error("[CARRY-011] {operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Operation name used for logging.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last error observed.
        #[source]
        source: Box<Error>,
    },

    /// Run was cancelled at an item boundary (CARRY-012).
    #[error("[CARRY-012] Transfer cancelled")]
    Cancelled,

    /// IO error (CARRY-013).
    #[error("[CARRY-013] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (CARRY-014).
    #[error("[CARRY-014] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error (CARRY-015).
    #[error("[CARRY-015] YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// How far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retried with backoff; surfaced only when retries run out.
    Transient,
    /// The current item is skipped and the run continues.
    PerItemFatal,
    /// The run aborts; the last saved checkpoint stays valid.
    SessionFatal,
    /// Fails before any transfer attempt.
    Configuration,
    /// User interrupt.
    Interrupted,
}

impl ErrorKind {
    /// Whether the retry executor should try again.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl Error {
    /// Returns the error code (e.g., "CARRY-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Transient(_) => "CARRY-001",
            Self::RateLimited(_) => "CARRY-002",
            Self::Authentication(_) => "CARRY-003",
            Self::PermissionDenied(_) => "CARRY-004",
            Self::MalformedItem { .. } => "CARRY-005",
            Self::Rejected { .. } => "CARRY-006",
            Self::NotCommitted(_) => "CARRY-007",
            Self::DestinationUnreachable(_) => "CARRY-008",
            Self::Checkpoint(_) => "CARRY-009",
            Self::Config(_) => "CARRY-010",
            Self::RetriesExhausted { .. } => "CARRY-011",
            Self::Cancelled => "CARRY-012",
            Self::Io(_) => "CARRY-013",
            Self::Json(_) => "CARRY-014",
            Self::Yaml(_) => "CARRY-015",
        }
    }

    /// Classification table.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient(_) | Self::RateLimited(_) => ErrorKind::Transient,
            Self::Io(e) => match e.kind() {
                io::ErrorKind::PermissionDenied
                | io::ErrorKind::ReadOnlyFilesystem
                | io::ErrorKind::StorageFull => ErrorKind::SessionFatal,
                io::ErrorKind::InvalidInput
                | io::ErrorKind::InvalidData
                | io::ErrorKind::Unsupported => ErrorKind::PerItemFatal,
                _ => ErrorKind::Transient,
            },
            Self::MalformedItem { .. }
            | Self::Rejected { .. }
            | Self::NotCommitted(_)
            | Self::RetriesExhausted { .. }
            | Self::Json(_) => ErrorKind::PerItemFatal,
            Self::Authentication(_)
            | Self::PermissionDenied(_)
            | Self::DestinationUnreachable(_)
            | Self::Checkpoint(_) => ErrorKind::SessionFatal,
            Self::Config(_) | Self::Yaml(_) => ErrorKind::Configuration,
            Self::Cancelled => ErrorKind::Interrupted,
        }
    }

    /// Shorthand for a malformed-item error.
    pub fn malformed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedItem {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a destination rejection.
    pub fn rejected(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            id: id.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(Error::Transient("timeout".into()).kind().is_retryable());
        assert!(Error::RateLimited("429".into()).kind().is_retryable());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(Error::Io(io).kind().is_retryable());
    }

    #[test]
    fn test_local_disk_errors_are_not_retried() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(Error::Io(denied).kind(), ErrorKind::SessionFatal);

        let full = std::io::Error::from(std::io::ErrorKind::StorageFull);
        assert_eq!(Error::Io(full).kind(), ErrorKind::SessionFatal);

        let bad = std::io::Error::from(std::io::ErrorKind::InvalidData);
        assert_eq!(Error::Io(bad).kind(), ErrorKind::PerItemFatal);
    }

    #[test]
    fn test_auth_and_permission_are_session_fatal() {
        assert_eq!(
            Error::Authentication("401".into()).kind(),
            ErrorKind::SessionFatal
        );
        assert_eq!(
            Error::PermissionDenied("403".into()).kind(),
            ErrorKind::SessionFatal
        );
    }

    #[test]
    fn test_item_errors_are_per_item_fatal() {
        assert_eq!(
            Error::malformed("m1", "bad base64").kind(),
            ErrorKind::PerItemFatal
        );
        assert_eq!(
            Error::rejected("m1", "too large").kind(),
            ErrorKind::PerItemFatal
        );
        assert!(!Error::rejected("m1", "too large").kind().is_retryable());
    }

    #[test]
    fn test_retries_exhausted_keeps_source() {
        let err = Error::RetriesExhausted {
            operation: "upload m1".into(),
            attempts: 3,
            source: Box::new(Error::Transient("503".into())),
        };

        assert_eq!(err.kind(), ErrorKind::PerItemFatal);
        assert!(err.to_string().contains("after 3 attempts"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_codes_are_unique() {
        let errors = [
            Error::Transient(String::new()),
            Error::RateLimited(String::new()),
            Error::Authentication(String::new()),
            Error::PermissionDenied(String::new()),
            Error::malformed("", ""),
            Error::rejected("", ""),
            Error::NotCommitted(String::new()),
            Error::DestinationUnreachable(String::new()),
            Error::Checkpoint(String::new()),
            Error::Config(String::new()),
            Error::Cancelled,
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(Error::code).collect();
        assert_eq!(codes.len(), errors.len());
    }
}
