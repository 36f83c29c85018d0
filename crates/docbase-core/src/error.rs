// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The backend-neutral error taxonomy (spec §7).
//!
//! Generalizes the teacher's [per-call `TransactionError<E>`](crate::transaction::TransactionError)
//! source-preservation idiom to the full set of kinds an adapter can raise,
//! carrying the originating backend error as `source` so stack traces are
//! never lost (spec §7 "User-visible behavior").

use std::fmt;

/// The seven error kinds from spec §7's authoritative taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Adapter initialized twice, or the backend rejected configuration.
    Initialization,
    /// Schema, collection, attribute, or document absent where required.
    NotFound,
    /// Unique-constraint violation on a table, column, index, or document.
    Duplicate,
    /// Data wider than the destination column.
    Truncation,
    /// Statement exceeded its deadline.
    Timeout,
    /// `begin`/`commit`/`rollback` failed.
    Transaction,
    /// Catch-all for unmapped backend errors.
    Database,
    /// Caller-supplied identifier or query failed local validation before
    /// ever reaching the backend (identifier filtering, unknown query
    /// method). Not part of the backend-code mapping table but needed so
    /// `filter_identifier` and query parsing have somewhere to report to.
    Validation
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initialization => "initialization error",
            Self::NotFound => "not found",
            Self::Duplicate => "duplicate",
            Self::Truncation => "truncation",
            Self::Timeout => "timeout",
            Self::Transaction => "transaction error",
            Self::Database => "database error",
            Self::Validation => "validation error"
        };
        write!(f, "{s}")
    }
}

/// A typed adapter error: `{kind, message, backendCode?, cause}` (spec §7).
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    /// The taxonomy kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// The raw backend error code, when one was available to map from.
    pub backend_code: Option<String>,
    /// The originating backend error, preserved for stack-trace fidelity.
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>
}

impl AdapterError {
    /// Construct an error with no backend code or cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            backend_code: None,
            cause: None
        }
    }

    /// Attach the raw backend error code.
    #[must_use]
    pub fn with_backend_code(mut self, code: impl Into<String>) -> Self {
        self.backend_code = Some(code.into());
        self
    }

    /// Attach the originating backend error as `cause`.
    #[must_use]
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// `true` for kinds spec §4.11 documents as recoverable in "migrating"
    /// mode (the façade may suppress these during metadata sync).
    pub fn is_duplicate(&self) -> bool {
        matches!(self.kind, ErrorKind::Duplicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = AdapterError::new(ErrorKind::Duplicate, "row exists");
        assert_eq!(err.to_string(), "duplicate: row exists");
    }

    #[test]
    fn with_backend_code_round_trips() {
        let err = AdapterError::new(ErrorKind::Timeout, "slow").with_backend_code("57014");
        assert_eq!(err.backend_code.as_deref(), Some("57014"));
    }

    #[test]
    fn is_duplicate_only_for_duplicate_kind() {
        assert!(AdapterError::new(ErrorKind::Duplicate, "x").is_duplicate());
        assert!(!AdapterError::new(ErrorKind::Timeout, "x").is_duplicate());
    }

    #[test]
    fn cause_is_preserved_as_source() {
        use std::error::Error as _;
        let inner = std::io::Error::other("boom");
        let err = AdapterError::new(ErrorKind::Database, "wrapped").with_cause(inner);
        assert!(err.source().is_some());
    }
}
