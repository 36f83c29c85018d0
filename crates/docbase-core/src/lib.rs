// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Backend-neutral types shared by every docbase SQL adapter.
//!
//! This crate provides the data model (documents, attribute values,
//! permissions), the structured query AST, the transaction traits, and the
//! error taxonomy. It has no dependency on any particular SQL backend —
//! `docbase`'s `mariadb` and `postgres` modules build on top of it.
//!
//! # Overview
//!
//! - [`Document`] — a persistent record with reserved fields and user
//!   attributes
//! - [`Permission`] / [`PermissionType`] — row-level authorization grants
//! - [`query`] — the structured query AST and grouping routine
//! - [`Transactional`] / [`TransactionOps`] — transaction lifecycle traits
//! - [`AdapterError`] / [`ErrorKind`] — the backend-neutral error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod permission;
pub mod prelude;
pub mod query;
pub mod transaction;
pub mod value;

pub use document::Document;
pub use error::{AdapterError, ErrorKind};
pub use permission::{Permission, PermissionType};
pub use query::{OrderDirection, Query, QueryGroup};
pub use value::AttributeValue;

/// Re-export async_trait for downstream adapter implementations.
pub use async_trait::async_trait;

/// Reserved column names interpreted by the core and never exposed as user
/// attributes (spec §6 "Invariants for compatibility").
pub const RESERVED_COLUMNS: &[&str] =
    &["_id", "_uid", "_tenant", "_createdAt", "_updatedAt", "_permissions"];

/// Restrict an identifier to `[A-Za-z0-9_-]`, rejecting inputs whose
/// filtered form would be empty (spec §4.1).
///
/// Idempotent: `filter_identifier(filter_identifier(x)?) == filter_identifier(x)`.
pub fn filter_identifier(raw: &str) -> Result<String, AdapterError> {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if filtered.is_empty() {
        return Err(AdapterError::new(
            ErrorKind::Validation,
            format!("identifier '{raw}' has no valid characters after filtering")
        ));
    }

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_identifier_strips_invalid_chars() {
        assert_eq!(filter_identifier("my.table;name").unwrap(), "mytablename");
    }

    #[test]
    fn filter_identifier_keeps_allowed_chars() {
        assert_eq!(filter_identifier("user_profiles-v2").unwrap(), "user_profiles-v2");
    }

    #[test]
    fn filter_identifier_rejects_empty_result() {
        assert!(filter_identifier("!!!").is_err());
        assert!(filter_identifier("").is_err());
    }

    #[test]
    fn filter_identifier_is_idempotent() {
        let once = filter_identifier("weird$$name--1").unwrap();
        let twice = filter_identifier(&once).unwrap();
        assert_eq!(once, twice);
    }
}
