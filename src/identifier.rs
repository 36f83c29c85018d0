// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Identifier filtering at the SQL-generation boundary (spec §4.1: "All
//! string identifiers pass through a filter that restricts them to
//! `[A-Za-z0-9_-]`, rejecting empty results, before interpolation").
//!
//! The filter itself lives in `docbase-core` so both this crate and any
//! future adapter-only crate can share it without depending on `sqlx`. This
//! module re-exports it under the name the component table in SPEC_FULL.md
//! names, plus the table/column name composition rules from spec §4.2.

pub use docbase_core::filter_identifier;

use crate::config::AdapterConfig;

/// Compose a fully-qualified table name: `<prefix>_<name>`, filtered and
/// then wrapped in the dialect's schema-qualification
/// (`<database>.<prefix>_<name>` for MariaDB, `"<schema>"."<prefix>_<name>"`
/// for Postgres — spec §4.2 "Table name composition"). This function only
/// produces the unquoted, unqualified local name; dialect-specific
/// qualification and quoting happens in `sql::dialect`.
pub fn collection_table_name(config: &AdapterConfig, collection: &str) -> Result<String, docbase_core::AdapterError> {
    let filtered = filter_identifier(collection)?;
    Ok(format!("{}_{}", config.prefix, filtered))
}

/// The companion permissions table for a collection: `<prefix>_<name>_perms`.
pub fn perms_table_name(config: &AdapterConfig, collection: &str) -> Result<String, docbase_core::AdapterError> {
    Ok(format!("{}_perms", collection_table_name(config, collection)?))
}

/// The junction table for a many-to-many relationship (spec §4.8):
/// `_<parentInternalId>_<childInternalId>`.
pub fn junction_table_name(parent_internal_id: i64, child_internal_id: i64) -> String {
    format!("_{parent_internal_id}_{child_internal_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdapterConfig {
        AdapterConfig::new("core", "app")
    }

    #[test]
    fn collection_table_name_applies_prefix() {
        assert_eq!(collection_table_name(&config(), "users").unwrap(), "app_users");
    }

    #[test]
    fn perms_table_name_appends_suffix() {
        assert_eq!(perms_table_name(&config(), "users").unwrap(), "app_users_perms");
    }

    #[test]
    fn collection_table_name_rejects_unfilterable_input() {
        assert!(collection_table_name(&config(), "!!!").is_err());
    }

    #[test]
    fn junction_table_name_uses_internal_ids() {
        assert_eq!(junction_table_name(4, 9), "_4_9");
    }
}
