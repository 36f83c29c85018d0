// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The MariaDB/MySQL [`Dialect`] implementation (spec §4.3).
//!
//! Grounded on the teacher's MySQL-family SQL fragments (backtick
//! identifiers, `?` placeholders) scattered through
//! `entity-derive-impl/src/entity/sql/mysql/{helpers,crud,query}.rs`,
//! generalized into a single runtime `Dialect` impl the way
//! [`crate::postgres::dialect::PostgresDialect`] generalizes its
//! Postgres-family counterpart.

use crate::sql::{Dialect, fulltext};

/// Backtick-identifier, `?`-placeholder, `LIKE`/`MATCH...AGAINST`/
/// `JSON_OVERLAPS` dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MariadbDialect;

impl Dialect for MariadbDialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("`{ident}`")
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn qualify_table(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }

    fn like_operator(&self) -> &'static str {
        "LIKE"
    }

    fn array_contains_predicate(&self, column: &str, placeholder: &str) -> String {
        format!("JSON_OVERLAPS({column}, {placeholder})")
    }

    fn fulltext_predicate(&self, column: &str, placeholder: &str) -> String {
        format!("MATCH({column}) AGAINST ({placeholder} IN BOOLEAN MODE)")
    }

    fn fulltext_value(&self, raw: &str) -> String {
        let sanitized = fulltext::sanitize(raw);
        if sanitized.quoted {
            format!("\"{}\"", sanitized.text)
        } else {
            format!("{}*", sanitized.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_uses_backticks() {
        assert_eq!(MariadbDialect.quote_ident("name"), "`name`");
    }

    #[test]
    fn placeholder_is_always_question_mark() {
        assert_eq!(MariadbDialect.placeholder(1), "?");
        assert_eq!(MariadbDialect.placeholder(7), "?");
    }

    #[test]
    fn qualify_table_backtick_quotes_both_parts() {
        assert_eq!(MariadbDialect.qualify_table("core", "app_posts"), "`core`.`app_posts`");
    }

    #[test]
    fn like_operator_is_case_sensitive_keyword() {
        assert_eq!(MariadbDialect.like_operator(), "LIKE");
    }

    #[test]
    fn fulltext_value_appends_trailing_wildcard() {
        assert_eq!(MariadbDialect.fulltext_value("quick brown"), "quick brown*");
    }

    #[test]
    fn fulltext_value_preserves_quoted_phrase() {
        assert_eq!(MariadbDialect.fulltext_value("\"quick fox\""), "\"quick fox\"");
    }
}
