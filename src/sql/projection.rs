// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Building the `SELECT` column list from a query's `select()` modifier
//! (spec §4.2 "Projection").

use super::{Dialect, resolve_alias};

/// Build the projected column list for a `SELECT`.
///
/// `selected` is the attribute list from a query's `select()` modifier
/// (empty means "all columns"). The result always includes `_uid` and
/// `_permissions` so row materialization can always recover `$id` and
/// `$permissions` regardless of what the caller projected.
pub fn build(dialect: &dyn Dialect, table_alias: &str, selected: &[String]) -> String {
    if selected.is_empty() {
        return format!("{table_alias}.*");
    }

    let mut columns: Vec<String> = Vec::with_capacity(selected.len() + 2);
    let mut seen = std::collections::HashSet::new();

    for attribute in selected {
        let column = resolve_alias(attribute);
        if seen.insert(column.to_string()) {
            columns.push(format!("{table_alias}.{}", dialect.quote_ident(column)));
        }
    }
    for required in ["_uid", "_permissions"] {
        if seen.insert(required.to_string()) {
            columns.push(format!("{table_alias}.{}", dialect.quote_ident(required)));
        }
    }

    columns.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDialect;

    impl Dialect for FakeDialect {
        fn quote_ident(&self, ident: &str) -> String {
            format!("\"{ident}\"")
        }

        fn placeholder(&self, index: usize) -> String {
            format!("${index}")
        }

        fn qualify_table(&self, schema: &str, table: &str) -> String {
            format!("\"{schema}\".\"{table}\"")
        }

        fn like_operator(&self) -> &'static str {
            "ILIKE"
        }

        fn array_contains_predicate(&self, column: &str, placeholder: &str) -> String {
            format!("{column} @> {placeholder}")
        }

        fn fulltext_predicate(&self, column: &str, placeholder: &str) -> String {
            format!("{column} @@ {placeholder}")
        }

        fn fulltext_value(&self, raw: &str) -> String {
            raw.to_string()
        }
    }

    #[test]
    fn empty_selection_projects_star() {
        assert_eq!(build(&FakeDialect, "t", &[]), "t.*");
    }

    #[test]
    fn selection_always_includes_uid_and_permissions() {
        let out = build(&FakeDialect, "t", &["name".to_string()]);
        assert_eq!(out, "t.\"name\", t.\"_uid\", t.\"_permissions\"");
    }

    #[test]
    fn selection_rewrites_reserved_aliases() {
        let out = build(&FakeDialect, "t", &["$internalId".to_string()]);
        assert!(out.contains("t.\"_id\""));
    }

    #[test]
    fn selection_deduplicates_columns() {
        let out = build(&FakeDialect, "t", &["$id".to_string(), "$id".to_string()]);
        assert_eq!(out, "t.\"_uid\", t.\"_permissions\"");
    }
}
