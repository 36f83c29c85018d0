// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The row-level authorization predicate (spec §4.2 "Permissions predicate").

use docbase_core::{AttributeValue, PermissionType};

use super::Dialect;

/// A compiled permissions predicate plus any bind values it needs (the
/// tenant placeholder, in shared-table mode).
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionPredicate {
    /// The `_uid IN (SELECT ...)` clause.
    pub sql: String,
    /// Bind values, in placeholder order.
    pub binds: Vec<AttributeValue>
}

/// Build the predicate restricting reads to documents the given roles may
/// act on (spec §4.2): `table_main._uid IN (SELECT _document FROM
/// <name>_perms WHERE _permission IN (<roles>) AND _type = '<action>' [AND
/// (_tenant = ? OR _tenant IS NULL)])`. `any` is always implicitly present
/// among the roles.
pub fn build(
    dialect: &dyn Dialect,
    table_alias: &str,
    perms_table: &str,
    action: PermissionType,
    roles: &[String],
    shared_tables: bool,
    next_placeholder: &mut impl FnMut() -> String
) -> PermissionPredicate {
    let mut role_literals: Vec<String> = roles.iter().map(|r| sql_literal(r)).collect();
    if !roles.iter().any(|r| r == "any") {
        role_literals.insert(0, sql_literal("any"));
    }

    let mut sql = format!(
        "{alias}.{uid} IN (SELECT _document FROM {perms} WHERE _permission IN ({roles}) AND _type = {action})",
        alias = table_alias,
        uid = dialect.quote_ident("_uid"),
        perms = perms_table,
        roles = role_literals.join(", "),
        action = sql_literal(action.as_str())
    );

    let mut binds = Vec::new();
    if shared_tables {
        let ph = next_placeholder();
        sql.push_str(&format!(
            " AND ({tenant} = {ph} OR {tenant} IS NULL)",
            tenant = dialect.quote_ident("_tenant")
        ));
        binds.push(AttributeValue::Null);
    }

    PermissionPredicate { sql, binds }
}

/// Quote and minimally escape a string for inline SQL-literal use. Roles
/// reach this function already validated by
/// [`docbase_core::permission::Permission::parse`], but a stray apostrophe
/// must still not break statement syntax.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
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
    fn any_is_always_present() {
        let mut idx = 0;
        let predicate = build(&FakeDialect, "t", "app_posts_perms", PermissionType::Read, &["user:1".to_string()], false, &mut || {
            idx += 1;
            format!("${idx}")
        });
        assert!(predicate.sql.contains("'any'"));
        assert!(predicate.sql.contains("'user:1'"));
        assert!(predicate.binds.is_empty());
    }

    #[test]
    fn any_is_not_duplicated() {
        let mut idx = 0;
        let predicate = build(&FakeDialect, "t", "app_posts_perms", PermissionType::Read, &["any".to_string()], false, &mut || {
            idx += 1;
            format!("${idx}")
        });
        assert_eq!(predicate.sql.matches("'any'").count(), 1);
    }

    #[test]
    fn shared_tables_append_tenant_clause_and_bind() {
        let mut idx = 0;
        let predicate = build(&FakeDialect, "t", "app_posts_perms", PermissionType::Write, &["any".to_string()], true, &mut || {
            idx += 1;
            format!("${idx}")
        });
        assert!(predicate.sql.contains("_tenant"));
        assert_eq!(predicate.binds.len(), 1);
    }

    #[test]
    fn role_apostrophes_are_escaped() {
        let mut idx = 0;
        let predicate = build(&FakeDialect, "t", "app_posts_perms", PermissionType::Read, &["team:o'brien".to_string()], false, &mut || {
            idx += 1;
            format!("${idx}")
        });
        assert!(predicate.sql.contains("'team:o''brien'"));
    }
}
