// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Postgres DDL emission (spec §4.4, §6 "Persisted schema layout").
//!
//! Postgres has no inline-named-index syntax the way MySQL does, so a
//! collection's DDL is a sequence of statements: one `CREATE TABLE` plus one
//! `CREATE INDEX` per index, mirroring the teacher's
//! `entity-derive-impl/src/entity/migrations/postgres/ddl.rs` split between
//! `generate_create_table`/`generate_single_index`/`generate_composite_index`,
//! generalized from compile-time field lists to runtime attribute/index
//! descriptors.

use std::collections::HashMap;

use crate::{
    config::AdapterConfig,
    relationship::RELATIONSHIP_COLUMN_TYPE,
    schema::{AttributeDescriptor, AttributeType, AttributeUpdate, IndexDescriptor, IndexType},
    sql::Dialect
};

use super::dialect::PostgresDialect;

/// Map a declared attribute to its Postgres column type (spec §4.4 "Type
/// mapping"). The `array` flag always wins, promoting the column to
/// `JSONB` regardless of `kind`.
pub(crate) fn column_type(attribute: &AttributeDescriptor, config: &AdapterConfig) -> String {
    if attribute.array {
        return "JSONB".to_string();
    }
    match attribute.kind {
        AttributeType::String => match (attribute.size, config.max_varchar_limit) {
            (Some(size), Some(limit)) if size > limit => "TEXT".to_string(),
            (Some(size), _) => format!("VARCHAR({size})"),
            (None, _) => "TEXT".to_string()
        },
        AttributeType::Integer => {
            if attribute.byte_width.unwrap_or(4) >= 8 {
                "BIGINT".to_string()
            } else {
                "INTEGER".to_string()
            }
        }
        AttributeType::Float => "DOUBLE PRECISION".to_string(),
        AttributeType::Boolean => "BOOLEAN".to_string(),
        AttributeType::DateTime => "TIMESTAMP(3)".to_string(),
        AttributeType::Relationship => RELATIONSHIP_COLUMN_TYPE.to_string()
    }
}

/// Compose an index name unique across tenants in shared-table mode (spec
/// §4.4: "Index names are composed `<prefix><tenant>_<collection>_<index>`
/// to be unique across tenants in shared-table mode"). `table` here is
/// already the prefixed collection table name.
pub fn index_name(config: &AdapterConfig, table: &str, suffix: &str) -> String {
    match config.tenant_id {
        Some(tenant) if config.requires_tenant_scope() => format!("{table}_{tenant}_{suffix}"),
        _ => format!("{table}_{suffix}")
    }
}

fn quoted_column_ref(dialect: &PostgresDialect, name: &str, case_insensitive: bool, descending: bool) -> String {
    let ident = dialect.quote_ident(name);
    let mut expr = if case_insensitive { format!("LOWER({ident})") } else { ident };
    if descending {
        expr.push_str(" DESC");
    }
    expr
}

/// Emit `CREATE [UNIQUE] INDEX ... ON <table> (<cols>)`, lower-casing
/// string-typed columns in unique indexes for case-insensitive uniqueness
/// (spec §4.4: "Unique indexes on strings are case-insensitive via
/// `LOWER(col)` expression indexes"), or a `USING GIN` expression index over
/// the first attribute for a fulltext index (spec §4.4, Scenario F) — the
/// expression must match [`crate::sql::Dialect::fulltext_predicate`]'s
/// `to_tsvector(regexp_replace(...))` exactly or the planner never picks the
/// index up for `@@ websearch_to_tsquery` queries.
pub fn index_statement(
    dialect: &PostgresDialect,
    config: &AdapterConfig,
    table: &str,
    index: &IndexDescriptor,
    attribute_kinds: &HashMap<String, AttributeType>
) -> String {
    let name = index_name(config, table, &index.name);
    let qualified = dialect.qualify_table(&config.schema, table);
    let quoted_name = dialect.quote_ident(&name);

    if matches!(index.kind, IndexType::Fulltext) {
        let column = index.attributes.first().map(|a| dialect.quote_ident(a)).unwrap_or_default();
        return format!("CREATE INDEX {quoted_name} ON {qualified} USING GIN (to_tsvector(regexp_replace({column}, '[^\\w]+', ' ', 'g')))");
    }

    let unique = matches!(index.kind, IndexType::Unique);
    let columns: Vec<String> = index
        .attributes
        .iter()
        .enumerate()
        .map(|(i, attribute)| {
            let is_string = matches!(attribute_kinds.get(attribute), Some(AttributeType::String));
            let descending = index.descending.get(i).copied().unwrap_or(false);
            quoted_column_ref(dialect, attribute, unique && is_string, descending)
        })
        .collect();

    format!(
        "CREATE {unique}INDEX {quoted_name} ON {qualified} ({cols})",
        unique = if unique { "UNIQUE " } else { "" },
        cols = columns.join(", ")
    )
}

/// Emit the full sequence of statements to materialize a collection and its
/// companion `_perms` table (spec §6 "Persisted schema layout").
pub fn create_collection_statements(
    dialect: &PostgresDialect,
    config: &AdapterConfig,
    table: &str,
    perms_table: &str,
    attributes: &[AttributeDescriptor],
    indexes: &[IndexDescriptor]
) -> Vec<String> {
    let qualified = dialect.qualify_table(&config.schema, table);
    let perms_qualified = dialect.qualify_table(&config.schema, perms_table);
    let shared = config.requires_tenant_scope();

    let mut columns = vec![
        format!("{} BIGSERIAL PRIMARY KEY", dialect.quote_ident("_id")),
        format!("{} VARCHAR(255) NOT NULL", dialect.quote_ident("_uid")),
    ];
    if shared {
        columns.push(format!("{} BIGINT", dialect.quote_ident("_tenant")));
    }
    columns.push(format!("{} TIMESTAMP(3) NOT NULL", dialect.quote_ident("_createdAt")));
    columns.push(format!("{} TIMESTAMP(3) NOT NULL", dialect.quote_ident("_updatedAt")));
    columns.push(format!("{} JSONB NOT NULL", dialect.quote_ident("_permissions")));

    let mut attribute_kinds = HashMap::with_capacity(attributes.len());
    for attribute in attributes {
        let mut definition = format!("{} {}", dialect.quote_ident(&attribute.name), column_type(attribute, config));
        if attribute.required {
            definition.push_str(" NOT NULL");
        }
        if let Some(default) = &attribute.default {
            definition.push_str(&format!(" DEFAULT {default}"));
        }
        columns.push(definition);
        attribute_kinds.insert(attribute.name.clone(), attribute.kind);
    }

    let mut statements = vec![format!("CREATE TABLE {qualified} ({})", columns.join(", "))];

    let uid_index = IndexDescriptor::unique(
        "uid",
        if shared {
            vec!["_uid".to_string(), "_tenant".to_string()]
        } else {
            vec!["_uid".to_string()]
        }
    );
    statements.push(index_statement(dialect, config, table, &uid_index, &attribute_kinds));
    statements.push(index_statement(
        dialect,
        config,
        table,
        &IndexDescriptor::key("created_at", vec!["_createdAt".to_string()]),
        &attribute_kinds
    ));
    statements.push(index_statement(
        dialect,
        config,
        table,
        &IndexDescriptor::key("updated_at", vec!["_updatedAt".to_string()]),
        &attribute_kinds
    ));
    if shared {
        statements.push(index_statement(
            dialect,
            config,
            table,
            &IndexDescriptor::key("tenant_id", vec!["_tenant".to_string(), "_id".to_string()]),
            &attribute_kinds
        ));
    }

    for index in indexes {
        statements.push(index_statement(dialect, config, table, index, &attribute_kinds));
    }

    let mut perms_columns = vec![format!("{} BIGSERIAL PRIMARY KEY", dialect.quote_ident("_id"))];
    if shared {
        perms_columns.push(format!("{} BIGINT", dialect.quote_ident("_tenant")));
    }
    perms_columns.push(format!("{} VARCHAR(32) NOT NULL", dialect.quote_ident("_type")));
    perms_columns.push(format!("{} VARCHAR(255) NOT NULL", dialect.quote_ident("_permission")));
    perms_columns.push(format!("{} VARCHAR(255) NOT NULL", dialect.quote_ident("_document")));
    statements.push(format!("CREATE TABLE {perms_qualified} ({})", perms_columns.join(", ")));

    let perms_unique_attrs = if shared {
        vec!["_document".to_string(), "_tenant".to_string(), "_type".to_string(), "_permission".to_string()]
    } else {
        vec!["_document".to_string(), "_type".to_string(), "_permission".to_string()]
    };
    statements.push(index_statement(
        dialect,
        config,
        perms_table,
        &IndexDescriptor::unique("doc", perms_unique_attrs),
        &HashMap::new()
    ));
    statements.push(index_statement(
        dialect,
        config,
        perms_table,
        &IndexDescriptor::key("lookup", vec!["_permission".to_string(), "_type".to_string()]),
        &HashMap::new()
    ));

    statements
}

/// `DROP TABLE [IF EXISTS] <data>, <perms>`.
pub fn drop_collection_statement(dialect: &PostgresDialect, config: &AdapterConfig, table: &str, perms_table: &str, if_exists: bool) -> String {
    let ie = if if_exists { "IF EXISTS " } else { "" };
    format!(
        "DROP TABLE {ie}{}, {}",
        dialect.qualify_table(&config.schema, table),
        dialect.qualify_table(&config.schema, perms_table)
    )
}

/// `ALTER TABLE <table> ALTER COLUMN ...` for a widen/nullability/default
/// change (spec §4.1 `updateAttribute`).
pub fn alter_attribute_statements(dialect: &PostgresDialect, config: &AdapterConfig, table: &str, name: &str, update: &AttributeUpdate) -> Vec<String> {
    let qualified = dialect.qualify_table(&config.schema, table);
    let ident = dialect.quote_ident(name);
    let mut statements = Vec::new();

    if let Some(size) = update.size {
        statements.push(format!("ALTER TABLE {qualified} ALTER COLUMN {ident} TYPE VARCHAR({size})"));
    }
    if let Some(required) = update.required {
        let action = if required { "SET NOT NULL" } else { "DROP NOT NULL" };
        statements.push(format!("ALTER TABLE {qualified} ALTER COLUMN {ident} {action}"));
    }
    if let Some(default) = &update.default {
        statements.push(format!("ALTER TABLE {qualified} ALTER COLUMN {ident} SET DEFAULT {default}"));
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeDescriptor;

    fn config() -> AdapterConfig {
        AdapterConfig::new("core", "app")
    }

    #[test]
    fn array_attribute_is_promoted_to_jsonb() {
        let attr = AttributeDescriptor::new("tags", AttributeType::String).as_array();
        assert_eq!(column_type(&attr, &config()), "JSONB");
    }

    #[test]
    fn wide_integer_becomes_bigint() {
        let mut attr = AttributeDescriptor::new("views", AttributeType::Integer);
        attr.byte_width = Some(8);
        assert_eq!(column_type(&attr, &config()), "BIGINT");
    }

    #[test]
    fn string_over_limit_falls_back_to_text() {
        let mut attr = AttributeDescriptor::new("bio", AttributeType::String).with_size(20000);
        attr.size = Some(20000);
        let mut cfg = config();
        cfg.max_varchar_limit = Some(10485760);
        assert_eq!(column_type(&attr, &cfg), "VARCHAR(20000)");
        cfg.max_varchar_limit = Some(100);
        assert_eq!(column_type(&attr, &cfg), "TEXT");
    }

    #[test]
    fn create_collection_emits_data_and_perms_tables() {
        let statements = create_collection_statements(&PostgresDialect, &config(), "app_posts", "app_posts_perms", &[], &[]);
        assert!(statements[0].starts_with("CREATE TABLE \"core\".\"app_posts\""));
        assert!(statements.iter().any(|s| s.contains("app_posts_perms")));
    }

    #[test]
    fn shared_table_index_name_embeds_tenant() {
        let cfg = AdapterConfig::shared("core", "app", 7);
        let index = IndexDescriptor::key("by_name", vec!["name".to_string()]);
        let stmt = index_statement(&PostgresDialect, &cfg, "app_posts", &index, &HashMap::new());
        assert!(stmt.contains("app_posts_7_by_name"));
    }

    #[test]
    fn unique_index_on_string_lowercases_expression() {
        let mut kinds = HashMap::new();
        kinds.insert("name".to_string(), AttributeType::String);
        let index = IndexDescriptor::unique("by_name", vec!["name".to_string()]);
        let stmt = index_statement(&PostgresDialect, &config(), "app_posts", &index, &kinds);
        assert!(stmt.contains("LOWER(\"name\")"));
    }

    #[test]
    fn drop_statement_drops_both_tables() {
        let stmt = drop_collection_statement(&PostgresDialect, &config(), "app_posts", "app_posts_perms", true);
        assert_eq!(stmt, "DROP TABLE IF EXISTS \"core\".\"app_posts\", \"core\".\"app_posts_perms\"");
    }

    #[test]
    fn fulltext_index_uses_gin_tsvector_expression() {
        let index = IndexDescriptor::fulltext("bio_fulltext", vec!["bio".to_string()]);
        let stmt = index_statement(&PostgresDialect, &config(), "app_posts", &index, &HashMap::new());
        assert!(stmt.contains("USING GIN (to_tsvector(regexp_replace(\"bio\""));
    }

    #[test]
    fn index_statement_does_not_truncate_on_short_descending_vector() {
        let index = IndexDescriptor {
            name: "by_name_and_age".to_string(),
            kind: IndexType::Key,
            attributes: vec!["name".to_string(), "age".to_string()],
            lengths: vec![],
            descending: vec![]
        };
        let stmt = index_statement(&PostgresDialect, &config(), "app_posts", &index, &HashMap::new());
        assert!(stmt.contains("\"name\""));
        assert!(stmt.contains("\"age\""));
    }
}
