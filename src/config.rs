// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Adapter configuration (spec §4.1 "Configuration options").
//!
//! A plain constructor-built struct, matching the teacher's own
//! `entity-core`: there is no external config crate here, because every
//! option is supplied programmatically by the façade that owns the adapter
//! instance, not read from a file or environment at this layer.

/// Options governing how an adapter names tables, scopes tenants, and binds
/// parameters.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// When `true`, collections share one physical table per tenant,
    /// discriminated by the `_tenant` column, instead of one table per
    /// collection-tenant pair.
    pub shared_tables: bool,
    /// The active tenant, required whenever `shared_tables` is `true`.
    pub tenant_id: Option<i64>,
    /// The schema (Postgres) or database (MariaDB) collections live under.
    pub schema: String,
    /// Table-name prefix, applied to every collection and its `_perms`
    /// sibling.
    pub prefix: String,
    /// The largest `VARCHAR(n)` the backend accepts before the adapter
    /// falls back to `TEXT`. `None` uses the backend's own default ladder.
    pub max_varchar_limit: Option<u32>,
    /// When `true`, `$createdAt`/`$updatedAt` values supplied by the caller
    /// are persisted as given rather than overwritten with "now".
    pub preserve_dates: bool,
    /// When `true`, the underlying pool is required to use named rather
    /// than positional placeholders. MariaDB enforces this at pool
    /// creation (spec §4.3); Postgres ignores it (its placeholders are
    /// always positional `$N`).
    pub named_placeholders: bool
}

impl AdapterConfig {
    /// Build a config for a single-tenant deployment (`shared_tables =
    /// false`, `tenant_id = None`).
    pub fn new(schema: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            shared_tables: false,
            tenant_id: None,
            schema: schema.into(),
            prefix: prefix.into(),
            max_varchar_limit: None,
            preserve_dates: false,
            named_placeholders: false
        }
    }

    /// Build a config for a shared-table multi-tenant deployment.
    pub fn shared(schema: impl Into<String>, prefix: impl Into<String>, tenant_id: i64) -> Self {
        Self {
            shared_tables: true,
            tenant_id: Some(tenant_id),
            ..Self::new(schema, prefix)
        }
    }

    /// `true` when reads/writes must be scoped by `_tenant`.
    pub fn requires_tenant_scope(&self) -> bool {
        self.shared_tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_to_single_tenant() {
        let config = AdapterConfig::new("core", "app");
        assert!(!config.requires_tenant_scope());
        assert_eq!(config.tenant_id, None);
    }

    #[test]
    fn shared_sets_tenant_id() {
        let config = AdapterConfig::shared("core", "app", 42);
        assert!(config.requires_tenant_scope());
        assert_eq!(config.tenant_id, Some(42));
    }
}
