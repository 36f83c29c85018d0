// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! [`Document`] — the persistent entity type (spec §3 "Document").

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    permission::{Permission, PermissionType},
    value::AttributeValue
};

/// A persistent document: reserved fields plus an open map of user
/// attributes.
///
/// Attributes are kept in a [`BTreeMap`] so column enumeration (for DDL and
/// for `INSERT`/`UPDATE` column lists) is deterministic across runs — this
/// matters for reproducible generated SQL in tests and for stable
/// `columns_str`-style projections (spec §4.2 "Projection").
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    id: Option<String>,
    internal_id: Option<i64>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    permissions: Vec<Permission>,
    tenant: Option<i64>,
    attributes: BTreeMap<String, AttributeValue>
}

impl Document {
    /// Start building a document with user attributes already known.
    pub fn new() -> Self {
        Self::default()
    }

    /// The external `$id`. `None` before the caller assigns one.
    pub fn get_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Set the external `$id`.
    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.id = Some(id.into());
        self
    }

    /// The backend-assigned monotonic `$internalId`.
    pub fn get_internal_id(&self) -> Option<i64> {
        self.internal_id
    }

    /// Set the backend-assigned `$internalId`, called by the adapter after
    /// `createDocument` inserts the row (spec §4.9).
    pub fn set_internal_id(&mut self, id: i64) -> &mut Self {
        self.internal_id = Some(id);
        self
    }

    /// `$createdAt`.
    pub fn get_created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Set `$createdAt`.
    pub fn set_created_at(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.created_at = Some(at);
        self
    }

    /// `$updatedAt`.
    pub fn get_updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Set `$updatedAt`.
    pub fn set_updated_at(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.updated_at = Some(at);
        self
    }

    /// `$tenant`, present only in shared-table deployments.
    pub fn get_tenant(&self) -> Option<i64> {
        self.tenant
    }

    /// Set `$tenant`.
    pub fn set_tenant(&mut self, tenant: i64) -> &mut Self {
        self.tenant = Some(tenant);
        self
    }

    /// The full ordered `$permissions` list.
    pub fn get_permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// Replace the permissions list wholesale.
    pub fn set_permissions(&mut self, permissions: Vec<Permission>) -> &mut Self {
        self.permissions = permissions;
        self
    }

    /// Permissions filtered to a single [`PermissionType`], matching the
    /// façade's `getPermissionsByType` (spec §6).
    pub fn get_permissions_by_type(&self, kind: PermissionType) -> Vec<&Permission> {
        self.permissions.iter().filter(|p| p.action == kind).collect()
    }

    /// The full user-attribute map.
    pub fn get_attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// Set a single user attribute. Attribute names must not be
    /// `$`-prefixed (spec §6 invariant) — the façade enforces this before
    /// it ever reaches the core, so this is a debug-only assertion rather
    /// than a runtime error path.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: AttributeValue) -> &mut Self {
        let name = name.into();
        debug_assert!(!name.starts_with('$'), "user attributes must not be $-prefixed");
        self.attributes.insert(name, value);
        self
    }

    /// Read a single attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// `$createdAt <= $updatedAt` (spec §3 invariant 3), vacuously true when
    /// either timestamp is unset.
    pub fn timestamps_are_ordered(&self) -> bool {
        match (self.created_at, self.updated_at) {
            (Some(c), Some(u)) => c <= u,
            _ => true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trips_reserved_fields() {
        let mut doc = Document::new();
        doc.set_id("doc-1")
            .set_internal_id(42)
            .set_tenant(7)
            .set_attribute("name", AttributeValue::Str("hi".into()));

        assert_eq!(doc.get_id(), Some("doc-1"));
        assert_eq!(doc.get_internal_id(), Some(42));
        assert_eq!(doc.get_tenant(), Some(7));
        assert_eq!(doc.get_attribute("name"), Some(&AttributeValue::Str("hi".into())));
    }

    #[test]
    fn permissions_by_type_filters() {
        let mut doc = Document::new();
        doc.set_permissions(vec![
            Permission::new(PermissionType::Read, "any"),
            Permission::new(PermissionType::Update, "user:1"),
            Permission::new(PermissionType::Read, "user:2"),
        ]);
        let reads = doc.get_permissions_by_type(PermissionType::Read);
        assert_eq!(reads.len(), 2);
    }

    #[test]
    fn timestamps_ordered_when_unset() {
        assert!(Document::new().timestamps_are_ordered());
    }

    #[test]
    fn timestamps_ordered_checks_created_before_updated() {
        let mut doc = Document::new();
        let now = Utc::now();
        doc.set_created_at(now).set_updated_at(now);
        assert!(doc.timestamps_are_ordered());
    }
}
