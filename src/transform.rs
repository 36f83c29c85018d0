// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The pre-execute SQL transform pipeline (spec §4.7).
//!
//! A [`TransformRegistry`] maps `(event, name)` to an ordered callback that
//! rewrites a SQL string before it reaches the connection. Before executing
//! any statement, the core folds the `all`-event callbacks first, then the
//! callbacks registered against the statement's own event, in the order
//! they were installed (spec §9 re-architecture hint: "an ordered registry
//! keyed by `(event, name) → function(sql) → sql`").

use std::{collections::HashMap, fmt};

/// The recognized transform events (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformEvent {
    /// Applies to every statement, before its specific event's callbacks.
    All,
    DocumentCreate,
    DocumentUpdate,
    DocumentsUpdate,
    DocumentDelete,
    DocumentsDelete,
    DocumentFind,
    DocumentCount,
    DocumentSum,
    PermissionsCreate,
    PermissionsDelete,
    PermissionsRead,
    AttributeCreate,
    AttributeUpdate,
    AttributeDelete,
    IndexCreate,
    IndexDelete,
    IndexRename,
    DatabaseCreate,
    DatabaseDelete,
    CollectionCreate,
    CollectionDelete
}

impl TransformEvent {
    /// The event keyword as it appears in façade-facing APIs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::DocumentCreate => "documentCreate",
            Self::DocumentUpdate => "documentUpdate",
            Self::DocumentsUpdate => "documentsUpdate",
            Self::DocumentDelete => "documentDelete",
            Self::DocumentsDelete => "documentsDelete",
            Self::DocumentFind => "documentFind",
            Self::DocumentCount => "documentCount",
            Self::DocumentSum => "documentSum",
            Self::PermissionsCreate => "permissionsCreate",
            Self::PermissionsDelete => "permissionsDelete",
            Self::PermissionsRead => "permissionsRead",
            Self::AttributeCreate => "attributeCreate",
            Self::AttributeUpdate => "attributeUpdate",
            Self::AttributeDelete => "attributeDelete",
            Self::IndexCreate => "indexCreate",
            Self::IndexDelete => "indexDelete",
            Self::IndexRename => "indexRename",
            Self::DatabaseCreate => "databaseCreate",
            Self::DatabaseDelete => "databaseDelete",
            Self::CollectionCreate => "collectionCreate",
            Self::CollectionDelete => "collectionDelete"
        }
    }
}

impl fmt::Display for TransformEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type Callback = Box<dyn Fn(&str) -> String + Send + Sync>;

/// An ordered registry of named SQL-rewriting callbacks, plus the
/// `setMetadata` comment-preamble map (spec §4.7 "Metadata").
#[derive(Default)]
pub struct TransformRegistry {
    callbacks: HashMap<TransformEvent, Vec<(String, Callback)>>,
    metadata: Vec<(String, String)>
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("events", &self.callbacks.keys().collect::<Vec<_>>())
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) a named callback against `event`. Installing a
    /// name that already exists replaces its callback in place, preserving
    /// its original position in the fold order.
    pub fn before(&mut self, event: TransformEvent, name: impl Into<String>, callback: Callback) {
        let name = name.into();
        let entries = self.callbacks.entry(event).or_default();
        if let Some(slot) = entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = callback;
        } else {
            entries.push((name, callback));
        }
    }

    /// Remove a named callback, matching the façade's `before(event, name,
    /// null)` removal convention.
    pub fn remove(&mut self, event: TransformEvent, name: &str) {
        if let Some(entries) = self.callbacks.get_mut(&event) {
            entries.retain(|(n, _)| n != name);
        }
    }

    /// Install a `timeout`-named transformer, the convention spec
    /// §4.3/§4.4 use for statement-level deadlines.
    pub fn set_timeout(&mut self, event: TransformEvent, callback: Callback) {
        self.before(event, "timeout", callback);
    }

    /// Remove the `timeout`-named transformer.
    pub fn clear_timeout(&mut self, event: TransformEvent) {
        self.remove(event, "timeout");
    }

    /// Set or replace a metadata key, used to build the `/* key: value */`
    /// comment preamble.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.metadata.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.metadata.push((key, value));
        }
    }

    /// Clear all metadata keys.
    pub fn reset_metadata(&mut self) {
        self.metadata.clear();
    }

    /// Fold `all`-event callbacks, then `event`'s own callbacks, over `sql`
    /// in insertion order, then prepend the metadata comment preamble.
    pub fn apply(&self, event: TransformEvent, sql: &str) -> String {
        let mut rewritten = sql.to_string();
        if event != TransformEvent::All {
            if let Some(entries) = self.callbacks.get(&TransformEvent::All) {
                for (_, callback) in entries {
                    rewritten = callback(&rewritten);
                }
            }
        }
        if let Some(entries) = self.callbacks.get(&event) {
            for (_, callback) in entries {
                rewritten = callback(&rewritten);
            }
        }
        self.prefix_metadata(&rewritten)
    }

    fn prefix_metadata(&self, sql: &str) -> String {
        if self.metadata.is_empty() {
            return sql.to_string();
        }
        let mut prefixed = String::new();
        for (key, value) in &self.metadata {
            prefixed.push_str(&format!("/* {key}: {value} */\n"));
        }
        prefixed.push_str(sql);
        prefixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_event_callbacks_run_before_specific_event() {
        let mut registry = TransformRegistry::new();
        registry.before(TransformEvent::All, "upper", Box::new(|s| s.to_uppercase()));
        registry.before(TransformEvent::DocumentFind, "suffix", Box::new(|s| format!("{s};")));
        let out = registry.apply(TransformEvent::DocumentFind, "select 1");
        assert_eq!(out, "SELECT 1;");
    }

    #[test]
    fn callbacks_fold_in_insertion_order() {
        let mut registry = TransformRegistry::new();
        registry.before(TransformEvent::DocumentFind, "a", Box::new(|s| format!("{s}-a")));
        registry.before(TransformEvent::DocumentFind, "b", Box::new(|s| format!("{s}-b")));
        let out = registry.apply(TransformEvent::DocumentFind, "x");
        assert_eq!(out, "x-a-b");
    }

    #[test]
    fn replacing_a_name_preserves_its_position() {
        let mut registry = TransformRegistry::new();
        registry.before(TransformEvent::DocumentFind, "a", Box::new(|s| format!("{s}-a1")));
        registry.before(TransformEvent::DocumentFind, "b", Box::new(|s| format!("{s}-b")));
        registry.before(TransformEvent::DocumentFind, "a", Box::new(|s| format!("{s}-a2")));
        let out = registry.apply(TransformEvent::DocumentFind, "x");
        assert_eq!(out, "x-a2-b");
    }

    #[test]
    fn removing_a_name_drops_its_callback() {
        let mut registry = TransformRegistry::new();
        registry.before(TransformEvent::DocumentFind, "a", Box::new(|s| format!("{s}-a")));
        registry.remove(TransformEvent::DocumentFind, "a");
        assert_eq!(registry.apply(TransformEvent::DocumentFind, "x"), "x");
    }

    #[test]
    fn metadata_prefixes_as_comment_lines() {
        let mut registry = TransformRegistry::new();
        registry.set_metadata("service", "docbase");
        let out = registry.apply(TransformEvent::DocumentFind, "select 1");
        assert_eq!(out, "/* service: docbase */\nselect 1");
    }

    #[test]
    fn reset_metadata_clears_prefixes() {
        let mut registry = TransformRegistry::new();
        registry.set_metadata("service", "docbase");
        registry.reset_metadata();
        assert_eq!(registry.apply(TransformEvent::DocumentFind, "select 1"), "select 1");
    }

    #[test]
    fn timeout_transformer_installs_under_fixed_name() {
        let mut registry = TransformRegistry::new();
        registry.set_timeout(TransformEvent::DocumentFind, Box::new(|s| format!("SET STATEMENT max_statement_time = 5 FOR {s}")));
        let out = registry.apply(TransformEvent::DocumentFind, "select 1");
        assert!(out.contains("max_statement_time"));
        registry.clear_timeout(TransformEvent::DocumentFind);
        assert_eq!(registry.apply(TransformEvent::DocumentFind, "select 1"), "select 1");
    }
}
