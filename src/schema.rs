// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Attribute and index descriptors (spec §3 "Attribute descriptor", "Index
//! descriptor"), the inputs to `createCollection`/`createAttribute`/
//! `createIndex` (spec §4.1).

/// The recognized logical attribute types (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// `VARCHAR`/`TEXT` ladder by declared size.
    String,
    /// `INT`/`BIGINT` by declared byte-width, optionally unsigned.
    Integer,
    /// `DOUBLE`/`DOUBLE PRECISION`.
    Float,
    /// `TINYINT(1)`/`BOOLEAN`.
    Boolean,
    /// Sub-second-precision timestamp.
    DateTime,
    /// Opaque relationship id string, stored as `VARCHAR(255)`.
    Relationship
}

/// A declared attribute (spec §3 "Attribute descriptor").
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    /// The attribute's column name (pre-identifier-filter).
    pub name: String,
    /// The logical type.
    pub kind: AttributeType,
    /// `VARCHAR(n)` size for [`AttributeType::String`]; ignored otherwise.
    pub size: Option<u32>,
    /// Byte-width for [`AttributeType::Integer`] (`>= 8` selects `BIGINT`).
    pub byte_width: Option<u8>,
    /// `true` for `UNSIGNED` integers.
    pub unsigned: bool,
    /// `true` promotes this attribute to a JSON/JSONB column regardless of
    /// `kind` (spec §3: "an `array` flag that promotes any type to a JSON
    /// column").
    pub array: bool,
    /// `true` if the column disallows `NULL`.
    pub required: bool,
    /// The column's default value, rendered as a SQL literal by the
    /// backend's DDL module.
    pub default: Option<String>
}

impl AttributeDescriptor {
    /// A required, non-array attribute with no default.
    pub fn new(name: impl Into<String>, kind: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind,
            size: None,
            byte_width: None,
            unsigned: false,
            array: false,
            required: false,
            default: None
        }
    }

    /// Mark this attribute array-typed (promotes it to a JSON column).
    #[must_use]
    pub fn as_array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Set the `VARCHAR(n)` size for a string attribute.
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }
}

/// A requested change to an existing attribute (spec §4.1 `updateAttribute`
/// — "type/size/rename, widening only guaranteed").
#[derive(Debug, Clone, Default)]
pub struct AttributeUpdate {
    /// A new declared size, required to be `>=` the current size (spec
    /// §4.1: "widening only guaranteed").
    pub size: Option<u32>,
    /// Toggle the required/nullable flag.
    pub required: Option<bool>,
    /// Replace the default value.
    pub default: Option<String>
}

/// The three index kinds (spec §3 "Index descriptor").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Key,
    Unique,
    Fulltext
}

/// A declared index (spec §3 "Index descriptor").
#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    /// The index's name (pre-identifier-filter, pre-tenant-prefix).
    pub name: String,
    /// The index kind.
    pub kind: IndexType,
    /// Attribute names covered by the index, in key order.
    pub attributes: Vec<String>,
    /// Per-attribute key-length prefixes (MariaDB `VARCHAR` prefix
    /// indexing); `0` means "full column".
    pub lengths: Vec<u32>,
    /// Per-attribute sort order: `true` for descending.
    pub descending: Vec<bool>
}

impl IndexDescriptor {
    /// A simple, ascending, full-length key index over `attributes`.
    pub fn key(name: impl Into<String>, attributes: Vec<String>) -> Self {
        let len = attributes.len();
        Self {
            name: name.into(),
            kind: IndexType::Key,
            attributes,
            lengths: vec![0; len],
            descending: vec![false; len]
        }
    }

    /// A unique index over `attributes`.
    pub fn unique(name: impl Into<String>, attributes: Vec<String>) -> Self {
        Self {
            kind: IndexType::Unique,
            ..Self::key(name, attributes)
        }
    }

    /// A fulltext index over `attributes`.
    pub fn fulltext(name: impl Into<String>, attributes: Vec<String>) -> Self {
        Self {
            kind: IndexType::Fulltext,
            ..Self::key(name, attributes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_descriptor_builder_sets_array_and_size() {
        let attr = AttributeDescriptor::new("bio", AttributeType::String).with_size(1000).as_array();
        assert!(attr.array);
        assert_eq!(attr.size, Some(1000));
    }

    #[test]
    fn index_descriptor_key_defaults_to_ascending_full_length() {
        let idx = IndexDescriptor::key("idx_name", vec!["name".to_string()]);
        assert_eq!(idx.lengths, vec![0]);
        assert_eq!(idx.descending, vec![false]);
    }

    #[test]
    fn index_descriptor_unique_sets_kind() {
        let idx = IndexDescriptor::unique("idx_uid", vec!["_uid".to_string()]);
        assert_eq!(idx.kind, IndexType::Unique);
    }
}
