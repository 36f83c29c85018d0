// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! [`AttributeValue`] — the dynamic value type held by document attributes.
//!
//! Per the re-architecture hint in spec §9, dynamic attribute maps become a
//! tagged sum type rather than a loosely-typed JSON blob, so the SQL layer
//! can make per-variant decisions (column type, JSON encoding, escaping)
//! without re-inspecting a `serde_json::Value` at every call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A single user-attribute value, as stored on a [`crate::Document`].
///
/// Arrays are always represented as [`AttributeValue::Array`]; the SQL layer
/// promotes any array-valued attribute to a JSON column regardless of the
/// element type (spec §3 "Attribute descriptor").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// SQL `NULL`.
    Null,
    /// Boolean, stored as `TINYINT(1)` (MariaDB) or `BOOLEAN` (Postgres).
    Bool(bool),
    /// Signed integer, stored as `INT`/`BIGINT` by declared byte-width.
    Int(i64),
    /// Floating point, stored as `DOUBLE`/`DOUBLE PRECISION`.
    Float(f64),
    /// Text, stored by the VARCHAR/TEXT ladder per declared size.
    Str(String),
    /// Sub-second timestamp, stored as `DATETIME(3)`/`TIMESTAMP(3)`.
    DateTime(DateTime<Utc>),
    /// Array of values, always promoted to a JSON/JSONB column.
    Array(Vec<AttributeValue>),
    /// Opaque JSON object, used for relationship payloads and passthrough
    /// values the façade has already serialized.
    Json(Json)
}

impl AttributeValue {
    /// `true` if this value must be bound as JSON text rather than a scalar
    /// bind parameter.
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Render this value as the JSON text docbase binds for array/JSON
    /// columns. Scalars are wrapped in their natural JSON representation.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::Number((*i).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Str(s) => Json::String(s.clone()),
            Self::DateTime(dt) => Json::String(dt.to_rfc3339()),
            Self::Array(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Json(v) => v.clone()
        }
    }

    /// Render this value as a plain display string, used for LIKE-pattern
    /// construction (`startsWith`/`endsWith`/`contains` on scalars).
    pub fn as_display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
            Self::DateTime(dt) => dt.to_rfc3339(),
            Self::Array(_) | Self::Json(_) => self.to_json().to_string()
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_json_roundtrip() {
        assert_eq!(AttributeValue::Int(7).to_json(), Json::from(7));
        assert_eq!(AttributeValue::Bool(true).to_json(), Json::from(true));
        assert_eq!(AttributeValue::Str("x".into()).to_json(), Json::from("x"));
    }

    #[test]
    fn array_is_detected() {
        assert!(AttributeValue::Array(vec![AttributeValue::Int(1)]).is_array());
        assert!(!AttributeValue::Int(1).is_array());
    }

    #[test]
    fn array_to_json_nests_elements() {
        let arr = AttributeValue::Array(vec![AttributeValue::Int(1), AttributeValue::Str("a".into())]);
        assert_eq!(arr.to_json(), serde_json::json!([1, "a"]));
    }

    #[test]
    fn display_for_like_patterns() {
        assert_eq!(AttributeValue::Str("hi".into()).as_display(), "hi");
        assert_eq!(AttributeValue::Int(42).as_display(), "42");
    }
}
