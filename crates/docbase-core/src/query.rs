// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The backend-neutral query AST (spec §4.5 "Query Model").
//!
//! The façade hands the adapter a flat `Vec<Query>` decoded from
//! `{method, attribute, values}` JSON objects. [`group_queries`] separates
//! that flat list into the shape the SQL layer actually needs: filter
//! predicates (possibly nested under `and`/`or`), a projection, an ordering,
//! a page size, and an optional cursor.

use crate::{
    error::{AdapterError, ErrorKind},
    value::AttributeValue
};

/// The fixed set of query method names recognized from `{method, ...}`
/// JSON (spec §4.5). Unknown method strings are a validation error, never
/// silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethod {
    Equal,
    NotEqual,
    Lesser,
    LesserEqual,
    Greater,
    GreaterEqual,
    Search,
    Between,
    IsNull,
    IsNotNull,
    StartsWith,
    EndsWith,
    Contains,
    And,
    Or,
    Select,
    OrderAsc,
    OrderDesc,
    Limit,
    Offset,
    CursorAfter,
    CursorBefore
}

impl QueryMethod {
    /// The exact method keyword used in `{method: "..."}` JSON.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "notEqual",
            Self::Lesser => "lesser",
            Self::LesserEqual => "lesserEqual",
            Self::Greater => "greater",
            Self::GreaterEqual => "greaterEqual",
            Self::Search => "search",
            Self::Between => "between",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Contains => "contains",
            Self::And => "and",
            Self::Or => "or",
            Self::Select => "select",
            Self::OrderAsc => "orderAsc",
            Self::OrderDesc => "orderDesc",
            Self::Limit => "limit",
            Self::Offset => "offset",
            Self::CursorAfter => "cursorAfter",
            Self::CursorBefore => "cursorBefore"
        }
    }

    /// Recognize a method keyword, the `isMethod` check spec §4.5 requires
    /// before the façade ever constructs a [`Query`].
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "equal" => Self::Equal,
            "notEqual" => Self::NotEqual,
            "lesser" => Self::Lesser,
            "lesserEqual" => Self::LesserEqual,
            "greater" => Self::Greater,
            "greaterEqual" => Self::GreaterEqual,
            "search" => Self::Search,
            "between" => Self::Between,
            "isNull" => Self::IsNull,
            "isNotNull" => Self::IsNotNull,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            "contains" => Self::Contains,
            "and" => Self::And,
            "or" => Self::Or,
            "select" => Self::Select,
            "orderAsc" => Self::OrderAsc,
            "orderDesc" => Self::OrderDesc,
            "limit" => Self::Limit,
            "offset" => Self::Offset,
            "cursorAfter" => Self::CursorAfter,
            "cursorBefore" => Self::CursorBefore,
            _ => return None
        })
    }

    /// `true` for the twelve comparison/text methods that filter rows.
    pub fn is_filter(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Lesser
                | Self::LesserEqual
                | Self::Greater
                | Self::GreaterEqual
                | Self::Search
                | Self::Between
                | Self::IsNull
                | Self::IsNotNull
                | Self::StartsWith
                | Self::EndsWith
                | Self::Contains
        )
    }

    /// `true` for `and`/`or`, which nest other queries rather than
    /// naming an attribute directly.
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// `true` for the modifiers that shape result pagination/projection
    /// rather than filtering rows.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Self::Select
                | Self::OrderAsc
                | Self::OrderDesc
                | Self::Limit
                | Self::Offset
                | Self::CursorAfter
                | Self::CursorBefore
        )
    }
}

/// Ascending or descending sort direction (spec §4.5 `orderAsc`/`orderDesc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc
}

impl OrderDirection {
    /// The SQL keyword, identical across both supported dialects.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC"
        }
    }
}

/// Keyset-pagination direction (spec §4.5 `cursorAfter`/`cursorBefore`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    After,
    Before
}

/// One query node: a filter, a logical grouping of nested queries, or a
/// pagination/projection modifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Which method this node represents.
    pub method: QueryMethod,
    /// The target attribute name, absent for `and`/`or`/`limit`/`offset`.
    pub attribute: Option<String>,
    /// The method's operand values (empty for `isNull`/`isNotNull`).
    pub values: Vec<AttributeValue>,
    /// Nested queries, populated only for `and`/`or`.
    pub queries: Vec<Query>
}

impl Query {
    fn leaf(method: QueryMethod, attribute: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        Self {
            method,
            attribute: Some(attribute.into()),
            values,
            queries: Vec::new()
        }
    }

    /// `equal(attribute, values)`.
    pub fn equal(attribute: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::Equal, attribute, values)
    }

    /// `notEqual(attribute, values)`.
    pub fn not_equal(attribute: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::NotEqual, attribute, values)
    }

    /// `lesser(attribute, value)`.
    pub fn lesser(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::Lesser, attribute, vec![value.into()])
    }

    /// `lesserEqual(attribute, value)`.
    pub fn lesser_equal(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::LesserEqual, attribute, vec![value.into()])
    }

    /// `greater(attribute, value)`.
    pub fn greater(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::Greater, attribute, vec![value.into()])
    }

    /// `greaterEqual(attribute, value)`.
    pub fn greater_equal(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::GreaterEqual, attribute, vec![value.into()])
    }

    /// `between(attribute, lower, upper)`.
    pub fn between(attribute: impl Into<String>, lower: impl Into<AttributeValue>, upper: impl Into<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::Between, attribute, vec![lower.into(), upper.into()])
    }

    /// `startsWith(attribute, value)`.
    pub fn starts_with(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::StartsWith, attribute, vec![value.into()])
    }

    /// `endsWith(attribute, value)`.
    pub fn ends_with(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::EndsWith, attribute, vec![value.into()])
    }

    /// `contains(attribute, value)`.
    pub fn contains(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::Contains, attribute, vec![value.into()])
    }

    /// `search(attribute, value)`, a single full-text query string.
    pub fn search(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::leaf(QueryMethod::Search, attribute, vec![value.into()])
    }

    /// `isNull(attribute)`.
    pub fn is_null(attribute: impl Into<String>) -> Self {
        Self::leaf(QueryMethod::IsNull, attribute, Vec::new())
    }

    /// `isNotNull(attribute)`.
    pub fn is_not_null(attribute: impl Into<String>) -> Self {
        Self::leaf(QueryMethod::IsNotNull, attribute, Vec::new())
    }

    /// `and([queries...])`.
    pub fn and(queries: Vec<Query>) -> Self {
        Self {
            method: QueryMethod::And,
            attribute: None,
            values: Vec::new(),
            queries
        }
    }

    /// `or([queries...])`.
    pub fn or(queries: Vec<Query>) -> Self {
        Self {
            method: QueryMethod::Or,
            attribute: None,
            values: Vec::new(),
            queries
        }
    }

    /// `select([attributes...])`.
    pub fn select(attributes: Vec<String>) -> Self {
        Self {
            method: QueryMethod::Select,
            attribute: None,
            values: attributes.into_iter().map(AttributeValue::Str).collect(),
            queries: Vec::new()
        }
    }

    /// `orderAsc(attribute)` / `orderDesc(attribute)`.
    pub fn order(attribute: impl Into<String>, direction: OrderDirection) -> Self {
        let method = match direction {
            OrderDirection::Asc => QueryMethod::OrderAsc,
            OrderDirection::Desc => QueryMethod::OrderDesc
        };
        Self::leaf(method, attribute, Vec::new())
    }

    /// `limit(n)`.
    pub fn limit(n: u32) -> Self {
        Self {
            method: QueryMethod::Limit,
            attribute: None,
            values: vec![AttributeValue::Int(i64::from(n))],
            queries: Vec::new()
        }
    }

    /// `offset(n)`.
    pub fn offset(n: u32) -> Self {
        Self {
            method: QueryMethod::Offset,
            attribute: None,
            values: vec![AttributeValue::Int(i64::from(n))],
            queries: Vec::new()
        }
    }

    /// `cursorAfter(documentId)` / `cursorBefore(documentId)`.
    pub fn cursor(document_id: impl Into<String>, direction: CursorDirection) -> Self {
        let method = match direction {
            CursorDirection::After => QueryMethod::CursorAfter,
            CursorDirection::Before => QueryMethod::CursorBefore
        };
        Self {
            method,
            attribute: None,
            values: vec![AttributeValue::Str(document_id.into())],
            queries: Vec::new()
        }
    }
}

/// The default page size applied when no `limit` query is present,
/// matching the façade's own default (spec §4.5 "Defaults").
pub const DEFAULT_LIMIT: u32 = 25;

/// The maximum page size an adapter accepts regardless of the requested
/// `limit` (spec §4.5 "Defaults", spec §8 law 7).
pub const MAX_LIMIT: u32 = 1000;

/// A flat `Vec<Query>`, separated into filters and resolved modifiers —
/// the shape the SQL layer consumes (spec §4.5, §4.10 "Find Semantics").
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryGroup {
    /// Top-level filter/logical nodes, ANDed together.
    pub filters: Vec<Query>,
    /// Projected attribute names; empty means "all columns".
    pub select: Vec<String>,
    /// Ordering clauses, applied in the order given, most-specific first.
    pub orders: Vec<(String, OrderDirection)>,
    /// Resolved page size, clamped to [`MAX_LIMIT`] and defaulted to
    /// [`DEFAULT_LIMIT`] when absent.
    pub limit: u32,
    /// Row offset, 0 when absent.
    pub offset: u32,
    /// Keyset cursor, when a `cursorAfter`/`cursorBefore` was present.
    pub cursor: Option<(String, CursorDirection)>
}

/// Split a flat query list into filters and modifiers, applying defaults
/// and the hard limit clamp (spec §4.5, §8 law 7: "a requested limit above
/// the backend's hard cap is clamped, never rejected").
///
/// Later modifiers of the same kind override earlier ones, matching how
/// the façade itself folds repeated calls to the same builder method.
pub fn group_queries(queries: &[Query]) -> Result<QueryGroup, AdapterError> {
    let mut group = QueryGroup {
        limit: DEFAULT_LIMIT,
        ..QueryGroup::default()
    };
    let mut limit_set = false;

    for query in queries {
        if query.method.is_filter() || query.method.is_logical() {
            group.filters.push(query.clone());
            continue;
        }

        match query.method {
            QueryMethod::Select => {
                group.select = query
                    .values
                    .iter()
                    .map(|v| v.as_display())
                    .collect();
            }
            QueryMethod::OrderAsc | QueryMethod::OrderDesc => {
                let attribute = query.attribute.clone().ok_or_else(|| {
                    AdapterError::new(ErrorKind::Validation, "order query missing attribute")
                })?;
                let direction = if query.method == QueryMethod::OrderAsc {
                    OrderDirection::Asc
                } else {
                    OrderDirection::Desc
                };
                group.orders.push((attribute, direction));
            }
            QueryMethod::Limit => {
                let n = first_int(query)?;
                group.limit = u32::try_from(n).unwrap_or(0).min(MAX_LIMIT);
                limit_set = true;
            }
            QueryMethod::Offset => {
                let n = first_int(query)?;
                group.offset = u32::try_from(n).unwrap_or(0);
            }
            QueryMethod::CursorAfter => {
                group.cursor = Some((first_str(query)?, CursorDirection::After));
            }
            QueryMethod::CursorBefore => {
                group.cursor = Some((first_str(query)?, CursorDirection::Before));
            }
            _ => unreachable!("filter/logical methods handled above")
        }
    }

    if !limit_set {
        group.limit = DEFAULT_LIMIT;
    }
    Ok(group)
}

fn first_int(query: &Query) -> Result<i64, AdapterError> {
    match query.values.first() {
        Some(AttributeValue::Int(n)) => Ok(*n),
        _ => Err(AdapterError::new(
            ErrorKind::Validation,
            format!("{} requires a single integer value", query.method.as_str())
        ))
    }
}

fn first_str(query: &Query) -> Result<String, AdapterError> {
    match query.values.first() {
        Some(AttributeValue::Str(s)) => Ok(s.clone()),
        _ => Err(AdapterError::new(
            ErrorKind::Validation,
            format!("{} requires a single string value", query.method.as_str())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_round_trips_all_variants() {
        for method in [
            QueryMethod::Equal,
            QueryMethod::NotEqual,
            QueryMethod::Lesser,
            QueryMethod::LesserEqual,
            QueryMethod::Greater,
            QueryMethod::GreaterEqual,
            QueryMethod::Search,
            QueryMethod::Between,
            QueryMethod::IsNull,
            QueryMethod::IsNotNull,
            QueryMethod::StartsWith,
            QueryMethod::EndsWith,
            QueryMethod::Contains,
            QueryMethod::And,
            QueryMethod::Or,
            QueryMethod::Select,
            QueryMethod::OrderAsc,
            QueryMethod::OrderDesc,
            QueryMethod::Limit,
            QueryMethod::Offset,
            QueryMethod::CursorAfter,
            QueryMethod::CursorBefore
        ] {
            assert_eq!(QueryMethod::parse(method.as_str()), Some(method));
        }
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert_eq!(QueryMethod::parse("bogus"), None);
    }

    #[test]
    fn group_queries_separates_filters_and_modifiers() {
        let queries = vec![
            Query::equal("status", vec![AttributeValue::Str("active".into())]),
            Query::order("name", OrderDirection::Asc),
            Query::limit(10),
            Query::offset(5)
        ];
        let group = group_queries(&queries).unwrap();
        assert_eq!(group.filters.len(), 1);
        assert_eq!(group.orders, vec![("name".to_string(), OrderDirection::Asc)]);
        assert_eq!(group.limit, 10);
        assert_eq!(group.offset, 5);
    }

    #[test]
    fn group_queries_defaults_limit_when_absent() {
        let group = group_queries(&[]).unwrap();
        assert_eq!(group.limit, DEFAULT_LIMIT);
        assert_eq!(group.offset, 0);
        assert!(group.cursor.is_none());
    }

    #[test]
    fn group_queries_clamps_limit_to_max() {
        let group = group_queries(&[Query::limit(10_000)]).unwrap();
        assert_eq!(group.limit, MAX_LIMIT);
    }

    #[test]
    fn group_queries_keeps_last_cursor() {
        let queries = vec![
            Query::cursor("doc-a", CursorDirection::After),
            Query::cursor("doc-b", CursorDirection::Before)
        ];
        let group = group_queries(&queries).unwrap();
        assert_eq!(group.cursor, Some(("doc-b".to_string(), CursorDirection::Before)));
    }

    #[test]
    fn and_nests_child_queries() {
        let nested = Query::and(vec![
            Query::equal("a", vec![AttributeValue::Int(1)]),
            Query::equal("b", vec![AttributeValue::Int(2)])
        ]);
        let group = group_queries(&[nested]).unwrap();
        assert_eq!(group.filters.len(), 1);
        assert_eq!(group.filters[0].queries.len(), 2);
    }
}
