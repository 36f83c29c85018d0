// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Compiling the query AST (spec §4.5) into parameterized SQL (spec §4.2
//! "Condition compilation").
//!
//! Grounded on the teacher's `generate_where_conditions`/
//! `generate_query_bindings` pair
//! (`entity-derive-impl/src/entity/sql/postgres/helpers.rs`), which threads
//! a `param_idx` counter through recursive condition assembly; here that
//! counter becomes [`ParamCounter`] and the recursive descent follows the
//! query AST directly instead of a fixed per-field loop.

use std::collections::HashSet;

use docbase_core::{
    AdapterError, AttributeValue, ErrorKind,
    query::{Query, QueryMethod}
};

use super::{Dialect, escape_like, resolve_alias};

/// A monotonic 1-based parameter index, threaded through condition
/// compilation so Postgres can emit `$1, $2, ...` across nested boolean
/// groups while MariaDB's `?` placeholders simply ignore the value.
#[derive(Debug, Default)]
pub struct ParamCounter(usize);

impl ParamCounter {
    /// Start counting from 1.
    pub fn new() -> Self {
        Self(0)
    }

    /// Advance and return the next 1-based index.
    pub fn next(&mut self) -> usize {
        self.0 += 1;
        self.0
    }
}

/// A compiled condition: the SQL fragment (already table-alias qualified)
/// and the bind values in the order its placeholders appear.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledCondition {
    /// Empty when the input query list was empty (spec §4.2: "an empty
    /// group compiles to the empty string and is omitted").
    pub sql: String,
    /// Bind values in placeholder order.
    pub binds: Vec<AttributeValue>
}

/// Compile a flat, top-level list of filter/logical queries into a single
/// `AND`-joined condition (spec §4.10 "Compile filter conditions").
pub fn compile_all(
    dialect: &dyn Dialect,
    queries: &[Query],
    array_attributes: &HashSet<String>,
    table_alias: &str,
    counter: &mut ParamCounter
) -> Result<CompiledCondition, AdapterError> {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    for query in queries {
        let compiled = compile_one(dialect, query, array_attributes, table_alias, counter)?;
        if !compiled.sql.is_empty() {
            clauses.push(compiled.sql);
            binds.extend(compiled.binds);
        }
    }

    Ok(CompiledCondition {
        sql: clauses.join(" AND "),
        binds
    })
}

fn compile_one(
    dialect: &dyn Dialect,
    query: &Query,
    array_attributes: &HashSet<String>,
    table_alias: &str,
    counter: &mut ParamCounter
) -> Result<CompiledCondition, AdapterError> {
    if query.method.is_logical() {
        return compile_logical(dialect, query, array_attributes, table_alias, counter);
    }
    compile_filter(dialect, query, array_attributes, table_alias, counter)
}

fn compile_logical(
    dialect: &dyn Dialect,
    query: &Query,
    array_attributes: &HashSet<String>,
    table_alias: &str,
    counter: &mut ParamCounter
) -> Result<CompiledCondition, AdapterError> {
    if query.queries.is_empty() {
        return Ok(CompiledCondition::default());
    }

    let joiner = match query.method {
        QueryMethod::And => " AND ",
        QueryMethod::Or => " OR ",
        _ => unreachable!("compile_logical only called for and/or")
    };

    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    for child in &query.queries {
        let compiled = compile_one(dialect, child, array_attributes, table_alias, counter)?;
        if !compiled.sql.is_empty() {
            clauses.push(compiled.sql);
            binds.extend(compiled.binds);
        }
    }

    if clauses.is_empty() {
        return Ok(CompiledCondition::default());
    }

    let sql = if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        format!("({})", clauses.join(joiner))
    };
    Ok(CompiledCondition { sql, binds })
}

fn compile_filter(
    dialect: &dyn Dialect,
    query: &Query,
    array_attributes: &HashSet<String>,
    table_alias: &str,
    counter: &mut ParamCounter
) -> Result<CompiledCondition, AdapterError> {
    let attribute = query
        .attribute
        .as_deref()
        .ok_or_else(|| AdapterError::new(ErrorKind::Validation, "filter query missing attribute"))?;
    let column = format!("{table_alias}.{}", dialect.quote_ident(resolve_alias(attribute)));
    let on_array = array_attributes.contains(attribute);

    let mut bind = |counter: &mut ParamCounter, value: AttributeValue| {
        let ph = dialect.placeholder(counter.next());
        (ph, value)
    };

    match query.method {
        QueryMethod::Equal | QueryMethod::NotEqual => {
            let op_single = if query.method == QueryMethod::Equal { "=" } else { "!=" };
            let op_multi = if query.method == QueryMethod::Equal { "IN" } else { "NOT IN" };
            require_values(query, 1..=usize::MAX)?;
            if query.values.len() == 1 {
                let (ph, value) = bind(counter, query.values[0].clone());
                Ok(CompiledCondition {
                    sql: format!("{column} {op_single} {ph}"),
                    binds: vec![value]
                })
            } else {
                let mut placeholders = Vec::with_capacity(query.values.len());
                let mut binds = Vec::with_capacity(query.values.len());
                for value in &query.values {
                    let (ph, value) = bind(counter, value.clone());
                    placeholders.push(ph);
                    binds.push(value);
                }
                Ok(CompiledCondition {
                    sql: format!("{column} {op_multi} ({})", placeholders.join(", ")),
                    binds
                })
            }
        }
        QueryMethod::Lesser | QueryMethod::LesserEqual | QueryMethod::Greater | QueryMethod::GreaterEqual => {
            require_values(query, 1..=1)?;
            let op = match query.method {
                QueryMethod::Lesser => "<",
                QueryMethod::LesserEqual => "<=",
                QueryMethod::Greater => ">",
                QueryMethod::GreaterEqual => ">=",
                _ => unreachable!()
            };
            let (ph, value) = bind(counter, query.values[0].clone());
            Ok(CompiledCondition {
                sql: format!("{column} {op} {ph}"),
                binds: vec![value]
            })
        }
        QueryMethod::Between => {
            require_values(query, 2..=2)?;
            let (ph_lo, lo) = bind(counter, query.values[0].clone());
            let (ph_hi, hi) = bind(counter, query.values[1].clone());
            Ok(CompiledCondition {
                sql: format!("{column} BETWEEN {ph_lo} AND {ph_hi}"),
                binds: vec![lo, hi]
            })
        }
        QueryMethod::IsNull => Ok(CompiledCondition {
            sql: format!("{column} IS NULL"),
            binds: Vec::new()
        }),
        QueryMethod::IsNotNull => Ok(CompiledCondition {
            sql: format!("{column} IS NOT NULL"),
            binds: Vec::new()
        }),
        QueryMethod::StartsWith | QueryMethod::EndsWith | QueryMethod::Contains => {
            require_values(query, 1..=1)?;
            if query.method == QueryMethod::Contains && on_array {
                let (ph, _) = bind(counter, AttributeValue::Null);
                let encoded = AttributeValue::Array(vec![query.values[0].clone()]).to_json();
                return Ok(CompiledCondition {
                    sql: dialect.array_contains_predicate(&column, &ph),
                    binds: vec![AttributeValue::Json(encoded)]
                });
            }
            let escaped = escape_like(&query.values[0].as_display());
            let pattern = match query.method {
                QueryMethod::StartsWith => format!("{escaped}%"),
                QueryMethod::EndsWith => format!("%{escaped}"),
                QueryMethod::Contains => format!("%{escaped}%"),
                _ => unreachable!()
            };
            let (ph, value) = bind(counter, AttributeValue::Str(pattern));
            Ok(CompiledCondition {
                sql: format!("{column} {} {ph}", dialect.like_operator()),
                binds: vec![value]
            })
        }
        QueryMethod::Search => {
            require_values(query, 1..=1)?;
            let token = dialect.fulltext_value(&query.values[0].as_display());
            let (ph, value) = bind(counter, AttributeValue::Str(token));
            Ok(CompiledCondition {
                sql: dialect.fulltext_predicate(&column, &ph),
                binds: vec![value]
            })
        }
        other => Err(AdapterError::new(
            ErrorKind::Validation,
            format!("'{}' is not a filter method", other.as_str())
        ))
    }
}

fn require_values(query: &Query, range: std::ops::RangeInclusive<usize>) -> Result<(), AdapterError> {
    if range.contains(&query.values.len()) {
        Ok(())
    } else {
        Err(AdapterError::new(
            ErrorKind::Validation,
            format!(
                "{} requires {}..{} values, got {}",
                query.method.as_str(),
                range.start(),
                range.end(),
                query.values.len()
            )
        ))
    }
}

#[cfg(test)]
mod tests {
    use docbase_core::query::Query;

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
            format!("to_tsvector({column}) @@ websearch_to_tsquery({placeholder})")
        }

        fn fulltext_value(&self, raw: &str) -> String {
            raw.to_string()
        }
    }

    #[test]
    fn equal_single_value_compiles_to_eq() {
        let mut counter = ParamCounter::new();
        let query = Query::equal("status", vec![AttributeValue::Str("active".into())]);
        let compiled = compile_all(&FakeDialect, &[query], &HashSet::new(), "t", &mut counter).unwrap();
        assert_eq!(compiled.sql, "t.\"status\" = $1");
        assert_eq!(compiled.binds, vec![AttributeValue::Str("active".into())]);
    }

    #[test]
    fn equal_multi_value_compiles_to_in() {
        let mut counter = ParamCounter::new();
        let query = Query::equal(
            "status",
            vec![AttributeValue::Str("a".into()), AttributeValue::Str("b".into())]
        );
        let compiled = compile_all(&FakeDialect, &[query], &HashSet::new(), "t", &mut counter).unwrap();
        assert_eq!(compiled.sql, "t.\"status\" IN ($1, $2)");
    }

    #[test]
    fn is_null_has_no_binds() {
        let mut counter = ParamCounter::new();
        let query = Query::is_null("deletedAt");
        let compiled = compile_all(&FakeDialect, &[query], &HashSet::new(), "t", &mut counter).unwrap();
        assert_eq!(compiled.sql, "t.\"deletedAt\" IS NULL");
        assert!(compiled.binds.is_empty());
    }

    #[test]
    fn starts_with_escapes_and_appends_wildcard() {
        let mut counter = ParamCounter::new();
        let query = Query::starts_with("name", "50%");
        let compiled = compile_all(&FakeDialect, &[query], &HashSet::new(), "t", &mut counter).unwrap();
        assert_eq!(compiled.binds, vec![AttributeValue::Str("50\\%%".into())]);
        assert!(compiled.sql.contains("ILIKE"));
    }

    #[test]
    fn contains_on_array_attribute_uses_containment_predicate() {
        let mut counter = ParamCounter::new();
        let array_attrs: HashSet<String> = ["tags".to_string()].into_iter().collect();
        let query = Query::contains("tags", "rust");
        let compiled = compile_all(&FakeDialect, &[query], &array_attrs, "t", &mut counter).unwrap();
        assert!(compiled.sql.contains("@>"));
    }

    #[test]
    fn and_wraps_multiple_children_in_parens() {
        let mut counter = ParamCounter::new();
        let query = Query::and(vec![
            Query::equal("a", vec![AttributeValue::Int(1)]),
            Query::equal("b", vec![AttributeValue::Int(2)])
        ]);
        let compiled = compile_all(&FakeDialect, &[query], &HashSet::new(), "t", &mut counter).unwrap();
        assert_eq!(compiled.sql, "(t.\"a\" = $1 AND t.\"b\" = $2)");
    }

    #[test]
    fn empty_logical_group_compiles_to_empty_and_is_omitted() {
        let mut counter = ParamCounter::new();
        let query = Query::and(vec![]);
        let compiled = compile_all(&FakeDialect, &[query], &HashSet::new(), "t", &mut counter).unwrap();
        assert_eq!(compiled.sql, "");
    }

    #[test]
    fn id_and_tenant_aliases_rewrite_to_reserved_columns() {
        let mut counter = ParamCounter::new();
        let query = Query::equal("$id", vec![AttributeValue::Str("doc-1".into())]);
        let compiled = compile_all(&FakeDialect, &[query], &HashSet::new(), "t", &mut counter).unwrap();
        assert!(compiled.sql.starts_with("t.\"_uid\""));
    }
}
