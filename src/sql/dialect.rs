// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The [`Dialect`] trait: the small set of backend-specific string-building
//! rules the condition/projection/permissions compilers need (spec §4.2,
//! §4.3, §4.4).
//!
//! Generalizes the teacher's `Context::dialect.placeholder(n)` /
//! `dialect.quote_ident(..)` calls — used at macro-expansion time to emit
//! `TokenStream`s building SQL strings — into a runtime trait implemented
//! once per backend and consulted by the shared compilers in this module.

/// Backend-specific SQL text rules. Implemented once by
/// [`crate::mariadb::MariadbDialect`] and [`crate::postgres::PostgresDialect`].
pub trait Dialect: Send + Sync {
    /// Quote an identifier (already passed through
    /// [`crate::identifier::filter_identifier`]) for safe interpolation.
    fn quote_ident(&self, ident: &str) -> String;

    /// The bind placeholder for the `index`-th parameter in a statement
    /// (1-based). MariaDB always returns `?`; Postgres returns `$<index>`
    /// (spec §4.4: "A counter threads through SQL generation").
    fn placeholder(&self, index: usize) -> String;

    /// Fully qualify a table name under `schema` (Postgres) or `database`
    /// (MariaDB), quoting both parts (spec §4.2 "Table name composition").
    fn qualify_table(&self, schema: &str, table: &str) -> String;

    /// The `LIKE`-family operator used for `startsWith`/`endsWith`/`contains`
    /// on scalar attributes (MariaDB: `LIKE`; Postgres: `ILIKE`, spec §4.4).
    fn like_operator(&self) -> &'static str;

    /// The array-containment predicate for `contains` on an array-typed
    /// attribute, with `column` and `placeholder` already substituted in.
    fn array_contains_predicate(&self, column: &str, placeholder: &str) -> String;

    /// The full-text predicate for `search`, with `column` and
    /// `placeholder` already substituted in.
    fn fulltext_predicate(&self, column: &str, placeholder: &str) -> String;

    /// Canonicalize a raw `search` query string into the dialect-specific
    /// full-text token bound as the predicate's parameter (spec §4.2
    /// "Fulltext value canonicalization").
    fn fulltext_value(&self, raw: &str) -> String;
}
