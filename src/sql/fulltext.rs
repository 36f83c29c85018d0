// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Shared full-text value sanitization (spec §4.2 "Fulltext value
//! canonicalization"), consulted by both backends' `Dialect::fulltext_value`
//! before they apply their own trailing-token convention.

/// A sanitized full-text search string: operator characters stripped,
/// internal whitespace collapsed, and whether the original input was
/// quoted (in which case backends preserve the phrase as an exact match
/// rather than tokenizing it further).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedQuery {
    /// The cleaned text, without surrounding quotes.
    pub text: String,
    /// `true` if the caller wrapped the original value in double quotes.
    pub quoted: bool
}

/// The operator characters spec §4.2 strips before tokenizing: `@ + - * )
/// ( < > ~ "`.
const OPERATOR_CHARS: &[char] = &['@', '+', '-', '*', ')', '(', '<', '>', '~', '"'];

/// Strip the fixed operator-character set, collapse runs of whitespace to
/// a single space, and detect whether the original value was
/// quote-delimited.
pub fn sanitize(raw: &str) -> SanitizedQuery {
    let trimmed = raw.trim();
    let quoted = trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2;

    let stripped: String = trimmed.chars().filter(|c| !OPERATOR_CHARS.contains(c)).collect();
    let text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    SanitizedQuery { text, quoted }
}
