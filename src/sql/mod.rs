// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The shared SQL dialect core (spec §4.2), specialized by
//! [`crate::mariadb`] and [`crate::postgres`].

pub mod condition;
pub mod dialect;
pub mod fulltext;
pub mod permissions;
pub mod projection;

pub use dialect::Dialect;

/// The attribute-name aliases the condition/projection compilers rewrite
/// before touching the dialect (spec §4.2 "Attribute aliases are rewritten
/// before compilation").
pub fn resolve_alias(attribute: &str) -> &str {
    match attribute {
        "$id" => "_uid",
        "$internalId" => "_id",
        "$tenant" => "_tenant",
        "$createdAt" => "_createdAt",
        "$updatedAt" => "_updatedAt",
        other => other
    }
}

/// The fixed wildcard-escape character set for LIKE-pattern construction
/// (spec §4.2 "Wildcard escape set").
pub const LIKE_WILDCARD_CHARS: &[char] =
    &['%', '_', '[', ']', '^', '-', '.', '*', '+', '?', '(', ')', '{', '}', '|'];

/// Backslash-escape every character in [`LIKE_WILDCARD_CHARS`] (and a
/// literal backslash itself) found in `raw`, so it matches literally
/// inside a `LIKE`/`ILIKE` pattern (spec §8 law 10).
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || LIKE_WILDCARD_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_alias_maps_reserved_fields() {
        assert_eq!(resolve_alias("$id"), "_uid");
        assert_eq!(resolve_alias("$internalId"), "_id");
        assert_eq!(resolve_alias("name"), "name");
    }

    #[test]
    fn escape_like_escapes_every_wildcard_char() {
        assert_eq!(escape_like("50% off"), "50\\% off");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn escape_like_is_noop_for_plain_text() {
        assert_eq!(escape_like("hello world"), "hello world");
    }
}
