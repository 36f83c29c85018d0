// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Row-level permission grants (spec §3 "Permission Row", §6 "Upstream
//! interface to the façade").
//!
//! Permissions flow in from the façade as opaque strings of the form
//! `action("role")`, e.g. `read("any")` or `update("user:42")`. The core
//! parses these with the fixed pattern the façade documents
//! (`(\w+)\("([^"]+)"\)`), never a general expression grammar.

use std::fmt;

use crate::error::{AdapterError, ErrorKind};

/// The fixed permission-action enumeration (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermissionType {
    /// Grants document creation under the owning collection.
    Create,
    /// Grants document reads.
    Read,
    /// Grants document updates.
    Update,
    /// Grants document deletion.
    Delete,
    /// Grants all of read/update/delete in one row.
    Write
}

impl PermissionType {
    /// All variants, in the fixed enumeration order used for batched
    /// `_perms` inserts (spec §4.9 "grouped by type").
    pub const ALL: [PermissionType; 5] =
        [Self::Create, Self::Read, Self::Update, Self::Delete, Self::Write];

    /// The lowercase action keyword as it appears in `action("role")`
    /// strings and in the `_type` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Write => "write"
        }
    }

    /// Parse the action keyword, case-sensitively matching `as_str`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "write" => Some(Self::Write),
            _ => None
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single parsed permission grant: `action("role")`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Permission {
    /// The granted action.
    pub action: PermissionType,
    /// The opaque role expression (`any`, `user:123`, `team:x/admin`, ...).
    pub role: String
}

impl Permission {
    /// Construct a permission directly.
    pub fn new(action: PermissionType, role: impl Into<String>) -> Self {
        Self {
            action,
            role: role.into()
        }
    }

    /// Parse a single `action("role")` string using the façade's fixed
    /// pattern `(\w+)\("([^"]+)"\)`.
    ///
    /// This is a hand-rolled scan rather than a regex dependency: the
    /// pattern is fixed and anchored (word chars, then a literal `("`,
    /// then anything but `"`, then a literal `")`), so a linear scan is
    /// both simpler and avoids pulling in a regex crate for one shape.
    pub fn parse(s: &str) -> Result<Self, AdapterError> {
        let open = s.find("(\"").ok_or_else(|| malformed(s))?;
        let (action_part, rest) = s.split_at(open);
        if !action_part.chars().all(|c| c.is_alphanumeric() || c == '_') || action_part.is_empty() {
            return Err(malformed(s));
        }
        let rest = &rest[2..];
        let close = rest.find("\")").ok_or_else(|| malformed(s))?;
        let role = &rest[..close];
        if rest[close + 2..].chars().any(|c| !c.is_whitespace()) {
            return Err(malformed(s));
        }

        let action = PermissionType::parse(action_part).ok_or_else(|| malformed(s))?;
        Ok(Self::new(action, role))
    }

    /// Render back to `action("role")` form.
    pub fn render(&self) -> String {
        format!("{}(\"{}\")", self.action.as_str(), self.role)
    }
}

fn malformed(s: &str) -> AdapterError {
    AdapterError::new(ErrorKind::Validation, format!("malformed permission string: '{s}'"))
}

/// Parse a whole `$permissions` list, failing on the first malformed entry.
pub fn parse_all(raw: &[String]) -> Result<Vec<Permission>, AdapterError> {
    raw.iter().map(|s| Permission::parse(s)).collect()
}

/// The result of diffing a document's current `_perms` rows against a new
/// desired set (spec §4.9 "updateDocument ... diffs current vs new
/// permissions").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionDiff {
    /// Permissions present in `current` but absent from `desired`; deleted.
    pub removed: Vec<Permission>,
    /// Permissions present in `desired` but absent from `current`; inserted.
    pub added: Vec<Permission>
}

/// Diff two permission sets, order-independent (spec §8 law 3: "no
/// duplicate rows exist").
pub fn diff(current: &[Permission], desired: &[Permission]) -> PermissionDiff {
    let removed = current.iter().filter(|p| !desired.contains(p)).cloned().collect();
    let added = desired.iter().filter(|p| !current.contains(p)).cloned().collect();
    PermissionDiff { removed, added }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_permission() {
        let p = Permission::parse("read(\"any\")").unwrap();
        assert_eq!(p.action, PermissionType::Read);
        assert_eq!(p.role, "any");
    }

    #[test]
    fn parse_role_with_slash_and_colon() {
        let p = Permission::parse("update(\"team:x/admin\")").unwrap();
        assert_eq!(p.role, "team:x/admin");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Permission::parse("read(any)").is_err());
        assert!(Permission::parse("read(\"any\"").is_err());
        assert!(Permission::parse("not-an-action(\"any\")").is_err());
        assert!(Permission::parse("unknown(\"any\")").is_err());
    }

    #[test]
    fn render_round_trips() {
        let p = Permission::new(PermissionType::Write, "user:1");
        assert_eq!(Permission::parse(&p.render()).unwrap(), p);
    }

    #[test]
    fn diff_detects_additions_and_removals() {
        let current = vec![Permission::new(PermissionType::Read, "any")];
        let desired = vec![
            Permission::new(PermissionType::Read, "any"),
            Permission::new(PermissionType::Update, "user:1")
        ];
        let d = diff(&current, &desired);
        assert!(d.removed.is_empty());
        assert_eq!(d.added, vec![Permission::new(PermissionType::Update, "user:1")]);
    }

    #[test]
    fn diff_is_order_independent() {
        let a = vec![
            Permission::new(PermissionType::Read, "any"),
            Permission::new(PermissionType::Write, "user:1")
        ];
        let b = vec![
            Permission::new(PermissionType::Write, "user:1"),
            Permission::new(PermissionType::Read, "any")
        ];
        let d = diff(&a, &b);
        assert!(d.added.is_empty() && d.removed.is_empty());
    }

    #[test]
    fn diff_exact_replacement_has_no_duplicates() {
        let current = vec![Permission::new(PermissionType::Read, "any")];
        let desired = vec![Permission::new(PermissionType::Read, "any")];
        let d = diff(&current, &desired);
        assert_eq!(d, PermissionDiff::default());
    }
}
