// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Convenient re-exports for crates implementing a docbase adapter.

pub use crate::{
    AdapterError, AttributeValue, Document, ErrorKind, Permission, PermissionType, Query,
    QueryGroup, async_trait, filter_identifier,
    query::{CursorDirection, OrderDirection},
    transaction::{TransactionError, TransactionOps, Transactional}
};
