// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Observability events (spec §6 "Events").
//!
//! The spec's bespoke event bus (`query:executed`, `pool:created`, ...) is
//! carried by `tracing` instead, the way the teacher's own example
//! applications report lifecycle signals. [`AdapterEvent`] gives callers a
//! typed, exhaustive taxonomy to match against in their own subscriber
//! layers rather than string-matching event names.

use std::fmt;

/// The event taxonomy an adapter instance emits over its lifetime.
/// Delivery is best-effort and synchronous with the triggering operation,
/// matching `tracing`'s synchronous-emit default (spec §6: "best-effort and
/// synchronous with the triggering operation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEvent {
    /// A query executed successfully.
    QueryExecuted,
    /// A query failed.
    QueryError,
    /// A query's row/duration statistics were captured.
    QueryStats,
    /// A connection pool was created.
    PoolCreated,
    /// A connection was returned to the pool.
    PoolReleased,
    /// A pool operation failed.
    PoolError,
    /// The adapter is shutting down.
    Shutdown
}

impl AdapterEvent {
    /// The event name as it appears in `tracing` fields, matching spec §6's
    /// `component:action` naming.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueryExecuted => "query:executed",
            Self::QueryError => "query:error",
            Self::QueryStats => "query:stats",
            Self::PoolCreated => "pool:created",
            Self::PoolReleased => "pool:released",
            Self::PoolError => "pool:error",
            Self::Shutdown => "shutdown"
        }
    }
}

impl fmt::Display for AdapterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Emit a successful query event at `debug` level.
pub fn query_executed(sql: &str, rows: usize, elapsed_ms: u128) {
    tracing::debug!(event = %AdapterEvent::QueryExecuted, rows, elapsed_ms, sql);
}

/// Emit a failed query event at `warn` level.
pub fn query_error(sql: &str, error: &docbase_core::AdapterError) {
    tracing::warn!(event = %AdapterEvent::QueryError, kind = %error.kind, sql, message = %error.message);
}

/// Emit a pool-created event at `info` level.
pub fn pool_created(backend: &str) {
    tracing::info!(event = %AdapterEvent::PoolCreated, backend);
}

/// Emit a shutdown event at `info` level.
pub fn shutdown() {
    tracing::info!(event = %AdapterEvent::Shutdown);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_spec_taxonomy() {
        assert_eq!(AdapterEvent::QueryExecuted.as_str(), "query:executed");
        assert_eq!(AdapterEvent::PoolError.as_str(), "pool:error");
        assert_eq!(AdapterEvent::Shutdown.to_string(), "shutdown");
    }
}
