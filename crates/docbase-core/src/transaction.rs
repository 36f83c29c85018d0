// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Transaction primitives (spec §4.6 "Transactions").
//!
//! Generalizes the teacher's `Transaction`/`TransactionContext` builder into
//! two small traits a backend pool and its transaction handle implement
//! ([`Transactional`], [`TransactionOps`]), plus a nesting-depth counter and
//! retry envelope ([`TransactionDepth`], [`with_transaction`]) that spec
//! §4.6 adds on top: nested calls join the already-open transaction and only
//! the outermost caller commits or rolls back, and a retryable failure in
//! the outermost scope gets up to [`MAX_TRANSACTION_ATTEMPTS`] tries.
//!
//! Actually threading the live transaction handle down to nested calls is a
//! concrete adapter's responsibility (it knows its own pool/connection
//! type); this module only owns the depth bookkeeping and the retry
//! decision, which are backend-neutral.

use std::{
    error::Error as StdError,
    future::Future,
    sync::atomic::{AtomicU32, Ordering}
};

use crate::error::{AdapterError, ErrorKind};

/// Error wrapper for the four points a transaction can fail (spec §4.6
/// "Failure modes").
#[derive(Debug)]
pub enum TransactionError<E> {
    /// Failed to open the transaction.
    Begin(E),
    /// Failed to commit.
    Commit(E),
    /// Failed to roll back after a failed operation.
    Rollback(E),
    /// The operation running inside the transaction failed.
    Operation(E)
}

impl<E: std::fmt::Display> std::fmt::Display for TransactionError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin(e) => write!(f, "failed to begin transaction: {e}"),
            Self::Commit(e) => write!(f, "failed to commit transaction: {e}"),
            Self::Rollback(e) => write!(f, "failed to roll back transaction: {e}"),
            Self::Operation(e) => write!(f, "transaction operation failed: {e}")
        }
    }
}

impl<E: StdError + 'static> StdError for TransactionError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Begin(e) | Self::Commit(e) | Self::Rollback(e) | Self::Operation(e) => Some(e)
        }
    }
}

impl<E> TransactionError<E> {
    /// `true` for a begin failure.
    pub const fn is_begin(&self) -> bool {
        matches!(self, Self::Begin(_))
    }

    /// `true` for a commit failure.
    pub const fn is_commit(&self) -> bool {
        matches!(self, Self::Commit(_))
    }

    /// `true` for a rollback failure.
    pub const fn is_rollback(&self) -> bool {
        matches!(self, Self::Rollback(_))
    }

    /// `true` for an operation failure.
    pub const fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// Unwrap the inner backend error, discarding which phase it came from.
    pub fn into_inner(self) -> E {
        match self {
            Self::Begin(e) | Self::Commit(e) | Self::Rollback(e) | Self::Operation(e) => e
        }
    }
}

impl<E> From<TransactionError<E>> for AdapterError
where
    E: StdError + Send + Sync + 'static
{
    fn from(err: TransactionError<E>) -> Self {
        let kind = if err.is_begin() || err.is_commit() || err.is_rollback() {
            ErrorKind::Transaction
        } else {
            ErrorKind::Database
        };
        let message = err.to_string();
        AdapterError::new(kind, message).with_cause(err.into_inner())
    }
}

/// A pool-like type that can open a new transaction.
#[allow(async_fn_in_trait)]
pub trait Transactional: Sized + Send + Sync {
    /// The transaction handle this pool opens.
    type Transaction<'t>: Send
    where
        Self: 't;
    /// The backend's native error type.
    type Error: StdError + Send + Sync + 'static;

    /// Begin a new transaction.
    async fn begin(&self) -> Result<Self::Transaction<'_>, Self::Error>;
}

/// A transaction handle that can be finalized.
#[allow(async_fn_in_trait)]
pub trait TransactionOps: Sized + Send {
    /// The backend's native error type.
    type Error: StdError + Send + Sync + 'static;

    /// Commit the transaction.
    async fn commit(self) -> Result<(), Self::Error>;

    /// Roll back the transaction.
    async fn rollback(self) -> Result<(), Self::Error>;
}

/// The retry budget for the outermost transaction scope (spec §4.6 "a
/// retryable failure — serialization conflict, deadlock, lock timeout — is
/// retried up to twice more before surfacing to the caller").
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

/// `true` for the error kinds spec §4.6 names as safe to retry inside a
/// fresh transaction attempt.
pub fn is_retryable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Timeout | ErrorKind::Transaction)
}

/// Tracks how many nested `with_transaction` scopes are currently open on
/// the calling task. Only the outermost scope (depth 1) is allowed to
/// commit, roll back, or retry; inner scopes join whatever transaction the
/// outermost caller already opened.
#[derive(Debug, Default)]
pub struct TransactionDepth(AtomicU32);

impl TransactionDepth {
    /// A fresh, unentered depth counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current nesting depth.
    pub fn current(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    /// Enter one level of nesting. The returned guard decrements on drop,
    /// including on panic-driven unwind.
    pub fn enter(&self) -> TransactionGuard<'_> {
        self.0.fetch_add(1, Ordering::SeqCst);
        TransactionGuard(self)
    }
}

/// RAII guard produced by [`TransactionDepth::enter`].
pub struct TransactionGuard<'a>(&'a TransactionDepth);

impl TransactionGuard<'_> {
    /// `true` if this guard represents the outermost transaction scope.
    pub fn is_outermost(&self) -> bool {
        self.0.current() == 1
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        self.0.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Run `operation` inside a transaction scope, retrying the outermost scope
/// up to [`MAX_TRANSACTION_ATTEMPTS`] times on a retryable error (spec
/// §4.6). Nested calls (an adapter method invoked while already inside a
/// transaction) run `operation` exactly once and propagate its result
/// unchanged — only the outermost caller's retry budget applies.
///
/// `operation` owns opening/closing its own transaction against the
/// concrete backend pool; this function only decides whether a failure is
/// worth retrying and how many times.
pub async fn with_transaction<F, Fut, T>(depth: &TransactionDepth, mut operation: F) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>
{
    let guard = depth.enter();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if guard.is_outermost() && attempt < MAX_TRANSACTION_ATTEMPTS && is_retryable(err.kind) => {
                continue;
            }
            Err(err) => return Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn transaction_error_display_mentions_phase() {
        let err: TransactionError<std::io::Error> = TransactionError::Begin(std::io::Error::other("x"));
        assert!(err.to_string().contains("begin"));
    }

    #[test]
    fn transaction_error_is_methods() {
        let err: TransactionError<&str> = TransactionError::Rollback("e");
        assert!(err.is_rollback());
        assert!(!err.is_commit());
    }

    #[test]
    fn transaction_error_converts_to_adapter_error() {
        let err: TransactionError<std::io::Error> = TransactionError::Commit(std::io::Error::other("boom"));
        let adapter_err: AdapterError = err.into();
        assert_eq!(adapter_err.kind, ErrorKind::Transaction);
    }

    #[test]
    fn operation_error_maps_to_database_kind() {
        let err: TransactionError<std::io::Error> = TransactionError::Operation(std::io::Error::other("boom"));
        let adapter_err: AdapterError = err.into();
        assert_eq!(adapter_err.kind, ErrorKind::Database);
    }

    #[test]
    fn depth_tracks_nesting_and_outermost() {
        let depth = TransactionDepth::new();
        let outer = depth.enter();
        assert!(outer.is_outermost());
        {
            let inner = depth.enter();
            assert!(!inner.is_outermost());
        }
        assert!(outer.is_outermost());
    }

    #[tokio::test]
    async fn with_transaction_retries_on_retryable_error() {
        let depth = TransactionDepth::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), AdapterError> = with_transaction(&depth, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AdapterError::new(ErrorKind::Timeout, "lock timeout"))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn with_transaction_does_not_retry_non_retryable_error() {
        let depth = TransactionDepth::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), AdapterError> = with_transaction(&depth, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdapterError::new(ErrorKind::Duplicate, "dup")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nested_scope_does_not_retry() {
        let depth = TransactionDepth::new();
        let _outer = depth.enter();
        let calls = AtomicU32::new(0);
        let result: Result<(), AdapterError> = with_transaction(&depth, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdapterError::new(ErrorKind::Timeout, "lock timeout")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
