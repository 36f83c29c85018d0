// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The Postgres backend (spec §4.4): [`PostgresDialect`] plus
//! [`PostgresAdapter`], the concrete `Adapter` implementation holding a
//! `sqlx::PgPool`.
//!
//! Grounded on the teacher's `entity-derive-impl/src/entity/sql/postgres/`
//! module (`context.rs` owning the pool/dialect pair the generated code
//! calls into) and `migrations/postgres/ddl.rs` (DDL emission), generalized
//! from compile-time-generated calls to a runtime trait implementation.

pub mod ddl;
pub mod dialect;
pub mod errors;

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docbase_core::{
    AdapterError, AttributeValue, ErrorKind,
    transaction::{TransactionDepth, TransactionOps, Transactional}
};
use sqlx::{
    Column, Row, TypeInfo,
    postgres::{PgArguments, PgPoolOptions, PgRow}
};
use tokio::sync::Mutex;

pub use dialect::PostgresDialect;

use crate::{
    adapter::{Adapter, ExecuteResult, RawRow},
    config::AdapterConfig,
    events,
    identifier,
    schema::{AttributeDescriptor, AttributeUpdate, IndexDescriptor},
    sql::Dialect,
    transform::TransformRegistry
};

/// A Postgres-backed [`Adapter`]: one connection pool, dialect, transform
/// registry, and transaction-depth counter per façade-owned instance (spec
/// §5 "Scheduling model").
pub struct PostgresAdapter {
    url: String,
    pool: Option<sqlx::PgPool>,
    config: AdapterConfig,
    dialect: PostgresDialect,
    transforms: TransformRegistry,
    depth: TransactionDepth,
    /// The connection pinned by `begin_transaction` for the duration of a
    /// `withTransaction` callback (spec §5); `execute`/`fetch` run against
    /// it instead of the pool whenever it is set.
    active: Mutex<Option<sqlx::Transaction<'static, sqlx::Postgres>>>
}

impl PostgresAdapter {
    /// Build an uninitialized adapter; call [`Adapter::init`] before use.
    pub fn new(url: impl Into<String>, config: AdapterConfig) -> Self {
        Self {
            url: url.into(),
            pool: None,
            config,
            dialect: PostgresDialect,
            transforms: TransformRegistry::new(),
            depth: TransactionDepth::new(),
            active: Mutex::new(None)
        }
    }

    fn pool(&self) -> Result<&sqlx::PgPool, AdapterError> {
        self.pool.as_ref().ok_or_else(|| AdapterError::new(ErrorKind::Initialization, "adapter not initialized"))
    }
}

/// Wraps the owned `sqlx` transaction handle [`Transactional::begin`]
/// opens so [`TransactionOps`] — defined in `docbase-core`, which has no
/// `sqlx` dependency — can be implemented for it: the trait is foreign to
/// this crate and so is `sqlx::Transaction`, so the impl needs a type that
/// is local to this crate to satisfy the orphan rule.
pub struct PostgresTransactionHandle(sqlx::Transaction<'static, sqlx::Postgres>);

impl Transactional for PostgresAdapter {
    type Transaction<'t>
        = PostgresTransactionHandle
    where
        Self: 't;
    type Error = AdapterError;

    async fn begin(&self) -> Result<Self::Transaction<'_>, Self::Error> {
        let tx = self.pool()?.begin().await.map_err(|e| map_sqlx_error(&e))?;
        Ok(PostgresTransactionHandle(tx))
    }
}

impl TransactionOps for PostgresTransactionHandle {
    type Error = AdapterError;

    async fn commit(self) -> Result<(), Self::Error> {
        self.0.commit().await.map_err(|e| map_sqlx_error(&e))
    }

    async fn rollback(self) -> Result<(), Self::Error> {
        self.0.rollback().await.map_err(|e| map_sqlx_error(&e))
    }
}

fn map_sqlx_error(error: &sqlx::Error) -> AdapterError {
    if let Some(db_error) = error.as_database_error() {
        let code = db_error.code().map(|c| c.to_string());
        let kind = code.as_deref().and_then(errors::map_code).unwrap_or(ErrorKind::Database);
        let mut adapter_error = AdapterError::new(kind, db_error.message().to_string());
        if let Some(code) = code {
            adapter_error = adapter_error.with_backend_code(code);
        }
        return adapter_error;
    }
    AdapterError::new(ErrorKind::Database, error.to_string())
}

fn bind_value<'q>(mut query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>, value: &'q AttributeValue) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    query = match value {
        AttributeValue::Null => query.bind(Option::<String>::None),
        AttributeValue::Bool(b) => query.bind(*b),
        AttributeValue::Int(i) => query.bind(*i),
        AttributeValue::Float(f) => query.bind(*f),
        AttributeValue::Str(s) => query.bind(s.clone()),
        AttributeValue::DateTime(dt) => query.bind(*dt),
        AttributeValue::Array(_) => query.bind(value.to_json()),
        AttributeValue::Json(v) => query.bind(v.clone())
    };
    query
}

fn row_to_raw_row(row: PgRow) -> Result<RawRow, AdapterError> {
    let mut out = RawRow::new();
    for column in row.columns() {
        let name = column.name().to_string();
        let value = decode_column(&row, column.ordinal(), column.type_info().name())?;
        out.insert(name, value);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<AttributeValue, AdapterError> {
    let decode_error = |e: sqlx::Error| map_sqlx_error(&e);
    match type_name {
        "BOOL" => Ok(row
            .try_get::<Option<bool>, _>(index)
            .map_err(decode_error)?
            .map(AttributeValue::Bool)
            .unwrap_or(AttributeValue::Null)),
        "INT2" | "INT4" | "INT8" => Ok(row
            .try_get::<Option<i64>, _>(index)
            .map_err(decode_error)?
            .map(AttributeValue::Int)
            .unwrap_or(AttributeValue::Null)),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => Ok(row
            .try_get::<Option<f64>, _>(index)
            .map_err(decode_error)?
            .map(AttributeValue::Float)
            .unwrap_or(AttributeValue::Null)),
        "TIMESTAMP" | "TIMESTAMPTZ" => Ok(row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map_err(decode_error)?
            .map(AttributeValue::DateTime)
            .unwrap_or(AttributeValue::Null)),
        "JSON" | "JSONB" => Ok(row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map_err(decode_error)?
            .map(AttributeValue::Json)
            .unwrap_or(AttributeValue::Null)),
        _ => Ok(row
            .try_get::<Option<String>, _>(index)
            .map_err(decode_error)?
            .map(AttributeValue::Str)
            .unwrap_or(AttributeValue::Null))
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn dialect(&self) -> &dyn crate::sql::Dialect {
        &self.dialect
    }

    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    fn transforms_mut(&mut self) -> &mut TransformRegistry {
        &mut self.transforms
    }

    fn transaction_depth(&self) -> &TransactionDepth {
        &self.depth
    }

    async fn execute(&self, sql: &str, binds: Vec<AttributeValue>) -> Result<ExecuteResult, AdapterError> {
        let is_insert = sql.trim_start().to_uppercase().starts_with("INSERT");
        let owned_sql;
        let sql_to_run: &str = if is_insert && !sql.to_uppercase().contains("RETURNING") {
            owned_sql = format!("{sql} RETURNING {}", self.dialect.quote_ident("_id"));
            &owned_sql
        } else {
            sql
        };

        let start = Instant::now();
        let mut active = self.active.lock().await;
        let result = if let Some(tx) = active.as_mut() {
            let mut query = sqlx::query(sql_to_run);
            for value in &binds {
                query = bind_value(query, value);
            }
            if is_insert {
                let row = query.fetch_optional(&mut **tx).await.map_err(|e| {
                    let mapped = map_sqlx_error(&e);
                    events::query_error(sql, &mapped);
                    mapped
                })?;
                let insert_id = row.as_ref().and_then(|r| r.try_get::<i64, _>("_id").ok());
                ExecuteResult {
                    rows_affected: u64::from(row.is_some()),
                    insert_id
                }
            } else {
                let outcome = query.execute(&mut **tx).await.map_err(|e| {
                    let mapped = map_sqlx_error(&e);
                    events::query_error(sql, &mapped);
                    mapped
                })?;
                ExecuteResult {
                    rows_affected: outcome.rows_affected(),
                    insert_id: None
                }
            }
        } else {
            drop(active);
            let pool = self.pool()?;
            let mut query = sqlx::query(sql_to_run);
            for value in &binds {
                query = bind_value(query, value);
            }
            if is_insert {
                let row = query.fetch_optional(pool).await.map_err(|e| {
                    let mapped = map_sqlx_error(&e);
                    events::query_error(sql, &mapped);
                    mapped
                })?;
                let insert_id = row.as_ref().and_then(|r| r.try_get::<i64, _>("_id").ok());
                ExecuteResult {
                    rows_affected: u64::from(row.is_some()),
                    insert_id
                }
            } else {
                let outcome = query.execute(pool).await.map_err(|e| {
                    let mapped = map_sqlx_error(&e);
                    events::query_error(sql, &mapped);
                    mapped
                })?;
                ExecuteResult {
                    rows_affected: outcome.rows_affected(),
                    insert_id: None
                }
            }
        };
        events::query_executed(sql, result.rows_affected as usize, start.elapsed().as_millis());
        Ok(result)
    }

    async fn fetch(&self, sql: &str, binds: Vec<AttributeValue>) -> Result<Vec<RawRow>, AdapterError> {
        let start = Instant::now();
        let mut active = self.active.lock().await;
        let rows = if let Some(tx) = active.as_mut() {
            let mut query = sqlx::query(sql);
            for value in &binds {
                query = bind_value(query, value);
            }
            query.fetch_all(&mut **tx).await.map_err(|e| {
                let mapped = map_sqlx_error(&e);
                events::query_error(sql, &mapped);
                mapped
            })?
        } else {
            drop(active);
            let pool = self.pool()?;
            let mut query = sqlx::query(sql);
            for value in &binds {
                query = bind_value(query, value);
            }
            query.fetch_all(pool).await.map_err(|e| {
                let mapped = map_sqlx_error(&e);
                events::query_error(sql, &mapped);
                mapped
            })?
        };
        events::query_executed(sql, rows.len(), start.elapsed().as_millis());
        rows.into_iter().map(row_to_raw_row).collect()
    }

    async fn begin_transaction(&self) -> Result<(), AdapterError> {
        let handle = Transactional::begin(self).await?;
        *self.active.lock().await = Some(handle.0);
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<(), AdapterError> {
        let tx = self.active.lock().await.take();
        if let Some(tx) = tx {
            PostgresTransactionHandle(tx).commit().await?;
        }
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<(), AdapterError> {
        let tx = self.active.lock().await.take();
        if let Some(tx) = tx {
            PostgresTransactionHandle(tx).rollback().await?;
        }
        Ok(())
    }

    async fn init(&mut self) -> Result<(), AdapterError> {
        if self.pool.is_some() {
            return Err(AdapterError::new(ErrorKind::Initialization, "adapter already initialized"));
        }
        let pool = PgPoolOptions::new()
            .connect(&self.url)
            .await
            .map_err(|e| AdapterError::new(ErrorKind::Initialization, e.to_string()).with_cause(e))?;
        events::pool_created("postgres");
        self.pool = Some(pool);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            events::shutdown();
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), AdapterError> {
        self.fetch("SELECT 1", Vec::new()).await.map(|_| ())
    }

    fn is_initialized(&self) -> bool {
        self.pool.is_some()
    }

    async fn create(&self, name: &str) -> Result<(), AdapterError> {
        let filtered = identifier::filter_identifier(name)?;
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", self.dialect.quote_ident(&filtered));
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    async fn drop(&self, name: &str) -> Result<(), AdapterError> {
        let filtered = identifier::filter_identifier(name)?;
        let sql = format!("DROP SCHEMA IF EXISTS {} CASCADE", self.dialect.quote_ident(&filtered));
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    async fn use_database(&mut self, name: &str) -> Result<(), AdapterError> {
        let filtered = identifier::filter_identifier(name)?;
        self.config.schema = filtered;
        Ok(())
    }

    async fn exists(&self, name: &str, collection: Option<&str>) -> Result<bool, AdapterError> {
        let filtered = identifier::filter_identifier(name)?;
        let rows = if let Some(collection) = collection {
            let table = identifier::collection_table_name(&self.config, collection)?;
            self.fetch(
                "SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
                vec![AttributeValue::Str(filtered), AttributeValue::Str(table)]
            )
            .await?
        } else {
            self.fetch("SELECT 1 FROM information_schema.schemata WHERE schema_name = $1", vec![AttributeValue::Str(filtered)]).await?
        };
        Ok(!rows.is_empty())
    }

    async fn create_collection(&self, name: &str, attributes: &[AttributeDescriptor], indexes: &[IndexDescriptor], if_exists: bool) -> Result<(), AdapterError> {
        let table = identifier::collection_table_name(&self.config, name)?;
        let perms_table = identifier::perms_table_name(&self.config, name)?;
        if if_exists && self.exists(&self.config.schema, Some(name)).await? {
            return Ok(());
        }
        for statement in ddl::create_collection_statements(&self.dialect, &self.config, &table, &perms_table, attributes, indexes) {
            let statement = self.transforms.apply(crate::transform::TransformEvent::CollectionCreate, &statement);
            self.execute(&statement, Vec::new()).await?;
        }
        Ok(())
    }

    async fn drop_collection(&self, name: &str, if_exists: bool) -> Result<(), AdapterError> {
        let table = identifier::collection_table_name(&self.config, name)?;
        let perms_table = identifier::perms_table_name(&self.config, name)?;
        let statement = ddl::drop_collection_statement(&self.dialect, &self.config, &table, &perms_table, if_exists);
        let statement = self.transforms.apply(crate::transform::TransformEvent::CollectionDelete, &statement);
        self.execute(&statement, Vec::new()).await?;
        Ok(())
    }

    async fn create_attribute(&self, collection: &str, attribute: &AttributeDescriptor) -> Result<(), AdapterError> {
        let table = identifier::collection_table_name(&self.config, collection)?;
        let qualified = self.dialect.qualify_table(&self.config.schema, &table);
        let column_type = ddl::column_type(attribute, &self.config);
        self.add_column(&qualified, &attribute.name, &column_type).await
    }

    async fn update_attribute(&self, collection: &str, name: &str, update: &AttributeUpdate) -> Result<(), AdapterError> {
        let table = identifier::collection_table_name(&self.config, collection)?;
        for statement in ddl::alter_attribute_statements(&self.dialect, &self.config, &table, name, update) {
            let statement = self.transforms.apply(crate::transform::TransformEvent::AttributeUpdate, &statement);
            self.execute(&statement, Vec::new()).await?;
        }
        Ok(())
    }

    async fn delete_attribute(&self, collection: &str, name: &str) -> Result<(), AdapterError> {
        let table = identifier::collection_table_name(&self.config, collection)?;
        let qualified = self.dialect.qualify_table(&self.config.schema, &table);
        self.drop_column(&qualified, name).await
    }

    async fn rename_attribute(&self, collection: &str, old_name: &str, new_name: &str) -> Result<(), AdapterError> {
        let table = identifier::collection_table_name(&self.config, collection)?;
        let sql = format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.dialect.qualify_table(&self.config.schema, &table),
            self.dialect.quote_ident(old_name),
            self.dialect.quote_ident(new_name)
        );
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    async fn create_index(&self, collection: &str, index: &IndexDescriptor) -> Result<(), AdapterError> {
        let table = identifier::collection_table_name(&self.config, collection)?;
        let sql = ddl::index_statement(&self.dialect, &self.config, &table, index, &std::collections::HashMap::new());
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    async fn delete_index(&self, collection: &str, name: &str) -> Result<(), AdapterError> {
        let table = identifier::collection_table_name(&self.config, collection)?;
        let index_name = ddl::index_name(&self.config, &table, name);
        let sql = format!(
            "DROP INDEX IF EXISTS {}.{}",
            self.dialect.quote_ident(&self.config.schema),
            self.dialect.quote_ident(&index_name)
        );
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    async fn rename_index(&self, collection: &str, old_name: &str, new_name: &str) -> Result<(), AdapterError> {
        let table = identifier::collection_table_name(&self.config, collection)?;
        let old = ddl::index_name(&self.config, &table, old_name);
        let new = ddl::index_name(&self.config, &table, new_name);
        let sql = format!(
            "ALTER INDEX {}.{} RENAME TO {}",
            self.dialect.quote_ident(&self.config.schema),
            self.dialect.quote_ident(&old),
            self.dialect.quote_ident(&new)
        );
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    async fn get_size_of_collection(&self, collection: &str) -> Result<u64, AdapterError> {
        let table = identifier::collection_table_name(&self.config, collection)?;
        let qualified = self.dialect.qualify_table(&self.config.schema, &table);
        let rows = self.fetch(&format!("SELECT COUNT(*) AS count FROM {qualified}"), Vec::new()).await?;
        Ok(rows.first().and_then(|r| r.get("count")).and_then(|v| if let AttributeValue::Int(n) = v { Some(*n as u64) } else { None }).unwrap_or(0))
    }

    async fn get_size_of_collection_on_disk(&self, collection: &str) -> Result<u64, AdapterError> {
        let table = identifier::collection_table_name(&self.config, collection)?;
        let qualified = self.dialect.qualify_table(&self.config.schema, &table);
        let rows = self
            .fetch(&format!("SELECT pg_total_relation_size('{qualified}') AS count"), Vec::new())
            .await?;
        Ok(rows.first().and_then(|r| r.get("count")).and_then(|v| if let AttributeValue::Int(n) = v { Some(*n as u64) } else { None }).unwrap_or(0))
    }

    async fn get_connection_id(&self) -> Result<String, AdapterError> {
        let rows = self.fetch("SELECT pg_backend_pid() AS count", Vec::new()).await?;
        Ok(rows
            .first()
            .and_then(|r| r.get("count"))
            .map(|v| v.as_display())
            .unwrap_or_default())
    }

    fn supports_cast_index_array(&self) -> bool {
        true
    }

    async fn rename_column(&self, table: &str, from: &str, to: &str, _column_type: &str) -> Result<(), AdapterError> {
        let sql = format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.dialect.qualify_table(&self.config.schema, table),
            self.dialect.quote_ident(from),
            self.dialect.quote_ident(to)
        );
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_adapter_starts_uninitialized() {
        let adapter = PostgresAdapter::new("postgres://localhost/test", AdapterConfig::new("core", "app"));
        assert!(!adapter.is_initialized());
    }
}
