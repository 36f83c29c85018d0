// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The backend-neutral [`Adapter`] contract (spec §4.1) plus the
//! document-CRUD/find default methods built on top of it (spec §4.9–§4.11).
//!
//! Mirrors how the teacher's generated `create`/`update`/`delete`/`list`
//! methods compose `Context` fields (`entity-derive-impl/src/entity/sql/
//! postgres/crud.rs`, `query.rs`) — here the composition happens once, at
//! runtime, against any [`crate::sql::Dialect`] implementation, instead of
//! once per derive-macro expansion.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use docbase_core::{
    AdapterError, AttributeValue, Document, ErrorKind, Permission, PermissionType, Query,
    permission,
    query::{CursorDirection, OrderDirection, group_queries},
    transaction::TransactionDepth
};

use crate::{
    config::AdapterConfig,
    identifier,
    relationship::{ColumnDelta, RELATIONSHIP_COLUMN_TYPE, RelationshipSideMarker, RelationshipSpec, create_ddl, delete_ddl, update_ddl},
    schema::{AttributeDescriptor, AttributeUpdate, IndexDescriptor},
    sql::{Dialect, condition, permissions, projection},
    transform::{TransformEvent, TransformRegistry}
};

/// The outcome of an `execute`: how many rows changed, and the
/// backend-assigned id for an `INSERT` (`insertId` on MariaDB, the
/// `RETURNING _id` value on Postgres — spec §4.9).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteResult {
    /// Rows affected by an `UPDATE`/`DELETE`, or inserted by an `INSERT`.
    pub rows_affected: u64,
    /// The auto-assigned `_id`, present only after an `INSERT`.
    pub insert_id: Option<i64>
}

/// One raw row of column name → value, prior to materialization into a
/// [`Document`] (spec §4.2 "Row → document materialization").
pub type RawRow = BTreeMap<String, AttributeValue>;

/// Strip and rename reserved columns to their `$`-prefixed document
/// fields; parse `_permissions`; attach the rest as user attributes (spec
/// §4.2).
pub fn materialize_row(mut row: RawRow) -> Result<Document, AdapterError> {
    let mut document = Document::new();

    if let Some(AttributeValue::Str(uid)) = row.remove("_uid") {
        document.set_id(uid);
    }
    if let Some(AttributeValue::Int(id)) = row.remove("_id") {
        document.set_internal_id(id);
    }
    if let Some(AttributeValue::Int(tenant)) = row.remove("_tenant") {
        document.set_tenant(tenant);
    }
    if let Some(AttributeValue::DateTime(at)) = row.remove("_createdAt") {
        document.set_created_at(at);
    }
    if let Some(AttributeValue::DateTime(at)) = row.remove("_updatedAt") {
        document.set_updated_at(at);
    }
    if let Some(raw) = row.remove("_permissions") {
        let strings = permissions_json_to_strings(&raw);
        document.set_permissions(permission::parse_all(&strings)?);
    }

    for (name, value) in row {
        document.set_attribute(name, value);
    }
    Ok(document)
}

fn permissions_json_to_strings(value: &AttributeValue) -> Vec<String> {
    match value {
        AttributeValue::Json(serde_json::Value::Array(items)) => {
            items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
        }
        AttributeValue::Str(raw) => serde_json::from_str::<Vec<String>>(raw).unwrap_or_default(),
        _ => Vec::new()
    }
}

/// Clamp an `increaseDocumentAttribute` delta (spec §4.9, §8 law 6): each
/// bound applies independently, matching the original `CASE WHEN max IS
/// NOT NULL AND ... THEN max WHEN min IS NOT NULL AND ... THEN min ELSE
/// ... END` — a `None` bound leaves that side unclamped rather than
/// disabling clamping altogether (spec §9 open question, resolved as
/// "null bound ⇒ unbounded on that side").
pub fn clamp_increase(prior: f64, delta: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let mut next = prior + delta;
    if let Some(max) = max {
        if next > max {
            next = max;
        }
    }
    if let Some(min) = min {
        if next < min {
            next = min;
        }
    }
    next
}

/// The backend-neutral adapter contract (spec §4.1).
#[async_trait]
pub trait Adapter: Send + Sync {
    /// This adapter's dialect.
    fn dialect(&self) -> &dyn Dialect;
    /// This adapter's configuration.
    fn config(&self) -> &AdapterConfig;
    /// The transform-pipeline registry (read-only).
    fn transforms(&self) -> &TransformRegistry;
    /// The transform-pipeline registry (read-write, for `before`/
    /// `setMetadata`/`setTimeout`).
    fn transforms_mut(&mut self) -> &mut TransformRegistry;
    /// The nesting-depth counter shared by `withTransaction` calls on this
    /// adapter instance.
    fn transaction_depth(&self) -> &TransactionDepth;

    /// Execute a statement that does not return rows.
    async fn execute(&self, sql: &str, binds: Vec<AttributeValue>) -> Result<ExecuteResult, AdapterError>;
    /// Execute a statement and fetch its result rows.
    async fn fetch(&self, sql: &str, binds: Vec<AttributeValue>) -> Result<Vec<RawRow>, AdapterError>;

    // -- Transactions (spec §4.6) --

    /// Open the backend transaction and pin it as the connection `execute`/
    /// `fetch` run against until `commit_transaction`/`rollback_transaction`
    /// clears it (spec §5 "pin a single connection for the duration of the
    /// callback"). Only called by [`Adapter::transaction`] at the outermost
    /// nesting level.
    async fn begin_transaction(&self) -> Result<(), AdapterError>;
    /// Commit the pinned transaction and release the connection.
    async fn commit_transaction(&self) -> Result<(), AdapterError>;
    /// Roll back the pinned transaction and release the connection.
    async fn rollback_transaction(&self) -> Result<(), AdapterError>;

    /// Run `operation` inside a transaction (spec §4.6 "withTransaction"): a
    /// call nested inside an already-open transaction joins it and neither
    /// issues SQL nor retries — only the outermost caller begins, commits
    /// or rolls back, and retries a retryable failure up to
    /// [`docbase_core::transaction::MAX_TRANSACTION_ATTEMPTS`] times (§8
    /// law 9).
    async fn transaction<F, Fut, T>(&self, mut operation: F) -> Result<T, AdapterError>
    where
        Self: Sized,
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, AdapterError>> + Send,
        T: Send
    {
        let depth = self.transaction_depth();
        docbase_core::transaction::with_transaction(depth, move || {
            let fut = operation();
            async move {
                let is_outermost = depth.current() == 1;
                if is_outermost {
                    self.begin_transaction().await?;
                }
                match fut.await {
                    Ok(value) => {
                        if is_outermost {
                            self.commit_transaction().await?;
                        }
                        Ok(value)
                    }
                    Err(err) => {
                        if is_outermost {
                            self.rollback_transaction().await?;
                        }
                        Err(err)
                    }
                }
            }
        })
        .await
    }

    // -- Lifecycle --
    async fn init(&mut self) -> Result<(), AdapterError>;
    async fn close(&mut self) -> Result<(), AdapterError>;
    async fn ping(&self) -> Result<(), AdapterError>;
    fn is_initialized(&self) -> bool;
    /// Assert that a connection handle is available for raw-SQL escape
    /// hatches outside the document API (spec §4.1 "getClient").
    /// Object-safety rules out returning the concrete pool type from a
    /// backend-neutral trait; callers that hold the concrete adapter type
    /// reach its pool field directly once this confirms readiness.
    async fn get_client(&self) -> Result<(), AdapterError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(AdapterError::new(ErrorKind::Initialization, "adapter not initialized"))
        }
    }

    // -- Schema admin --
    async fn create(&self, name: &str) -> Result<(), AdapterError>;
    async fn drop(&self, name: &str) -> Result<(), AdapterError>;
    async fn exists(&self, name: &str, collection: Option<&str>) -> Result<bool, AdapterError>;
    /// Switch the active schema/database for subsequent operations (spec
    /// §4.1 "use(name)"). Backend-specific because the underlying config
    /// field lives on the concrete adapter struct, not this trait.
    async fn use_database(&mut self, name: &str) -> Result<(), AdapterError>;

    // -- Collection admin --
    async fn create_collection(
        &self,
        name: &str,
        attributes: &[AttributeDescriptor],
        indexes: &[IndexDescriptor],
        if_exists: bool
    ) -> Result<(), AdapterError>;
    async fn drop_collection(&self, name: &str, if_exists: bool) -> Result<(), AdapterError>;

    // -- Attribute admin --
    async fn create_attribute(&self, collection: &str, attribute: &AttributeDescriptor) -> Result<(), AdapterError>;
    async fn update_attribute(&self, collection: &str, name: &str, update: &AttributeUpdate) -> Result<(), AdapterError>;
    async fn delete_attribute(&self, collection: &str, name: &str) -> Result<(), AdapterError>;
    async fn rename_attribute(&self, collection: &str, old_name: &str, new_name: &str) -> Result<(), AdapterError>;

    // -- Index admin --
    async fn create_index(&self, collection: &str, index: &IndexDescriptor) -> Result<(), AdapterError>;
    async fn delete_index(&self, collection: &str, name: &str) -> Result<(), AdapterError>;
    async fn rename_index(&self, collection: &str, old_name: &str, new_name: &str) -> Result<(), AdapterError>;

    // -- Introspection --
    async fn get_size_of_collection(&self, collection: &str) -> Result<u64, AdapterError>;
    async fn get_size_of_collection_on_disk(&self, collection: &str) -> Result<u64, AdapterError>;
    async fn get_connection_id(&self) -> Result<String, AdapterError>;
    /// `true` if array-typed attributes can be indexed directly (spec
    /// §4.3: "MariaDB returns false").
    fn supports_cast_index_array(&self) -> bool;

    /// `ALTER TABLE <table> ADD COLUMN <name> <column_type>`, identical
    /// syntax on both backends.
    async fn add_column(&self, table: &str, name: &str, column_type: &str) -> Result<(), AdapterError> {
        let ident = self.dialect().quote_ident(name);
        let sql = format!("ALTER TABLE {table} ADD COLUMN {ident} {column_type}");
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    /// `ALTER TABLE <table> DROP COLUMN <name>`, identical syntax on both
    /// backends.
    async fn drop_column(&self, table: &str, name: &str) -> Result<(), AdapterError> {
        let ident = self.dialect().quote_ident(name);
        let sql = format!("ALTER TABLE {table} DROP COLUMN {ident}");
        self.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    /// Rename a column, whose syntax differs by backend (`RENAME COLUMN`
    /// on Postgres, `CHANGE` on MariaDB — spec §4.3/§4.4 DDL notes).
    async fn rename_column(&self, table: &str, from: &str, to: &str, column_type: &str) -> Result<(), AdapterError>;

    // -- Relationship admin (spec §4.8) --

    /// Materialize the columns (and, for many-to-many, the junction
    /// table) a relationship requires.
    async fn create_relationship(&self, parent_table: &str, child_table: &str, spec: &RelationshipSpec) -> Result<(), AdapterError> {
        let ddl = create_ddl(spec);
        self.apply_column_deltas(parent_table, child_table, &ddl.columns).await?;
        if let Some(junction) = &ddl.junction_table {
            self.create_collection(junction, &[], &[], true).await?;
        }
        Ok(())
    }

    /// Rename the relationship's owning column(s).
    async fn update_relationship(
        &self,
        parent_table: &str,
        child_table: &str,
        spec: &RelationshipSpec,
        new_key: Option<&str>,
        new_two_way_key: Option<&str>
    ) -> Result<(), AdapterError> {
        let ddl = update_ddl(spec, new_key, new_two_way_key)?;
        self.apply_column_deltas(parent_table, child_table, &ddl.columns).await
    }

    /// Drop the relationship's owning column(s), or its junction table.
    async fn delete_relationship(&self, parent_table: &str, child_table: &str, spec: &RelationshipSpec) -> Result<(), AdapterError> {
        let ddl = delete_ddl(spec);
        self.apply_column_deltas(parent_table, child_table, &ddl.columns).await?;
        if let Some(junction) = &ddl.junction_table {
            self.drop_collection(junction, true).await?;
        }
        Ok(())
    }

    /// Render and run a batch of [`ColumnDelta`]s against the appropriate
    /// side's table.
    async fn apply_column_deltas(&self, parent_table: &str, child_table: &str, deltas: &[ColumnDelta]) -> Result<(), AdapterError> {
        for delta in deltas {
            match delta {
                ColumnDelta::Add { side, name } => {
                    let table = self.side_table(*side, parent_table, child_table);
                    self.add_column(table, name, RELATIONSHIP_COLUMN_TYPE).await?;
                }
                ColumnDelta::Rename { side, from, to } => {
                    let table = self.side_table(*side, parent_table, child_table);
                    self.rename_column(table, from, to, RELATIONSHIP_COLUMN_TYPE).await?;
                }
                ColumnDelta::Drop { side, name } => {
                    let table = self.side_table(*side, parent_table, child_table);
                    self.drop_column(table, name).await?;
                }
            }
        }
        Ok(())
    }

    /// Resolve a [`RelationshipSideMarker`] to its concrete table name.
    fn side_table<'a>(&self, side: RelationshipSideMarker, parent_table: &'a str, child_table: &'a str) -> &'a str {
        match side {
            RelationshipSideMarker::Parent => parent_table,
            RelationshipSideMarker::Child => child_table
        }
    }

    // -- Document CRUD (spec §4.9) --

    /// Insert a document and its permission grants.
    async fn create_document(&self, collection: &str, mut document: Document) -> Result<Document, AdapterError> {
        let table = identifier::collection_table_name(self.config(), collection)?;
        let perms_table = identifier::perms_table_name(self.config(), collection)?;
        let qualified = self.dialect().qualify_table(&self.config().schema, &table);

        let uid = document
            .get_id()
            .ok_or_else(|| AdapterError::new(ErrorKind::Validation, "document is missing $id"))?
            .to_string();

        let mut counter = condition::ParamCounter::new();
        let mut columns = vec![self.dialect().quote_ident("_uid")];
        let mut binds = vec![AttributeValue::Str(uid.clone())];
        let mut placeholders = vec![self.dialect().placeholder(counter.next())];

        if let Some(internal_id) = document.get_internal_id() {
            columns.push(self.dialect().quote_ident("_id"));
            placeholders.push(self.dialect().placeholder(counter.next()));
            binds.push(AttributeValue::Int(internal_id));
        }

        if self.config().requires_tenant_scope() {
            let tenant = self.tenant_id()?;
            columns.push(self.dialect().quote_ident("_tenant"));
            placeholders.push(self.dialect().placeholder(counter.next()));
            binds.push(AttributeValue::Int(tenant));
            document.set_tenant(tenant);
        }

        let now = document.get_created_at().unwrap_or_else(Utc::now);
        document.set_created_at(now).set_updated_at(now);
        for column in ["_createdAt", "_updatedAt"] {
            columns.push(self.dialect().quote_ident(column));
            placeholders.push(self.dialect().placeholder(counter.next()));
            binds.push(AttributeValue::DateTime(now));
        }

        columns.push(self.dialect().quote_ident("_permissions"));
        placeholders.push(self.dialect().placeholder(counter.next()));
        binds.push(AttributeValue::Json(permissions_to_json(document.get_permissions())));

        for (name, value) in document.get_attributes() {
            columns.push(self.dialect().quote_ident(name));
            placeholders.push(self.dialect().placeholder(counter.next()));
            binds.push(value.clone());
        }

        let sql = format!(
            "INSERT INTO {qualified} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        let sql = self.transforms().apply(TransformEvent::DocumentCreate, &sql);
        let result = self.execute(&sql, binds).await?;

        let internal_id = result
            .insert_id
            .or_else(|| document.get_internal_id())
            .ok_or_else(|| AdapterError::new(ErrorKind::Database, "insert did not yield an internal id"))?;
        document.set_internal_id(internal_id);

        if !document.get_permissions().is_empty() {
            self.insert_permissions(&perms_table, &uid, document.get_permissions()).await?;
        }

        Ok(document)
    }

    /// Insert many documents, chunked by `batch_size` (spec §4.9
    /// "createDocuments"). Each document is created independently; a
    /// single-row failure aborts the whole batch rather than partially
    /// committing, unless the caller wraps the call in `withTransaction`.
    async fn create_documents(&self, collection: &str, documents: Vec<Document>, batch_size: usize) -> Result<Vec<Document>, AdapterError> {
        let batch_size = batch_size.max(1);
        let mut created = Vec::with_capacity(documents.len());
        for chunk in documents.into_iter().collect::<Vec<_>>().chunks(batch_size) {
            for document in chunk {
                created.push(self.create_document(collection, document.clone()).await?);
            }
        }
        Ok(created)
    }

    /// Apply a patch and reconcile `$permissions` (spec §4.9
    /// "updateDocument").
    async fn update_document(&self, collection: &str, id: &str, patch: Document) -> Result<Document, AdapterError> {
        let table = identifier::collection_table_name(self.config(), collection)?;
        let perms_table = identifier::perms_table_name(self.config(), collection)?;
        let qualified = self.dialect().qualify_table(&self.config().schema, &table);

        let mut counter = condition::ParamCounter::new();
        let mut set_clauses = Vec::new();
        let mut binds = Vec::new();

        for (name, value) in patch.get_attributes() {
            set_clauses.push(format!("{} = {}", self.dialect().quote_ident(name), self.dialect().placeholder(counter.next())));
            binds.push(value.clone());
        }
        let updated_at = patch.get_updated_at().unwrap_or_else(Utc::now);
        set_clauses.push(format!(
            "{} = {}",
            self.dialect().quote_ident("_updatedAt"),
            self.dialect().placeholder(counter.next())
        ));
        binds.push(AttributeValue::DateTime(updated_at));

        let mut where_sql = format!("{} = {}", self.dialect().quote_ident("_uid"), self.dialect().placeholder(counter.next()));
        binds.push(AttributeValue::Str(id.to_string()));
        if self.config().requires_tenant_scope() {
            let tenant = self.tenant_id()?;
            where_sql.push_str(&format!(" AND {} = {}", self.dialect().quote_ident("_tenant"), self.dialect().placeholder(counter.next())));
            binds.push(AttributeValue::Int(tenant));
        }

        let sql = format!("UPDATE {qualified} SET {} WHERE {where_sql}", set_clauses.join(", "));
        let sql = self.transforms().apply(TransformEvent::DocumentUpdate, &sql);
        self.execute(&sql, binds).await?;

        self.reconcile_permissions(&perms_table, id, patch.get_permissions()).await?;

        self.get_document(collection, id, &[], false)
            .await?
            .ok_or_else(|| AdapterError::new(ErrorKind::NotFound, format!("document '{id}' not found after update")))
    }

    /// Apply the same patch to every id in `ids` (spec §4.9
    /// "updateDocuments"). Permissions are diffed per document, since each
    /// may carry a distinct current `$permissions` set.
    async fn update_documents(&self, collection: &str, ids: &[String], patch: Document) -> Result<u64, AdapterError> {
        let mut updated = 0;
        for id in ids {
            self.update_document(collection, id, patch.clone()).await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Clamp-increment a numeric attribute (spec §4.9
    /// "increaseDocumentAttribute", §8 law 6).
    async fn increase_document_attribute(
        &self,
        collection: &str,
        id: &str,
        attribute: &str,
        delta: f64,
        min: Option<f64>,
        max: Option<f64>
    ) -> Result<bool, AdapterError> {
        let table = identifier::collection_table_name(self.config(), collection)?;
        let qualified = self.dialect().qualify_table(&self.config().schema, &table);
        let column = self.dialect().quote_ident(attribute);

        let mut counter = condition::ParamCounter::new();
        let delta_ph = self.dialect().placeholder(counter.next());
        let max_ph = self.dialect().placeholder(counter.next());
        let min_ph = self.dialect().placeholder(counter.next());
        let updated_at_ph = self.dialect().placeholder(counter.next());
        let id_ph = self.dialect().placeholder(counter.next());

        let sql = format!(
            "UPDATE {qualified} SET {column} = CASE \
             WHEN {max_ph} IS NOT NULL AND {column} + {delta_ph} > {max_ph} THEN {max_ph} \
             WHEN {min_ph} IS NOT NULL AND {column} + {delta_ph} < {min_ph} THEN {min_ph} \
             ELSE {column} + {delta_ph} END, \
             {updated_at} = {updated_at_ph} WHERE {uid} = {id_ph}",
            updated_at = self.dialect().quote_ident("_updatedAt"),
            uid = self.dialect().quote_ident("_uid")
        );
        let sql = self.transforms().apply(TransformEvent::DocumentUpdate, &sql);

        let binds = vec![
            AttributeValue::Float(delta),
            max.map(AttributeValue::Float).unwrap_or(AttributeValue::Null),
            min.map(AttributeValue::Float).unwrap_or(AttributeValue::Null),
            AttributeValue::DateTime(Utc::now()),
            AttributeValue::Str(id.to_string()),
        ];
        let result = self.execute(&sql, binds).await?;
        Ok(result.rows_affected > 0)
    }

    /// Delete a document and its permission rows (spec §4.9
    /// "deleteDocument").
    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), AdapterError> {
        self.delete_documents(collection, std::slice::from_ref(&id.to_string())).await?;
        Ok(())
    }

    /// Delete many documents and their permission rows (spec §4.9
    /// "deleteDocuments").
    async fn delete_documents(&self, collection: &str, ids: &[String]) -> Result<u64, AdapterError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let table = identifier::collection_table_name(self.config(), collection)?;
        let perms_table = identifier::perms_table_name(self.config(), collection)?;
        let qualified = self.dialect().qualify_table(&self.config().schema, &table);
        let perms_qualified = self.dialect().qualify_table(&self.config().schema, &perms_table);

        let mut counter = condition::ParamCounter::new();
        let placeholders: Vec<String> = ids.iter().map(|_| self.dialect().placeholder(counter.next())).collect();
        let binds: Vec<AttributeValue> = ids.iter().map(|id| AttributeValue::Str(id.clone())).collect();

        let sql = format!(
            "DELETE FROM {qualified} WHERE {} IN ({})",
            self.dialect().quote_ident("_uid"),
            placeholders.join(", ")
        );
        let sql = self.transforms().apply(TransformEvent::DocumentsDelete, &sql);
        let result = self.execute(&sql, binds.clone()).await?;

        let perms_sql = format!(
            "DELETE FROM {perms_qualified} WHERE {} IN ({})",
            self.dialect().quote_ident("_document"),
            placeholders.join(", ")
        );
        let perms_sql = self.transforms().apply(TransformEvent::PermissionsDelete, &perms_sql);
        self.execute(&perms_sql, binds).await?;

        Ok(result.rows_affected)
    }

    // -- Read (spec §4.10) --

    /// Fetch one document by `$id`.
    async fn get_document(&self, collection: &str, id: &str, queries: &[Query], for_update: bool) -> Result<Option<Document>, AdapterError> {
        let mut queries = queries.to_vec();
        queries.push(Query::equal("$id", vec![AttributeValue::Str(id.to_string())]));
        let mut rows = self.find_rows(collection, &queries, &HashSet::new(), None, for_update).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
    }

    /// Run a structured query against a collection (spec §4.10).
    async fn find(
        &self,
        collection: &str,
        queries: &[Query],
        array_attributes: &HashSet<String>,
        for_permission: Option<(PermissionType, Vec<String>)>
    ) -> Result<Vec<Document>, AdapterError> {
        self.find_rows(collection, queries, array_attributes, for_permission, false).await
    }

    /// Count matching rows, capped at `max` (spec §4.10 "Count and sum").
    async fn count(&self, collection: &str, queries: &[Query], max: Option<u32>) -> Result<u64, AdapterError> {
        let table = identifier::collection_table_name(self.config(), collection)?;
        let qualified = self.dialect().qualify_table(&self.config().schema, &table);
        let group = group_queries(queries)?;
        let mut counter = condition::ParamCounter::new();
        let compiled = condition::compile_all(self.dialect(), &group.filters, &HashSet::new(), "table_main", &mut counter)?;

        let where_sql = self.build_where(&compiled.sql, &mut counter)?;
        let limit_sql = max.map(|m| format!(" LIMIT {m}")).unwrap_or_default();
        let sql = format!(
            "SELECT COUNT(*) AS count FROM (SELECT 1 FROM {qualified} AS table_main{where}{limit}) AS bounded",
            where = where_sql.0,
            limit = limit_sql
        );
        let sql = self.transforms().apply(TransformEvent::DocumentCount, &sql);
        let mut binds = compiled.binds;
        binds.extend(where_sql.1);
        let rows = self.fetch(&sql, binds).await?;
        Ok(extract_count(&rows))
    }

    /// Sum an attribute across matching rows, capped at `max` rows before
    /// aggregation.
    async fn sum(&self, collection: &str, attribute: &str, queries: &[Query], max: Option<u32>) -> Result<f64, AdapterError> {
        let table = identifier::collection_table_name(self.config(), collection)?;
        let qualified = self.dialect().qualify_table(&self.config().schema, &table);
        let group = group_queries(queries)?;
        let mut counter = condition::ParamCounter::new();
        let compiled = condition::compile_all(self.dialect(), &group.filters, &HashSet::new(), "table_main", &mut counter)?;
        let where_sql = self.build_where(&compiled.sql, &mut counter)?;
        let limit_sql = max.map(|m| format!(" LIMIT {m}")).unwrap_or_default();
        let column = self.dialect().quote_ident(attribute);
        let sql = format!(
            "SELECT SUM({column}) AS total FROM (SELECT {column} FROM {qualified} AS table_main{where}{limit}) AS bounded",
            where = where_sql.0,
            limit = limit_sql
        );
        let sql = self.transforms().apply(TransformEvent::DocumentSum, &sql);
        let mut binds = compiled.binds;
        binds.extend(where_sql.1);
        let rows = self.fetch(&sql, binds).await?;
        Ok(extract_sum(&rows))
    }

    /// Shared implementation behind [`Adapter::find`] and
    /// [`Adapter::get_document`].
    async fn find_rows(
        &self,
        collection: &str,
        queries: &[Query],
        array_attributes: &HashSet<String>,
        for_permission: Option<(PermissionType, Vec<String>)>,
        for_update: bool
    ) -> Result<Vec<Document>, AdapterError> {
        let table = identifier::collection_table_name(self.config(), collection)?;
        let perms_table = identifier::perms_table_name(self.config(), collection)?;
        let qualified = self.dialect().qualify_table(&self.config().schema, &table);
        let group = group_queries(queries)?;

        let mut counter = condition::ParamCounter::new();
        let compiled = condition::compile_all(self.dialect(), &group.filters, array_attributes, "table_main", &mut counter)?;

        let mut where_clauses = Vec::new();
        let mut binds = compiled.binds;
        if !compiled.sql.is_empty() {
            where_clauses.push(compiled.sql);
        }

        if let Some((action, roles)) = &for_permission {
            let mut next = || self.dialect().placeholder(counter.next());
            let predicate = permissions::build(
                self.dialect(),
                "table_main",
                &perms_table,
                *action,
                roles,
                self.config().requires_tenant_scope(),
                &mut next
            );
            where_clauses.push(predicate.sql);
            for _ in &predicate.binds {
                binds.push(AttributeValue::Int(self.config().tenant_id.unwrap_or_default()));
            }
        }

        if self.config().requires_tenant_scope() {
            let ph = self.dialect().placeholder(counter.next());
            where_clauses.push(format!(
                "(table_main.{tenant} = {ph} OR table_main.{tenant} IS NULL)",
                tenant = self.dialect().quote_ident("_tenant")
            ));
            binds.push(AttributeValue::Int(self.tenant_id()?));
        }

        let reverse_direction = matches!(group.cursor, Some((_, CursorDirection::Before)));
        let mut orders = group.orders.clone();
        if !orders.iter().any(|(a, _)| a == "_id" || a == "$internalId") {
            orders.push(("_id".to_string(), OrderDirection::Asc));
        }
        let effective_orders: Vec<(String, OrderDirection)> = orders
            .iter()
            .map(|(a, d)| (a.clone(), if reverse_direction { flip(*d) } else { *d }))
            .collect();

        if let Some((cursor_id, _)) = &group.cursor {
            if let Some((first_attr, first_dir)) = effective_orders.first() {
                let cmp = if *first_dir == OrderDirection::Asc { ">" } else { "<" };
                let col = self.dialect().quote_ident(crate::sql::resolve_alias(first_attr));
                let anchor_ph_1 = self.dialect().placeholder(counter.next());
                let anchor_ph_2 = self.dialect().placeholder(counter.next());
                let anchor_ph_3 = self.dialect().placeholder(counter.next());
                where_clauses.push(format!(
                    "(table_main.{col} {cmp} (SELECT {col} FROM {qualified} WHERE {uid} = {a1}) \
                     OR (table_main.{col} = (SELECT {col} FROM {qualified} WHERE {uid} = {a2}) \
                     AND table_main.{id_col} {cmp} (SELECT {id_col} FROM {qualified} WHERE {uid} = {a3})))",
                    uid = self.dialect().quote_ident("_uid"),
                    id_col = self.dialect().quote_ident("_id"),
                    a1 = anchor_ph_1,
                    a2 = anchor_ph_2,
                    a3 = anchor_ph_3
                ));
                for _ in 0..3 {
                    binds.push(AttributeValue::Str(cursor_id.clone()));
                }
            }
        }

        let projection_sql = projection::build(self.dialect(), "table_main", &group.select);
        let order_sql = effective_orders
            .iter()
            .map(|(attr, dir)| {
                format!(
                    "table_main.{} {}",
                    self.dialect().quote_ident(crate::sql::resolve_alias(attr)),
                    dir.as_sql()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let limit_ph = self.dialect().placeholder(counter.next());
        let offset_ph = self.dialect().placeholder(counter.next());
        binds.push(AttributeValue::Int(i64::from(group.limit)));
        binds.push(AttributeValue::Int(i64::from(group.offset)));

        let for_update_sql = if for_update { " FOR UPDATE" } else { "" };
        let sql = format!(
            "SELECT {projection_sql} FROM {qualified} AS table_main{where_sql} ORDER BY {order_sql} LIMIT {limit_ph} OFFSET {offset_ph}{for_update_sql}"
        );
        let sql = self.transforms().apply(TransformEvent::DocumentFind, &sql);

        let rows = self.fetch(&sql, binds).await?;
        let mut documents: Vec<Document> = rows.into_iter().map(materialize_row).collect::<Result<_, _>>()?;
        if reverse_direction {
            documents.reverse();
        }
        Ok(documents)
    }

    /// Build a `WHERE` fragment adding the tenant scope clause, reusing
    /// the same compiled filter `sql` from a prior step (used by
    /// `count`/`sum`, which share the filter-compilation path with
    /// `find_rows` but build a narrower surrounding query).
    fn build_where(&self, compiled_sql: &str, counter: &mut condition::ParamCounter) -> Result<(String, Vec<AttributeValue>), AdapterError> {
        let mut clauses = Vec::new();
        if !compiled_sql.is_empty() {
            clauses.push(compiled_sql.to_string());
        }
        let mut binds = Vec::new();
        if self.config().requires_tenant_scope() {
            let ph = self.dialect().placeholder(counter.next());
            clauses.push(format!(
                "(table_main.{tenant} = {ph} OR table_main.{tenant} IS NULL)",
                tenant = self.dialect().quote_ident("_tenant")
            ));
            binds.push(AttributeValue::Int(self.tenant_id()?));
        }
        if clauses.is_empty() {
            Ok((String::new(), binds))
        } else {
            Ok((format!(" WHERE {}", clauses.join(" AND ")), binds))
        }
    }

    /// Bulk-insert permission rows, grouped by type for readability (spec
    /// §4.9: "a single bulk `INSERT` ... grouped by type").
    async fn insert_permissions(&self, perms_table: &str, document_uid: &str, grants: &[Permission]) -> Result<(), AdapterError> {
        if grants.is_empty() {
            return Ok(());
        }
        let qualified = self.dialect().qualify_table(&self.config().schema, perms_table);
        let mut counter = condition::ParamCounter::new();
        let mut value_groups = Vec::with_capacity(grants.len());
        let mut binds = Vec::new();

        let mut ordered = grants.to_vec();
        ordered.sort_by_key(|p| p.action);

        for grant in &ordered {
            let mut placeholders = vec![
                self.dialect().placeholder(counter.next()),
                self.dialect().placeholder(counter.next()),
                self.dialect().placeholder(counter.next()),
            ];
            binds.push(AttributeValue::Str(grant.action.as_str().to_string()));
            binds.push(AttributeValue::Str(grant.role.clone()));
            binds.push(AttributeValue::Str(document_uid.to_string()));
            if self.config().requires_tenant_scope() {
                placeholders.push(self.dialect().placeholder(counter.next()));
                binds.push(AttributeValue::Int(self.tenant_id()?));
            }
            value_groups.push(format!("({})", placeholders.join(", ")));
        }

        let mut columns = vec!["_type", "_permission", "_document"];
        if self.config().requires_tenant_scope() {
            columns.push("_tenant");
        }
        let columns_sql = columns.iter().map(|c| self.dialect().quote_ident(c)).collect::<Vec<_>>().join(", ");

        let sql = format!("INSERT INTO {qualified} ({columns_sql}) VALUES {}", value_groups.join(", "));
        let sql = self.transforms().apply(TransformEvent::PermissionsCreate, &sql);
        self.execute(&sql, binds).await?;
        Ok(())
    }

    /// Delete permission rows matching the given grants exactly.
    async fn delete_permissions_matching(&self, perms_table: &str, document_uid: &str, grants: &[Permission]) -> Result<(), AdapterError> {
        if grants.is_empty() {
            return Ok(());
        }
        let qualified = self.dialect().qualify_table(&self.config().schema, perms_table);
        let mut counter = condition::ParamCounter::new();
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        for grant in grants {
            let doc_ph = self.dialect().placeholder(counter.next());
            let type_ph = self.dialect().placeholder(counter.next());
            let role_ph = self.dialect().placeholder(counter.next());
            clauses.push(format!(
                "({doc} = {doc_ph} AND {ty} = {type_ph} AND {perm} = {role_ph})",
                doc = self.dialect().quote_ident("_document"),
                ty = self.dialect().quote_ident("_type"),
                perm = self.dialect().quote_ident("_permission")
            ));
            binds.push(AttributeValue::Str(document_uid.to_string()));
            binds.push(AttributeValue::Str(grant.action.as_str().to_string()));
            binds.push(AttributeValue::Str(grant.role.clone()));
        }

        let sql = format!("DELETE FROM {qualified} WHERE {}", clauses.join(" OR "));
        let sql = self.transforms().apply(TransformEvent::PermissionsDelete, &sql);
        self.execute(&sql, binds).await?;
        Ok(())
    }

    /// Read a document's current permission rows, then diff against
    /// `desired` and apply the delete/insert pair (spec §4.9
    /// "updateDocument ... diffs current vs new permissions").
    async fn reconcile_permissions(&self, perms_table: &str, document_uid: &str, desired: &[Permission]) -> Result<(), AdapterError> {
        let current = self.current_permissions(perms_table, document_uid).await?;
        let diff = permission::diff(&current, desired);
        if !diff.removed.is_empty() {
            self.delete_permissions_matching(perms_table, document_uid, &diff.removed).await?;
        }
        if !diff.added.is_empty() {
            self.insert_permissions(perms_table, document_uid, &diff.added).await?;
        }
        Ok(())
    }

    /// Read a document's current permission rows from `<name>_perms`.
    async fn current_permissions(&self, perms_table: &str, document_uid: &str) -> Result<Vec<Permission>, AdapterError> {
        let qualified = self.dialect().qualify_table(&self.config().schema, perms_table);
        let mut counter = condition::ParamCounter::new();
        let ph = self.dialect().placeholder(counter.next());
        let sql = format!(
            "SELECT {ty}, {perm} FROM {qualified} WHERE {doc} = {ph}",
            ty = self.dialect().quote_ident("_type"),
            perm = self.dialect().quote_ident("_permission"),
            doc = self.dialect().quote_ident("_document")
        );
        let sql = self.transforms().apply(TransformEvent::PermissionsRead, &sql);
        let rows = self.fetch(&sql, vec![AttributeValue::Str(document_uid.to_string())]).await?;

        rows.into_iter()
            .map(|row| {
                let action = match row.get("_type") {
                    Some(AttributeValue::Str(s)) => PermissionType::parse(s)
                        .ok_or_else(|| AdapterError::new(ErrorKind::Database, format!("unknown permission type '{s}'"))),
                    _ => Err(AdapterError::new(ErrorKind::Database, "missing _type in permission row"))
                }?;
                let role = match row.get("_permission") {
                    Some(value) => value.as_display(),
                    None => return Err(AdapterError::new(ErrorKind::Database, "missing _permission in permission row"))
                };
                Ok(Permission::new(action, role))
            })
            .collect()
    }

    fn tenant_id(&self) -> Result<i64, AdapterError> {
        self.config()
            .tenant_id
            .ok_or_else(|| AdapterError::new(ErrorKind::Validation, "shared_tables requires tenant_id"))
    }
}

fn flip(direction: OrderDirection) -> OrderDirection {
    match direction {
        OrderDirection::Asc => OrderDirection::Desc,
        OrderDirection::Desc => OrderDirection::Asc
    }
}

fn permissions_to_json(permissions: &[Permission]) -> serde_json::Value {
    serde_json::Value::Array(permissions.iter().map(|p| serde_json::Value::String(p.render())).collect())
}

fn extract_count(rows: &[RawRow]) -> u64 {
    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(|v| match v {
            AttributeValue::Int(n) => Some(*n as u64),
            _ => None
        })
        .unwrap_or(0)
}

fn extract_sum(rows: &[RawRow]) -> f64 {
    rows.first()
        .and_then(|row| row.get("total"))
        .map(|v| match v {
            AttributeValue::Int(n) => *n as f64,
            AttributeValue::Float(f) => *f,
            _ => 0.0
        })
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_increase_clamps_both_bounds() {
        assert_eq!(clamp_increase(7.0, 10.0, Some(0.0), Some(10.0)), 10.0);
        assert_eq!(clamp_increase(7.0, -100.0, Some(0.0), Some(10.0)), 0.0);
    }

    #[test]
    fn clamp_increase_is_unbounded_without_limits() {
        assert_eq!(clamp_increase(5.0, 3.0, None, None), 8.0);
    }

    #[test]
    fn clamp_increase_clamps_only_the_given_side() {
        assert_eq!(clamp_increase(5.0, 100.0, Some(0.0), None), 105.0);
        assert_eq!(clamp_increase(5.0, -100.0, None, Some(10.0)), -95.0);
    }

    #[test]
    fn materialize_row_strips_reserved_and_keeps_attributes() {
        let mut row: RawRow = BTreeMap::new();
        row.insert("_uid".to_string(), AttributeValue::Str("doc-1".to_string()));
        row.insert("_id".to_string(), AttributeValue::Int(7));
        row.insert(
            "_permissions".to_string(),
            AttributeValue::Json(serde_json::json!(["read(\"any\")"]))
        );
        row.insert("name".to_string(), AttributeValue::Str("hi".to_string()));

        let document = materialize_row(row).unwrap();
        assert_eq!(document.get_id(), Some("doc-1"));
        assert_eq!(document.get_internal_id(), Some(7));
        assert_eq!(document.get_permissions().len(), 1);
        assert_eq!(document.get_attribute("name"), Some(&AttributeValue::Str("hi".to_string())));
        assert!(document.get_attribute("_uid").is_none());
    }

    #[test]
    fn extract_count_reads_first_row() {
        let mut row: RawRow = BTreeMap::new();
        row.insert("count".to_string(), AttributeValue::Int(4));
        assert_eq!(extract_count(&[row]), 4);
        assert_eq!(extract_count(&[]), 0);
    }

    #[test]
    fn extract_sum_reads_first_row() {
        let mut row: RawRow = BTreeMap::new();
        row.insert("total".to_string(), AttributeValue::Float(12.5));
        assert_eq!(extract_sum(&[row]), 12.5);
        assert_eq!(extract_sum(&[]), 0.0);
    }
}
