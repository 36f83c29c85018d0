// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Live-database scenarios from spec.md §8, run against a real
//! MariaDB/MySQL instance. Requires `MARIADB_DATABASE_URL` and the
//! `mariadb` feature; `#[ignore]`d otherwise since there is no database in
//! a normal test run.

#![cfg(feature = "mariadb")]

use docbase::{
    adapter::Adapter,
    config::AdapterConfig,
    mariadb::MariadbAdapter,
    schema::{AttributeDescriptor, AttributeType, IndexDescriptor}
};
use docbase_core::{AttributeValue, Document, Query};

async fn adapter(schema: &str) -> MariadbAdapter {
    let url = std::env::var("MARIADB_DATABASE_URL").expect("MARIADB_DATABASE_URL must be set for live scenarios");
    let mut adapter = MariadbAdapter::new(url, AdapterConfig::new(schema, "t"));
    adapter.init().await.expect("connect");
    adapter.create(schema).await.expect("create database");
    adapter.use_database(schema).await.expect("use database");
    adapter
}

#[tokio::test]
#[ignore = "requires a live MariaDB instance"]
async fn scenario_a_crud_and_permissions() {
    let adapter = adapter("scenario_a").await;
    adapter
        .create_collection(
            "t1",
            &[AttributeDescriptor::new("name", AttributeType::String).with_size(50)],
            &[],
            true
        )
        .await
        .expect("create collection");

    let mut document = Document::new();
    document.set_id("a");
    document.set_attribute("name", AttributeValue::Str("hi".into()));
    document.set_permissions(docbase_core::permission::parse_all(&["read(\"any\")".to_string()]).unwrap());
    adapter.create_document("t1", document).await.expect("create document");

    let found = adapter
        .find("t1", &[Query::equal("name", vec![AttributeValue::Str("hi".into())])], &Default::default(), None)
        .await
        .expect("find");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_id(), Some("a"));

    adapter.delete_document("t1", "a").await.expect("delete document");
    assert_eq!(adapter.count("t1", &[], None).await.expect("count"), 0);

    adapter.drop_collection("t1", true).await.expect("drop collection");
    adapter.drop("scenario_a").await.expect("drop database");
}

#[tokio::test]
#[ignore = "requires a live MariaDB instance"]
async fn scenario_f_fulltext_search() {
    let adapter = adapter("scenario_f").await;
    adapter
        .create_collection(
            "t1",
            &[AttributeDescriptor::new("bio", AttributeType::String).with_size(512)],
            &[IndexDescriptor::fulltext("bio_fulltext", vec!["bio".to_string()])],
            true
        )
        .await
        .expect("create collection");

    let mut document = Document::new();
    document.set_id("a");
    document.set_attribute("bio", AttributeValue::Str("the quick brown fox jumps".into()));
    adapter.create_document("t1", document).await.expect("create document");

    let found = adapter
        .find("t1", &[Query::search("bio", AttributeValue::Str("quick fox".into()))], &Default::default(), None)
        .await
        .expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_id(), Some("a"));

    adapter.drop_collection("t1", true).await.expect("drop collection");
    adapter.drop("scenario_f").await.expect("drop database");
}
