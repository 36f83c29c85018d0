// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Live-database scenarios from spec.md §8, run against a real Postgres
//! instance. Requires `POSTGRES_DATABASE_URL` and the `postgres` feature;
//! `#[ignore]`d otherwise since there is no database in a normal test run.

#![cfg(feature = "postgres")]

use docbase::{
    adapter::Adapter,
    config::AdapterConfig,
    postgres::PostgresAdapter,
    schema::{AttributeDescriptor, AttributeType}
};
use docbase_core::{AttributeValue, Document, OrderDirection, Query};

async fn adapter(schema: &str) -> PostgresAdapter {
    let url = std::env::var("POSTGRES_DATABASE_URL").expect("POSTGRES_DATABASE_URL must be set for live scenarios");
    let mut adapter = PostgresAdapter::new(url, AdapterConfig::new(schema, "t"));
    adapter.init().await.expect("connect");
    adapter.create(schema).await.expect("create schema");
    adapter
}

#[tokio::test]
#[ignore = "requires a live Postgres instance"]
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
    adapter.drop("scenario_a").await.expect("drop schema");
}

#[tokio::test]
#[ignore = "requires a live Postgres instance"]
async fn scenario_b_cursor_pagination() {
    let adapter = adapter("scenario_b").await;
    adapter
        .create_collection("t1", &[AttributeDescriptor::new("name", AttributeType::String).with_size(50)], &[], true)
        .await
        .expect("create collection");

    for (id, name) in [("a", "a"), ("b", "b"), ("c", "c"), ("d", "d")] {
        let mut document = Document::new();
        document.set_id(id);
        document.set_attribute("name", AttributeValue::Str(name.into()));
        adapter.create_document("t1", document).await.expect("create document");
    }

    let page_one = adapter
        .find("t1", &[Query::order("name", OrderDirection::Asc), Query::limit(2)], &Default::default(), None)
        .await
        .expect("find page one");
    let ids: Vec<_> = page_one.iter().map(|d| d.get_id().unwrap().to_string()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    adapter.drop_collection("t1", true).await.expect("drop collection");
    adapter.drop("scenario_b").await.expect("drop schema");
}

#[tokio::test]
#[ignore = "requires a live Postgres instance"]
async fn scenario_c_counter_clamp() {
    let adapter = adapter("scenario_c").await;
    adapter
        .create_collection("t1", &[AttributeDescriptor::new("n", AttributeType::Integer)], &[], true)
        .await
        .expect("create collection");

    let mut document = Document::new();
    document.set_id("a");
    document.set_attribute("n", AttributeValue::Int(7));
    adapter.create_document("t1", document).await.expect("create document");

    adapter.increase_document_attribute("t1", "a", "n", 10.0, Some(0.0), Some(10.0)).await.expect("increase");
    let after_up = adapter.get_document("t1", "a", &[], false).await.expect("get").expect("present");
    assert_eq!(after_up.get_attributes().get("n"), Some(&AttributeValue::Int(10)));

    adapter.increase_document_attribute("t1", "a", "n", -100.0, Some(0.0), Some(10.0)).await.expect("decrease");
    let after_down = adapter.get_document("t1", "a", &[], false).await.expect("get").expect("present");
    assert_eq!(after_down.get_attributes().get("n"), Some(&AttributeValue::Int(0)));

    adapter.drop_collection("t1", true).await.expect("drop collection");
    adapter.drop("scenario_c").await.expect("drop schema");
}

#[tokio::test]
#[ignore = "requires a live Postgres instance"]
async fn scenario_d_duplicate_id_maps_to_duplicate_kind() {
    let adapter = adapter("scenario_d").await;
    adapter
        .create_collection("t1", &[AttributeDescriptor::new("name", AttributeType::String).with_size(50)], &[], true)
        .await
        .expect("create collection");

    let mut first = Document::new();
    first.set_id("a");
    adapter.create_document("t1", first).await.expect("first insert");

    let mut second = Document::new();
    second.set_id("a");
    let error = adapter.create_document("t1", second).await.expect_err("duplicate insert must fail");
    assert!(error.is_duplicate());

    adapter.drop_collection("t1", true).await.expect("drop collection");
    adapter.drop("scenario_d").await.expect("drop schema");
}
