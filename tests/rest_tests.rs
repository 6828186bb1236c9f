//! REST integration tests for the generic resource endpoints
//!
//! Full round-trips: JSON → HTTP request → handler → record store →
//! mutation pipeline → envelope.

mod common;

use axum::http::StatusCode;
use common::{build_api, header, seed};
use resource_mesh::prelude::*;

fn data(body: &Value) -> &Value {
    &body["data"]
}

// =============================================================================
// Envelope and CRUD
// =============================================================================

#[tokio::test]
async fn test_health_routes() {
    let api = build_api(vec![]);

    for path in ["/health", "/healthz"] {
        let response = api.server.get(path).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn test_create_then_get() {
    let api = build_api(vec![]);

    let response = api
        .server
        .post("/equipment")
        .json(&json!({ "name": "Drill", "status": "active", "meta": { "color": "red" } }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "OK");
    assert!(body["time"].as_f64().is_some());
    assert_eq!(data(&body)["name"], "Drill");
    assert_eq!(data(&body)["meta"]["color"], "red");

    let id = data(&body)["id"].as_str().unwrap().to_string();
    let response = api.server.get(&format!("/equipment/{}", id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(data(&body)["id"], id);
    assert_eq!(data(&body)["status"], "active");
    assert!(data(&body)["deleted_at"].is_null());
}

#[tokio::test]
async fn test_create_rejects_non_object_body() {
    let api = build_api(vec![]);

    let response = api
        .server
        .post("/equipment")
        .json(&json!(["not", "an", "object"]))
        .await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_get_unknown_or_malformed_id_is_404() {
    let api = build_api(vec![]);

    for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let response = api.server.get(&format!("/equipment/{}", id)).await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Not found");
        assert!(body["time"].as_f64().is_some());
    }
}

#[tokio::test]
async fn test_update_merges_meta_and_fields() {
    let api = build_api(vec![]);
    let item = seed(
        &api.records,
        json!({ "name": "Drill", "meta": { "color": "red", "warehouse": "north" } }),
    )
    .await;

    let response = api
        .server
        .put(&format!("/equipment/{}", item.id))
        .json(&json!({ "color": "blue", "name": "Hammer drill", "id": Uuid::new_v4() }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(data(&body)["id"], item.id.to_string());
    assert_eq!(data(&body)["name"], "Hammer drill");
    assert_eq!(data(&body)["meta"]["color"], "blue");
    assert_eq!(data(&body)["meta"]["warehouse"], "north");

    let stored = api.records.get(&item.id).await.unwrap().unwrap();
    assert!(!stored.fields.contains_key("color"));
    assert_eq!(stored.meta["color"], "blue");
}

#[tokio::test]
async fn test_soft_delete_and_restore() {
    let api = build_api(vec![]);
    let item = seed(&api.records, json!({ "name": "Drill" })).await;
    seed(&api.records, json!({ "name": "Saw" })).await;

    let response = api.server.delete(&format!("/equipment/{}", item.id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(data(&body)["deleted_at"].is_string());

    let listed: Value = api.server.get("/equipment").await.json();
    assert_eq!(data(&listed).as_array().unwrap().len(), 1);

    let listed: Value = api
        .server
        .get("/equipment")
        .add_query_param("with_trashed", "1")
        .await
        .json();
    assert_eq!(data(&listed).as_array().unwrap().len(), 2);

    let listed: Value = api
        .server
        .get("/equipment")
        .add_query_param("only_trashed", "true")
        .await
        .json();
    assert_eq!(data(&listed)[0]["name"], "Drill");

    // Trashed records stay reachable by id
    api.server
        .get(&format!("/equipment/{}", item.id))
        .await
        .assert_status_ok();

    let response = api
        .server
        .post(&format!("/equipment/{}/restore", item.id))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(data(&body)["deleted_at"].is_null());

    let listed: Value = api.server.get("/equipment").await.json();
    assert_eq!(data(&listed).as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_purge_removes_record() {
    let api = build_api(vec![]);
    let item = seed(&api.records, json!({ "name": "Drill" })).await;

    let response = api
        .server
        .delete(&format!("/equipment/{}/purge", item.id))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(data(&body)["name"], "Drill");

    api.server
        .get(&format!("/equipment/{}", item.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_purge_blocked_by_attached_connection() {
    let api = build_api(vec![]);
    let item = seed(&api.records, json!({ "name": "Drill" })).await;

    api.server
        .post(&format!("/equipment/{}/attach", item.id))
        .json(&json!({ "service": "vendors", "service_id": "7" }))
        .await
        .assert_status_ok();

    let response = api
        .server
        .delete(&format!("/equipment/{}/purge", item.id))
        .await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);
    let body: Value = response.json();
    assert_eq!(
        body["message"],
        "Unable to purge item. Please Detach all connections first"
    );
    assert!(api.records.get(&item.id).await.unwrap().is_some());

    api.server
        .post(&format!("/equipment/{}/detach", item.id))
        .json(&json!({ "service": "vendors", "service_id": "7" }))
        .await
        .assert_status_ok();

    api.server
        .delete(&format!("/equipment/{}/purge", item.id))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_columns_projection_on_single_record() {
    let api = build_api(vec![]);
    let item = seed(
        &api.records,
        json!({ "name": "Drill", "status": "active", "price": 120 }),
    )
    .await;

    let body: Value = api
        .server
        .get(&format!("/equipment/{}", item.id))
        .add_query_param("columns", "name, price")
        .await
        .json();
    let record = data(&body).as_object().unwrap();
    assert_eq!(record.len(), 2);
    assert_eq!(record["name"], "Drill");
    assert_eq!(record["price"], 120);
    assert!(!record.contains_key("id"));
}

// =============================================================================
// Listing, search and pagination
// =============================================================================

#[tokio::test]
async fn test_listing_over_max_results_is_force_paginated() {
    let api = build_api(vec![]);
    for i in 0..250 {
        seed(&api.records, json!({ "name": format!("Item {}", i) })).await;
    }

    let body: Value = api.server.get("/equipment").await.json();
    assert_eq!(data(&body).as_array().unwrap().len(), 200);
    assert_eq!(body["total"], 250);
    assert_eq!(body["per_page"], 200);
    assert_eq!(body["current_page"], 1);
    assert_eq!(body["last_page"], 2);
    assert_eq!(body["has_next"], true);

    let body: Value = api
        .server
        .get("/equipment")
        .add_query_param("page", "2")
        .await
        .json();
    assert_eq!(data(&body).as_array().unwrap().len(), 50);
    assert_eq!(data(&body)[0]["name"], "Item 200");
    assert_eq!(body["has_next"], false);
    assert_eq!(body["has_prev"], true);
}

#[tokio::test]
async fn test_listing_under_max_results_has_no_pagination_keys() {
    let api = build_api(vec![]);
    for i in 0..3 {
        seed(&api.records, json!({ "name": format!("Item {}", i) })).await;
    }

    let body: Value = api.server.get("/equipment").await.json();
    assert_eq!(data(&body).as_array().unwrap().len(), 3);
    assert!(body.get("total").is_none());
    assert!(body.get("current_page").is_none());
}

#[tokio::test]
async fn test_explicit_page_size() {
    let api = build_api(vec![]);
    for i in 0..7 {
        seed(&api.records, json!({ "name": format!("Item {}", i) })).await;
    }

    let body: Value = api
        .server
        .get("/equipment")
        .add_query_param("paginate", "3")
        .add_query_param("page", "3")
        .await
        .json();
    assert_eq!(data(&body).as_array().unwrap().len(), 1);
    assert_eq!(body["total"], 7);
    assert_eq!(body["last_page"], 3);
}

#[tokio::test]
async fn test_just_count() {
    let api = build_api(vec![]);
    for status in ["active", "active", "retired"] {
        seed(&api.records, json!({ "name": "Drill", "status": status })).await;
    }

    let body: Value = api
        .server
        .get("/equipment")
        .add_query_param("status", "active")
        .add_query_param("just_count", "1")
        .await
        .json();
    assert_eq!(data(&body), &json!({ "total": 2 }));
}

#[tokio::test]
async fn test_search_by_like_id_list_and_exclude() {
    let api = build_api(vec![]);
    let drill = seed(&api.records, json!({ "name": "Hammer Drill" })).await;
    let saw = seed(&api.records, json!({ "name": "Saw" })).await;
    seed(&api.records, json!({ "name": "Drill press" })).await;

    let body: Value = api
        .server
        .get("/equipment")
        .add_query_param("name_like", "drill")
        .await
        .json();
    assert_eq!(data(&body).as_array().unwrap().len(), 2);

    let ids = format!("{},{}", drill.id, saw.id);
    let body: Value = api
        .server
        .get("/equipment")
        .add_query_param("id", &ids)
        .add_query_param("exclude", &saw.id.to_string())
        .await
        .json();
    let listed = data(&body).as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], drill.id.to_string());

    // Unsearchable parameters are ignored
    let body: Value = api
        .server
        .get("/equipment")
        .add_query_param("price", "10")
        .await
        .json();
    assert_eq!(data(&body).as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_meta_filter() {
    let api = build_api(vec![]);
    seed(&api.records, json!({ "name": "Drill", "meta": { "color": "red" } })).await;
    seed(&api.records, json!({ "name": "Saw", "meta": { "color": "blue" } })).await;

    let body: Value = api
        .server
        .get("/equipment")
        .add_query_param("meta", r#"{"color":"blue"}"#)
        .await
        .json();
    let listed = data(&body).as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "Saw");
}

#[tokio::test]
async fn test_wrong_filters_are_generic() {
    let api = build_api(vec![]);
    seed(&api.records, json!({ "name": "Drill" })).await;

    for (key, value) in [("id", "12,13"), ("meta", "{not json"), ("paginate", "many")] {
        let response = api
            .server
            .get("/equipment")
            .add_query_param(key, value)
            .await;
        response.assert_status(StatusCode::PRECONDITION_FAILED);
        let body: Value = response.json();
        assert_eq!(
            body["message"],
            "Wrong filters provided. Please check documentation"
        );
        assert_eq!(body["code"], "WRONG_FILTERS");
    }
}

#[tokio::test]
async fn test_limit_without_page_size_is_unpaginated() {
    let api = build_api(vec![]);
    for i in 0..10 {
        seed(&api.records, json!({ "name": format!("Item {}", i) })).await;
    }

    let body: Value = api
        .server
        .get("/equipment")
        .add_query_param("limit", "4")
        .await
        .json();
    assert_eq!(data(&body).as_array().unwrap().len(), 4);
    assert!(body.get("total").is_none());
}

// =============================================================================
// Headers and events
// =============================================================================

#[tokio::test]
async fn test_malformed_account_header_rejected() {
    let api = build_api(vec![]);
    let (name, value) = header("x-account-id", "account-42");

    let response = api.server.get("/equipment").add_header(name, value).await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_lifecycle_events_published() {
    let api = build_api(vec![]);
    let mut events = api.events.as_ref().unwrap().subscribe();
    let account = Uuid::new_v4();
    let (name, value) = header("x-account-id", &account.to_string());

    let body: Value = api
        .server
        .post("/equipment")
        .add_header(name, value)
        .json(&json!({ "name": "Drill" }))
        .await
        .json();
    let id = data(&body)["id"].as_str().unwrap().to_string();
    api.server
        .delete(&format!("/equipment/{}", id))
        .await
        .assert_status_ok();

    let created = events.recv().await.unwrap();
    assert_eq!(created.event.action(), "created");
    assert_eq!(created.event.item_id().to_string(), id);
    match created.event {
        ApiEvent::Resource(resource_mesh::core::events::ResourceEvent::Created {
            account_id,
            ..
        }) => assert_eq!(account_id, Some(account)),
        other => panic!("unexpected event: {:?}", other),
    }

    let deleted = events.recv().await.unwrap();
    assert_eq!(deleted.event.action(), "deleted");
}
