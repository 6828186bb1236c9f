//! Mutation pipeline over HTTP: internal, external and dependency stages

mod common;

use axum::http::StatusCode;
use common::{build_api, header, seed, spawn_sibling};
use resource_mesh::prelude::*;

fn hide(key: &str) -> ActionRecord {
    ActionRecord {
        method: "hide".to_string(),
        key: key.to_string(),
        params: None,
    }
}

fn when(condition: &str, value: Value, actions: Vec<ActionRecord>) -> DependencyRecord {
    DependencyRecord {
        condition: condition.to_string(),
        kind: "internal".to_string(),
        value,
        actions,
    }
}

#[tokio::test]
async fn test_internal_rules_and_dependencies() {
    let api = build_api(vec![]);
    api.rules
        .create(
            MutationRecord::internal("color")
                .with_dependencies(vec![when("eq", json!("red"), vec![hide("price")])]),
        )
        .await
        .unwrap();
    api.rules
        .create(MutationRecord::internal("warehouse"))
        .await
        .unwrap();
    seed(
        &api.records,
        json!({ "name": "Drill", "price": 120, "meta": { "color": "red" } }),
    )
    .await;
    seed(
        &api.records,
        json!({ "name": "Saw", "price": 80, "meta": { "color": "blue", "warehouse": "north" } }),
    )
    .await;

    let body: Value = api.server.get("/equipment").await.json();
    let listed = body["data"].as_array().unwrap();

    assert_eq!(listed[0]["color"], "red");
    assert!(listed[0]["warehouse"].is_null());
    assert!(listed[0].get("price").is_none());

    assert_eq!(listed[1]["color"], "blue");
    assert_eq!(listed[1]["warehouse"], "north");
    assert_eq!(listed[1]["price"], 80);
}

#[tokio::test]
async fn test_rename_and_set_actions() {
    let api = build_api(vec![]);
    api.rules
        .create(MutationRecord::internal("color").with_dependencies(vec![when(
            "ne",
            json!("red"),
            vec![
                ActionRecord {
                    method: "set".to_string(),
                    key: "label".to_string(),
                    params: Some(json!("name")),
                },
                ActionRecord {
                    method: "rename".to_string(),
                    key: "color".to_string(),
                    params: Some(json!("shade")),
                },
            ],
        )]))
        .await
        .unwrap();
    let item = seed(
        &api.records,
        json!({ "name": "Saw", "meta": { "color": "blue" } }),
    )
    .await;

    let body: Value = api
        .server
        .get(&format!("/equipment/{}", item.id))
        .await
        .json();
    assert_eq!(body["data"]["label"], "Saw");
    assert_eq!(body["data"]["shade"], "blue");
    assert!(body["data"].get("color").is_none());
}

#[tokio::test]
async fn test_numeric_conditions() {
    let api = build_api(vec![]);
    api.rules
        .create(
            MutationRecord::internal("stock")
                .with_dependencies(vec![when("gt", json!(10), vec![hide("reorder")])]),
        )
        .await
        .unwrap();
    seed(
        &api.records,
        json!({ "name": "Low", "reorder": true, "meta": { "stock": "3" } }),
    )
    .await;
    seed(
        &api.records,
        json!({ "name": "High", "reorder": true, "meta": { "stock": 40 } }),
    )
    .await;

    let body: Value = api.server.get("/equipment").await.json();
    let listed = body["data"].as_array().unwrap();
    // 10 > 3, so the low-stock item hides its flag
    assert!(listed[0].get("reorder").is_none());
    assert_eq!(listed[1]["reorder"], true);
}

#[tokio::test]
async fn test_unsupported_action_fails_request() {
    let api = build_api(vec![]);
    api.rules
        .create(MutationRecord::internal("color").with_dependencies(vec![when(
            "eq",
            json!("red"),
            vec![ActionRecord {
                method: "setNull".to_string(),
                key: "price".to_string(),
                params: None,
            }],
        )]))
        .await
        .unwrap();
    let red = seed(&api.records, json!({ "name": "Drill", "meta": { "color": "red" } })).await;
    let blue = seed(&api.records, json!({ "name": "Saw", "meta": { "color": "blue" } })).await;

    // Never reached for blue items
    api.server
        .get(&format!("/equipment/{}", blue.id))
        .await
        .assert_status_ok();

    let response = api.server.get(&format!("/equipment/{}", red.id)).await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNSUPPORTED_ACTION");
}

#[tokio::test]
async fn test_invalid_rule_is_500() {
    let api = build_api(vec![]);
    api.rules
        .create(MutationRecord::internal("color").with_dependencies(vec![DependencyRecord {
            condition: "approximately".to_string(),
            kind: "internal".to_string(),
            value: json!("red"),
            actions: vec![hide("price")],
        }]))
        .await
        .unwrap();
    let item = seed(&api.records, json!({ "name": "Drill" })).await;

    let response = api.server.get(&format!("/equipment/{}", item.id)).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_MUTATION_RULE");
}

#[tokio::test]
async fn test_account_rules_stack_on_global_rules() {
    let api = build_api(vec![]);
    let account = Uuid::new_v4();
    api.rules
        .create(MutationRecord::internal("color"))
        .await
        .unwrap();
    api.rules
        .create(MutationRecord::internal("warehouse").with_account(account))
        .await
        .unwrap();
    api.rules
        .create(MutationRecord::internal("secret").with_account(Uuid::new_v4()))
        .await
        .unwrap();
    let item = seed(
        &api.records,
        json!({ "name": "Drill", "meta": { "color": "red", "warehouse": "north", "secret": "x" } }),
    )
    .await;
    let path = format!("/equipment/{}", item.id);

    let body: Value = api.server.get(&path).await.json();
    assert_eq!(body["data"]["color"], "red");
    assert!(body["data"].get("warehouse").is_none());

    let (name, value) = header("x-account-id", &account.to_string());
    let body: Value = api.server.get(&path).add_header(name, value).await.json();
    assert_eq!(body["data"]["color"], "red");
    assert_eq!(body["data"]["warehouse"], "north");
    assert!(body["data"].get("secret").is_none());
}

#[tokio::test]
async fn test_external_rules_resolve_through_sibling() {
    let sibling = spawn_sibling().await;
    let api = build_api(vec![sibling.entry("vendors", "/vendors")]);
    api.rules
        .create(MutationRecord::external("vendor", "vendors"))
        .await
        .unwrap();
    let drill = seed(&api.records, json!({ "name": "Drill" })).await;
    let saw = seed(&api.records, json!({ "name": "Saw" })).await;
    seed(&api.records, json!({ "name": "Ladder" })).await;
    for (item, service_id) in [(&drill, "7"), (&saw, "8")] {
        api.server
            .post(&format!("/equipment/{}/attach", item.id))
            .json(&json!({ "service": "vendors", "service_id": service_id }))
            .await
            .assert_status_ok();
    }

    let response = api
        .server
        .get("/equipment")
        .add_query_param("with_connections", "1")
        .authorization_bearer("secret-token")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let listed = body["data"].as_array().unwrap();

    assert_eq!(listed[0]["vendor"], json!([{ "id": 7, "name": "Vendor 7" }]));
    assert_eq!(listed[1]["vendor"], json!([{ "id": 8, "name": "Vendor 8" }]));
    assert!(listed[2]["vendor"].is_null());

    let seen = sibling.requests_to("/vendors");
    assert_eq!(seen.len(), 1, "one call per service for the whole batch");
    assert_eq!(seen[0].query.get("id").map(String::as_str), Some("7,8"));
    assert_eq!(
        seen[0].query.get("exclude_mutation").map(String::as_str),
        Some("vendors")
    );
    assert_eq!(seen[0].bearer.as_deref(), Some("secret-token"));
}

#[tokio::test]
async fn test_external_rules_are_noop_without_flag() {
    let sibling = spawn_sibling().await;
    let api = build_api(vec![sibling.entry("vendors", "/vendors")]);
    api.rules
        .create(MutationRecord::external("vendor", "vendors"))
        .await
        .unwrap();
    let drill = seed(&api.records, json!({ "name": "Drill" })).await;
    api.server
        .post(&format!("/equipment/{}/attach", drill.id))
        .json(&json!({ "service": "vendors", "service_id": "7" }))
        .await
        .assert_status_ok();

    let body: Value = api
        .server
        .get(&format!("/equipment/{}", drill.id))
        .await
        .json();
    assert!(body["data"].get("vendor").is_none());
    assert!(sibling.requests().is_empty());
}

#[tokio::test]
async fn test_excluded_service_keeps_null() {
    let sibling = spawn_sibling().await;
    let api = build_api(vec![sibling.entry("vendors", "/vendors")]);
    api.rules
        .create(MutationRecord::external("vendor", "vendors"))
        .await
        .unwrap();
    let drill = seed(&api.records, json!({ "name": "Drill" })).await;
    api.server
        .post(&format!("/equipment/{}/attach", drill.id))
        .json(&json!({ "service": "vendors", "service_id": "7" }))
        .await
        .assert_status_ok();

    let body: Value = api
        .server
        .get(&format!("/equipment/{}", drill.id))
        .add_query_param("with_connections", "1")
        .add_query_param("exclude_mutation", "vendors")
        .await
        .json();
    assert!(body["data"]["vendor"].is_null());
    assert!(sibling.requests().is_empty());
}

#[tokio::test]
async fn test_external_failure_aborts_listing() {
    let sibling = spawn_sibling().await;
    let api = build_api(vec![sibling.entry("vendors", "/failing")]);
    api.rules
        .create(MutationRecord::external("vendor", "vendors"))
        .await
        .unwrap();
    let drill = seed(&api.records, json!({ "name": "Drill" })).await;
    api.server
        .post(&format!("/equipment/{}/attach", drill.id))
        .json(&json!({ "service": "vendors", "service_id": "7" }))
        .await
        .assert_status_ok();

    let response = api
        .server
        .get("/equipment")
        .add_query_param("with_connections", "1")
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["message"], "vendor database unavailable");
}

#[tokio::test]
async fn test_setup_mutations() {
    let api = build_api(vec![]);
    api.rules
        .add_preset(MutationRecord::internal("warehouse"))
        .unwrap();
    api.rules
        .add_preset(MutationRecord::internal("serial_number"))
        .unwrap();
    let account = Uuid::new_v4();

    let response = api
        .server
        .post("/equipment/mutations/setup")
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Please provide an account_id field");

    let response = api
        .server
        .post("/equipment/mutations/setup")
        .json(&json!({ "account_id": account }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        body["message"],
        format!(
            "Mutations have been set up for account {}. Added 2 mutation rules",
            account
        )
    );
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["account_id"], account.to_string());

    let body: Value = api
        .server
        .post("/equipment/mutations/setup")
        .json(&json!({ "account_id": account }))
        .await
        .json();
    assert!(body["message"].as_str().unwrap().ends_with("Added 0 mutation rules"));

    // The new rules apply to the account straight away
    let item = seed(
        &api.records,
        json!({ "name": "Drill", "meta": { "warehouse": "north" } }),
    )
    .await;
    let (name, value) = header("x-account-id", &account.to_string());
    let body: Value = api
        .server
        .get(&format!("/equipment/{}", item.id))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(body["data"]["warehouse"], "north");
    assert!(body["data"]["serial_number"].is_null());
}
