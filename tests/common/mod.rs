//! Shared integration test infrastructure
//!
//! ```text
//! axum_test::TestServer
//!     └─ resource-mesh Router (ServerBuilder)
//!         └─ RemoteServiceClient ──HTTP──▶ sibling axum service on 127.0.0.1:0
//!                                             ├─ GET    /vendors          (?id=1,2)
//!                                             ├─ POST   /vendors
//!                                             ├─ GET    /vendors/{id}     (404 for 99)
//!                                             ├─ PUT    /vendors/{id}
//!                                             ├─ DELETE /vendors/{id}
//!                                             ├─ POST   /vendors/{id}/restore
//!                                             ├─ DELETE /vendors/{id}/purge
//!                                             ├─ GET    /plain            (bare array)
//!                                             ├─ GET    /failing          (500 + envelope)
//!                                             ├─ GET    /slow             (answers after 2s)
//!                                             └─ GET    /opaque           (502, no body)
//! ```

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use axum_test::TestServer;
use resource_mesh::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// One request observed by the sibling service
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

type Seen = Arc<Mutex<Vec<SeenRequest>>>;

/// A running sibling service
pub struct Sibling {
    pub base_url: String,
    seen: Seen,
}

impl Sibling {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<SeenRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Registry entry pointing `name` at `prefix` on this sibling
    pub fn entry(&self, name: &str, prefix: &str) -> ServiceEntry {
        ServiceEntry::new(name, self.base_url.clone(), prefix)
    }
}

fn record(seen: &Seen, method: &str, uri: &Uri, headers: &HeaderMap, body: Option<Value>) {
    let query = Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(q)| q)
        .unwrap_or_default();
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    seen.lock().unwrap().push(SeenRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        bearer,
        body,
    });
}

fn vendor(id: &str) -> Value {
    match id.parse::<u64>() {
        Ok(n) => json!({ "id": n, "name": format!("Vendor {}", n) }),
        Err(_) => json!({ "id": id, "name": format!("Vendor {}", id) }),
    }
}

async fn list_vendors(
    State(seen): State<Seen>,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    record(&seen, "GET", &uri, &headers, None);
    let data: Vec<Value> = match params.get("id") {
        Some(ids) => ids
            .split(',')
            .filter(|id| !id.is_empty() && *id != "404")
            .map(vendor)
            .collect(),
        None => (1..=3).map(|n| vendor(&n.to_string())).collect(),
    };
    Json(json!({ "success": true, "data": data, "message": "OK", "time": 0.01 }))
}

async fn create_vendor(
    State(seen): State<Seen>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record(&seen, "POST", &uri, &headers, Some(body.clone()));
    let mut created = body;
    created["id"] = json!(100);
    Json(json!({ "success": true, "data": created, "message": "OK", "time": 0.01 }))
}

async fn get_vendor(
    State(seen): State<Seen>,
    uri: Uri,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    record(&seen, "GET", &uri, &headers, None);
    if id == "99" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Not found", "time": 0.01 })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": vendor(&id), "message": "OK", "time": 0.01 })),
    )
}

async fn update_vendor(
    State(seen): State<Seen>,
    uri: Uri,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    record(&seen, "PUT", &uri, &headers, Some(body.clone()));
    let mut updated = vendor(&id);
    if let (Some(target), Some(changes)) = (updated.as_object_mut(), body.as_object()) {
        for (k, v) in changes {
            target.insert(k.clone(), v.clone());
        }
    }
    Json(json!({ "success": true, "data": updated, "message": "OK", "time": 0.01 }))
}

async fn delete_vendor(
    State(seen): State<Seen>,
    uri: Uri,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    record(&seen, "DELETE", &uri, &headers, None);
    Json(json!({ "success": true, "data": vendor(&id), "message": "OK", "time": 0.01 }))
}

async fn restore_vendor(
    State(seen): State<Seen>,
    uri: Uri,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    record(&seen, "POST", &uri, &headers, None);
    Json(json!({ "success": true, "data": vendor(&id), "message": "OK", "time": 0.01 }))
}

async fn plain_list(State(seen): State<Seen>, uri: Uri, headers: HeaderMap) -> Json<Value> {
    record(&seen, "GET", &uri, &headers, None);
    Json(json!([{ "id": "a1", "label": "plain" }]))
}

async fn failing(State(seen): State<Seen>, uri: Uri, headers: HeaderMap) -> impl IntoResponse {
    record(&seen, "GET", &uri, &headers, None);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "message": "vendor database unavailable", "time": 0.02 })),
    )
}

async fn slow(State(seen): State<Seen>, uri: Uri, headers: HeaderMap) -> Json<Value> {
    record(&seen, "GET", &uri, &headers, None);
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    Json(json!({ "success": true, "data": [], "message": "OK", "time": 2.0 }))
}

async fn opaque(State(seen): State<Seen>, uri: Uri, headers: HeaderMap) -> impl IntoResponse {
    record(&seen, "GET", &uri, &headers, None);
    (StatusCode::BAD_GATEWAY, "upstream hiccup")
}

/// Start a sibling service on an ephemeral port
pub async fn spawn_sibling() -> Sibling {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/vendors", get(list_vendors).post(create_vendor))
        .route(
            "/vendors/{id}",
            get(get_vendor).put(update_vendor).delete(delete_vendor),
        )
        .route("/vendors/{id}/restore", post(restore_vendor))
        .route("/vendors/{id}/purge", delete(delete_vendor))
        .route("/plain", get(plain_list))
        .route("/failing", get(failing))
        .route("/slow", get(slow))
        .route("/opaque", get(opaque))
        .with_state(seen.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Sibling {
        base_url: format!("http://{}", addr),
        seen,
    }
}

/// A registry URL nothing listens on
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Equipment API wired to the given services
pub struct TestApi {
    pub server: TestServer,
    pub records: InMemoryRecordStore,
    pub rules: InMemoryMutationStore,
    pub connections: InMemoryConnectionService,
    pub events: Option<Arc<EventBus>>,
}

pub fn equipment_definition() -> ResourceDefinition {
    ResourceDefinition::new("equipment", "equipment").with_searchable(["id", "name", "status"])
}

pub fn build_api(services: Vec<ServiceEntry>) -> TestApi {
    let records = InMemoryRecordStore::new();
    let rules = InMemoryMutationStore::new();
    let connections = InMemoryConnectionService::new();

    let config = ApiConfig {
        services,
        ..ApiConfig::default()
    };
    let host = ServerBuilder::new()
        .with_config(config)
        .with_connection_service(connections.clone())
        .with_mutation_store(rules.clone())
        .with_event_bus(64)
        .register_resource(equipment_definition(), records.clone())
        .build_host()
        .unwrap();
    let events = host.event_bus().cloned();
    let router = RestExposure::build_router(Arc::new(host), vec![]).unwrap();

    TestApi {
        server: TestServer::new(router),
        records,
        rules,
        connections,
        events,
    }
}

/// Store a record directly, bypassing HTTP
pub async fn seed(records: &InMemoryRecordStore, body: Value) -> ResourceItem {
    let item = ResourceItem::from_body(body.as_object().cloned().unwrap_or_default());
    records.create(item).await.unwrap()
}

pub fn header(name: &'static str, value: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(name),
        HeaderValue::from_str(value).unwrap(),
    )
}
