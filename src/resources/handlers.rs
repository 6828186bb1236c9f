//! HTTP handlers for resource endpoints
//!
//! Every handler is resource-agnostic: the [`ResourceState`] carries the
//! definition, the record store and the shared pipeline. Single-record
//! endpoints run the same three-stage pipeline as listings, over a batch of
//! one.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use uuid::Uuid;

use super::ResourceDefinition;
use super::envelope::Envelope;
use super::orchestrator::{Listing, QueryOrchestrator};
use crate::connections::{AttachRequest, ConnectionManager, ConnectionQuery, DetachRequest};
use crate::core::context::RequestContext;
use crate::core::error::{ApiResult, ResourceError, StorageError, ValidationError};
use crate::core::events::{ApiEvent, ConnectionEvent, EventBus, ResourceEvent};
use crate::core::item::{ItemView, ResourceItem};
use crate::core::service::RecordStore;
use crate::mutation::MutationPipeline;

/// State shared by the handlers of one resource type
#[derive(Clone)]
pub struct ResourceState {
    pub definition: Arc<ResourceDefinition>,
    pub store: Arc<dyn RecordStore>,
    pub orchestrator: Arc<QueryOrchestrator>,
    pub pipeline: Arc<MutationPipeline>,
    pub connections: Arc<ConnectionManager>,
    /// Optional event bus for lifecycle notifications
    pub event_bus: Option<Arc<EventBus>>,
}

impl ResourceState {
    fn publish(&self, event: ApiEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    fn resource_event(&self, item_id: Uuid, context: &RequestContext, action: Action) {
        let resource = self.definition.singular.clone();
        let account_id = context.account_id;
        let event = match action {
            Action::Created => ResourceEvent::Created {
                resource,
                item_id,
                account_id,
            },
            Action::Updated => ResourceEvent::Updated {
                resource,
                item_id,
                account_id,
            },
            Action::Deleted => ResourceEvent::Deleted {
                resource,
                item_id,
                account_id,
            },
            Action::Restored => ResourceEvent::Restored {
                resource,
                item_id,
                account_id,
            },
            Action::Purged => ResourceEvent::Purged {
                resource,
                item_id,
                account_id,
            },
        };
        self.publish(ApiEvent::Resource(event));
    }

    /// Load a record by id, soft-deleted ones included
    async fn load(&self, id: &str) -> ApiResult<ResourceItem> {
        let not_found = || ResourceError::NotFound {
            resource: self.definition.singular.clone(),
            id: id.to_string(),
        };
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;
        self.store
            .get(&uuid)
            .await
            .map_err(|e| StorageError::failed("load record", e))?
            .ok_or_else(|| not_found().into())
    }

    /// Run the pipeline over one record and apply `columns`
    async fn render(&self, context: &RequestContext, item: &ResourceItem) -> ApiResult<Response> {
        let mut views = [item.to_view()];
        self.pipeline.apply(context, &mut views).await?;
        let [mut view] = views;
        if let Some(columns) = context.params.list("columns") {
            view.retain_columns(&columns);
        }
        Ok(Envelope::ok(view, context.elapsed()).into_response())
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Created,
    Updated,
    Deleted,
    Restored,
    Purged,
}

/// Build every route of one resource type
///
/// ```text
/// GET    /{plural}                   list / search
/// POST   /{plural}                   create
/// POST   /{plural}/mutations/setup   copy mutation presets to an account
/// GET    /{plural}/{id}              fetch one
/// PUT    /{plural}/{id}              update
/// DELETE /{plural}/{id}              soft delete
/// POST   /{plural}/{id}/restore      restore
/// DELETE /{plural}/{id}/purge        purge
/// GET    /{plural}/{id}/connections  connections, optionally hydrated
/// POST   /{plural}/{id}/attach       attach to a remote object
/// POST   /{plural}/{id}/detach       detach from a remote object
/// ```
pub fn resource_routes(state: ResourceState) -> Router {
    let base = format!("/{}", state.definition.plural);
    Router::new()
        .route(&base, get(list_items).post(create_item))
        .route(&format!("{}/mutations/setup", base), post(setup_mutations))
        .route(
            &format!("{}/{{id}}", base),
            get(get_item).put(update_item).delete(delete_item),
        )
        .route(&format!("{}/{{id}}/restore", base), post(restore_item))
        .route(&format!("{}/{{id}}/purge", base), delete(purge_item))
        .route(&format!("{}/{{id}}/connections", base), get(get_connections))
        .route(&format!("{}/{{id}}/attach", base), post(attach))
        .route(&format!("{}/{{id}}/detach", base), post(detach))
        .with_state(state)
}

fn respond(context: &RequestContext, result: ApiResult<Response>) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => {
            if err.status_code().is_server_error() {
                tracing::error!(error = %err, code = err.error_code(), "request failed");
            }
            err.into_response_with_time(context.elapsed())
        }
    }
}

/// Parse a JSON object body; an empty body is an empty object
fn json_object(body: &Bytes) -> ApiResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ValidationError::InvalidJson {
            message: "expected a JSON object".to_string(),
        }
        .into()),
        Err(e) => Err(ValidationError::InvalidJson {
            message: e.to_string(),
        }
        .into()),
    }
}

fn json_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_value(Value::Object(json_object(body)?)).map_err(|e| {
        ValidationError::InvalidJson {
            message: e.to_string(),
        }
        .into()
    })
}

// =============================================================================
// Records
// =============================================================================

pub async fn list_items(State(state): State<ResourceState>, context: RequestContext) -> Response {
    let result: ApiResult<Response> = async {
        let listing = state
            .orchestrator
            .list(state.store.as_ref(), &state.pipeline, &context)
            .await?;
        Ok(match listing {
            Listing::Count(total) => {
                Envelope::ok(json!({ "total": total }), context.elapsed()).into_response()
            }
            Listing::Items { items, pagination } => {
                Envelope::<Vec<ItemView>>::ok(items, context.elapsed())
                    .with_pagination(pagination)
                    .into_response()
            }
        })
    }
    .await;
    respond(&context, result)
}

pub async fn get_item(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    context: RequestContext,
) -> Response {
    let result: ApiResult<Response> = async {
        let item = state.load(&id).await?;
        state.render(&context, &item).await
    }
    .await;
    respond(&context, result)
}

pub async fn create_item(
    State(state): State<ResourceState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    let result: ApiResult<Response> = async {
        let item = ResourceItem::from_body(json_object(&body)?);
        let created = state
            .store
            .create(item)
            .await
            .map_err(|e| StorageError::failed("create record", e))?;

        let response = state.render(&context, &created).await?;
        state.resource_event(created.id, &context, Action::Created);
        Ok(response)
    }
    .await;
    respond(&context, result)
}

pub async fn update_item(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    let result: ApiResult<Response> = async {
        let mut item = state.load(&id).await?;
        item.apply_update(json_object(&body)?);
        let saved = state
            .store
            .save(item)
            .await
            .map_err(|e| StorageError::failed("update record", e))?;

        let response = state.render(&context, &saved).await?;
        state.resource_event(saved.id, &context, Action::Updated);
        Ok(response)
    }
    .await;
    respond(&context, result)
}

pub async fn delete_item(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    context: RequestContext,
) -> Response {
    let result: ApiResult<Response> = async {
        let mut item = state.load(&id).await?;
        if !item.is_trashed() {
            item.soft_delete();
        }
        let saved = state
            .store
            .save(item)
            .await
            .map_err(|e| StorageError::failed("delete record", e))?;

        let response = state.render(&context, &saved).await?;
        state.resource_event(saved.id, &context, Action::Deleted);
        Ok(response)
    }
    .await;
    respond(&context, result)
}

pub async fn restore_item(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    context: RequestContext,
) -> Response {
    let result: ApiResult<Response> = async {
        let mut item = state.load(&id).await?;
        item.restore();
        let saved = state
            .store
            .save(item)
            .await
            .map_err(|e| StorageError::failed("restore record", e))?;

        let response = state.render(&context, &saved).await?;
        state.resource_event(saved.id, &context, Action::Restored);
        Ok(response)
    }
    .await;
    respond(&context, result)
}

/// Purge a record; refused while any connection is still attached
pub async fn purge_item(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    context: RequestContext,
) -> Response {
    let result: ApiResult<Response> = async {
        let item = state.load(&id).await?;
        let attached = state.connections.attached_count(&item.id).await?;
        if attached > 0 {
            return Err(ResourceError::PurgeBlocked {
                resource: state.definition.singular.clone(),
                id: item.id,
                attached,
            }
            .into());
        }

        state
            .store
            .purge(&item.id)
            .await
            .map_err(|e| StorageError::failed("purge record", e))?;

        let response = state.render(&context, &item).await?;
        state.resource_event(item.id, &context, Action::Purged);
        Ok(response)
    }
    .await;
    respond(&context, result)
}

// =============================================================================
// Connections
// =============================================================================

pub async fn get_connections(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    context: RequestContext,
) -> Response {
    let result: ApiResult<Response> = async {
        let item_id = Uuid::parse_str(&id).map_err(|_| ResourceError::NotFound {
            resource: state.definition.singular.clone(),
            id: id.clone(),
        })?;
        let query = ConnectionQuery {
            service: context
                .params
                .get("service")
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            with_detached: context.params.flag("with_detached"),
            include_objects: context.params.flag("include_objects"),
        };
        let view = state
            .connections
            .get_connections(item_id, query, context.token.as_deref())
            .await?;
        Ok(Envelope::ok(view, context.elapsed()).into_response())
    }
    .await;
    respond(&context, result)
}

pub async fn attach(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    let result: ApiResult<Response> = async {
        let item = state.load(&id).await?;
        let request: AttachRequest = json_body(&body)?;
        let connection = state
            .connections
            .attach(item.id, request, context.user_id.clone())
            .await?;

        state.publish(ApiEvent::Connection(ConnectionEvent::Attached {
            resource: state.definition.singular.clone(),
            item_id: item.id,
            service: connection.service.clone(),
            service_id: connection.service_id.clone(),
        }));
        Ok(Envelope::ok(connection, context.elapsed()).into_response())
    }
    .await;
    respond(&context, result)
}

pub async fn detach(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    let result: ApiResult<Response> = async {
        let item = state.load(&id).await?;
        let request: DetachRequest = json_body(&body)?;
        let connection = state.connections.detach(item.id, request).await?;

        state.publish(ApiEvent::Connection(ConnectionEvent::Detached {
            resource: state.definition.singular.clone(),
            item_id: item.id,
            service: connection.service.clone(),
            service_id: connection.service_id.clone(),
        }));
        Ok(Envelope::ok(connection, context.elapsed()).into_response())
    }
    .await;
    respond(&context, result)
}

// =============================================================================
// Mutation presets
// =============================================================================

/// Copy mutation presets into an account
pub async fn setup_mutations(
    State(state): State<ResourceState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    let result: ApiResult<Response> = async {
        let body = json_object(&body)?;
        let raw = match body.get("account_id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(ValidationError::MissingArgument {
                    argument: "account_id".to_string(),
                }
                .into());
            }
        };
        let account_id = Uuid::parse_str(&raw).map_err(|_| ValidationError::FieldError {
            field: "account_id".to_string(),
            message: format!("'{}' is not a valid account id", raw),
        })?;

        let created = state.pipeline.catalog().setup_account(account_id).await?;
        let message = format!(
            "Mutations have been set up for account {}. Added {} mutation rules",
            account_id,
            created.len()
        );
        Ok(Envelope::ok(created, context.elapsed())
            .with_message(message)
            .into_response())
    }
    .await;
    respond(&context, result)
}
