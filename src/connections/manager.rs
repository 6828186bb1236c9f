//! Attach/detach state machine and connection hydration

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::connection::{Connection, ConnectionState};
use crate::core::error::{ApiResult, ConnectionError, StorageError};
use crate::core::service::{ConnectionService, ServiceCaller};
use crate::remote::FanOut;

/// Body of `POST /{id}/attach`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AttachRequest {
    #[validate(length(min = 1, message = "service is required"))]
    #[serde(default)]
    pub service: String,

    #[validate(length(min = 1, message = "service_id is required"))]
    #[serde(default, deserialize_with = "string_or_number")]
    pub service_id: String,

    #[serde(default)]
    pub attached_at: Option<DateTime<Utc>>,
}

/// Body of `POST /{id}/detach`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DetachRequest {
    #[validate(length(min = 1, message = "service is required"))]
    #[serde(default)]
    pub service: String,

    #[validate(length(min = 1, message = "service_id is required"))]
    #[serde(default, deserialize_with = "string_or_number")]
    pub service_id: String,

    #[serde(default)]
    pub detached_at: Option<DateTime<Utc>>,
}

/// Remote ids arrive as strings or numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Filters of `GET /{id}/connections`
#[derive(Debug, Clone, Default)]
pub struct ConnectionQuery {
    pub service: Option<String>,
    pub with_detached: bool,
    /// Hydrate the remote objects behind the rows
    pub include_objects: bool,
}

/// Connections of an item, with remote objects when requested
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ConnectionsView {
    Rows(Vec<Connection>),
    Hydrated {
        connections: Vec<Connection>,
        objects: IndexMap<String, Vec<Value>>,
    },
}

pub struct ConnectionManager {
    connections: Arc<dyn ConnectionService>,
    caller: Arc<dyn ServiceCaller>,
    fanout: FanOut,
}

impl ConnectionManager {
    pub fn new(
        connections: Arc<dyn ConnectionService>,
        caller: Arc<dyn ServiceCaller>,
        fanout: FanOut,
    ) -> Self {
        Self {
            connections,
            caller,
            fanout,
        }
    }

    async fn state_of(
        &self,
        item_id: &Uuid,
        service: &str,
        service_id: &str,
    ) -> ApiResult<(ConnectionState, Option<Connection>)> {
        let latest = self
            .connections
            .latest_for(item_id, service, service_id)
            .await
            .map_err(|e| StorageError::failed("load connection", e))?;
        Ok((ConnectionState::of_latest(latest.as_ref()), latest))
    }

    /// Attach an item to a remote object
    ///
    /// Detached triples get a fresh row; the old row is left untouched.
    pub async fn attach(
        &self,
        item_id: Uuid,
        request: AttachRequest,
        user_id: Option<String>,
    ) -> ApiResult<Connection> {
        request.validate()?;

        let connection = Connection::new(
            item_id,
            request.service.clone(),
            request.service_id.clone(),
            user_id,
            request.attached_at,
        );
        let created = self
            .connections
            .create_unless_attached(connection)
            .await
            .map_err(|e| StorageError::failed("attach", e))?
            .ok_or(ConnectionError::AlreadyAttached {
                item_id,
                service: request.service,
                service_id: request.service_id,
            })?;

        tracing::debug!(
            item_id = %item_id,
            service = %created.service,
            service_id = %created.service_id,
            "attached"
        );
        Ok(created)
    }

    /// Detach the most recent row of a triple
    pub async fn detach(&self, item_id: Uuid, request: DetachRequest) -> ApiResult<Connection> {
        request.validate()?;

        let (state, latest) = self
            .state_of(&item_id, &request.service, &request.service_id)
            .await?;
        let mut connection = match (state, latest) {
            (ConnectionState::Attached, Some(connection)) => connection,
            (ConnectionState::Detached, _) => {
                return Err(ConnectionError::AlreadyDetached {
                    item_id,
                    service: request.service,
                    service_id: request.service_id,
                }
                .into());
            }
            _ => {
                return Err(ConnectionError::NotAttached {
                    item_id,
                    service: request.service,
                    service_id: request.service_id,
                }
                .into());
            }
        };

        connection.detach(request.detached_at);
        let updated = self
            .connections
            .update(connection)
            .await
            .map_err(|e| StorageError::failed("detach", e))?;

        tracing::debug!(
            item_id = %item_id,
            service = %updated.service,
            service_id = %updated.service_id,
            "detached"
        );
        Ok(updated)
    }

    /// Rows of an item, optionally hydrated with one call per service
    ///
    /// Any failing service aborts the whole request.
    pub async fn get_connections(
        &self,
        item_id: Uuid,
        query: ConnectionQuery,
        token: Option<&str>,
    ) -> ApiResult<ConnectionsView> {
        let rows = self
            .connections
            .find_by_item(&item_id, query.service.as_deref(), query.with_detached)
            .await
            .map_err(|e| StorageError::failed("load connections", e))?;

        if !query.include_objects {
            return Ok(ConnectionsView::Rows(rows));
        }

        let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
        for row in &rows {
            let ids = grouped.entry(row.service.clone()).or_default();
            if !ids.contains(&row.service_id) {
                ids.push(row.service_id.clone());
            }
        }

        let token = token.map(str::to_string);
        let mut fetched = self
            .fanout
            .run(grouped.keys().cloned().collect(), |service| {
                let params = json!({
                    "id": grouped.get(&service).map(|ids| ids.join(",")).unwrap_or_default(),
                });
                let caller = self.caller.clone();
                let token = token.clone();
                async move { caller.index_from(&service, params, token.as_deref()).await }
            })
            .await?;

        // Keep the services in row order
        let objects = grouped
            .keys()
            .map(|service| {
                let objects = fetched.remove(service).unwrap_or_default();
                (service.clone(), objects)
            })
            .collect();

        Ok(ConnectionsView::Hydrated {
            connections: rows,
            objects,
        })
    }

    pub async fn attached_count(&self, item_id: &Uuid) -> ApiResult<usize> {
        Ok(self
            .connections
            .count_attached(item_id)
            .await
            .map_err(|e| StorageError::failed("count connections", e))?)
    }
}
