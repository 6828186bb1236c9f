//! Service traits for records, connections, mutation rules and remote calls
//!
//! Storage traits return `anyhow::Result`; the layers above wrap failures in
//! typed errors. Implementations are shared as `Arc<dyn Trait>`.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::core::connection::Connection;
use crate::core::item::ResourceItem;
use crate::core::query::{PageWindow, RecordQuery};
use crate::core::rule::MutationRecord;
use crate::remote::{RemoteError, ServiceCall, list_payload};

/// Storage of one resource type
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Number of records matching the query, capped by its `limit`
    async fn count(&self, query: &RecordQuery) -> Result<usize>;

    /// Matching records in insertion order, optionally windowed
    ///
    /// The window applies after the query's `limit` truncation.
    async fn fetch(&self, query: &RecordQuery, window: Option<PageWindow>)
    -> Result<Vec<ResourceItem>>;

    /// Get a record by id, soft-deleted or not
    async fn get(&self, id: &Uuid) -> Result<Option<ResourceItem>>;

    async fn create(&self, item: ResourceItem) -> Result<ResourceItem>;

    /// Persist an existing record (update, soft delete, restore)
    async fn save(&self, item: ResourceItem) -> Result<ResourceItem>;

    /// Physically remove a record
    async fn purge(&self, id: &Uuid) -> Result<()>;
}

/// Storage of connection rows
///
/// Rows are never deleted through this trait.
#[async_trait]
pub trait ConnectionService: Send + Sync {
    async fn create(&self, connection: Connection) -> Result<Connection>;

    /// Insert `connection` unless its triple is currently attached
    ///
    /// The check and the insert must be atomic. Returns `None` when the
    /// triple was already attached and nothing was written.
    async fn create_unless_attached(&self, connection: Connection) -> Result<Option<Connection>>;

    /// Replace an existing row (used to set `detached_at`)
    async fn update(&self, connection: Connection) -> Result<Connection>;

    /// Most recently created row for a triple
    async fn latest_for(
        &self,
        item_id: &Uuid,
        service: &str,
        service_id: &str,
    ) -> Result<Option<Connection>>;

    /// Rows of one item, optionally for one service
    async fn find_by_item(
        &self,
        item_id: &Uuid,
        service: Option<&str>,
        include_detached: bool,
    ) -> Result<Vec<Connection>>;

    /// Rows of a batch of items restricted to the given services
    async fn find_for_items(
        &self,
        item_ids: &[Uuid],
        services: &[String],
        include_detached: bool,
    ) -> Result<Vec<Connection>>;

    /// Number of attached rows of one item
    async fn count_attached(&self, item_id: &Uuid) -> Result<usize>;
}

/// Storage of mutation rules and presets
#[async_trait]
pub trait MutationStore: Send + Sync {
    /// Rules owned by exactly this account (`None` for global rules)
    async fn rules_for(&self, account_id: Option<&Uuid>) -> Result<Vec<MutationRecord>>;

    /// Preset rules copied into accounts on setup
    async fn presets(&self) -> Result<Vec<MutationRecord>>;

    async fn create(&self, record: MutationRecord) -> Result<MutationRecord>;
}

/// Something that can call a registered sibling service
///
/// Implemented over HTTP by [`RemoteServiceClient`](crate::remote::RemoteServiceClient);
/// tests substitute their own.
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    /// Perform one call and return the decoded JSON body
    async fn call_service(
        &self,
        service: &str,
        call: ServiceCall,
        params: Value,
        token: Option<&str>,
    ) -> Result<Value, RemoteError>;

    /// List objects, unwrapping the `data` payload
    async fn index_from(
        &self,
        service: &str,
        params: Value,
        token: Option<&str>,
    ) -> Result<Vec<Value>, RemoteError> {
        let body = self
            .call_service(service, ServiceCall::List, params, token)
            .await?;
        Ok(list_payload(body))
    }

    async fn get_from(
        &self,
        service: &str,
        id: &str,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.call_service(service, ServiceCall::Get(id.to_string()), Value::Null, token)
            .await
    }

    async fn create_from(
        &self,
        service: &str,
        params: Value,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.call_service(service, ServiceCall::Create, params, token)
            .await
    }

    async fn update_from(
        &self,
        service: &str,
        id: &str,
        params: Value,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.call_service(service, ServiceCall::Update(id.to_string()), params, token)
            .await
    }

    async fn delete_from(
        &self,
        service: &str,
        id: &str,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.call_service(service, ServiceCall::Delete(id.to_string()), Value::Null, token)
            .await
    }

    async fn restore_from(
        &self,
        service: &str,
        id: &str,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.call_service(service, ServiceCall::Restore(id.to_string()), Value::Null, token)
            .await
    }

    async fn purge_from(
        &self,
        service: &str,
        id: &str,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.call_service(service, ServiceCall::Purge(id.to_string()), Value::Null, token)
            .await
    }
}
