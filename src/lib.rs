//! # Resource Mesh
//!
//! A generic resource API layer for services in a microservice mesh.
//!
//! ## Features
//!
//! - **Generic Resource Endpoints**: list/search/paginate, CRUD, soft delete,
//!   restore and purge for any resource type over an abstract record store
//! - **Per-Account Mutation Pipeline**: data-driven derived fields
//!   (internal → external → dependencies) configured from stored rules
//! - **Connections**: timestamped links between local items and objects in
//!   sibling services, with attach/detach and hydration
//! - **Remote Services**: a registry-backed HTTP client with bounded,
//!   fail-fast fan-out
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use resource_mesh::prelude::*;
//!
//! let app = ServerBuilder::new()
//!     .with_connection_service(InMemoryConnectionService::new())
//!     .with_mutation_store(InMemoryMutationStore::new())
//!     .register_resource(
//!         ResourceDefinition::new("equipment", "equipment")
//!             .with_searchable(["id", "name", "status"]),
//!         InMemoryRecordStore::new(),
//!     )
//!     .build()?;
//! ```

pub mod config;
pub mod connections;
pub mod core;
pub mod mutation;
pub mod remote;
pub mod resources;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        ApiError, ApiEvent, ApiResult, Connection, ConnectionService, EventBus, ItemView,
        MutationRecord, MutationStore, RecordStore, RequestContext, ResourceItem, ServiceCaller,
    };
    pub use crate::core::rule::{ActionRecord, DependencyRecord};

    // === Config ===
    pub use crate::config::{ApiConfig, RemoteLimits, ServiceEntry};

    // === Engine ===
    pub use crate::connections::{AttachRequest, ConnectionManager, DetachRequest};
    pub use crate::mutation::{MutationCatalog, MutationPipeline};
    pub use crate::remote::{FanOut, RemoteError, RemoteServiceClient, ServiceCall, ServiceRegistry};
    pub use crate::resources::{QueryOrchestrator, ResourceDefinition};

    // === Server ===
    pub use crate::server::{ApiHost, RestExposure, ServerBuilder};

    // === Storage ===
    pub use crate::storage::{InMemoryConnectionService, InMemoryMutationStore, InMemoryRecordStore};

    // === Common third-party ===
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
    pub use uuid::Uuid;
}
