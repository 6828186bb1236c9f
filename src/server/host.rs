//! Server host holding every shared component
//!
//! The host is built once by the [`ServerBuilder`](super::ServerBuilder) and
//! is the single source of truth for the application state. Exposures turn it
//! into routers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::connections::ConnectionManager;
use crate::core::events::EventBus;
use crate::mutation::{MutationCatalog, MutationPipeline};
use crate::server::resource_registry::ResourceRegistry;

pub struct ApiHost {
    pub config: Arc<ApiConfig>,

    /// Shared mutation pipeline (one rule cache per process)
    pub pipeline: Arc<MutationPipeline>,

    /// Attach/detach and connection hydration
    pub connections: Arc<ConnectionManager>,

    /// Resources with their routes
    pub resources: ResourceRegistry,

    /// Optional event bus for lifecycle notifications
    pub event_bus: Option<Arc<EventBus>>,
}

impl ApiHost {
    pub fn new(
        config: Arc<ApiConfig>,
        pipeline: Arc<MutationPipeline>,
        connections: Arc<ConnectionManager>,
        resources: ResourceRegistry,
    ) -> Self {
        Self {
            config,
            pipeline,
            connections,
            resources,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn event_bus(&self) -> Option<&Arc<EventBus>> {
        self.event_bus.as_ref()
    }

    /// The rule cache, for invalidation after rules change out of band
    pub fn catalog(&self) -> &Arc<MutationCatalog> {
        self.pipeline.catalog()
    }

    pub fn resource_types(&self) -> Vec<&str> {
        self.resources.resource_types()
    }
}
