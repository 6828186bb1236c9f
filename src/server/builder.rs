//! ServerBuilder for fluent API to build HTTP servers

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::exposure::RestExposure;
use super::host::ApiHost;
use super::resource_registry::ResourceRegistry;
use crate::config::ApiConfig;
use crate::connections::ConnectionManager;
use crate::core::events::EventBus;
use crate::core::service::{ConnectionService, MutationStore, RecordStore, ServiceCaller};
use crate::mutation::{MutationCatalog, MutationPipeline};
use crate::remote::{FanOut, RemoteServiceClient, ServiceRegistry};
use crate::resources::{QueryOrchestrator, ResourceDefinition, ResourceState};

/// Builder for creating HTTP servers with auto-registered resource routes
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(ApiConfig::from_yaml_file("config/api.yaml")?)
///     .with_connection_service(InMemoryConnectionService::new())
///     .with_mutation_store(InMemoryMutationStore::new())
///     .register_resource(
///         ResourceDefinition::new("equipment", "equipment").with_searchable(["id", "name"]),
///         InMemoryRecordStore::new(),
///     )
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: ApiConfig,
    connection_service: Option<Arc<dyn ConnectionService>>,
    mutation_store: Option<Arc<dyn MutationStore>>,
    service_caller: Option<Arc<dyn ServiceCaller>>,
    resources: Vec<(ResourceDefinition, Arc<dyn RecordStore>)>,
    custom_routes: Vec<Router>,
    event_bus: Option<EventBus>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ApiConfig::default(),
            connection_service: None,
            mutation_store: None,
            service_caller: None,
            resources: Vec::new(),
            custom_routes: Vec::new(),
            event_bus: None,
        }
    }

    /// Replace the default configuration
    pub fn with_config(mut self, config: ApiConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the connection table (required)
    pub fn with_connection_service(mut self, service: impl ConnectionService + 'static) -> Self {
        self.connection_service = Some(Arc::new(service));
        self
    }

    /// Set the mutation rule store (required)
    pub fn with_mutation_store(mut self, store: impl MutationStore + 'static) -> Self {
        self.mutation_store = Some(Arc::new(store));
        self
    }

    /// Override the outbound caller
    ///
    /// Defaults to a [`RemoteServiceClient`] over the configured services.
    pub fn with_service_caller(mut self, caller: impl ServiceCaller + 'static) -> Self {
        self.service_caller = Some(Arc::new(caller));
        self
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Enable lifecycle events
    ///
    /// # Arguments
    ///
    /// * `capacity` - Buffer size for the broadcast channel (recommended: 1024)
    pub fn with_event_bus(mut self, capacity: usize) -> Self {
        self.event_bus = Some(EventBus::new(capacity));
        self
    }

    /// Expose a resource type backed by `store`
    pub fn register_resource(
        mut self,
        definition: ResourceDefinition,
        store: impl RecordStore + 'static,
    ) -> Self {
        self.resources.push((definition, Arc::new(store)));
        self
    }

    /// Build the host shared by every exposure
    pub fn build_host(mut self) -> Result<ApiHost> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let connection_service = self.connection_service.take().ok_or_else(|| {
            anyhow::anyhow!("ConnectionService is required. Call .with_connection_service()")
        })?;
        let mutation_store = self.mutation_store.take().ok_or_else(|| {
            anyhow::anyhow!("MutationStore is required. Call .with_mutation_store()")
        })?;
        let caller = match self.service_caller.take() {
            Some(caller) => caller,
            None => Arc::new(RemoteServiceClient::new(
                ServiceRegistry::from_config(&config),
                config.remote.call_timeout(),
            )?) as Arc<dyn ServiceCaller>,
        };

        let fanout = FanOut::from_limits(&config.remote);
        let catalog = Arc::new(MutationCatalog::new(mutation_store));
        let pipeline = Arc::new(MutationPipeline::new(
            catalog,
            connection_service.clone(),
            caller.clone(),
            fanout.clone(),
        ));
        let connections = Arc::new(ConnectionManager::new(connection_service, caller, fanout));
        let event_bus = self.event_bus.take().map(Arc::new);

        let mut registry = ResourceRegistry::new();
        for (definition, store) in self.resources {
            let orchestrator = QueryOrchestrator::new(definition.searchable.clone(), config.max_results);
            registry.register(Box::new(ResourceState {
                definition: Arc::new(definition),
                store,
                orchestrator: Arc::new(orchestrator),
                pipeline: pipeline.clone(),
                connections: connections.clone(),
                event_bus: event_bus.clone(),
            }));
        }

        let mut host = ApiHost::new(config, pipeline, connections, registry);
        if let Some(event_bus) = event_bus {
            host = host.with_event_bus(event_bus);
        }
        Ok(host)
    }

    /// Build the final REST router
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        RestExposure::build_router(host, custom_routes)
    }

    /// Serve the application with graceful shutdown on SIGTERM or Ctrl+C
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
///
/// A handler that fails to install never fires; the other one still does.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
