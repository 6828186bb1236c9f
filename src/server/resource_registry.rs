//! Resource registry for managing resource descriptors and their routes

use axum::Router;
use std::collections::BTreeMap;

use crate::resources::{ResourceState, resource_routes};

/// Trait that describes how to build routes for a resource type
///
/// The builder registers one [`ResourceState`] per resource; custom
/// descriptors can be registered directly for resources with extra routes.
pub trait ResourceDescriptor: Send + Sync {
    /// The resource name (singular, e.g., "equipment")
    fn singular(&self) -> &str;

    /// The path segment (e.g., "equipment")
    fn plural(&self) -> &str;

    /// Build every route for this resource
    fn build_routes(&self) -> Router;
}

impl ResourceDescriptor for ResourceState {
    fn singular(&self) -> &str {
        &self.definition.singular
    }

    fn plural(&self) -> &str {
        &self.definition.plural
    }

    fn build_routes(&self) -> Router {
        resource_routes(self.clone())
    }
}

/// Registry for all resources exposed by a host
#[derive(Default)]
pub struct ResourceRegistry {
    descriptors: BTreeMap<String, Box<dyn ResourceDescriptor>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous one with the same name
    pub fn register(&mut self, descriptor: Box<dyn ResourceDescriptor>) {
        let name = descriptor.singular().to_string();
        if self.descriptors.insert(name.clone(), descriptor).is_some() {
            tracing::warn!(resource = %name, "resource registered twice, keeping the last one");
        }
    }

    /// Merge the routes of every registered resource
    pub fn build_routes(&self) -> Router {
        self.descriptors
            .values()
            .fold(Router::new(), |router, descriptor| {
                router.merge(descriptor.build_routes())
            })
    }

    /// Registered resource names, sorted
    pub fn resource_types(&self) -> Vec<&str> {
        self.descriptors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
