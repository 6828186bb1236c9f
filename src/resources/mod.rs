//! Generic resource endpoints
//!
//! A resource type is described by a [`ResourceDefinition`]; the handlers in
//! [`handlers`] serve every endpoint for it against an abstract record store,
//! running each response through the mutation pipeline.

pub mod envelope;
pub mod handlers;
pub mod orchestrator;

pub use envelope::Envelope;
pub use handlers::{ResourceState, resource_routes};
pub use orchestrator::{Listing, QueryOrchestrator};

/// Static description of one resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDefinition {
    /// Singular name, used in events and error messages (e.g. "equipment")
    pub singular: String,
    /// Path segment the routes are nested under (e.g. "equipment")
    pub plural: String,
    /// Fields eligible for equality and `_like` filtering
    pub searchable: Vec<String>,
}

impl ResourceDefinition {
    pub fn new(singular: impl Into<String>, plural: impl Into<String>) -> Self {
        Self {
            singular: singular.into(),
            plural: plural.into(),
            searchable: vec!["id".to_string()],
        }
    }

    /// Replace the searchable field list
    pub fn with_searchable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable = fields.into_iter().map(Into::into).collect();
        self
    }
}
