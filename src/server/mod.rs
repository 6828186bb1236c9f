//! Server module for building HTTP servers with auto-registered routes
//!
//! This module provides a `ServerBuilder` that registers:
//! - every endpoint for each declared resource
//! - health routes
//! - custom routes

pub mod builder;
pub mod exposure;
pub mod host;
pub mod resource_registry;

pub use builder::ServerBuilder;
pub use exposure::RestExposure;
pub use host::ApiHost;
pub use resource_registry::{ResourceDescriptor, ResourceRegistry};
