//! Connections between local items and objects in sibling services

pub mod manager;

pub use manager::{AttachRequest, ConnectionManager, ConnectionQuery, ConnectionsView, DetachRequest};
