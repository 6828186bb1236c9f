//! Outbound calls to sibling services
//!
//! - [`ServiceRegistry`]: static name → base URL mapping
//! - [`RemoteServiceClient`]: `reqwest` client implementing
//!   [`ServiceCaller`](crate::core::service::ServiceCaller)
//! - [`fanout`]: bounded, deadline-aware, fail-fast concurrent calls

pub mod client;
pub mod fanout;
pub mod registry;

pub use client::RemoteServiceClient;
pub use fanout::{FanOut, FanOutError};
pub use registry::ServiceRegistry;

use axum::http::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// One CRUD-style call against a sibling service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    List,
    Get(String),
    Create,
    Update(String),
    Delete(String),
    Restore(String),
    Purge(String),
}

impl ServiceCall {
    pub fn method(&self) -> Method {
        match self {
            ServiceCall::List | ServiceCall::Get(_) => Method::GET,
            ServiceCall::Create | ServiceCall::Restore(_) => Method::POST,
            ServiceCall::Update(_) => Method::PUT,
            ServiceCall::Delete(_) | ServiceCall::Purge(_) => Method::DELETE,
        }
    }

    /// Path appended to the service's CRUD prefix
    pub fn path(&self) -> String {
        match self {
            ServiceCall::List | ServiceCall::Create => String::new(),
            ServiceCall::Get(id) | ServiceCall::Update(id) | ServiceCall::Delete(id) => {
                format!("/{}", id)
            }
            ServiceCall::Restore(id) => format!("/{}/restore", id),
            ServiceCall::Purge(id) => format!("/{}/purge", id),
        }
    }
}

/// Failure of a single outbound call
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Name missing from the registry
    #[error("Server {service} is not listed as available")]
    NotAvailable { service: String },

    /// Transport-level failure
    #[error("Cannot connect to url {url}")]
    Connect { url: String },

    /// Error status with a body; the body is relayed as-is
    #[error("{url} responded with status {status}")]
    Upstream { url: String, status: u16, body: Value },

    #[error("Call to {service} timed out")]
    Timeout { service: String },

    /// Anything else, carrying the raw message
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RemoteError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RemoteError::NotAvailable { .. } => "SERVICE_NOT_AVAILABLE",
            RemoteError::Connect { .. } => "SERVICE_UNREACHABLE",
            RemoteError::Upstream { .. } => "UPSTREAM_ERROR",
            RemoteError::Timeout { .. } => "SERVICE_TIMEOUT",
            RemoteError::Other(_) => "REMOTE_ERROR",
        }
    }
}

/// Extract the list payload of a decoded body
///
/// A top-level `data` key is unwrapped; a non-array payload counts as one
/// object, `null` as none.
pub fn list_payload(body: Value) -> Vec<Value> {
    let payload = match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    match payload {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
