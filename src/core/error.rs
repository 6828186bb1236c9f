//! Typed error handling for the resource API layer
//!
//! Every failure a handler can produce is an [`ApiError`]. Each category
//! carries its own enum so callers can match on specific cases, and every
//! variant knows its HTTP status and machine-readable code.
//!
//! # Error Categories
//!
//! - [`ResourceError`]: record lookup and lifecycle errors
//! - [`ConnectionError`]: attach/detach state machine and fan-out failures
//! - [`QueryError`]: filter and pagination errors (deliberately opaque)
//! - [`MutationError`]: invalid or unsupported mutation rules
//! - [`RemoteError`]: outbound calls to sibling services
//! - [`ValidationError`]: malformed request input
//! - [`StorageError`]: record store failures
//! - [`ConfigError`]: configuration parsing and validation
//!
//! Status taxonomy: not-found maps to 404, invalid input and business rule
//! violations map to 412, infrastructure failures map to 500. A sibling
//! service error that carried a body is relayed with the sibling's status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub use crate::mutation::MutationError;
pub use crate::remote::RemoteError;

/// Message used whenever a listing fails for a reason we do not expose.
pub const WRONG_FILTERS_MESSAGE: &str = "Wrong filters provided. Please check documentation";

/// The main error type for the resource API layer
#[derive(Debug)]
pub enum ApiError {
    /// Record lookup and lifecycle errors
    Resource(ResourceError),

    /// Connection state machine and fan-out errors
    Connection(ConnectionError),

    /// Filter / pagination errors
    Query(QueryError),

    /// Mutation rule errors
    Mutation(MutationError),

    /// Outbound call errors
    Remote(RemoteError),

    /// Request input errors
    Validation(ValidationError),

    /// Record store errors
    Storage(StorageError),

    /// Configuration errors
    Config(ConfigError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Resource(e) => write!(f, "{}", e),
            ApiError::Connection(e) => write!(f, "{}", e),
            ApiError::Query(e) => write!(f, "{}", e),
            ApiError::Mutation(e) => write!(f, "{}", e),
            ApiError::Remote(e) => write!(f, "{}", e),
            ApiError::Validation(e) => write!(f, "{}", e),
            ApiError::Storage(e) => write!(f, "{}", e),
            ApiError::Config(e) => write!(f, "{}", e),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Resource(e) => Some(e),
            ApiError::Connection(e) => Some(e),
            ApiError::Query(e) => Some(e),
            ApiError::Mutation(e) => Some(e),
            ApiError::Remote(e) => Some(e),
            ApiError::Validation(e) => Some(e),
            ApiError::Storage(e) => Some(e),
            ApiError::Config(e) => Some(e),
            ApiError::Internal(_) => None,
        }
    }
}

/// Failure envelope returned to API callers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Human-readable error message
    pub message: String,
    /// Error code for programmatic handling
    pub code: &'static str,
    /// Elapsed request time in seconds
    pub time: f64,
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        if let Some((status, _)) = self.relayed() {
            return status;
        }
        match self {
            ApiError::Resource(e) => e.status_code(),
            ApiError::Connection(e) => e.status_code(),
            ApiError::Query(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::Mutation(e) => e.status_code(),
            ApiError::Remote(e) => e.status_code(),
            ApiError::Validation(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Resource(e) => e.error_code(),
            ApiError::Connection(e) => e.error_code(),
            ApiError::Query(_) => "WRONG_FILTERS",
            ApiError::Mutation(e) => e.error_code(),
            ApiError::Remote(e) => e.error_code(),
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Config(_) => "CONFIG_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Sibling error to pass through untouched, if any
    ///
    /// Only upstream responses that carried a body qualify; the sibling's own
    /// envelope is trusted and returned as-is.
    pub fn relayed(&self) -> Option<(StatusCode, &Value)> {
        let remote = match self {
            ApiError::Remote(e) => e,
            ApiError::Connection(ConnectionError::ServiceFailed { source, .. }) => source,
            _ => return None,
        };
        match remote {
            RemoteError::Upstream { status, body, .. } => {
                let status = StatusCode::from_u16(*status).ok()?;
                Some((status, body))
            }
            _ => None,
        }
    }

    /// Build the failure envelope
    pub fn to_response(&self, time: f64) -> ErrorResponse {
        ErrorResponse {
            success: false,
            message: self.to_string(),
            code: self.error_code(),
            time,
        }
    }

    /// Render this error as an HTTP response stamped with the request time
    pub fn into_response_with_time(self, time: f64) -> Response {
        if let Some((status, body)) = self.relayed() {
            return (status, Json(body.clone())).into_response();
        }
        let status = self.status_code();
        (status, Json(self.to_response(time))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with_time(0.0)
    }
}

// =============================================================================
// Resource Errors
// =============================================================================

/// Errors related to resource records
#[derive(Debug)]
pub enum ResourceError {
    /// Record was not found (also used for unparseable ids)
    NotFound { resource: String, id: String },

    /// Purge refused because the record still has attached connections
    PurgeBlocked { resource: String, id: Uuid, attached: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound { .. } => write!(f, "Not found"),
            ResourceError::PurgeBlocked { .. } => write!(
                f,
                "Unable to purge item. Please Detach all connections first"
            ),
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResourceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResourceError::PurgeBlocked { .. } => StatusCode::PRECONDITION_FAILED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::NotFound { .. } => "NOT_FOUND",
            ResourceError::PurgeBlocked { .. } => "PURGE_BLOCKED",
        }
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        ApiError::Resource(err)
    }
}

// =============================================================================
// Connection Errors
// =============================================================================

/// Errors related to connections and the remote objects behind them
#[derive(Debug)]
pub enum ConnectionError {
    /// An attached row already exists for the triple
    AlreadyAttached {
        item_id: Uuid,
        service: String,
        service_id: String,
    },

    /// No row has ever existed for the triple
    NotAttached {
        item_id: Uuid,
        service: String,
        service_id: String,
    },

    /// The most recent row for the triple is already detached
    AlreadyDetached {
        item_id: Uuid,
        service: String,
        service_id: String,
    },

    /// A sibling service failed while hydrating connected objects
    ServiceFailed { service: String, source: RemoteError },
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::AlreadyAttached { .. } => write!(f, "Item is already attached"),
            ConnectionError::NotAttached { .. } => write!(f, "Item is not attached"),
            ConnectionError::AlreadyDetached { .. } => write!(f, "Item is already detached"),
            ConnectionError::ServiceFailed { service, source } => write!(
                f,
                "Something went wrong with connection to {}: {}",
                service, source
            ),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::ServiceFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ConnectionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ConnectionError::AlreadyAttached { .. }
            | ConnectionError::NotAttached { .. }
            | ConnectionError::AlreadyDetached { .. } => StatusCode::PRECONDITION_FAILED,
            ConnectionError::ServiceFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectionError::AlreadyAttached { .. } => "ALREADY_ATTACHED",
            ConnectionError::NotAttached { .. } => "NOT_ATTACHED",
            ConnectionError::AlreadyDetached { .. } => "ALREADY_DETACHED",
            ConnectionError::ServiceFailed { .. } => "CONNECTION_SERVICE_FAILED",
        }
    }
}

impl From<ConnectionError> for ApiError {
    fn from(err: ConnectionError) -> Self {
        ApiError::Connection(err)
    }
}

impl From<crate::remote::FanOutError> for ApiError {
    fn from(err: crate::remote::FanOutError) -> Self {
        ApiError::Connection(ConnectionError::ServiceFailed {
            service: err.service,
            source: err.source,
        })
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors raised while building or running a listing
///
/// The cause is kept for server-side logs only; callers always see
/// [`WRONG_FILTERS_MESSAGE`].
#[derive(Debug)]
pub enum QueryError {
    WrongFilters { cause: String },
}

impl QueryError {
    pub fn wrong_filters(cause: impl Into<String>) -> Self {
        QueryError::WrongFilters {
            cause: cause.into(),
        }
    }

    pub fn cause(&self) -> &str {
        match self {
            QueryError::WrongFilters { cause } => cause,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", WRONG_FILTERS_MESSAGE)
    }
}

impl std::error::Error for QueryError {}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Query(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to request input
#[derive(Debug)]
pub enum ValidationError {
    /// Single field validation error
    FieldError { field: String, message: String },

    /// Multiple field validation errors
    FieldErrors(Vec<FieldValidationError>),

    /// Invalid JSON body
    InvalidJson { message: String },

    /// Missing required argument
    MissingArgument { argument: String },

    /// Header present but unusable
    InvalidHeader { header: String, value: String },
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::FieldError { field, message } => {
                write!(f, "Validation error for field '{}': {}", field, message)
            }
            ValidationError::FieldErrors(errors) => {
                let msgs: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                write!(f, "Validation errors: {}", msgs.join(", "))
            }
            ValidationError::InvalidJson { message } => write!(f, "Invalid JSON: {}", message),
            ValidationError::MissingArgument { argument } => {
                write!(f, "Please provide an {} field", argument)
            }
            ValidationError::InvalidHeader { header, value } => {
                write!(f, "Invalid value '{}' for header {}", value, header)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldValidationError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::Validation(ValidationError::FieldErrors(fields))
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to record, connection and rule stores
#[derive(Debug)]
pub enum StorageError {
    /// Operation failed inside the store
    OperationFailed { operation: String, message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::OperationFailed { operation, .. } => {
                write!(f, "Something went wrong while trying to {}", operation)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    pub fn failed(operation: impl Into<String>, err: anyhow::Error) -> Self {
        StorageError::OperationFailed {
            operation: operation.into(),
            message: err.to_string(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to parse configuration
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Invalid value in configuration
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// IO error while reading configuration
    IoError { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError { file, message } => {
                if let Some(file) = file {
                    write!(f, "Failed to parse config file '{}': {}", file, message)
                } else {
                    write!(f, "Failed to parse config: {}", message)
                }
            }
            ConfigError::InvalidValue {
                field,
                value,
                message,
            } => write!(
                f,
                "Invalid value '{}' for field '{}': {}",
                value, field, message
            ),
            ConfigError::IoError { message } => write!(f, "IO error: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::Config(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

impl From<MutationError> for ApiError {
    fn from(err: MutationError) -> Self {
        ApiError::Mutation(err)
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        ApiError::Remote(err)
    }
}

/// A specialized Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
