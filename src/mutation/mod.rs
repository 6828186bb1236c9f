//! Per-account field mutations
//!
//! The [`MutationCatalog`] loads and caches validated rule sets, and the
//! [`MutationPipeline`] applies them to a batch of item views in three
//! stages: internal, external, then dependencies.

pub mod catalog;
pub mod dependency;
pub mod pipeline;

pub use catalog::{MutationCatalog, RuleSet};
pub use pipeline::MutationPipeline;

use axum::http::StatusCode;
use thiserror::Error;

use crate::core::rule::ActionMethod;

/// Errors raised while loading or applying mutation rules
#[derive(Debug, Error)]
pub enum MutationError {
    /// A stored rule failed validation when its rule set was loaded
    #[error("Invalid mutation rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    /// A satisfied dependency reached an action with no implementation
    #[error("Action '{method}' of mutation rule '{rule}' is not supported")]
    UnsupportedAction { rule: String, method: ActionMethod },

    /// The rule store could not be read or written
    #[error("Unable to load mutation rules: {0}")]
    Store(String),
}

impl MutationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MutationError::InvalidRule { .. } | MutationError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            MutationError::UnsupportedAction { .. } => StatusCode::PRECONDITION_FAILED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            MutationError::InvalidRule { .. } => "INVALID_MUTATION_RULE",
            MutationError::UnsupportedAction { .. } => "UNSUPPORTED_ACTION",
            MutationError::Store(_) => "MUTATION_STORE_ERROR",
        }
    }
}
