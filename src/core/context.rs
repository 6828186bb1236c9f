//! Explicit per-request context
//!
//! Tenant, credentials and pipeline flags travel in a [`RequestContext`]
//! value that every stage receives as an argument. Nothing about the current
//! request is stored in shared state.

use axum::extract::{FromRequestParts, Query};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use std::time::Instant;
use uuid::Uuid;

use crate::core::error::{ApiError, QueryError, ValidationError};
use crate::core::query::RequestParams;

pub const ACCOUNT_HEADER: &str = "x-account-id";
pub const USER_HEADER: &str = "x-user-id";

/// Flags steering the mutation pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineFlags {
    /// Opt in to external mutation
    pub with_connections: bool,
    /// Include detached connections when resolving external fields
    pub with_detached: bool,
    /// Service whose external rules must not be resolved again
    pub exclude_mutation: Option<String>,
}

impl PipelineFlags {
    pub fn from_params(params: &RequestParams) -> Self {
        Self {
            with_connections: params.flag("with_connections"),
            with_detached: params.flag("with_detached"),
            exclude_mutation: params
                .get("exclude_mutation")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// Everything a handler knows about the caller
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub account_id: Option<Uuid>,
    /// Bearer credential forwarded to sibling services
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub flags: PipelineFlags,
    pub params: RequestParams,
    pub started_at: Instant,
}

impl RequestContext {
    /// Context for calls made outside an HTTP request
    pub fn new(account_id: Option<Uuid>) -> Self {
        Self {
            account_id,
            token: None,
            user_id: None,
            flags: PipelineFlags::default(),
            params: RequestParams::default(),
            started_at: Instant::now(),
        }
    }

    pub fn with_params(mut self, params: RequestParams) -> Self {
        self.flags = PipelineFlags::from_params(&params);
        self.params = params;
        self
    }

    /// Seconds since the request started
    pub fn elapsed(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Build a context from headers and query parameters
    pub fn from_parts(headers: &HeaderMap, params: RequestParams) -> Result<Self, ApiError> {
        let account_id = match header_str(headers, ACCOUNT_HEADER) {
            None => None,
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
                ValidationError::InvalidHeader {
                    header: ACCOUNT_HEADER.to_string(),
                    value: raw.to_string(),
                }
            })?),
        };

        let token = header_str(headers, "authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let mut context = Self::new(account_id).with_params(params);
        context.token = token;
        context.user_id = header_str(headers, USER_HEADER).map(str::to_string);
        Ok(context)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<RequestParams>::try_from_uri(&parts.uri)
            .map_err(|e| QueryError::wrong_filters(e.to_string()))?;
        Self::from_parts(&parts.headers, params)
    }
}
