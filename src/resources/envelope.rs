//! Success envelope shared by every resource endpoint

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::core::query::PaginationMeta;

/// `{success: true, data, message, time}` with pagination keys merged at the
/// top level when the listing is paginated
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
    pub time: f64,
    #[serde(flatten)]
    pub pagination: Option<PaginationMeta>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T, time: f64) -> Self {
        Self {
            success: true,
            data,
            message: "OK".to_string(),
            time,
            pagination: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_pagination(mut self, pagination: Option<PaginationMeta>) -> Self {
        self.pagination = pagination;
        self
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
