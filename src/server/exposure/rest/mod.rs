//! REST API exposure
//!
//! Consumes an [`ApiHost`] and produces an axum `Router` with health routes,
//! every registered resource and any custom routes.

use anyhow::Result;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::super::host::ApiHost;

pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    pub fn build_router(host: Arc<ApiHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let mut app = Self::health_routes().merge(host.resources.build_routes());

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        tracing::debug!(resources = ?host.resource_types(), "REST router built");
        Ok(app.layer(TraceLayer::new_for_http()))
    }

    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "resource-mesh"
        }))
    }
}
