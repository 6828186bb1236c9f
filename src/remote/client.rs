//! HTTP client for registered sibling services

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

use super::{RemoteError, ServiceCall, ServiceRegistry};
use crate::core::service::ServiceCaller;

/// `reqwest`-backed [`ServiceCaller`]
///
/// One client (and connection pool) is shared by every call. `GET` calls
/// send their params as the query string, all others as a JSON body.
#[derive(Clone)]
pub struct RemoteServiceClient {
    client: Client,
    registry: ServiceRegistry,
}

impl RemoteServiceClient {
    /// Build the shared client; every call is bounded by `call_timeout`
    pub fn new(registry: ServiceRegistry, call_timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| RemoteError::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, registry })
    }

    fn classify_send_error(service: &str, url: &str, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout {
                service: service.to_string(),
            }
        } else if err.is_connect() {
            RemoteError::Connect {
                url: url.to_string(),
            }
        } else {
            RemoteError::Other(err.to_string())
        }
    }

    async fn decode(url: &str, response: Response) -> Result<Value, RemoteError> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Other(e.to_string()))?;

        if status.is_success() {
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes)
                .map_err(|e| RemoteError::Other(format!("Invalid JSON from {}: {}", url, e)));
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) if !body.is_null() => Err(RemoteError::Upstream {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            }),
            _ => Err(RemoteError::Other(format!(
                "{} responded with status {}",
                url, status
            ))),
        }
    }
}

/// Flatten a JSON object into query pairs
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    match params {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl ServiceCaller for RemoteServiceClient {
    async fn call_service(
        &self,
        service: &str,
        call: ServiceCall,
        params: Value,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        let url = self.registry.url_for(service, &call)?;
        let method = call.method();
        tracing::debug!(service = %service, method = %method, url = %url, "calling service");

        let mut request = self.client.request(method.clone(), &url);
        if method == reqwest::Method::GET {
            request = request.query(&query_pairs(&params));
        } else if !params.is_null() {
            request = request.json(&params);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::classify_send_error(service, &url, e))?;
        Self::decode(&url, response).await
    }
}
