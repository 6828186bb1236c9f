//! Concurrent calls to several services within one request
//!
//! Calls run on a bounded window (`buffer_unordered`), each under its own
//! timeout, and the whole set under a shared deadline. The first failure
//! ends the fan-out: the stream is dropped, which cancels every call still
//! in flight, and no partial result is returned.

use futures::{StreamExt, TryStreamExt, stream};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use super::RemoteError;
use crate::config::RemoteLimits;

/// The call that ended a fan-out
#[derive(Debug, Clone, Error)]
#[error("{service}: {source}")]
pub struct FanOutError {
    pub service: String,
    pub source: RemoteError,
}

/// Fan-out limits
#[derive(Debug, Clone)]
pub struct FanOut {
    max_concurrency: usize,
    call_timeout: Duration,
    deadline: Duration,
}

impl FanOut {
    pub fn new(max_concurrency: usize, call_timeout: Duration, deadline: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            call_timeout,
            deadline,
        }
    }

    pub fn from_limits(limits: &RemoteLimits) -> Self {
        Self::new(
            limits.max_concurrency,
            limits.call_timeout(),
            limits.fanout_deadline(),
        )
    }

    /// Run `call` once per service and collect the results by service
    pub async fn run<T, F, Fut>(
        &self,
        services: Vec<String>,
        call: F,
    ) -> Result<HashMap<String, T>, FanOutError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        if services.is_empty() {
            return Ok(HashMap::new());
        }
        let names = services.join(",");
        let call_timeout = self.call_timeout;

        let calls = stream::iter(services.into_iter().map(|service| {
            let pending = call(service.clone());
            async move {
                match tokio::time::timeout(call_timeout, pending).await {
                    Ok(Ok(value)) => Ok((service, value)),
                    Ok(Err(source)) => Err(FanOutError { service, source }),
                    Err(_) => Err(FanOutError {
                        source: RemoteError::Timeout {
                            service: service.clone(),
                        },
                        service,
                    }),
                }
            }
        }))
        .buffer_unordered(self.max_concurrency)
        .try_collect::<HashMap<String, T>>();

        let result = match tokio::time::timeout(self.deadline, calls).await {
            Ok(result) => result,
            Err(_) => Err(FanOutError {
                service: names.clone(),
                source: RemoteError::Timeout {
                    service: names.clone(),
                },
            }),
        };

        if let Err(e) = &result {
            tracing::warn!(service = %e.service, error = %e.source, "fan-out aborted");
        }
        result
    }
}

impl Default for FanOut {
    fn default() -> Self {
        Self::from_limits(&RemoteLimits::default())
    }
}
