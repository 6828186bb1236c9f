//! Configuration loading and management

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::core::error::ConfigError;

/// A sibling service reachable through the remote client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceEntry {
    /// Registered name (e.g., "vendors")
    pub name: String,

    /// Scheme and host, no trailing slash (e.g., "http://microservices.vendors")
    pub base_url: String,

    /// Path of the service's CRUD resource (e.g., "/vendors")
    pub crud_prefix: String,
}

impl ServiceEntry {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        crud_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            crud_prefix: crud_prefix.into(),
        }
    }
}

/// Limits applied to outbound calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteLimits {
    /// Timeout of a single outbound call
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Shared deadline of one fan-out
    #[serde(default = "default_fanout_deadline_ms")]
    pub fanout_deadline_ms: u64,

    /// Calls in flight at once during a fan-out
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_call_timeout_ms() -> u64 {
    5000
}

fn default_fanout_deadline_ms() -> u64 {
    10000
}

fn default_max_concurrency() -> usize {
    8
}

impl RemoteLimits {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn fanout_deadline(&self) -> Duration {
        Duration::from_millis(self.fanout_deadline_ms)
    }
}

impl Default for RemoteLimits {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            fanout_deadline_ms: default_fanout_deadline_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Complete configuration of the API layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Page size forced on unpaginated listings above this count
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Service registry
    #[serde(default)]
    pub services: Vec<ServiceEntry>,

    #[serde(default)]
    pub remote: RemoteLimits,

    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

fn default_max_results() -> usize {
    200
}

fn default_event_bus_capacity() -> usize {
    1024
}

impl ApiConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("{}: {}", path, e),
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            file: Some(path.to_string()),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError {
            file: None,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_results".to_string(),
                value: "0".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.remote.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "remote.max_concurrency".to_string(),
                value: "0".to_string(),
                message: "must be positive".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for entry in &self.services {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "services.name".to_string(),
                    value: entry.name.clone(),
                    message: "duplicate service name".to_string(),
                });
            }
            if entry.base_url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("services.{}.base_url", entry.name),
                    value: String::new(),
                    message: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceEntry> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            services: vec![
                ServiceEntry::new("equipment", "http://microservices.equipment", "/equipment"),
                ServiceEntry::new("vendors", "http://microservices.vendors", "/vendors"),
            ],
            remote: RemoteLimits::default(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}
