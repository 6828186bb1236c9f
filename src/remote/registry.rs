//! Static registry of sibling services

use std::collections::HashMap;

use super::{RemoteError, ServiceCall};
use crate::config::{ApiConfig, ServiceEntry};

/// Immutable, process-wide mapping from service name to its location
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    entries: HashMap<String, ServiceEntry>,
}

impl ServiceRegistry {
    pub fn new(entries: impl IntoIterator<Item = ServiceEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.services.iter().cloned())
    }

    pub fn resolve(&self, service: &str) -> Result<&ServiceEntry, RemoteError> {
        self.entries
            .get(service)
            .ok_or_else(|| RemoteError::NotAvailable {
                service: service.to_string(),
            })
    }

    /// `base_url + crud_prefix [/id [/restore|/purge]]`
    pub fn url_for(&self, service: &str, call: &ServiceCall) -> Result<String, RemoteError> {
        let entry = self.resolve(service)?;
        Ok(format!(
            "{}{}{}",
            entry.base_url.trim_end_matches('/'),
            entry.crud_prefix,
            call.path()
        ))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
