//! In-memory stores for testing and development

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::core::connection::Connection;
use crate::core::item::ResourceItem;
use crate::core::query::{PageWindow, RecordQuery};
use crate::core::rule::MutationRecord;
use crate::core::service::{ConnectionService, MutationStore, RecordStore};

/// In-memory record store
///
/// Records are kept in insertion order. Uses RwLock for thread-safe access.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    items: Arc<RwLock<Vec<ResourceItem>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, query: &RecordQuery) -> Result<Vec<ResourceItem>> {
        let items = self
            .items
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let matched = items.iter().filter(|item| query.matches(item)).cloned();
        Ok(match query.limit {
            Some(limit) => matched.take(limit).collect(),
            None => matched.collect(),
        })
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn count(&self, query: &RecordQuery) -> Result<usize> {
        Ok(self.matching(query)?.len())
    }

    async fn fetch(
        &self,
        query: &RecordQuery,
        window: Option<PageWindow>,
    ) -> Result<Vec<ResourceItem>> {
        let matched = self.matching(query)?;
        Ok(match window {
            Some(w) => matched.into_iter().skip(w.offset).take(w.size).collect(),
            None => matched,
        })
    }

    async fn get(&self, id: &Uuid) -> Result<Option<ResourceItem>> {
        let items = self
            .items
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(items.iter().find(|item| &item.id == id).cloned())
    }

    async fn create(&self, item: ResourceItem) -> Result<ResourceItem> {
        let mut items = self
            .items
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if items.iter().any(|existing| existing.id == item.id) {
            return Err(anyhow!("Record {} already exists", item.id));
        }
        items.push(item.clone());

        Ok(item)
    }

    async fn save(&self, item: ResourceItem) -> Result<ResourceItem> {
        let mut items = self
            .items
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let slot = items
            .iter_mut()
            .find(|existing| existing.id == item.id)
            .ok_or_else(|| anyhow!("Record not found"))?;
        *slot = item.clone();

        Ok(item)
    }

    async fn purge(&self, id: &Uuid) -> Result<()> {
        let mut items = self
            .items
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        items.retain(|item| &item.id != id);

        Ok(())
    }
}

/// Most recent row of a triple; later rows win ties on `created_at`
fn latest_row<'a>(
    connections: &'a [Connection],
    item_id: &Uuid,
    service: &str,
    service_id: &str,
) -> Option<&'a Connection> {
    connections
        .iter()
        .filter(|c| c.matches(item_id, service, service_id))
        .fold(None::<&Connection>, |latest, c| match latest {
            Some(l) if l.created_at > c.created_at => Some(l),
            _ => Some(c),
        })
}

/// In-memory connection table
#[derive(Clone, Default)]
pub struct InMemoryConnectionService {
    connections: Arc<RwLock<Vec<Connection>>>,
}

impl InMemoryConnectionService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionService for InMemoryConnectionService {
    async fn create(&self, connection: Connection) -> Result<Connection> {
        let mut connections = self
            .connections
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        connections.push(connection.clone());

        Ok(connection)
    }

    async fn create_unless_attached(&self, connection: Connection) -> Result<Option<Connection>> {
        let mut connections = self
            .connections
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let attached = latest_row(
            &connections,
            &connection.item_id,
            &connection.service,
            &connection.service_id,
        )
        .is_some_and(Connection::is_attached);
        if attached {
            return Ok(None);
        }

        connections.push(connection.clone());

        Ok(Some(connection))
    }

    async fn update(&self, connection: Connection) -> Result<Connection> {
        let mut connections = self
            .connections
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let slot = connections
            .iter_mut()
            .find(|c| c.id == connection.id)
            .ok_or_else(|| anyhow!("Connection not found"))?;
        *slot = connection.clone();

        Ok(connection)
    }

    async fn latest_for(
        &self,
        item_id: &Uuid,
        service: &str,
        service_id: &str,
    ) -> Result<Option<Connection>> {
        let connections = self
            .connections
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(latest_row(&connections, item_id, service, service_id).cloned())
    }

    async fn find_by_item(
        &self,
        item_id: &Uuid,
        service: Option<&str>,
        include_detached: bool,
    ) -> Result<Vec<Connection>> {
        let connections = self
            .connections
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(connections
            .iter()
            .filter(|c| {
                &c.item_id == item_id
                    && service.is_none_or(|s| c.service == s)
                    && (include_detached || c.is_attached())
            })
            .cloned()
            .collect())
    }

    async fn find_for_items(
        &self,
        item_ids: &[Uuid],
        services: &[String],
        include_detached: bool,
    ) -> Result<Vec<Connection>> {
        let connections = self
            .connections
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(connections
            .iter()
            .filter(|c| {
                item_ids.contains(&c.item_id)
                    && services.contains(&c.service)
                    && (include_detached || c.is_attached())
            })
            .cloned()
            .collect())
    }

    async fn count_attached(&self, item_id: &Uuid) -> Result<usize> {
        let connections = self
            .connections
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(connections
            .iter()
            .filter(|c| &c.item_id == item_id && c.is_attached())
            .count())
    }
}

/// In-memory rule and preset store
#[derive(Clone, Default)]
pub struct InMemoryMutationStore {
    rules: Arc<RwLock<Vec<MutationRecord>>>,
    presets: Arc<RwLock<Vec<MutationRecord>>>,
}

impl InMemoryMutationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a preset copied into accounts on setup
    pub fn add_preset(&self, preset: MutationRecord) -> Result<()> {
        self.presets
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .push(preset);
        Ok(())
    }
}

#[async_trait]
impl MutationStore for InMemoryMutationStore {
    async fn rules_for(&self, account_id: Option<&Uuid>) -> Result<Vec<MutationRecord>> {
        let rules = self
            .rules
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(rules
            .iter()
            .filter(|r| r.account_id.as_ref() == account_id)
            .cloned()
            .collect())
    }

    async fn presets(&self) -> Result<Vec<MutationRecord>> {
        let presets = self
            .presets
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(presets.clone())
    }

    async fn create(&self, record: MutationRecord) -> Result<MutationRecord> {
        let mut rules = self
            .rules
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        rules.push(record.clone());

        Ok(record)
    }
}
