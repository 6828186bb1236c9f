//! Cached, validated rule sets per account

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use uuid::Uuid;

use super::MutationError;
use crate::core::rule::{MutationRecord, MutationRule};
use crate::core::service::MutationStore;

/// The rules of one account, split by kind
///
/// A rule that is both external and functional appears in both lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub internal: Vec<MutationRule>,
    pub external: Vec<MutationRule>,
    pub functional: Vec<MutationRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<MutationRule>) -> Self {
        let mut set = Self::default();
        for rule in rules {
            if rule.is_functional() {
                set.functional.push(rule.clone());
            }
            if rule.is_external() {
                set.external.push(rule);
            } else {
                set.internal.push(rule);
            }
        }
        set
    }

    /// Validate stored rows; the first invalid row fails the whole set
    pub fn from_records(records: Vec<MutationRecord>) -> Result<Self, MutationError> {
        let rules = records
            .into_iter()
            .map(MutationRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty() && self.functional.is_empty()
    }

    /// Distinct services targeted by external rules
    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = Vec::new();
        for service in self.external.iter().filter_map(MutationRule::service) {
            if !services.iter().any(|s| s == service) {
                services.push(service.to_string());
            }
        }
        services
    }
}

/// Read-mostly cache of rule sets keyed by account
///
/// `None` is the key for requests without an account; they see only global
/// rules. Writes through [`setup_account`](Self::setup_account) invalidate
/// the affected entry; other writers call [`invalidate`](Self::invalidate).
pub struct MutationCatalog {
    store: Arc<dyn MutationStore>,
    cache: RwLock<HashMap<Option<Uuid>, Arc<RuleSet>>>,
    /// Bumped under the cache write lock by every invalidation
    generation: AtomicU64,
}

impl MutationCatalog {
    pub fn new(store: Arc<dyn MutationStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Rule set for an account: its own rules plus global ones
    ///
    /// An account rule shadows a global rule of the same name. A set loaded
    /// while an invalidation ran is returned but not cached.
    pub async fn rules(&self, account_id: Option<Uuid>) -> Result<Arc<RuleSet>, MutationError> {
        if let Some(cached) = self.cached(&account_id)? {
            return Ok(cached);
        }
        let generation = self.generation.load(Ordering::Acquire);

        let mut records = match account_id {
            Some(account) => self
                .store
                .rules_for(Some(&account))
                .await
                .map_err(|e| MutationError::Store(e.to_string()))?,
            None => Vec::new(),
        };
        let global = self
            .store
            .rules_for(None)
            .await
            .map_err(|e| MutationError::Store(e.to_string()))?;
        for record in global {
            if !records.iter().any(|r| r.name == record.name) {
                records.push(record);
            }
        }

        let set = Arc::new(RuleSet::from_records(records)?);
        tracing::debug!(
            account_id = ?account_id,
            internal = set.internal.len(),
            external = set.external.len(),
            functional = set.functional.len(),
            "loaded mutation rules"
        );

        let mut cache = self
            .cache
            .write()
            .map_err(|e| MutationError::Store(format!("Failed to acquire write lock: {}", e)))?;
        if self.generation.load(Ordering::Acquire) == generation {
            cache.insert(account_id, set.clone());
        } else {
            tracing::debug!(account_id = ?account_id, "rules changed while loading, not cached");
        }
        Ok(set)
    }

    fn cached(&self, account_id: &Option<Uuid>) -> Result<Option<Arc<RuleSet>>, MutationError> {
        let cache = self
            .cache
            .read()
            .map_err(|e| MutationError::Store(format!("Failed to acquire read lock: {}", e)))?;
        Ok(cache.get(account_id).cloned())
    }

    /// Drop the cached set of one account
    ///
    /// Global rules feed every account, so `None` clears everything.
    pub fn invalidate(&self, account_id: Option<Uuid>) {
        match account_id {
            None => self.invalidate_all(),
            Some(_) => {
                self.invalidating().remove(&account_id);
                tracing::debug!(account_id = ?account_id, "invalidated mutation rules");
            }
        }
    }

    pub fn invalidate_all(&self) {
        self.invalidating().clear();
        tracing::debug!("invalidated all mutation rules");
    }

    /// Write guard for an invalidation, with the generation already bumped
    ///
    /// A poisoned cache is recovered by clearing it.
    fn invalidating(&self) -> RwLockWriteGuard<'_, HashMap<Option<Uuid>, Arc<RuleSet>>> {
        let cache = self.cache.write().unwrap_or_else(|poisoned| {
            tracing::warn!("mutation rule cache lock poisoned, clearing it");
            let mut cache = poisoned.into_inner();
            cache.clear();
            cache
        });
        self.cache.clear_poison();
        self.generation.fetch_add(1, Ordering::AcqRel);
        cache
    }

    /// Copy every preset the account does not have yet (matched by name)
    ///
    /// Returns the rules created by this call.
    pub async fn setup_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<MutationRecord>, MutationError> {
        let store_err = |e: anyhow::Error| MutationError::Store(e.to_string());

        let existing = self.store.rules_for(Some(&account_id)).await.map_err(store_err)?;
        let presets = self.store.presets().await.map_err(store_err)?;

        let mut created = Vec::new();
        for preset in presets {
            if existing.iter().any(|r| r.name == preset.name) {
                continue;
            }
            let record = MutationRecord {
                id: Uuid::new_v4(),
                account_id: Some(account_id),
                ..preset
            };
            created.push(self.store.create(record).await.map_err(store_err)?);
        }

        self.invalidate(Some(account_id));
        tracing::info!(
            account_id = %account_id,
            added = created.len(),
            "mutation presets set up"
        );
        Ok(created)
    }
}
