//! The three-stage mutation pipeline
//!
//! ```text
//! internal  → project meta entries onto top-level fields
//! external  → replace fields with objects fetched from sibling services
//! dependencies → hide / rename / copy fields based on computed values
//! ```
//!
//! The stages always run in this order over the same batch of views, so
//! internal mutation never sees external values and dependencies see both.

use indexmap::IndexMap;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::catalog::{MutationCatalog, RuleSet};
use super::dependency;
use crate::core::connection::Connection;
use crate::core::context::RequestContext;
use crate::core::error::{ApiResult, StorageError};
use crate::core::item::ItemView;
use crate::core::service::{ConnectionService, ServiceCaller};
use crate::remote::FanOut;

pub struct MutationPipeline {
    catalog: Arc<MutationCatalog>,
    connections: Arc<dyn ConnectionService>,
    caller: Arc<dyn ServiceCaller>,
    fanout: FanOut,
}

impl MutationPipeline {
    pub fn new(
        catalog: Arc<MutationCatalog>,
        connections: Arc<dyn ConnectionService>,
        caller: Arc<dyn ServiceCaller>,
        fanout: FanOut,
    ) -> Self {
        Self {
            catalog,
            connections,
            caller,
            fanout,
        }
    }

    pub fn catalog(&self) -> &Arc<MutationCatalog> {
        &self.catalog
    }

    /// Run every stage over a batch of views
    pub async fn apply(&self, context: &RequestContext, items: &mut [ItemView]) -> ApiResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let rules = self.catalog.rules(context.account_id).await?;
        if rules.is_empty() {
            return Ok(());
        }

        apply_internal(&rules, items);
        self.apply_external(&rules, context, items).await?;
        apply_dependencies(&rules, items)?;
        Ok(())
    }

    /// Resolve external rules through connections and one call per service
    ///
    /// A no-op unless the request sets `with_connections`.
    pub async fn apply_external(
        &self,
        rules: &RuleSet,
        context: &RequestContext,
        items: &mut [ItemView],
    ) -> ApiResult<()> {
        if !context.flags.with_connections || rules.external.is_empty() {
            return Ok(());
        }

        // Placeholder until the lookup resolves
        for item in items.iter_mut() {
            for rule in &rules.external {
                if let Some(service) = rule.service() {
                    item.insert(rule.name.clone(), Value::String(service.to_string()));
                }
            }
        }

        let excluded = context.flags.exclude_mutation.as_deref();
        let services: Vec<String> = rules
            .services()
            .into_iter()
            .filter(|s| Some(s.as_str()) != excluded)
            .collect();

        let ids: Vec<Uuid> = items.iter().map(ItemView::id).collect();
        let connections = if services.is_empty() {
            Vec::new()
        } else {
            self.connections
                .find_for_items(&ids, &services, context.flags.with_detached)
                .await
                .map_err(|e| StorageError::failed("load connections", e))?
        };

        let wanted = group_service_ids(&connections);
        let token = context.token.clone();
        let fetched = self
            .fanout
            .run(wanted.keys().cloned().collect(), |service| {
                let params = json!({
                    "id": wanted.get(&service).map(|ids| ids.join(",")).unwrap_or_default(),
                    "exclude_mutation": service.clone(),
                });
                let caller = self.caller.clone();
                let token = token.clone();
                async move { caller.index_from(&service, params, token.as_deref()).await }
            })
            .await?;

        for item in items.iter_mut() {
            for rule in &rules.external {
                let Some(service) = rule.service() else {
                    continue;
                };
                let value = matching_objects(item.id(), service, &connections, &fetched);
                item.insert(rule.name.clone(), value);
            }
        }
        Ok(())
    }
}

/// Project meta entries onto top-level fields, defaulting to null
pub fn apply_internal(rules: &RuleSet, items: &mut [ItemView]) {
    for item in items.iter_mut() {
        for rule in &rules.internal {
            let value = item.meta_value(&rule.name).cloned().unwrap_or(Value::Null);
            item.insert(rule.name.clone(), value);
        }
    }
}

/// Run every functional rule over every view
pub fn apply_dependencies(rules: &RuleSet, items: &mut [ItemView]) -> ApiResult<()> {
    for item in items.iter_mut() {
        for rule in &rules.functional {
            dependency::resolve(rule, item)?;
        }
    }
    Ok(())
}

/// Distinct remote ids per service, in first-seen order
fn group_service_ids(connections: &[Connection]) -> IndexMap<String, Vec<String>> {
    let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
    for connection in connections {
        let ids = grouped.entry(connection.service.clone()).or_default();
        if !ids.contains(&connection.service_id) {
            ids.push(connection.service_id.clone());
        }
    }
    grouped
}

/// Objects of `service` connected to `item_id`, or null when there are none
fn matching_objects(
    item_id: Uuid,
    service: &str,
    connections: &[Connection],
    fetched: &HashMap<String, Vec<Value>>,
) -> Value {
    let Some(objects) = fetched.get(service) else {
        return Value::Null;
    };
    let service_ids: Vec<&str> = connections
        .iter()
        .filter(|c| c.item_id == item_id && c.service == service)
        .map(|c| c.service_id.as_str())
        .collect();

    let matched: Vec<Value> = objects
        .iter()
        .filter(|object| object_id(object).is_some_and(|id| service_ids.contains(&id.as_str())))
        .cloned()
        .collect();

    if matched.is_empty() {
        Value::Null
    } else {
        Value::Array(matched)
    }
}

fn object_id(object: &Value) -> Option<String> {
    match object.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
