//! Mutation rules: stored rows and their validated form
//!
//! Rules are stored as loosely typed rows ([`MutationRecord`]) so accounts can
//! configure them without code changes. Before a rule is evaluated it is
//! converted into a [`MutationRule`]; unknown conditions, dependency types and
//! action methods are rejected at that point, never during evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::mutation::MutationError;

/// A mutation rule as stored per account (or globally)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MutationRecord {
    pub id: Uuid,

    /// Owning account; `None` means the rule is global
    #[serde(default)]
    pub account_id: Option<Uuid>,

    /// Target field populated by the rule
    pub name: String,

    /// Present when the value comes from another service
    #[serde(default)]
    pub external: Option<ExternalSource>,

    /// Present and non-empty when the rule is functional
    #[serde(default)]
    pub dependencies: Option<Vec<DependencyRecord>>,
}

impl MutationRecord {
    pub fn internal(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: None,
            name: name.into(),
            external: None,
            dependencies: None,
        }
    }

    pub fn external(name: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            external: Some(ExternalSource {
                service: service.into(),
            }),
            ..Self::internal(name)
        }
    }

    pub fn with_account(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<DependencyRecord>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }
}

/// External-service marker of a stored rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalSource {
    pub service: String,
}

/// A dependency as stored inside a functional rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyRecord {
    pub condition: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub value: Value,

    #[serde(default)]
    pub actions: Vec<ActionRecord>,
}

/// An action as stored inside a dependency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRecord {
    pub method: String,
    pub key: String,
    #[serde(default)]
    pub params: Option<Value>,
}

// =============================================================================
// Validated form
// =============================================================================

/// Where a rule takes its value from
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSource {
    /// Projected from the item's `meta`
    Internal,
    /// Fetched from a sibling service through connections
    External { service: String },
}

/// A validated mutation rule
///
/// A rule is internal iff it has no external source, external iff it has
/// one, and functional iff it carries dependencies. External and functional
/// can overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRule {
    pub name: String,
    pub source: RuleSource,
    pub dependencies: Vec<Dependency>,
}

impl MutationRule {
    pub fn is_internal(&self) -> bool {
        matches!(self.source, RuleSource::Internal)
    }

    pub fn is_external(&self) -> bool {
        matches!(self.source, RuleSource::External { .. })
    }

    pub fn is_functional(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// Target service of an external rule
    pub fn service(&self) -> Option<&str> {
        match &self.source {
            RuleSource::External { service } => Some(service),
            RuleSource::Internal => None,
        }
    }
}

impl TryFrom<MutationRecord> for MutationRule {
    type Error = MutationError;

    fn try_from(record: MutationRecord) -> Result<Self, Self::Error> {
        let invalid = |reason: String| MutationError::InvalidRule {
            rule: record.name.clone(),
            reason,
        };

        if record.name.trim().is_empty() {
            return Err(invalid("rule name is empty".to_string()));
        }

        let source = match &record.external {
            None => RuleSource::Internal,
            Some(ext) if ext.service.trim().is_empty() => {
                return Err(invalid("external rule without service".to_string()));
            }
            Some(ext) => RuleSource::External {
                service: ext.service.clone(),
            },
        };

        let dependencies = record
            .dependencies
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|d| Dependency::try_from(d).map_err(&invalid))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: record.name,
            source,
            dependencies,
        })
    }
}

/// Comparison operator of a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Condition::Eq),
            "ne" => Ok(Condition::Ne),
            "gt" => Ok(Condition::Gt),
            "lt" => Ok(Condition::Lt),
            "gte" => Ok(Condition::Gte),
            "lte" => Ok(Condition::Lte),
            other => Err(format!("unknown condition '{}'", other)),
        }
    }
}

/// What a dependency compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyType {
    /// The item's own value for the rule's field
    Internal,
    /// Accepted by the schema, never satisfied
    External,
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(DependencyType::Internal),
            "external" => Ok(DependencyType::External),
            other => Err(format!("unknown dependency type '{}'", other)),
        }
    }
}

/// A validated dependency
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub condition: Condition,
    pub kind: DependencyType,
    pub value: Value,
    pub actions: Vec<Action>,
}

impl TryFrom<DependencyRecord> for Dependency {
    type Error = String;

    fn try_from(record: DependencyRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            condition: record.condition.parse()?,
            kind: record.kind.parse()?,
            value: record.value,
            actions: record
                .actions
                .into_iter()
                .map(Action::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

/// Every method the rule schema recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMethod {
    Get,
    Set,
    Show,
    Hide,
    Delete,
    SetNull,
    Rename,
}

impl FromStr for ActionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(ActionMethod::Get),
            "set" => Ok(ActionMethod::Set),
            "show" => Ok(ActionMethod::Show),
            "hide" => Ok(ActionMethod::Hide),
            "delete" => Ok(ActionMethod::Delete),
            "setNull" => Ok(ActionMethod::SetNull),
            "rename" => Ok(ActionMethod::Rename),
            other => Err(format!("unknown action method '{}'", other)),
        }
    }
}

impl fmt::Display for ActionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionMethod::Get => "get",
            ActionMethod::Set => "set",
            ActionMethod::Show => "show",
            ActionMethod::Hide => "hide",
            ActionMethod::Delete => "delete",
            ActionMethod::SetNull => "setNull",
            ActionMethod::Rename => "rename",
        };
        f.write_str(name)
    }
}

/// A validated action
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Delete `key`
    Hide { key: String },
    /// Move the value at `key` to `to`
    Rename { key: String, to: String },
    /// Copy the value at `from` into `key`
    Set { key: String, from: String },
    /// Recognized by the schema but not implemented
    Unsupported { method: ActionMethod, key: String },
}

impl TryFrom<ActionRecord> for Action {
    type Error = String;

    fn try_from(record: ActionRecord) -> Result<Self, Self::Error> {
        let method: ActionMethod = record.method.parse()?;
        let params = || match &record.params {
            Some(Value::String(p)) if !p.is_empty() => Ok(p.clone()),
            _ => Err(format!(
                "action '{}' on '{}' requires a string params",
                method, record.key
            )),
        };
        Ok(match method {
            ActionMethod::Hide => Action::Hide {
                key: record.key.clone(),
            },
            ActionMethod::Rename => Action::Rename {
                to: params()?,
                key: record.key.clone(),
            },
            ActionMethod::Set => Action::Set {
                from: params()?,
                key: record.key.clone(),
            },
            method => Action::Unsupported {
                method,
                key: record.key.clone(),
            },
        })
    }
}
