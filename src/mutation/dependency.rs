//! Dependency conditions and actions

use serde_json::Value;
use std::cmp::Ordering;

use super::MutationError;
use crate::core::item::ItemView;
use crate::core::rule::{Action, Condition, Dependency, DependencyType, MutationRule};

/// Evaluate `expected <condition> actual`
///
/// Numbers and numeric strings compare numerically, other strings
/// lexically. Equality falls back to JSON equality; ordering of any other
/// pair of values is never satisfied.
pub fn condition_holds(condition: Condition, expected: &Value, actual: &Value) -> bool {
    let ordering = compare(expected, actual);
    match condition {
        Condition::Eq => equals(ordering, expected, actual),
        Condition::Ne => !equals(ordering, expected, actual),
        Condition::Gt => ordering == Some(Ordering::Greater),
        Condition::Lt => ordering == Some(Ordering::Less),
        Condition::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        Condition::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
    }
}

fn equals(ordering: Option<Ordering>, expected: &Value, actual: &Value) -> bool {
    match ordering {
        Some(o) => o == Ordering::Equal,
        None => expected == actual,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether a dependency fires for the current value of its rule's field
pub fn is_satisfied(rule: &MutationRule, dependency: &Dependency, view: &ItemView) -> bool {
    match dependency.kind {
        DependencyType::Internal => condition_holds(
            dependency.condition,
            &dependency.value,
            &view.get_or_null(&rule.name),
        ),
        DependencyType::External => {
            tracing::debug!(
                rule = %rule.name,
                "external dependency skipped, never satisfied"
            );
            false
        }
    }
}

/// Apply one action to a view
pub fn apply_action(
    rule: &MutationRule,
    action: &Action,
    view: &mut ItemView,
) -> Result<(), MutationError> {
    match action {
        Action::Hide { key } => {
            view.remove(key);
        }
        Action::Rename { key, to } => {
            let value = view.remove(key).unwrap_or(Value::Null);
            view.insert(to.clone(), value);
        }
        Action::Set { key, from } => {
            let value = view.get_or_null(from);
            view.insert(key.clone(), value);
        }
        Action::Unsupported { method, .. } => {
            return Err(MutationError::UnsupportedAction {
                rule: rule.name.clone(),
                method: *method,
            });
        }
    }
    Ok(())
}

/// Run every dependency of a functional rule against one view
///
/// Dependencies and their actions run in declaration order and observe the
/// effects of earlier ones.
pub fn resolve(rule: &MutationRule, view: &mut ItemView) -> Result<(), MutationError> {
    for dependency in &rule.dependencies {
        if !is_satisfied(rule, dependency, view) {
            continue;
        }
        for action in &dependency.actions {
            apply_action(rule, action, view)?;
        }
    }
    Ok(())
}
