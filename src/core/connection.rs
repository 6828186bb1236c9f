//! Connections between local items and objects owned by other services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A timestamped link from a local item to a remote object
///
/// Rows are created on attach and only ever mutated to set `detached_at`.
/// They are never physically deleted, so the full attach history of a
/// `(item_id, service, service_id)` triple stays queryable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    /// Unique identifier for this row
    pub id: Uuid,

    /// The local item
    pub item_id: Uuid,

    /// Registered name of the service owning the remote object
    pub service: String,

    /// Id of the remote object inside that service (opaque)
    pub service_id: String,

    /// Who attached it, when known
    pub user_id: Option<String>,

    pub attached_at: DateTime<Utc>,
    pub detached_at: Option<DateTime<Utc>>,

    /// Insertion time, used to find the most recent row for a triple
    pub created_at: DateTime<Utc>,
}

impl Connection {
    /// Create a new attached row
    pub fn new(
        item_id: Uuid,
        service: impl Into<String>,
        service_id: impl Into<String>,
        user_id: Option<String>,
        attached_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            item_id,
            service: service.into(),
            service_id: service_id.into(),
            user_id,
            attached_at: attached_at.unwrap_or(now),
            detached_at: None,
            created_at: now,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.detached_at.is_none()
    }

    /// Mark this row detached
    pub fn detach(&mut self, at: Option<DateTime<Utc>>) {
        self.detached_at = Some(at.unwrap_or_else(Utc::now));
    }

    pub fn matches(&self, item_id: &Uuid, service: &str, service_id: &str) -> bool {
        &self.item_id == item_id && self.service == service && self.service_id == service_id
    }
}

/// State of a `(item_id, service, service_id)` triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No row has ever existed
    Unattached,
    /// The most recent row has no `detached_at`
    Attached,
    /// The most recent row is detached; a new attach creates a fresh row
    Detached,
}

impl ConnectionState {
    /// Derive the state from the most recent row of a triple
    pub fn of_latest(latest: Option<&Connection>) -> Self {
        match latest {
            None => ConnectionState::Unattached,
            Some(c) if c.is_attached() => ConnectionState::Attached,
            Some(_) => ConnectionState::Detached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_connection_is_attached() {
        let c = Connection::new(Uuid::new_v4(), "vendors", "42", None, None);
        assert!(c.is_attached());
        assert_eq!(ConnectionState::of_latest(Some(&c)), ConnectionState::Attached);
    }

    #[test]
    fn test_detach_sets_timestamp() {
        let mut c = Connection::new(Uuid::new_v4(), "vendors", "42", None, None);
        c.detach(None);
        assert!(c.detached_at.is_some());
        assert_eq!(ConnectionState::of_latest(Some(&c)), ConnectionState::Detached);
    }

    #[test]
    fn test_unattached_when_no_row() {
        assert_eq!(ConnectionState::of_latest(None), ConnectionState::Unattached);
    }
}
