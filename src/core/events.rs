//! Lifecycle events for resources and connections
//!
//! Handlers publish to an [`EventBus`] after a write succeeds. Delivery is
//! fire-and-forget: publishing never fails and never blocks the request, and
//! subscribers that fall behind get `Lagged` from `recv()`.
//!
//! ```rust,ignore
//! let bus = EventBus::new(1024);
//! let mut rx = bus.subscribe();
//!
//! bus.publish(ApiEvent::Resource(ResourceEvent::Created {
//!     resource: "equipment".to_string(),
//!     item_id: Uuid::new_v4(),
//!     account_id: None,
//! }));
//!
//! if let Ok(envelope) = rx.recv().await {
//!     tracing::info!(action = envelope.event.action(), "event received");
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Record lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResourceEvent {
    Created {
        resource: String,
        item_id: Uuid,
        account_id: Option<Uuid>,
    },
    Updated {
        resource: String,
        item_id: Uuid,
        account_id: Option<Uuid>,
    },
    /// Soft delete
    Deleted {
        resource: String,
        item_id: Uuid,
        account_id: Option<Uuid>,
    },
    Restored {
        resource: String,
        item_id: Uuid,
        account_id: Option<Uuid>,
    },
    Purged {
        resource: String,
        item_id: Uuid,
        account_id: Option<Uuid>,
    },
}

/// Connection state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConnectionEvent {
    Attached {
        resource: String,
        item_id: Uuid,
        service: String,
        service_id: String,
    },
    Detached {
        resource: String,
        item_id: Uuid,
        service: String,
        service_id: String,
    },
}

/// Top-level event wrapping resource and connection events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApiEvent {
    Resource(ResourceEvent),
    Connection(ConnectionEvent),
}

impl ApiEvent {
    pub fn event_kind(&self) -> &str {
        match self {
            ApiEvent::Resource(_) => "resource",
            ApiEvent::Connection(_) => "connection",
        }
    }

    /// Resource (plural) the event relates to
    pub fn resource(&self) -> &str {
        match self {
            ApiEvent::Resource(e) => match e {
                ResourceEvent::Created { resource, .. }
                | ResourceEvent::Updated { resource, .. }
                | ResourceEvent::Deleted { resource, .. }
                | ResourceEvent::Restored { resource, .. }
                | ResourceEvent::Purged { resource, .. } => resource,
            },
            ApiEvent::Connection(e) => match e {
                ConnectionEvent::Attached { resource, .. }
                | ConnectionEvent::Detached { resource, .. } => resource,
            },
        }
    }

    pub fn item_id(&self) -> Uuid {
        match self {
            ApiEvent::Resource(e) => match e {
                ResourceEvent::Created { item_id, .. }
                | ResourceEvent::Updated { item_id, .. }
                | ResourceEvent::Deleted { item_id, .. }
                | ResourceEvent::Restored { item_id, .. }
                | ResourceEvent::Purged { item_id, .. } => *item_id,
            },
            ApiEvent::Connection(e) => match e {
                ConnectionEvent::Attached { item_id, .. }
                | ConnectionEvent::Detached { item_id, .. } => *item_id,
            },
        }
    }

    pub fn action(&self) -> &str {
        match self {
            ApiEvent::Resource(e) => match e {
                ResourceEvent::Created { .. } => "created",
                ResourceEvent::Updated { .. } => "updated",
                ResourceEvent::Deleted { .. } => "deleted",
                ResourceEvent::Restored { .. } => "restored",
                ResourceEvent::Purged { .. } => "purged",
            },
            ApiEvent::Connection(e) => match e {
                ConnectionEvent::Attached { .. } => "attached",
                ConnectionEvent::Detached { .. } => "detached",
            },
        }
    }
}

/// An event plus delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: ApiEvent,
}

impl EventEnvelope {
    pub fn new(event: ApiEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus, cheap to clone
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per slow receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many receivers got it
    pub fn publish(&self, event: ApiEvent) -> usize {
        tracing::debug!(
            kind = event.event_kind(),
            action = event.action(),
            resource = event.resource(),
            item_id = %event.item_id(),
            "publishing event"
        );
        // send() only fails without receivers
        self.sender.send(EventEnvelope::new(event)).unwrap_or(0)
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
