//! Core module containing fundamental types and traits of the API layer

pub mod connection;
pub mod context;
pub mod error;
pub mod events;
pub mod item;
pub mod query;
pub mod rule;
pub mod service;

pub use connection::{Connection, ConnectionState};
pub use context::{PipelineFlags, RequestContext};
pub use error::{ApiError, ApiResult};
pub use events::{ApiEvent, EventBus, EventEnvelope};
pub use item::{ItemView, ResourceItem};
pub use query::{Filter, PaginationMeta, PaginationPlan, RecordQuery, RequestParams, TrashedScope};
pub use rule::{MutationRecord, MutationRule};
pub use service::{ConnectionService, MutationStore, RecordStore, ServiceCaller};
