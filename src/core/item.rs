//! Resource items and their transient response views

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Keys owned by the record itself; never stored inside `fields`
pub const RESERVED_KEYS: &[&str] = &["id", "meta", "created_at", "updated_at", "deleted_at"];

/// A stored resource record
///
/// Top-level columns live in `fields`, everything that is not modeled as a
/// column lives in `meta`. Soft deletion is tracked by `deleted_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceItem {
    pub id: Uuid,

    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,

    #[serde(default)]
    pub meta: Map<String, Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ResourceItem {
    /// Create a new record, dropping any reserved key from `fields`
    pub fn new(fields: IndexMap<String, Value>, meta: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            fields: strip_reserved(fields),
            meta,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Build a record from a JSON object body
    ///
    /// A `meta` object becomes the record's meta; other keys become fields.
    pub fn from_body(body: Map<String, Value>) -> Self {
        let mut fields = IndexMap::new();
        let mut meta = Map::new();
        for (key, value) in body {
            match (key.as_str(), value) {
                ("meta", Value::Object(m)) => meta = m,
                (_, value) => {
                    fields.insert(key, value);
                }
            }
        }
        Self::new(fields, meta)
    }

    /// Apply an update body
    ///
    /// Keys already present in `meta` update the meta entry, a `meta` object
    /// replaces meta wholesale, everything else lands on top-level fields.
    pub fn apply_update(&mut self, body: Map<String, Value>) {
        for (key, value) in body {
            if key == "meta" {
                if let Value::Object(m) = value {
                    self.meta = m;
                }
                continue;
            }
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if self.meta.contains_key(&key) {
                self.meta.insert(key, value);
            } else {
                self.fields.insert(key, value);
            }
        }
        self.touch();
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn soft_delete(&mut self) {
        self.deleted_at = Some(Utc::now());
        self.touch();
    }

    pub fn restore(&mut self) {
        self.deleted_at = None;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// String form of a column used for equality and substring filters
    pub fn filter_value(&self, field: &str) -> Option<String> {
        if field == "id" {
            return Some(self.id.to_string());
        }
        match self.fields.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Build the mutable view handed to the mutation pipeline
    pub fn to_view(&self) -> ItemView {
        let mut attributes = IndexMap::with_capacity(self.fields.len() + RESERVED_KEYS.len());
        attributes.insert("id".to_string(), json!(self.id));
        for (key, value) in &self.fields {
            attributes.insert(key.clone(), value.clone());
        }
        attributes.insert("meta".to_string(), Value::Object(self.meta.clone()));
        attributes.insert("created_at".to_string(), json!(self.created_at));
        attributes.insert("updated_at".to_string(), json!(self.updated_at));
        attributes.insert("deleted_at".to_string(), json!(self.deleted_at));
        ItemView {
            id: self.id,
            attributes,
        }
    }
}

fn strip_reserved(mut fields: IndexMap<String, Value>) -> IndexMap<String, Value> {
    fields.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));
    fields
}

/// Transient, mutable copy of a record for one request
///
/// The pipeline adds, overwrites and deletes keys here. Nothing written to a
/// view is persisted; it is only serialized into the response. The record id
/// is kept aside so connection lookups keep working even if a dependency
/// hides the `id` key.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    id: Uuid,
    attributes: IndexMap<String, Value>,
}

impl ItemView {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Value at `key`, `null` when absent
    pub fn get_or_null(&self, key: &str) -> Value {
        self.attributes.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.shift_remove(key)
    }

    /// Entry of the `meta` sub-mapping
    pub fn meta_value(&self, key: &str) -> Option<&Value> {
        self.attributes.get("meta")?.as_object()?.get(key)
    }

    /// Keep only the listed top-level keys
    pub fn retain_columns(&mut self, columns: &[String]) {
        self.attributes
            .retain(|key, _| columns.iter().any(|c| c == key));
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.attributes.into_iter().collect())
    }
}

impl Serialize for ItemView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}
