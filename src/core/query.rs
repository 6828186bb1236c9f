//! Request parameters, record filters and pagination

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::error::QueryError;
use crate::core::item::ResourceItem;

/// Raw query-string parameters of one request
///
/// Keeps the caller's order. Parsing into typed values happens on access so
/// malformed values can be reported as filter errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(IndexMap<String, String>);

impl RequestParams {
    pub fn new(params: IndexMap<String, String>) -> Self {
        Self(params)
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// A flag is set when present with any value other than `false` or `0`
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| !matches!(v.trim(), "false" | "0"))
    }

    /// Comma separated list, empty entries dropped
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(split_list)
    }

    /// Non-negative integer parameter
    pub fn number(&self, key: &str) -> Result<Option<usize>, QueryError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                QueryError::wrong_filters(format!("parameter '{}' is not a number: {}", key, raw))
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Split a comma separated list, trimming entries
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Which soft-deleted records a query sees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrashedScope {
    #[default]
    Without,
    With,
    Only,
}

impl TrashedScope {
    pub fn from_params(params: &RequestParams) -> Self {
        if params.flag("only_trashed") {
            TrashedScope::Only
        } else if params.flag("with_trashed") {
            TrashedScope::With
        } else {
            TrashedScope::Without
        }
    }

    pub fn admits(&self, item: &ResourceItem) -> bool {
        match self {
            TrashedScope::Without => !item.is_trashed(),
            TrashedScope::With => true,
            TrashedScope::Only => item.is_trashed(),
        }
    }
}

/// A single record predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact match on the string form of a column
    Eq { field: String, value: String },
    /// Case-insensitive substring match
    Like { field: String, pattern: String },
    /// Membership in a list of values
    In { field: String, values: Vec<String> },
    /// Every entry must equal the record's meta entry
    Meta(Map<String, Value>),
}

impl Filter {
    pub fn matches(&self, item: &ResourceItem) -> bool {
        match self {
            Filter::Eq { field, value } => item.filter_value(field).as_deref() == Some(value),
            Filter::Like { field, pattern } => item
                .filter_value(field)
                .is_some_and(|v| v.to_lowercase().contains(&pattern.to_lowercase())),
            Filter::In { field, values } => item
                .filter_value(field)
                .is_some_and(|v| values.iter().any(|candidate| candidate == &v)),
            Filter::Meta(expected) => expected
                .iter()
                .all(|(key, value)| item.meta.get(key) == Some(value)),
        }
    }
}

/// Everything a record store needs to select candidates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub filters: Vec<Filter>,
    pub scope: TrashedScope,
    pub exclude: Vec<Uuid>,
    /// Cap on the candidate set, applied before pagination
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn scope(mut self, scope: TrashedScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn exclude(mut self, ids: Vec<Uuid>) -> Self {
        self.exclude = ids;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Predicate part of the query (scope, filters and exclusions)
    pub fn matches(&self, item: &ResourceItem) -> bool {
        self.scope.admits(item)
            && !self.exclude.contains(&item.id)
            && self.filters.iter().all(|f| f.matches(item))
    }
}

/// Slice of the candidate set to materialize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub size: usize,
}

impl PageWindow {
    pub fn page(page: usize, per_page: usize) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(per_page),
            size: per_page,
        }
    }
}

/// How a listing is paginated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationPlan {
    /// Return every candidate
    All,
    /// Paginate; `forced` when the caller did not ask for it
    Paginate { per_page: usize, forced: bool },
}

impl PaginationPlan {
    /// Pick a plan from the requested page size and the candidate count
    ///
    /// A `limit` without a page size always returns the truncated set whole.
    pub fn select(
        requested: Option<usize>,
        total: usize,
        max_results: usize,
        limited: bool,
    ) -> Self {
        match requested {
            Some(per_page) if per_page > 0 => PaginationPlan::Paginate {
                per_page,
                forced: false,
            },
            _ if limited || total <= max_results => PaginationPlan::All,
            _ => PaginationPlan::Paginate {
                per_page: max_results,
                forced: true,
            },
        }
    }
}

/// Pagination metadata merged at the top level of a listing envelope
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaginationMeta {
    pub current_page: usize,
    pub per_page: usize,
    pub total: usize,
    pub last_page: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(page: usize, per_page: usize, total: usize) -> Self {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let last_page = total.div_ceil(per_page).max(1);
        Self {
            current_page: page,
            per_page,
            total,
            last_page,
            has_next: page.saturating_mul(per_page) < total,
            has_prev: page > 1,
        }
    }
}
