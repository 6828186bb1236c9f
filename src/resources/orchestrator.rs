//! Listing and search orchestration
//!
//! Turns request parameters into a [`RecordQuery`], picks a pagination plan,
//! materializes the page and runs it through the mutation pipeline.

use serde_json::Value;
use std::fmt::Display;
use uuid::Uuid;

use crate::core::context::RequestContext;
use crate::core::error::{ApiError, ApiResult, QueryError};
use crate::core::item::{ItemView, ResourceItem};
use crate::core::query::{
    Filter, PageWindow, PaginationMeta, PaginationPlan, RecordQuery, RequestParams, TrashedScope,
    split_list,
};
use crate::core::service::RecordStore;
use crate::mutation::MutationPipeline;

/// Outcome of a listing request
#[derive(Debug, Clone)]
pub enum Listing {
    /// `just_count` was requested
    Count(usize),
    Items {
        items: Vec<ItemView>,
        pagination: Option<PaginationMeta>,
    },
}

#[derive(Debug, Clone)]
pub struct QueryOrchestrator {
    searchable: Vec<String>,
    max_results: usize,
}

impl QueryOrchestrator {
    pub fn new(searchable: Vec<String>, max_results: usize) -> Self {
        Self {
            searchable,
            max_results: max_results.max(1),
        }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// A request is a search when it names a searchable field, its `_like`
    /// variant, or carries a `meta` filter
    pub fn is_search(&self, params: &RequestParams) -> bool {
        self.searchable
            .iter()
            .any(|field| params.contains(field) || params.contains(&format!("{}_like", field)))
            || params.get("meta").is_some_and(|m| !m.trim().is_empty())
    }

    /// Build the candidate query for a request
    pub fn build_query(&self, params: &RequestParams) -> Result<RecordQuery, QueryError> {
        let mut query = RecordQuery::new().scope(TrashedScope::from_params(params));

        if self.is_search(params) {
            for field in &self.searchable {
                if field == "id" {
                    if let Some(raw) = params.get("id") {
                        query = query.filter(Filter::In {
                            field: "id".to_string(),
                            values: parse_ids(raw)?
                                .into_iter()
                                .map(|id| id.to_string())
                                .collect(),
                        });
                    }
                    continue;
                }
                if let Some(value) = params.get(field) {
                    query = query.filter(Filter::Eq {
                        field: field.clone(),
                        value: value.to_string(),
                    });
                }
                if let Some(pattern) = params.get(&format!("{}_like", field)) {
                    query = query.filter(Filter::Like {
                        field: field.clone(),
                        pattern: pattern.to_string(),
                    });
                }
            }

            if let Some(raw) = params.get("meta").filter(|m| !m.trim().is_empty()) {
                match serde_json::from_str::<Value>(raw) {
                    Ok(Value::Object(expected)) => query = query.filter(Filter::Meta(expected)),
                    Ok(_) => return Err(QueryError::wrong_filters("meta must be a JSON object")),
                    Err(e) => return Err(QueryError::wrong_filters(format!("meta: {}", e))),
                }
            }
        }

        if let Some(raw) = params.get("exclude") {
            query = query.exclude(parse_ids(raw)?);
        }

        Ok(query.limit(params.number("limit")?))
    }

    /// Run a listing request end to end
    ///
    /// Filter and store failures come back as the generic wrong-filters error;
    /// pipeline failures keep their own classification.
    pub async fn list(
        &self,
        store: &dyn RecordStore,
        pipeline: &MutationPipeline,
        context: &RequestContext,
    ) -> ApiResult<Listing> {
        let params = &context.params;
        let query = self.build_query(params).map_err(reject)?;

        if params.flag("just_count") {
            let count_query = RecordQuery {
                exclude: Vec::new(),
                limit: None,
                ..query
            };
            let total = store.count(&count_query).await.map_err(hide_cause)?;
            return Ok(Listing::Count(total));
        }

        let total = store.count(&query).await.map_err(hide_cause)?;
        let requested = params.number("paginate").map_err(reject)?;
        let page = params
            .number("page")
            .map_err(reject)?
            .unwrap_or(1)
            .max(1);

        let plan = PaginationPlan::select(requested, total, self.max_results, query.limit.is_some());
        let (window, pagination) = match plan {
            PaginationPlan::All => (None, None),
            PaginationPlan::Paginate { per_page, forced } => {
                if forced {
                    tracing::debug!(total, per_page, "forcing pagination");
                }
                (
                    Some(PageWindow::page(page, per_page)),
                    Some(PaginationMeta::new(page, per_page, total)),
                )
            }
        };

        let records = store.fetch(&query, window).await.map_err(hide_cause)?;
        let mut items: Vec<ItemView> = records.iter().map(ResourceItem::to_view).collect();
        pipeline.apply(context, &mut items).await?;

        Ok(Listing::Items { items, pagination })
    }
}

fn parse_ids(raw: &str) -> Result<Vec<Uuid>, QueryError> {
    split_list(raw)
        .iter()
        .map(|id| {
            Uuid::parse_str(id).map_err(|_| QueryError::wrong_filters(format!("invalid id: {}", id)))
        })
        .collect()
}

/// Log the real cause and report the generic filter error
fn hide_cause(err: impl Display) -> ApiError {
    reject(QueryError::wrong_filters(err.to_string()))
}

fn reject(err: QueryError) -> ApiError {
    tracing::warn!(cause = err.cause(), "listing failed, reporting wrong filters");
    err.into()
}
