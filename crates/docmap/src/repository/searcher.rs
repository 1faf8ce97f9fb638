//! Paged search over a filter type.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::core::codec;
use crate::core::fields::Document;
use crate::core::single;
use crate::core::transport::SearchTransport;
use crate::error::StorageResult;

/// Which page of results to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum number of items.
    pub limit: u64,
    /// Number of matching items to skip.
    pub offset: u64,
}

impl PageRequest {
    /// Creates a page request.
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage<T> {
    /// The records on this page.
    pub items: Vec<T>,
    /// Total number of matches across all pages.
    pub total: u64,
}

/// A paged search over filter `F` returning records `T`.
#[async_trait]
pub trait SearchFunction<F, T>: Send + Sync {
    /// Runs the search.
    async fn search(&self, filter: &F, page: PageRequest) -> StorageResult<SearchPage<T>>;
}

/// Forwards searches to a [`SearchFunction`].
pub struct Searcher<F, T> {
    search: Arc<dyn SearchFunction<F, T>>,
}

impl<F, T> Clone for Searcher<F, T> {
    fn clone(&self) -> Self {
        Self {
            search: self.search.clone(),
        }
    }
}

impl<F, T> Debug for Searcher<F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher").finish_non_exhaustive()
    }
}

impl<F, T> Searcher<F, T> {
    /// Creates a searcher.
    pub fn new(search: Arc<dyn SearchFunction<F, T>>) -> Self {
        Self { search }
    }

    /// Returns one page of matches for `filter`.
    pub async fn search(&self, filter: &F, page: PageRequest) -> StorageResult<SearchPage<T>> {
        self.search.search(filter, page).await
    }
}

type QueryBuilder<F> = Box<dyn Fn(&F) -> Value + Send + Sync>;
type SortExtractor<F> = Box<dyn Fn(&F) -> Option<String> + Send + Sync>;

/// A search that builds its query and sort from the filter.
///
/// The request body is `{"query": ..., "from": offset, "size": limit}` plus
/// `sort` when the extractor yields one.
pub struct QuerySearch<F, T> {
    client: Arc<dyn SearchTransport>,
    index: String,
    build_query: QueryBuilder<F>,
    get_sort: SortExtractor<F>,
    _record: PhantomData<fn() -> T>,
}

impl<F, T> QuerySearch<F, T> {
    /// Creates a query search over `index`.
    pub fn new<Q, S>(
        client: Arc<dyn SearchTransport>,
        index: impl Into<String>,
        build_query: Q,
        get_sort: S,
    ) -> Self
    where
        Q: Fn(&F) -> Value + Send + Sync + 'static,
        S: Fn(&F) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            client,
            index: index.into(),
            build_query: Box::new(build_query),
            get_sort: Box::new(get_sort),
            _record: PhantomData,
        }
    }

    /// Builds the search request body for a filter and page.
    pub fn request_body(&self, filter: &F, page: PageRequest) -> Value {
        let mut body = Map::new();
        let query = (self.build_query)(filter);
        let query = match query {
            Value::Object(ref map) if map.is_empty() => json!({ "match_all": {} }),
            other => other,
        };
        body.insert("query".to_string(), query);
        body.insert("from".to_string(), json!(page.offset));
        body.insert("size".to_string(), json!(page.limit));
        if let Some(sort) = (self.get_sort)(filter) {
            let clauses = sort_clauses(&sort);
            if !clauses.is_empty() {
                body.insert("sort".to_string(), Value::Array(clauses));
            }
        }
        Value::Object(body)
    }
}

#[async_trait]
impl<F, T> SearchFunction<F, T> for QuerySearch<F, T>
where
    F: Send + Sync,
    T: Document + Send,
{
    async fn search(&self, filter: &F, page: PageRequest) -> StorageResult<SearchPage<T>> {
        let body = self.request_body(filter, page);
        let response = single::search(self.client.as_ref(), &[self.index.as_str()], &body).await?;
        let items = response
            .hits
            .hits
            .iter()
            .map(|hit| codec::decode(&hit.to_hit_value()))
            .collect::<StorageResult<Vec<T>>>()?;
        Ok(SearchPage {
            items,
            total: response.hits.total_value(),
        })
    }
}

/// Turns `"a,-b"` into `[{"a": "asc"}, {"b": "desc"}]`.
///
/// A leading `+` is also ascending. Blank entries are dropped.
pub fn sort_clauses(sort: &str) -> Vec<Value> {
    sort.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .filter_map(|field| {
            let (name, order) = match field.strip_prefix('-') {
                Some(name) => (name, "desc"),
                None => (field.strip_prefix('+').unwrap_or(field), "asc"),
            };
            let name = name.trim();
            (!name.is_empty()).then(|| json!({ name: order }))
        })
        .collect()
}
