//! Repository composition.
//!
//! [`Loader`] binds a transport, an index and a record type and forwards to
//! the single-record operations. [`Searcher`] forwards paged searches to a
//! caller-supplied [`SearchFunction`]; [`QuerySearch`] is the stock one,
//! built from a query builder and a sort extractor. The factories pair a
//! searcher with a loader over the same index.

mod loader;
mod searcher;

use std::sync::Arc;

pub use loader::Loader;
pub use searcher::{PageRequest, QuerySearch, SearchFunction, SearchPage, Searcher, sort_clauses};

use crate::core::fields::Document;
use crate::core::transport::SearchTransport;

/// Pairs a searcher over a caller-supplied search function with a loader.
pub fn search_loader<F, T>(
    client: Arc<dyn SearchTransport>,
    index: impl Into<String>,
    search: Arc<dyn SearchFunction<F, T>>,
) -> (Searcher<F, T>, Loader<T>)
where
    F: Send + Sync + 'static,
    T: Document + Send + 'static,
{
    (Searcher::new(search), Loader::new(client, index))
}

/// Pairs a query-building searcher with a loader over the same index.
pub fn search_loader_with_query<F, T, Q, S>(
    client: Arc<dyn SearchTransport>,
    index: impl Into<String>,
    build_query: Q,
    get_sort: S,
) -> (Searcher<F, T>, Loader<T>)
where
    F: Send + Sync + 'static,
    T: Document + Send + 'static,
    Q: Fn(&F) -> serde_json::Value + Send + Sync + 'static,
    S: Fn(&F) -> Option<String> + Send + Sync + 'static,
{
    let index = index.into();
    let search = QuerySearch::new(client.clone(), index.clone(), build_query, get_sort);
    (Searcher::new(Arc::new(search)), Loader::new(client, index))
}
