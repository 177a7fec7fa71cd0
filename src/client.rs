use crate::SearchQuery;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::future::Future;

/// A boxed error returned by [IndexClient] implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A search index client.
///
/// This is the seam between query orchestration and the index backend.
/// Implementations execute one query descriptor and return the raw response
/// body; any retry policy belongs to the implementation, not to this crate.
pub trait IndexClient {
    /// Executes a search query against the index.
    ///
    /// Called once per namespace per request.
    fn search(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = std::result::Result<SearchBody, BoxError>> + Send;
}

/// The raw body returned by the index for one query.
#[derive(Debug, Deserialize)]
pub struct SearchBody {
    /// The hits envelope.
    pub hits: Hits,
}

/// The hits for one query.
#[derive(Debug, Deserialize)]
pub struct Hits {
    /// Total number of documents matching the query, not the number
    /// returned on this page.
    pub total: u64,

    /// The documents on this page, in index order.
    pub hits: Vec<Hit>,
}

/// A single index hit.
#[derive(Debug, Deserialize)]
pub struct Hit {
    /// The stored document.
    #[serde(rename = "_source")]
    pub source: Map<String, Value>,
}
