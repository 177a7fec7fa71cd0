//! Query orchestration and AOI coverage filtering for a STAC search index.
//!
//! This crate turns raw request parameters into structured queries against
//! an external search index, reshapes the raw hits into a GeoJSON
//! `FeatureCollection`, and can post-filter results by how much of an
//! area-of-interest geometry each result covers.
//!
//! The index itself is behind the [IndexClient] trait; this crate only
//! builds queries, sequences their execution, and assembles responses.

pub mod coverage;
pub mod query;

mod client;
mod page;
mod request;
mod search;

pub use client::{BoxError, Hit, Hits, IndexClient, SearchBody};
pub use page::{Page, PageProperties};
pub use query::{Namespace, SearchQuery};
pub use request::{Event, SearchRequest};
pub use search::Search;

use thiserror::Error;

/// Crate-specific error enum.
#[derive(Debug, Error)]
pub enum Error {
    /// The `intersects` parameter was not valid GeoJSON.
    ///
    /// Surfaced before any index call is made.
    #[error("invalid input geometry")]
    InvalidGeometry(#[source] geojson::Error),

    /// Query-body construction failed.
    ///
    /// No index call is attempted for the namespace whose query failed to
    /// build.
    #[error("could not build query: {0}")]
    QueryBuild(String),

    /// The search backend returned an error.
    #[error("index query failed")]
    Index(#[source] BoxError),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The endpoint used to absolutize links when `API_URL` is not set.
pub const DEFAULT_API_URL: &str = "https://sat-api.developmentseed.org";

/// Returns the API base url from the `API_URL` environment variable.
///
/// Falls back to [DEFAULT_API_URL].
pub fn api_url() -> String {
    std::env::var("API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}
