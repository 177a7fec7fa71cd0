use crate::{
    coverage, Error, Event, IndexClient, Namespace, Page, Result, SearchBody, SearchQuery,
    SearchRequest,
};
use tracing::{debug, error};

/// One search over the catalog index.
///
/// Owns a request's lifecycle: parameter normalization at construction,
/// query construction and execution per namespace, response assembly, and
/// AOI coverage filtering. Stages run strictly in sequence and any failure
/// surfaces as a single terminal error; partial responses are never
/// returned.
#[derive(Debug)]
pub struct Search<'a, C: IndexClient> {
    request: SearchRequest,
    client: &'a C,
    api_url: String,
}

impl<'a, C: IndexClient> Search<'a, C> {
    /// Creates a new search from an incoming event.
    ///
    /// Fails with [Error::InvalidGeometry] when the `intersects` parameter
    /// does not parse, before any index call is made.
    pub fn new(event: Event, client: &'a C) -> Result<Search<'a, C>> {
        Ok(Search {
            request: SearchRequest::new(event)?,
            client,
            api_url: crate::api_url(),
        })
    }

    /// Overrides the API base url used to absolutize links.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Search<'a, C> {
        self.api_url = api_url.into();
        self
    }

    /// Returns the normalized request.
    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Searches a single namespace.
    pub async fn search(&self, namespace: Namespace) -> Result<Page> {
        let body = self.execute(namespace).await?;
        Ok(self.assemble(namespace, body))
    }

    /// Searches for items, probing the collections namespace first.
    ///
    /// The probe result is observed and discarded, never merged into the
    /// response; the items query is issued only after the probe resolves.
    /// A probe failure aborts the whole search.
    pub async fn search_items(&self) -> Result<Page> {
        let probe = self.execute(Namespace::Collections).await?;
        debug!(found = probe.hits.total, "collections probe");
        let body = self.execute(Namespace::Items).await?;
        Ok(self.assemble(Namespace::Items, body))
    }

    async fn execute(&self, namespace: Namespace) -> Result<SearchBody> {
        let query = SearchQuery::new(namespace, &self.request)?;
        debug!(query = ?query, "executing query");
        self.client.search(&query).await.map_err(|error| {
            error!(%namespace, %error, "index query failed");
            Error::Index(error)
        })
    }

    fn assemble(&self, namespace: Namespace, body: SearchBody) -> Page {
        let mut page = Page::new(
            namespace,
            body,
            self.request.size,
            self.request.page,
            &self.api_url,
        );
        page.features = coverage::filter(
            std::mem::take(&mut page.features),
            self.request.intersects(),
            self.request.coverage,
        );
        page
    }
}

#[cfg(test)]
mod tests {
    use super::Search;
    use crate::{BoxError, Error, Event, Hit, Hits, IndexClient, Namespace, SearchBody, SearchQuery};
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct MockClient {
        calls: Mutex<Vec<(Namespace, u64)>>,
        sources: Vec<Map<String, Value>>,
        fail: Option<Namespace>,
    }

    impl MockClient {
        fn with_sources(sources: Vec<Value>) -> MockClient {
            MockClient {
                sources: sources
                    .into_iter()
                    .map(|source| source.as_object().unwrap().clone())
                    .collect(),
                ..Default::default()
            }
        }

        fn namespaces(&self) -> Vec<Namespace> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(namespace, _)| *namespace)
                .collect()
        }
    }

    impl IndexClient for MockClient {
        async fn search(
            &self,
            query: &SearchQuery,
        ) -> std::result::Result<SearchBody, BoxError> {
            self.calls
                .lock()
                .unwrap()
                .push((query.namespace, query.from));
            if self.fail == Some(query.namespace) {
                return Err("the index is down".into());
            }
            Ok(SearchBody {
                hits: Hits {
                    total: self.sources.len() as u64,
                    hits: self
                        .sources
                        .iter()
                        .cloned()
                        .map(|source| Hit { source })
                        .collect(),
                },
            })
        }
    }

    fn event(query: Value) -> Event {
        Event {
            query: Some(query.as_object().unwrap().clone()),
            body: None,
        }
    }

    fn square(min: f64, max: f64) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [min, min],
                [max, min],
                [max, max],
                [min, max],
                [min, min],
            ]]
        })
    }

    #[test]
    fn combined_search_probes_collections_first() {
        let client = MockClient::default();
        let search = Search::new(event(json!({})), &client).unwrap();
        let _ = tokio_test::block_on(search.search_items()).unwrap();
        assert_eq!(
            client.namespaces(),
            vec![Namespace::Collections, Namespace::Items]
        );
    }

    #[tokio::test]
    async fn direct_search_skips_probe() {
        let client = MockClient::default();
        let search = Search::new(event(json!({})), &client).unwrap();
        let _ = search.search(Namespace::Items).await.unwrap();
        assert_eq!(client.namespaces(), vec![Namespace::Items]);
    }

    #[test]
    fn invalid_geometry_means_no_index_calls() {
        let client = MockClient::default();
        let result = Search::new(event(json!({"intersects": "{broken"})), &client);
        assert!(matches!(result.unwrap_err(), Error::InvalidGeometry(_)));
        assert!(client.namespaces().is_empty());
    }

    #[tokio::test]
    async fn probe_failure_short_circuits() {
        let client = MockClient {
            fail: Some(Namespace::Collections),
            ..Default::default()
        };
        let search = Search::new(event(json!({})), &client).unwrap();
        assert!(matches!(
            search.search_items().await.unwrap_err(),
            Error::Index(_)
        ));
        assert_eq!(client.namespaces(), vec![Namespace::Collections]);
    }

    #[tokio::test]
    async fn items_failure_surfaces() {
        let client = MockClient {
            fail: Some(Namespace::Items),
            ..Default::default()
        };
        let search = Search::new(event(json!({})), &client).unwrap();
        assert!(matches!(
            search.search_items().await.unwrap_err(),
            Error::Index(_)
        ));
        assert_eq!(
            client.namespaces(),
            vec![Namespace::Collections, Namespace::Items]
        );
    }

    #[tokio::test]
    async fn pagination_offset_and_reported_page() {
        let client = MockClient::default();
        let search = Search::new(
            event(json!({"limit": "10", "page": "3", "skip": "5"})),
            &client,
        )
        .unwrap();
        let page = search.search(Namespace::Items).await.unwrap();
        assert_eq!(page.properties.limit, 10);
        assert_eq!(page.properties.page, 5);
        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[0], (Namespace::Items, 20));
    }

    #[tokio::test]
    async fn coverage_filter_applies_after_assembly() {
        let client = MockClient::with_sources(vec![
            json!({"id": "inside", "geometry": square(0., 2.)}),
            json!({"id": "outside", "geometry": square(10., 12.)}),
        ]);
        let aoi = square(0., 2.).to_string();
        let search = Search::new(
            event(json!({"coverage": "99", "intersects": aoi, "limit": 10})),
            &client,
        )
        .unwrap()
        .with_api_url("https://x");
        let page = search.search_items().await.unwrap();
        assert_eq!(page.properties.found, 2);
        assert_eq!(page.features.len(), 1);
        assert_eq!(page.features[0]["properties"]["id"], "inside");
        assert_eq!(
            page.features[0]["links"][0]["href"],
            "https://x/search/stac?id=inside"
        );
    }

    #[tokio::test]
    async fn no_coverage_is_identity() {
        let client = MockClient::with_sources(vec![
            json!({"id": "a", "geometry": square(10., 12.)}),
            json!({"id": "b"}),
        ]);
        let search = Search::new(event(json!({"limit": 10})), &client).unwrap();
        let page = search.search_items().await.unwrap();
        assert_eq!(page.features.len(), 2);
        assert_eq!(page.features[0]["properties"]["id"], "a");
        assert_eq!(page.features[1]["properties"]["id"], "b");
    }
}
