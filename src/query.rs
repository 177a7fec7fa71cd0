//! Query and aggregation bodies for the search index.
//!
//! The builders here are deliberately permissive: unknown filter keys
//! become match clauses and never error, since arbitrary key-value filters
//! flow through from the caller.

use crate::{Error, Result, SearchRequest};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Parameters that drive pagination rather than filtering.
const PAGINATION_PARAMS: [&str; 3] = ["page", "limit", "skip"];

/// A logical partition of the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// STAC collections.
    Collections,

    /// STAC items.
    Items,
}

impl Namespace {
    /// Returns the name of this namespace in the index.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Collections => "collections",
            Namespace::Items => "items",
        }
    }

    /// Returns the path prefix used when synthesizing self links.
    pub(crate) fn self_link_prefix(&self) -> &'static str {
        match self {
            Namespace::Collections => "/collections",
            Namespace::Items => "/search/stac",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query descriptor, executed by an [IndexClient](crate::IndexClient).
#[derive(Debug, Serialize)]
pub struct SearchQuery {
    /// The namespace to query.
    pub namespace: Namespace,

    /// The query body.
    pub body: Value,

    /// Page size.
    pub size: u64,

    /// Zero-based offset of the first hit.
    pub from: u64,

    /// Optional source-field projection.
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<Vec<String>>,
}

impl SearchQuery {
    /// Builds the query descriptor for one namespace of a request.
    pub fn new(namespace: Namespace, request: &SearchRequest) -> Result<SearchQuery> {
        Ok(SearchQuery {
            namespace,
            body: build_query(&request.params)?,
            size: request.size,
            from: request.from,
            source: request.fields.clone(),
        })
    }
}

/// Builds an index query body from pass-through filter parameters.
///
/// `intersects` becomes a `geo_shape` filter on the document geometry,
/// `*_from`/`*_to` pairs become range clauses on the stripped field name,
/// and every other key becomes a match clause. Pagination parameters are
/// skipped. With no filters at all the body is a `match_all`.
pub fn build_query(params: &Map<String, Value>) -> Result<Value> {
    let mut musts = Vec::new();
    let mut filters = Vec::new();
    let mut ranges: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

    for (key, value) in params {
        if PAGINATION_PARAMS.contains(&key.as_str()) {
            continue;
        }
        if key == "intersects" {
            if !value.is_object() {
                return Err(Error::QueryBuild(
                    "intersects must be a GeoJSON object".to_string(),
                ));
            }
            filters.push(json!({
                "geo_shape": {
                    "geometry": {
                        "shape": value,
                        "relation": "intersects",
                    }
                }
            }));
        } else if let Some(field) = key.strip_suffix("_from") {
            ranges
                .entry(field.to_string())
                .or_default()
                .insert("gte".to_string(), value.clone());
        } else if let Some(field) = key.strip_suffix("_to") {
            ranges
                .entry(field.to_string())
                .or_default()
                .insert("lte".to_string(), value.clone());
        } else {
            musts.push(keyed("match", key, value.clone()));
        }
    }

    for (field, bounds) in ranges {
        musts.push(keyed("range", &field, Value::Object(bounds)));
    }

    if musts.is_empty() && filters.is_empty() {
        return Ok(json!({"query": {"match_all": {}}}));
    }

    Ok(json!({
        "query": {
            "bool": {
                "must": musts,
                "filter": filters,
            }
        }
    }))
}

/// Builds aggregation fragments for the requested fields.
///
/// Date-valued fields aggregate as daily histograms, everything else as
/// term buckets. Only invoked when aggregation parameters are present; the
/// search pipeline itself never calls this.
pub fn build_aggregations(fields: &[String]) -> Map<String, Value> {
    let mut aggregations = Map::new();
    for field in fields {
        let body = if field == "datetime" || field.ends_with("_date") {
            json!({"date_histogram": {"field": field, "interval": "day"}})
        } else {
            json!({"terms": {"field": field}})
        };
        aggregations.insert(field.clone(), body);
    }
    aggregations
}

/// Wraps a single dynamic key-value pair under a clause name.
fn keyed(clause: &str, key: &str, value: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(key.to_string(), value);
    let mut outer = Map::new();
    outer.insert(clause.to_string(), Value::Object(inner));
    Value::Object(outer)
}

#[cfg(test)]
mod tests {
    use super::{build_aggregations, build_query, Namespace, SearchQuery};
    use crate::{Error, Event, SearchRequest};
    use serde_json::{json, Map, Value};

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn match_all_when_empty() {
        let body = build_query(&Map::new()).unwrap();
        assert_eq!(body, json!({"query": {"match_all": {}}}));
    }

    #[test]
    fn pagination_params_are_skipped() {
        let body = build_query(&params(json!({"page": 2, "limit": 10, "skip": 5}))).unwrap();
        assert_eq!(body, json!({"query": {"match_all": {}}}));
    }

    #[test]
    fn unknown_key_becomes_match() {
        let body = build_query(&params(json!({"collection": "landsat-8"}))).unwrap();
        assert_eq!(
            body["query"]["bool"]["must"],
            json!([{"match": {"collection": "landsat-8"}}])
        );
    }

    #[test]
    fn range_suffixes_merge() {
        let body = build_query(&params(json!({"cloud_from": 0, "cloud_to": 20}))).unwrap();
        assert_eq!(
            body["query"]["bool"]["must"],
            json!([{"range": {"cloud": {"gte": 0, "lte": 20}}}])
        );
    }

    #[test]
    fn intersects_becomes_geo_shape() {
        let aoi = json!({"type": "Point", "coordinates": [-105.1, 40.1]});
        let body = build_query(&params(json!({"intersects": aoi}))).unwrap();
        assert_eq!(
            body["query"]["bool"]["filter"][0]["geo_shape"]["geometry"]["shape"],
            aoi
        );
    }

    #[test]
    fn intersects_string_fails_to_build() {
        let result = build_query(&params(json!({"intersects": "not parsed"})));
        assert!(matches!(result.unwrap_err(), Error::QueryBuild(_)));
    }

    #[test]
    fn descriptor_carries_pagination_and_projection() {
        let event = Event {
            query: Some(params(
                json!({"limit": "10", "page": "3", "fields": "id,bbox"}),
            )),
            body: None,
        };
        let request = SearchRequest::new(event).unwrap();
        let query = SearchQuery::new(Namespace::Items, &request).unwrap();
        assert_eq!(query.size, 10);
        assert_eq!(query.from, 20);
        assert_eq!(query.source.as_deref().unwrap(), ["id", "bbox"]);
        assert_eq!(query.namespace, Namespace::Items);
    }

    #[test]
    fn aggregations_by_field_kind() {
        let fields = vec!["platform".to_string(), "datetime".to_string()];
        let aggregations = build_aggregations(&fields);
        assert_eq!(
            aggregations["platform"],
            json!({"terms": {"field": "platform"}})
        );
        assert_eq!(
            aggregations["datetime"],
            json!({"date_histogram": {"field": "datetime", "interval": "day"}})
        );
    }
}
