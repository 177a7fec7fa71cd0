use crate::{Hit, Namespace, SearchBody};
use serde::Serialize;
use serde_json::{Map, Value};

/// Source keys lifted out of a hit's properties onto the feature itself.
const FEATURE_KEYS: [&str; 5] = ["bbox", "geometry", "assets", "links", "eo:bands"];

/// A page of search results, shaped as a GeoJSON `FeatureCollection`.
#[derive(Debug, Serialize)]
pub struct Page {
    /// This is always "FeatureCollection".
    pub r#type: String,

    /// Pagination context for this page.
    pub properties: PageProperties,

    /// The features, in index order.
    ///
    /// Usually STAC items, but maybe not legal STAC items if fields are
    /// excluded.
    pub features: Vec<Map<String, Value>>,
}

/// Pagination context.
#[derive(Debug, Serialize)]
pub struct PageProperties {
    /// Total number of hits in the index, not the number on this page.
    pub found: u64,

    /// Page size.
    pub limit: u64,

    /// The reported page number.
    pub page: u64,
}

impl Page {
    /// Assembles a page from a raw index response.
    pub fn new(
        namespace: Namespace,
        body: SearchBody,
        limit: u64,
        page: u64,
        api_url: &str,
    ) -> Page {
        let found = body.hits.total;
        let features = body
            .hits
            .hits
            .into_iter()
            .map(|hit| feature(namespace, hit, api_url))
            .collect();
        Page {
            r#type: "FeatureCollection".to_string(),
            properties: PageProperties { found, limit, page },
            features,
        }
    }
}

/// Reshapes one hit into a feature.
///
/// Everything except the lifted keys lands in `properties`. Relative
/// `collection` links are made absolute, and a self link is always
/// appended, whether or not the hit already carried one.
fn feature(namespace: Namespace, hit: Hit, api_url: &str) -> Map<String, Value> {
    let source = hit.source;
    let mut properties = source.clone();
    for key in FEATURE_KEYS {
        properties.remove(key);
    }

    let id = properties
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut links = match source.get("links") {
        Some(Value::Array(links)) => links.clone(),
        _ => Vec::new(),
    };
    for link in &mut links {
        if let Some(link) = link.as_object_mut() {
            if link.get("rel").and_then(Value::as_str) == Some("collection") {
                if let Some(Value::String(href)) = link.get_mut("href") {
                    *href = format!("{}{}", api_url, href);
                }
            }
        }
    }
    let mut self_link = Map::new();
    self_link.insert("rel".to_string(), "self".into());
    self_link.insert(
        "href".to_string(),
        format!("{}{}?id={}", api_url, namespace.self_link_prefix(), id).into(),
    );
    links.push(Value::Object(self_link));

    let mut feature = Map::new();
    feature.insert("type".to_string(), "Feature".into());
    feature.insert("properties".to_string(), Value::Object(properties));
    for key in ["bbox", "geometry", "assets"] {
        if let Some(value) = source.get(key) {
            feature.insert(key.to_string(), value.clone());
        }
    }
    feature.insert("links".to_string(), Value::Array(links));
    if let Some(bands) = source.get("eo:bands") {
        feature.insert("eo:bands".to_string(), bands.clone());
    }
    feature
}
