use crate::{Error, Result};
use geojson::GeoJson;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// An incoming search request.
///
/// Parameters arrive either as a query-string map or as a body map. A
/// non-empty query map takes precedence; otherwise the body map; otherwise
/// the parameter set is empty. A request carrying neither is not an error.
#[derive(Debug, Default, Deserialize)]
pub struct Event {
    /// Query-string parameters.
    pub query: Option<Map<String, Value>>,

    /// Body parameters.
    pub body: Option<Map<String, Value>>,
}

/// Normalized search parameters.
///
/// Constructed once per request and immutable afterwards. The one mutation
/// performed during construction is re-storing a string `intersects`
/// parameter in object form, since the geometry is both echoed into the
/// query body and used for coverage filtering.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Pass-through filter parameters, handed opaquely to the query
    /// builder.
    ///
    /// `coverage` and `fields` are never present here.
    pub params: Map<String, Value>,

    /// AOI coverage threshold percentage, if one was requested.
    pub coverage: Option<f64>,

    /// Requested source-field projection.
    pub fields: Option<Vec<String>>,

    /// Page size.
    pub size: u64,

    /// Zero-based offset of the first hit, always derived from `page` and
    /// `limit`.
    pub from: u64,

    /// The page number reported in the response envelope.
    ///
    /// When `skip` is supplied this diverges from the page that drives the
    /// query offset. Surprising, but it is a compatibility behavior and is
    /// preserved exactly.
    pub page: u64,
}

impl SearchRequest {
    /// Normalizes an incoming event into search parameters.
    ///
    /// Fails with [Error::InvalidGeometry] when an `intersects` parameter
    /// is present but does not parse as GeoJSON. This happens before any
    /// query is built or executed.
    pub fn new(event: Event) -> Result<SearchRequest> {
        let mut params = event
            .query
            .filter(|query| !query.is_empty())
            .or(event.body.filter(|body| !body.is_empty()))
            .unwrap_or_default();

        let coverage = params.remove("coverage").map(|value| to_float(&value));
        let fields = params.remove("fields").map(|value| to_fields(&value));

        let page = params.get("page").and_then(to_int).unwrap_or(1);
        let size = params.get("limit").and_then(to_int).unwrap_or(1);
        let from = page.saturating_sub(1) * size;
        let page = params.get("skip").and_then(to_int).unwrap_or(page);

        if let Some(intersects) = params.get("intersects") {
            if let Some(object) = parse_intersects(intersects)? {
                params.insert("intersects".to_string(), object);
            }
        }

        debug!(params = ?params, "search parameters");
        Ok(SearchRequest {
            params,
            coverage,
            fields,
            size,
            from,
            page,
        })
    }

    /// Returns the AOI geometry parameter, if present.
    pub fn intersects(&self) -> Option<&Value> {
        self.params.get("intersects")
    }
}

/// Validates the `intersects` parameter, returning the object form when the
/// input was a JSON string.
fn parse_intersects(value: &Value) -> Result<Option<Value>> {
    match value {
        Value::String(s) => {
            let geojson = s.parse::<GeoJson>().map_err(Error::InvalidGeometry)?;
            Ok(Some(serde_json::to_value(geojson)?))
        }
        other => {
            let _ = GeoJson::from_json_value(other.clone()).map_err(Error::InvalidGeometry)?;
            Ok(None)
        }
    }
}

/// Coerces a parameter to an integer, accepting numbers and numeric
/// strings.
///
/// Callers guard against coercion failure by defaulting.
fn to_int(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Coerces a coverage threshold to a float.
///
/// A value that does not coerce becomes NaN, which no coverage percentage
/// compares `>=` against, so such a threshold rejects every result.
fn to_float(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Parses a field projection from a comma-separated string or an array of
/// strings.
fn to_fields(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(|field| field.trim().to_string())
            .filter(|field| !field.is_empty())
            .collect(),
        Value::Array(values) => values
            .iter()
            .filter_map(|value| value.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}
