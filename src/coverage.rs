//! AOI coverage filtering.
//!
//! A result's coverage is the area of its geometry's intersection with the
//! AOI, as a percentage of the whole AOI's area. When the AOI is a
//! `FeatureCollection` the per-feature percentages are accumulated, not
//! averaged, and the denominator stays the whole AOI's area throughout.
//! Accumulated percentages are never clamped; only the inclusive `>=`
//! threshold comparison consumes them.

use geo::{Area, BooleanOps, MultiPolygon};
use geojson::GeoJson;
use serde_json::{Map, Value};

/// Filters features by their AOI coverage percentage.
///
/// With no threshold or no AOI this is the identity function, the default
/// path for most requests. Otherwise a feature is retained iff its
/// accumulated coverage percentage is at least `threshold`.
pub fn filter(
    features: Vec<Map<String, Value>>,
    intersects: Option<&Value>,
    threshold: Option<f64>,
) -> Vec<Map<String, Value>> {
    let (Some(threshold), Some(intersects)) = (threshold, intersects) else {
        return features;
    };
    let aoi = GeoJson::from_json_value(intersects.clone()).ok();
    let aoi_area = aoi.as_ref().map(total_area).unwrap_or(0.0);
    features
        .into_iter()
        .filter(|feature| {
            let percentage = match &aoi {
                Some(aoi) => coverage_percentage(aoi, feature, aoi_area),
                None => 0.0,
            };
            percentage >= threshold
        })
        .collect()
}

/// Accumulated coverage of one feature against the AOI.
///
/// Only `FeatureCollection`, `Feature`, and `Polygon` AOIs contribute;
/// anything else yields 0. Never fails: a feature without an areal
/// geometry, or with no overlap, simply scores 0.
fn coverage_percentage(aoi: &GeoJson, feature: &Map<String, Value>, aoi_area: f64) -> f64 {
    let Some(scene) = scene_geometry(feature) else {
        return 0.0;
    };
    match aoi {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .iter()
            .filter_map(|feature| feature.geometry.as_ref())
            .map(|geometry| part_percentage(geometry, &scene, aoi_area))
            .sum(),
        GeoJson::Feature(feature) => feature
            .geometry
            .as_ref()
            .map(|geometry| part_percentage(geometry, &scene, aoi_area))
            .unwrap_or(0.0),
        GeoJson::Geometry(geometry) => {
            if matches!(geometry.value, geojson::Value::Polygon(_)) {
                part_percentage(geometry, &scene, aoi_area)
            } else {
                0.0
            }
        }
    }
}

/// Coverage contributed by one AOI part: intersection area over the whole
/// AOI's area.
fn part_percentage(part: &geojson::Geometry, scene: &MultiPolygon<f64>, aoi_area: f64) -> f64 {
    if aoi_area == 0.0 {
        return 0.0;
    }
    let Some(part) = polygonal(part) else {
        return 0.0;
    };
    part.intersection(scene).unsigned_area() / aoi_area * 100.0
}

/// Total area of the AOI, summed across sub-features for a
/// `FeatureCollection`.
fn total_area(aoi: &GeoJson) -> f64 {
    match aoi {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .iter()
            .filter_map(|feature| feature.geometry.as_ref())
            .filter_map(polygonal)
            .map(|polygons| polygons.unsigned_area())
            .sum(),
        GeoJson::Feature(feature) => feature
            .geometry
            .as_ref()
            .and_then(polygonal)
            .map(|polygons| polygons.unsigned_area())
            .unwrap_or(0.0),
        GeoJson::Geometry(geometry) => polygonal(geometry)
            .map(|polygons| polygons.unsigned_area())
            .unwrap_or(0.0),
    }
}

/// The data geometry of an assembled feature.
fn scene_geometry(feature: &Map<String, Value>) -> Option<MultiPolygon<f64>> {
    match GeoJson::from_json_value(feature.get("geometry")?.clone()) {
        Ok(GeoJson::Geometry(geometry)) => polygonal(&geometry),
        _ => None,
    }
}

/// Converts a GeoJSON geometry into its polygonal form, if it has one.
fn polygonal(geometry: &geojson::Geometry) -> Option<MultiPolygon<f64>> {
    match geo::Geometry::<f64>::try_from(geometry.clone()) {
        Ok(geo::Geometry::Polygon(polygon)) => Some(MultiPolygon(vec![polygon])),
        Ok(geo::Geometry::MultiPolygon(polygons)) => Some(polygons),
        _ => None,
    }
}
