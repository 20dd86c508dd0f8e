//! Canonicalizes arbitrary `GeoJSON`-like input into an [`AreaFeature`].
//!
//! Overlay APIs and host layers hand back Features, bare geometries, whole
//! `FeatureCollection`s, and ad hoc objects that carry `coordinates` with no
//! declared type. All of them normalize to a well-formed
//! `Feature<Polygon|MultiPolygon>` with closed rings, or fail with
//! [`NormalizationError`].

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{Map, Value};

use crate::{AreaFeature, AreaGeometry, NormalizationError};

/// Normalizes a `GeoJSON`-like value into a canonical [`AreaFeature`].
///
/// - `FeatureCollection` → recurse on its first feature.
/// - `Feature` → use its geometry and properties.
/// - Bare geometry → wrap with empty properties.
/// - Object with `coordinates` but no `type` → inferred `Polygon`.
///
/// Any ring whose first and last coordinate differ is closed by appending
/// a copy of the first point.
///
/// # Errors
///
/// Returns [`NormalizationError`] when coordinates are missing, a declared
/// geometry type is not polygonal, or a ring has fewer than 4 points after
/// closing.
pub fn normalize_feature(value: &Value) -> Result<AreaFeature, NormalizationError> {
    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let first = value
                .get("features")
                .and_then(Value::as_array)
                .and_then(|features| features.first())
                .ok_or(NormalizationError::EmptyCollection)?;
            normalize_feature(first)
        }
        Some("Feature") => {
            let geometry = value
                .get("geometry")
                .filter(|geometry| !geometry.is_null())
                .ok_or(NormalizationError::MissingCoordinates)?;
            let properties = value
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let geometry = normalize_geometry(geometry)?;
            Ok(AreaFeature::with_properties(geometry, properties))
        }
        _ => {
            let geometry = normalize_geometry(value)?;
            Ok(AreaFeature::with_properties(geometry, Map::new()))
        }
    }
}

/// Normalizes a geometry-like value (declared or inferred).
fn normalize_geometry(value: &Value) -> Result<AreaGeometry, NormalizationError> {
    let coordinates = value
        .get("coordinates")
        .and_then(Value::as_array)
        .filter(|coordinates| !coordinates.is_empty())
        .ok_or(NormalizationError::MissingCoordinates)?;

    // An object carrying coordinates but no declared type is treated as a
    // Polygon, the overwhelmingly common shape of ad hoc overlay payloads.
    let geometry_type = value.get("type").and_then(Value::as_str).unwrap_or("Polygon");

    match geometry_type {
        "Polygon" => Ok(AreaGeometry::Polygon(parse_polygon(coordinates)?)),
        "MultiPolygon" => {
            let polygons = coordinates
                .iter()
                .map(|polygon| {
                    polygon
                        .as_array()
                        .ok_or(NormalizationError::MissingCoordinates)
                        .and_then(|rings| parse_polygon(rings))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AreaGeometry::MultiPolygon(MultiPolygon(polygons)))
        }
        other => Err(NormalizationError::UnsupportedGeometry {
            geometry_type: other.to_string(),
        }),
    }
}

/// Parses one polygon's ring array: first ring is the shell, the rest are
/// holes.
fn parse_polygon(rings: &[Value]) -> Result<Polygon<f64>, NormalizationError> {
    let mut parsed = rings.iter().map(|ring| parse_ring(ring));

    let exterior = parsed
        .next()
        .ok_or(NormalizationError::MissingCoordinates)??;
    let interiors = parsed.collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon::new(exterior, interiors))
}

/// Parses and closes a single ring.
fn parse_ring(ring: &Value) -> Result<LineString<f64>, NormalizationError> {
    let positions = ring
        .as_array()
        .ok_or(NormalizationError::MissingCoordinates)?;

    let mut coords = Vec::with_capacity(positions.len() + 1);
    for (index, position) in positions.iter().enumerate() {
        coords.push(parse_coord(position, index)?);
    }

    crate::ring::close(&mut coords);

    if coords.len() < 4 {
        return Err(NormalizationError::RingTooShort {
            points: coords.len(),
        });
    }

    Ok(LineString(coords))
}

/// Parses one `[x, y]` position (extra dimensions are ignored).
fn parse_coord(position: &Value, index: usize) -> Result<Coord<f64>, NormalizationError> {
    let pair = position
        .as_array()
        .ok_or(NormalizationError::InvalidCoordinate { index })?;
    let x = pair.first().and_then(Value::as_f64);
    let y = pair.get(1).and_then(Value::as_f64);
    match (x, y) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
        _ => Err(NormalizationError::InvalidCoordinate { index }),
    }
}
