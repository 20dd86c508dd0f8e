//! Tier A: remote exact geometry service.
//!
//! Speaks the Esri geometry-service difference protocol: the minuend goes
//! up as a `geometries` array of ring sets, the subtrahend as a single
//! `geometry` ring set, plus a spatial reference. The response is JSON with
//! either a `geometries` array or an `error` object. Both operands are
//! complexity-reduced first to bound the payload size.

use std::time::Duration;

use geo::{LineString, MultiPolygon, Polygon};
use serde_json::{Value, json};

use super::{EngineConfig, TierError};
use crate::{AreaFeature, AreaGeometry, DifferenceTier, reduce, ring};

/// Remote geometry service configuration.
#[derive(Debug, Clone)]
pub struct RemoteDifferenceConfig {
    /// Difference endpoint URL.
    pub url: String,
    /// Spatial reference well-known id sent with both operands.
    pub wkid: u32,
    /// Per-request timeout; a timeout is a tier failure, never fatal.
    pub timeout: Duration,
}

impl RemoteDifferenceConfig {
    /// Creates a configuration for the given endpoint with WGS84
    /// coordinates and a 10 second timeout.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wkid: 4326,
            timeout: Duration::from_secs(10),
        }
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Requests `minuend − subtrahend` from the remote service.
pub(crate) async fn difference(
    client: &reqwest::Client,
    remote: &RemoteDifferenceConfig,
    config: &EngineConfig,
    minuend: &AreaFeature,
    subtrahend: &AreaFeature,
) -> Result<AreaFeature, TierError> {
    let minuend_reduced = reduce::simplify_if_large(minuend, &config.reducer);
    let subtrahend_reduced = reduce::simplify_if_large(subtrahend, &config.reducer);

    let wkid = remote.wkid.to_string();
    let geometries = json!({
        "geometryType": "esriGeometryPolygon",
        "geometries": [{ "rings": geometry_rings(&minuend_reduced.geometry) }],
    })
    .to_string();
    let geometry = json!({
        "geometryType": "esriGeometryPolygon",
        "geometry": { "rings": geometry_rings(&subtrahend_reduced.geometry) },
    })
    .to_string();

    let response = client
        .post(&remote.url)
        .timeout(remote.timeout)
        .form(&[
            ("f", "json"),
            ("sr", wkid.as_str()),
            ("geometries", geometries.as_str()),
            ("geometry", geometry.as_str()),
        ])
        .send()
        .await?;
    let body: Value = response.json().await?;

    let result_geometry = parse_difference_response(&body)?;

    let mut result = minuend_reduced;
    result.geometry = result_geometry;
    result.provenance.difference_tier = Some(DifferenceTier::Remote);
    result.provenance.difference_applied = Some(true);
    Ok(result)
}

/// Serializes polygonal geometry to an Esri ring array.
fn geometry_rings(geometry: &AreaGeometry) -> Vec<Vec<[f64; 2]>> {
    geometry
        .polygons()
        .iter()
        .flat_map(|polygon| {
            std::iter::once(ring_positions(polygon.exterior()))
                .chain(polygon.interiors().iter().map(ring_positions))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn ring_positions(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.0.iter().map(|coord| [coord.x, coord.y]).collect()
}

/// Parses the service response into polygonal geometry.
///
/// An `error` object or an empty ring result is a tier failure: the
/// service cannot distinguish "fully subtracted" from "gave up", so empty
/// falls through to the local tiers.
fn parse_difference_response(body: &Value) -> Result<AreaGeometry, TierError> {
    if body.get("error").is_some() {
        return Err(TierError::Remote(
            body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        ));
    }

    let rings = body
        .get("geometries")
        .and_then(Value::as_array)
        .and_then(|geometries| geometries.first())
        .and_then(|geometry| geometry.get("rings"))
        .and_then(Value::as_array)
        .ok_or(TierError::UnexpectedEmpty)?;

    let polygons: Vec<Polygon<f64>> = rings.iter().filter_map(parse_ring).collect();
    if polygons.is_empty() {
        return Err(TierError::UnexpectedEmpty);
    }

    // One ring is a plain polygon; several come back as single-ring
    // polygons since the service does not mark holes explicitly.
    if polygons.len() == 1 {
        Ok(AreaGeometry::from_polygons(polygons))
    } else {
        Ok(AreaGeometry::MultiPolygon(MultiPolygon(polygons)))
    }
}

/// Parses one ring into a single-ring polygon, skipping degenerate rings.
fn parse_ring(value: &Value) -> Option<Polygon<f64>> {
    let positions = value.as_array()?;
    let mut coords = Vec::with_capacity(positions.len() + 1);
    for position in positions {
        let pair = position.as_array()?;
        let x = pair.first().and_then(Value::as_f64)?;
        let y = pair.get(1).and_then(Value::as_f64)?;
        coords.push(geo::Coord { x, y });
    }

    ring::close(&mut coords);
    if coords.len() < 4 {
        return None;
    }
    Some(Polygon::new(LineString(coords), vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_payload_is_a_tier_failure() {
        let body = json!({
            "error": { "code": 400, "message": "Unable to complete operation" }
        });
        let result = parse_difference_response(&body);
        assert!(matches!(
            result,
            Err(TierError::Remote(message)) if message == "Unable to complete operation"
        ));
    }

    #[test]
    fn empty_ring_result_is_a_tier_failure() {
        let body = json!({ "geometries": [{ "rings": [] }] });
        assert!(matches!(
            parse_difference_response(&body),
            Err(TierError::UnexpectedEmpty)
        ));

        let body = json!({ "geometries": [] });
        assert!(matches!(
            parse_difference_response(&body),
            Err(TierError::UnexpectedEmpty)
        ));
    }

    #[test]
    fn parses_single_ring_into_polygon() {
        let body = json!({
            "geometries": [{
                "rings": [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]],
            }],
        });
        let geometry = parse_difference_response(&body).unwrap();
        assert!(matches!(geometry, AreaGeometry::Polygon(_)));
        assert!((geometry.unsigned_area() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn parses_multiple_rings_and_closes_open_ones() {
        let body = json!({
            "geometries": [{
                "rings": [
                    [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
                    [[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0], [5.0, 5.0]],
                ],
            }],
        });
        let geometry = parse_difference_response(&body).unwrap();
        let AreaGeometry::MultiPolygon(multi) = &geometry else {
            panic!("expected multipolygon");
        };
        assert_eq!(multi.0.len(), 2);
        assert!(multi.0.iter().all(|polygon| polygon.exterior().is_closed()));
    }

    #[test]
    fn degenerate_rings_are_skipped() {
        let body = json!({
            "geometries": [{
                "rings": [
                    [[0.0, 0.0], [1.0, 1.0]],
                    [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]],
                ],
            }],
        });
        let geometry = parse_difference_response(&body).unwrap();
        assert!(matches!(geometry, AreaGeometry::Polygon(_)));
    }

    #[test]
    fn request_rings_cover_shell_and_holes() {
        let polygon = Polygon::new(
            LineString(vec![
                geo::Coord { x: 0.0, y: 0.0 },
                geo::Coord { x: 10.0, y: 0.0 },
                geo::Coord { x: 10.0, y: 10.0 },
                geo::Coord { x: 0.0, y: 10.0 },
                geo::Coord { x: 0.0, y: 0.0 },
            ]),
            vec![LineString(vec![
                geo::Coord { x: 2.0, y: 2.0 },
                geo::Coord { x: 4.0, y: 2.0 },
                geo::Coord { x: 4.0, y: 4.0 },
                geo::Coord { x: 2.0, y: 4.0 },
                geo::Coord { x: 2.0, y: 2.0 },
            ])],
        );
        let rings = geometry_rings(&AreaGeometry::Polygon(polygon));
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0][0], [0.0, 0.0]);
        assert_eq!(rings[1][0], [2.0, 2.0]);
    }
}
