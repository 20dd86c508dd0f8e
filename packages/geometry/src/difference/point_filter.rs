//! Tier C: manual point-filtering approximation.
//!
//! Retains minuend vertices that test outside the subtrahend, augments
//! them with ring/ring edge-intersection points for a sharper cut
//! boundary, and reconstructs a ring by polar-angle ordering around the
//! survivors' centroid. Sacrifices correctness on concave survivor sets
//! for guaranteed termination; it is the last resort before giving up.

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Contains, Coord, Point, Polygon};

use super::TierError;
use crate::{AreaFeature, AreaGeometry, DifferenceTier};

/// Computes an approximate `minuend − subtrahend` by vertex filtering.
pub(crate) fn difference(
    minuend: &AreaFeature,
    subtrahend: &AreaFeature,
) -> Result<AreaFeature, TierError> {
    let clips = subtrahend.geometry.polygons();
    if clips.is_empty() {
        return Err(TierError::UnexpectedEmpty);
    }

    let mut parts = Vec::new();
    for polygon in minuend.geometry.polygons() {
        let mut survivors: Vec<Coord<f64>> = open_exterior(&polygon)
            .iter()
            .copied()
            .filter(|coord| !inside(&subtrahend.geometry, *coord))
            .collect();

        for edge in polygon.exterior().lines() {
            for clip in &clips {
                for clip_edge in clip.exterior().lines() {
                    if let Some(LineIntersection::SinglePoint { intersection, .. }) =
                        line_intersection(edge, clip_edge)
                    {
                        survivors.push(intersection);
                    }
                }
            }
        }

        if let Some(ring) = crate::ring::rebuild_by_polar_angle(survivors) {
            parts.push(Polygon::new(ring, vec![]));
        }
    }

    if parts.is_empty() {
        // Fewer than 3 survivors anywhere: the subtrahend swallowed the
        // minuend, which is an explicit empty result rather than a failure.
        let mut result = AreaFeature::empty_from(minuend);
        result.provenance.difference_tier = Some(DifferenceTier::PointFilter);
        result.provenance.difference_applied = Some(true);
        return Ok(result);
    }

    let mut result = minuend.clone();
    result.geometry = AreaGeometry::from_polygons(parts);
    result.provenance.difference_tier = Some(DifferenceTier::PointFilter);
    result.provenance.difference_applied = Some(true);
    result.provenance.approximate = true;
    Ok(result)
}

fn inside(geometry: &AreaGeometry, coord: Coord<f64>) -> bool {
    let point = Point(coord);
    match geometry {
        AreaGeometry::Polygon(polygon) => polygon.contains(&point),
        AreaGeometry::MultiPolygon(multi) => multi.contains(&point),
        AreaGeometry::Empty => false,
    }
}

fn open_exterior(polygon: &Polygon<f64>) -> &[Coord<f64>] {
    let coords = &polygon.exterior().0;
    if coords.len() > 1 && polygon.exterior().is_closed() {
        &coords[..coords.len() - 1]
    } else {
        coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn square_feature(min: f64, max: f64) -> AreaFeature {
        AreaFeature::new(AreaGeometry::Polygon(Polygon::new(
            LineString(vec![
                Coord { x: min, y: min },
                Coord { x: max, y: min },
                Coord { x: max, y: max },
                Coord { x: min, y: max },
                Coord { x: min, y: min },
            ]),
            vec![],
        )))
    }

    #[test]
    fn covered_minuend_yields_tagged_empty() {
        let parcel = square_feature(2.0, 4.0);
        let covering = square_feature(0.0, 10.0);
        let result = difference(&parcel, &covering).unwrap();
        assert!(result.provenance.is_empty);
        assert!(result.geometry.is_empty());
        assert_eq!(
            result.provenance.difference_tier,
            Some(DifferenceTier::PointFilter)
        );
    }

    #[test]
    fn corner_overlap_keeps_outside_vertices_and_cut_points() {
        // Clip the square's top-right corner quadrant.
        let parcel = square_feature(0.0, 10.0);
        let corner = square_feature(5.0, 15.0);
        let result = difference(&parcel, &corner).unwrap();

        assert!(result.provenance.approximate);
        assert_eq!(result.provenance.difference_applied, Some(true));
        let area = result.geometry.unsigned_area();
        // The true difference has area 75; the polar rebuild bridges the
        // concave notch, so allow the approximation to overshoot.
        assert!(area <= 100.0 + 1e-9);
        assert!(area >= 50.0);
    }

    #[test]
    fn disjoint_subtrahend_reproduces_minuend() {
        let parcel = square_feature(0.0, 10.0);
        let distant = square_feature(100.0, 110.0);
        let result = difference(&parcel, &distant).unwrap();
        assert!((result.geometry.unsigned_area() - 100.0).abs() < 1e-9);
    }
}
