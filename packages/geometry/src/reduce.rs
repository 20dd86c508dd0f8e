//! Complexity reduction for oversized polygons.
//!
//! Overlay sources routinely return polygons with hundreds to thousands of
//! vertices. Boolean kernels and remote-service payloads both degrade with
//! size, so oversized operands are simplified and/or spatially clipped to a
//! neighbourhood of the parcel boundary before any expensive operation.

use geo::{BooleanOps, Coord, Polygon, Rect, Simplify};

use crate::{AreaFeature, AreaGeometry, ring, validity};

/// Rough conversion from kilometres to geographic degrees.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Tunable reduction parameters.
///
/// Tolerances are tuned for geographic (degree) coordinates.
#[derive(Debug, Clone)]
pub struct ReducerConfig {
    /// Vertex count above which simplification kicks in.
    pub vertex_threshold: usize,
    /// Vertex count above which the aggressive second pass runs.
    pub aggressive_vertex_threshold: usize,
    /// Tolerance for the first simplification pass.
    pub modest_tolerance: f64,
    /// Tolerance for the aggressive second pass.
    pub aggressive_tolerance: f64,
    /// Neighbourhood radius around the boundary for spatial clipping.
    pub clip_buffer_km: f64,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            vertex_threshold: 100,
            aggressive_vertex_threshold: 500,
            modest_tolerance: 1e-5,
            aggressive_tolerance: 1e-4,
            clip_buffer_km: 0.5,
        }
    }
}

/// Staged simplification: a modest pass once the vertex count exceeds the
/// threshold, then an aggressive pass if the result is still oversized.
///
/// Returns the input unchanged when it is small enough, or when
/// simplification would break the validity predicate.
#[must_use]
pub fn simplify_if_large(feature: &AreaFeature, config: &ReducerConfig) -> AreaFeature {
    if feature.geometry.vertex_count() <= config.vertex_threshold {
        return feature.clone();
    }

    let mut reduced = simplify(&feature.geometry, config.modest_tolerance);
    if reduced.vertex_count() > config.aggressive_vertex_threshold {
        reduced = simplify(&reduced, config.aggressive_tolerance);
    }

    if !validity::check(&reduced) {
        log::debug!("Simplification broke validity; keeping original geometry");
        return feature.clone();
    }

    log::debug!(
        "Simplified geometry from {} to {} vertices",
        feature.geometry.vertex_count(),
        reduced.vertex_count()
    );
    let mut result = feature.clone();
    result.geometry = reduced;
    result.provenance.simplified = true;
    result
}

/// Restricts a feature to a buffered neighbourhood of `boundary`.
///
/// Strategies in order, first candidate with at least 3 valid vertices wins:
/// vertex filtering with polar-angle ring reconstruction (an approximation
/// valid for roughly star-shaped survivor sets), exact intersection with the
/// buffer rectangle, plain simplification.
#[must_use]
pub fn clip_to_buffer(
    feature: &AreaFeature,
    boundary: &AreaGeometry,
    config: &ReducerConfig,
) -> AreaFeature {
    let Some(region) = buffer_region(boundary, config.clip_buffer_km) else {
        return simplify_if_large(feature, config);
    };

    if let Some(filtered) = filter_vertices(&feature.geometry, &region) {
        let mut result = feature.clone();
        result.geometry = filtered;
        result.provenance.clipped = true;
        result.provenance.approximate = true;
        return result;
    }

    if let Some(clipped) = intersect_with_region(&feature.geometry, &region) {
        let mut result = feature.clone();
        result.geometry = clipped;
        result.provenance.clipped = true;
        return result;
    }

    simplify_if_large(feature, config)
}

/// The boundary's bounding rectangle expanded by the buffer distance.
fn buffer_region(boundary: &AreaGeometry, buffer_km: f64) -> Option<Rect<f64>> {
    let rect = boundary.bounding_rect()?;
    let distance = buffer_km / KM_PER_DEGREE;
    Some(Rect::new(
        Coord {
            x: rect.min().x - distance,
            y: rect.min().y - distance,
        },
        Coord {
            x: rect.max().x + distance,
            y: rect.max().y + distance,
        },
    ))
}

/// Keeps only vertices inside the region and reconstructs a simple ring by
/// polar-angle ordering around the survivors' centroid.
fn filter_vertices(geometry: &AreaGeometry, region: &Rect<f64>) -> Option<AreaGeometry> {
    let mut parts = Vec::new();
    for polygon in geometry.polygons() {
        let survivors: Vec<Coord<f64>> = open_exterior(&polygon)
            .iter()
            .copied()
            .filter(|coord| coord_in_rect(*coord, region))
            .collect();
        if survivors.len() < 3 {
            continue;
        }
        if let Some(ring) = ring::rebuild_by_polar_angle(survivors) {
            parts.push(Polygon::new(ring, vec![]));
        }
    }
    if parts.is_empty() {
        return None;
    }

    let candidate = AreaGeometry::from_polygons(parts);
    // The polar rebuild can self-cross on concave survivor sets; reject
    // those and let the exact intersection strategy take over.
    if validity::check(&candidate) && candidate.unsigned_area() > 0.0 {
        Some(candidate)
    } else {
        None
    }
}

/// Exact boolean intersection with the buffer rectangle.
fn intersect_with_region(geometry: &AreaGeometry, region: &Rect<f64>) -> Option<AreaGeometry> {
    let region_polygon = region.to_polygon();
    let mut parts = Vec::new();
    for polygon in geometry.polygons() {
        parts.extend(polygon.intersection(&region_polygon).0);
    }
    if parts.is_empty() {
        return None;
    }

    let candidate = AreaGeometry::from_polygons(parts);
    if validity::check(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

fn simplify(geometry: &AreaGeometry, tolerance: f64) -> AreaGeometry {
    match geometry {
        AreaGeometry::Polygon(polygon) => AreaGeometry::Polygon(polygon.simplify(&tolerance)),
        AreaGeometry::MultiPolygon(multi) => AreaGeometry::MultiPolygon(multi.simplify(&tolerance)),
        AreaGeometry::Empty => AreaGeometry::Empty,
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

fn coord_in_rect(coord: Coord<f64>, rect: &Rect<f64>) -> bool {
    coord.x >= rect.min().x
        && coord.x <= rect.max().x
        && coord.y >= rect.min().y
        && coord.y <= rect.max().y
}
