//! Ring validity testing and repair.
//!
//! [`check`] is the single global validity predicate used by every stage:
//! simple (non-self-intersecting) rings, closed with at least 4 points,
//! holes nested inside their shell. [`repair`] restores validity through an
//! ordered ladder of strategies, re-checking each candidate against the same
//! predicate and stopping at the first success.

use geo::{
    Area, BoundingRect, ConvexHull, LineString, MultiPoint, Point, Polygon, RemoveRepeatedPoints,
    Simplify, Validation,
};
use offset_polygon::offset_polygon;

use crate::{AreaFeature, AreaGeometry, RepairFailure};

/// Cross-product magnitude below which three consecutive vertices are
/// treated as collinear.
const COLLINEAR_EPSILON: f64 = 1e-12;

/// Tunable repair parameters.
///
/// The defaults are tuned for geographic (degree) coordinates; callers
/// working in projected units should scale them accordingly.
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Outward buffer distance applied by the buffer strategy.
    pub buffer_epsilon: f64,
    /// Arc detail (vertices per full circle) for buffered corners.
    pub buffer_arc_detail: f64,
    /// Douglas-Peucker tolerance for the simplify strategy.
    pub simplify_tolerance: f64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            buffer_epsilon: 1e-9,
            buffer_arc_detail: 8.0,
            simplify_tolerance: 1e-7,
        }
    }
}

/// Tests the global validity predicate.
///
/// Explicitly empty geometry is vacuously valid; it is tagged rather than
/// silently dropped by the stages that produce it.
#[must_use]
pub fn check(geometry: &AreaGeometry) -> bool {
    match geometry {
        AreaGeometry::Polygon(polygon) => polygon_is_valid(polygon),
        AreaGeometry::MultiPolygon(multi) => {
            multi.0.iter().all(rings_well_formed) && multi.is_valid()
        }
        AreaGeometry::Empty => true,
    }
}

fn polygon_is_valid(polygon: &Polygon<f64>) -> bool {
    rings_well_formed(polygon) && polygon.is_valid()
}

/// Closed rings with at least 4 points each.
fn rings_well_formed(polygon: &Polygon<f64>) -> bool {
    ring_well_formed(polygon.exterior()) && polygon.interiors().iter().all(ring_well_formed)
}

fn ring_well_formed(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4 && ring.is_closed()
}

/// One rung of the repair ladder.
struct RepairStrategy {
    name: &'static str,
    /// Whether the strategy is a deliberately lossy over-approximation.
    lossy: bool,
    run: fn(&AreaGeometry, &RepairConfig) -> Option<AreaGeometry>,
}

/// The ordered repair ladder. Each candidate is re-checked against
/// [`check`]; the first one that passes wins.
const LADDER: &[RepairStrategy] = &[
    RepairStrategy {
        name: "buffer-outward",
        lossy: false,
        run: buffer_outward,
    },
    RepairStrategy {
        name: "drop-degenerate-vertices",
        lossy: false,
        run: drop_degenerate_vertices,
    },
    RepairStrategy {
        name: "simplify",
        lossy: false,
        run: simplify_geometry,
    },
    RepairStrategy {
        name: "convex-hull",
        lossy: true,
        run: convex_hull_of_vertices,
    },
];

/// Repairs a feature's geometry, returning it untouched when already valid.
///
/// Successful repair tags `repaired` (plus `approximate` when the convex
/// hull fallback had to be used).
///
/// # Errors
///
/// Returns [`RepairFailure`] when no strategy produces a valid geometry;
/// the caller must treat the original geometry as opaque.
pub fn repair(feature: &AreaFeature, config: &RepairConfig) -> Result<AreaFeature, RepairFailure> {
    if check(&feature.geometry) {
        return Ok(feature.clone());
    }

    for strategy in LADDER {
        let Some(candidate) = (strategy.run)(&feature.geometry, config) else {
            log::debug!("Repair strategy {} produced no candidate", strategy.name);
            continue;
        };
        if check(&candidate) {
            log::debug!("Repair strategy {} restored validity", strategy.name);
            let mut repaired = feature.clone();
            repaired.geometry = candidate;
            repaired.provenance.repaired = true;
            repaired.provenance.approximate |= strategy.lossy;
            return Ok(repaired);
        }
    }

    Err(RepairFailure {
        strategies: LADDER
            .iter()
            .map(|strategy| strategy.name)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Buffers the shell outward (and holes inward) by a small epsilon, which
/// rounds away many self-intersection artifacts.
fn buffer_outward(geometry: &AreaGeometry, config: &RepairConfig) -> Option<AreaGeometry> {
    let mut rebuilt = Vec::new();
    for polygon in geometry.polygons() {
        let exterior = largest_loop(
            offset_polygon(
                polygon.exterior(),
                config.buffer_epsilon,
                config.buffer_arc_detail,
            )
            .ok()?,
        )?;

        let mut interiors = Vec::new();
        for hole in polygon.interiors() {
            // A hole that vanishes under the shrink is dropped.
            if let Ok(loops) = offset_polygon(hole, -config.buffer_epsilon, config.buffer_arc_detail)
                && let Some(shrunk) = largest_loop(loops)
            {
                interiors.push(shrunk);
            }
        }

        rebuilt.push(Polygon::new(exterior, interiors));
    }
    Some(AreaGeometry::from_polygons(rebuilt))
}

fn largest_loop(loops: Vec<LineString<f64>>) -> Option<LineString<f64>> {
    loops
        .into_iter()
        .filter(|ring| ring.0.len() >= 4)
        .max_by(|a, b| ring_area(a).total_cmp(&ring_area(b)))
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).unsigned_area()
}

/// Removes duplicate and collinear-adjacent vertices, which eliminates
/// zero-width spikes and repeated points.
fn drop_degenerate_vertices(geometry: &AreaGeometry, _config: &RepairConfig) -> Option<AreaGeometry> {
    let rebuilt = geometry
        .polygons()
        .iter()
        .map(|polygon| {
            let deduped = polygon.remove_repeated_points();
            let exterior = drop_collinear(deduped.exterior())?;
            let interiors = deduped
                .interiors()
                .iter()
                .filter_map(drop_collinear)
                .collect();
            Some(Polygon::new(exterior, interiors))
        })
        .collect::<Option<Vec<_>>>()?;
    Some(AreaGeometry::from_polygons(rebuilt))
}

fn drop_collinear(ring: &LineString<f64>) -> Option<LineString<f64>> {
    let open = if ring.is_closed() && ring.0.len() > 1 {
        &ring.0[..ring.0.len() - 1]
    } else {
        &ring.0[..]
    };
    let n = open.len();
    if n < 3 {
        return None;
    }

    let mut kept = Vec::with_capacity(n);
    for i in 0..n {
        let prev = open[(i + n - 1) % n];
        let cur = open[i];
        let next = open[(i + 1) % n];
        let cross = (cur.x - prev.x) * (next.y - cur.y) - (cur.y - prev.y) * (next.x - cur.x);
        if cross.abs() > COLLINEAR_EPSILON {
            kept.push(cur);
        }
    }
    if kept.len() < 3 {
        return None;
    }

    crate::ring::close(&mut kept);
    Some(LineString(kept))
}

/// Simplifies every ring with a small tolerance.
fn simplify_geometry(geometry: &AreaGeometry, config: &RepairConfig) -> Option<AreaGeometry> {
    match geometry {
        AreaGeometry::Polygon(polygon) => Some(AreaGeometry::Polygon(
            polygon.simplify(&config.simplify_tolerance),
        )),
        AreaGeometry::MultiPolygon(multi) => Some(AreaGeometry::MultiPolygon(
            multi.simplify(&config.simplify_tolerance),
        )),
        AreaGeometry::Empty => None,
    }
}

/// Convex hull of every vertex: a deliberately lossy over-approximation
/// used as the last rung of the ladder.
fn convex_hull_of_vertices(geometry: &AreaGeometry, _config: &RepairConfig) -> Option<AreaGeometry> {
    let points: Vec<Point<f64>> = geometry
        .polygons()
        .iter()
        .flat_map(|polygon| {
            polygon
                .exterior()
                .0
                .iter()
                .chain(polygon.interiors().iter().flat_map(|ring| ring.0.iter()))
                .copied()
                .map(Point::from)
                .collect::<Vec<_>>()
        })
        .collect();
    if points.len() < 3 {
        return None;
    }

    let hull = MultiPoint(points).convex_hull();
    if ring_well_formed(hull.exterior()) && hull.unsigned_area() > 0.0 {
        Some(AreaGeometry::Polygon(hull))
    } else {
        None
    }
}

/// Whether a polygon pair is safe to hand to the exact boolean kernel:
/// both rings long enough and neither bounding box degenerate.
#[must_use]
pub fn non_degenerate_pair(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    polygon_non_degenerate(a) && polygon_non_degenerate(b)
}

fn polygon_non_degenerate(polygon: &Polygon<f64>) -> bool {
    polygon.exterior().0.len() >= 4
        && polygon
            .bounding_rect()
            .is_some_and(|rect| rect.width() > 0.0 && rect.height() > 0.0)
}
