//! Tier B: local exact boolean difference.
//!
//! Both operands are repaired first, then MultiPolygons are decomposed and
//! differenced pairwise. Pairs the boolean kernel is known to reject
//! (degenerate rings, zero-extent bounding boxes) are detected by an
//! explicit precondition and routed through an algebraic rewrite: the
//! subtrahend's inverse within a bounding box enclosing the minuend,
//! intersected with the minuend. The rewrite is equivalent to the direct
//! difference but avoids the degenerate code path.

use geo::{Area, BooleanOps, BoundingRect, Contains, Coord, Polygon, Rect};

use super::{EngineConfig, TierError};
use crate::{AreaFeature, AreaGeometry, DifferenceTier, validity};

/// Relative margin added around the minuend's bounding box for the
/// inverse rewrite.
const INVERSE_BOX_MARGIN: f64 = 0.1;

/// Computes `minuend − subtrahend` with the local boolean kernel.
pub(crate) fn difference(
    config: &EngineConfig,
    minuend: &AreaFeature,
    subtrahend: &AreaFeature,
) -> Result<AreaFeature, TierError> {
    // An operand that cannot be repaired still goes in: the precondition
    // below routes the pairs the kernel would reject through the rewrite,
    // and the engine's validity gate rejects any garbage that comes out.
    let minuend_repaired = validity::repair(minuend, &config.repair).unwrap_or_else(|e| {
        log::debug!("Minuend repair failed, proceeding with original: {e}");
        minuend.clone()
    });
    let subtrahend_repaired = validity::repair(subtrahend, &config.repair).unwrap_or_else(|e| {
        log::debug!("Subtrahend repair failed, proceeding with original: {e}");
        subtrahend.clone()
    });

    let clips = subtrahend_repaired.geometry.polygons();
    let mut parts = minuend_repaired.geometry.polygons();
    for clip in &clips {
        let mut next = Vec::new();
        for part in &parts {
            next.extend(difference_pair(part, clip, config.min_part_area));
        }
        parts = next;
        if parts.is_empty() {
            break;
        }
    }

    let geometry = AreaGeometry::from_polygons(parts);
    if geometry.is_empty() {
        // Empty is only the correct answer when the subtrahend actually
        // covers the minuend; anything else means the kernel gave up.
        if !covers(&subtrahend_repaired.geometry, &minuend_repaired.geometry) {
            return Err(TierError::UnexpectedEmpty);
        }
        let mut result = AreaFeature::empty_from(&minuend_repaired);
        result.provenance.difference_tier = Some(DifferenceTier::LocalBoolean);
        result.provenance.difference_applied = Some(true);
        return Ok(result);
    }

    let mut result = minuend_repaired;
    result.geometry = geometry;
    result.provenance.difference_tier = Some(DifferenceTier::LocalBoolean);
    result.provenance.difference_applied = Some(true);
    Ok(result)
}

/// Differences one polygon pair, keeping surviving parts above the area
/// floor.
fn difference_pair(part: &Polygon<f64>, clip: &Polygon<f64>, min_area: f64) -> Vec<Polygon<f64>> {
    let survivors = if validity::non_degenerate_pair(part, clip) {
        part.difference(clip)
    } else {
        inverse_difference(part, clip)
    };
    survivors
        .0
        .into_iter()
        .filter(|polygon| polygon.unsigned_area() > min_area)
        .collect()
}

/// The algebraic rewrite for degenerate pairs:
/// `part ∩ (box(part) − clip)`.
fn inverse_difference(part: &Polygon<f64>, clip: &Polygon<f64>) -> geo::MultiPolygon<f64> {
    let Some(rect) = part.bounding_rect() else {
        return geo::MultiPolygon(vec![part.clone()]);
    };
    let margin_x = rect.width().mul_add(INVERSE_BOX_MARGIN, f64::EPSILON);
    let margin_y = rect.height().mul_add(INVERSE_BOX_MARGIN, f64::EPSILON);
    let envelope = Rect::new(
        Coord {
            x: rect.min().x - margin_x,
            y: rect.min().y - margin_y,
        },
        Coord {
            x: rect.max().x + margin_x,
            y: rect.max().y + margin_y,
        },
    )
    .to_polygon();

    let inverse = envelope.difference(clip);
    inverse.intersection(part)
}

/// Whether the subtrahend fully covers the minuend.
fn covers(subtrahend: &AreaGeometry, minuend: &AreaGeometry) -> bool {
    minuend.polygons().iter().all(|part| match subtrahend {
        AreaGeometry::Polygon(clip) => clip.contains(part),
        AreaGeometry::MultiPolygon(clips) => clips.contains(part),
        AreaGeometry::Empty => false,
    })
}
