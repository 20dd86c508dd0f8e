//! Shared ring helpers for the approximate reconstruction paths.
//!
//! The polar-angle rebuild is only locally correct for roughly star-shaped
//! vertex sets and can produce self-crossing rings on concave inputs; every
//! caller tags its output `approximate` and re-checks validity.

use geo::{Coord, LineString};

/// Closes a ring in place by appending a copy of the first coordinate if
/// the first and last differ.
pub fn close(coords: &mut Vec<Coord<f64>>) {
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied())
        && (first.x != last.x || first.y != last.y)
    {
        coords.push(first);
    }
}

/// Arithmetic mean of a coordinate set.
pub fn coord_centroid(coords: &[Coord<f64>]) -> Coord<f64> {
    let n = coords.len() as f64;
    let (sx, sy) = coords
        .iter()
        .fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
    Coord {
        x: sx / n,
        y: sy / n,
    }
}

/// Rebuilds a simple ring from an unordered vertex set by sorting around
/// the set's centroid, deduplicating, and closing.
///
/// Returns `None` when fewer than 3 distinct vertices survive.
pub fn rebuild_by_polar_angle(mut coords: Vec<Coord<f64>>) -> Option<LineString<f64>> {
    coords.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    if coords.len() < 3 {
        return None;
    }

    let center = coord_centroid(&coords);
    coords.sort_by(|a, b| {
        let angle_a = (a.y - center.y).atan2(a.x - center.x);
        let angle_b = (b.y - center.y).atan2(b.x - center.x);
        angle_a.total_cmp(&angle_b)
    });
    coords.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    if coords.len() < 3 {
        return None;
    }

    close(&mut coords);
    Some(LineString(coords))
}
