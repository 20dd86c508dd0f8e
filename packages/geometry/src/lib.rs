#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Robust polygon engine for developable-area computation.
//!
//! Real-world parcel and overlay polygons are frequently degenerate:
//! unclosed rings, self-intersections, inconsistent winding, thousands of
//! vertices. Exact boolean libraries fail unpredictably on such input, so
//! every operation here degrades through an ordered ladder of fallbacks
//! instead of erroring out, while guaranteeing that no stage ever returns a
//! silently-invalid geometry.
//!
//! Pipeline stages, leaves first:
//! - [`normalize`] canonicalizes arbitrary `GeoJSON`-like input.
//! - [`validity`] tests and repairs ring validity.
//! - [`reduce`] simplifies and clips oversized polygons.
//! - [`difference`] computes minuend-minus-subtrahend via three tiers.
//!
//! Every stage produces a new [`AreaFeature`] rather than mutating its
//! input, and carries the accumulated [`Provenance`] tags forward.

pub mod difference;
pub mod feature;
pub mod normalize;
pub mod reduce;
mod ring;
pub mod validity;

pub use difference::{DifferenceEngine, EngineConfig, RemoteDifferenceConfig};
pub use feature::{AreaFeature, AreaGeometry, DifferenceTier, Provenance};
pub use reduce::ReducerConfig;
pub use validity::RepairConfig;

use thiserror::Error;

/// Errors from canonicalizing `GeoJSON`-like input into an [`AreaFeature`].
///
/// A normalization failure on the parcel boundary is fatal to a build; the
/// same failure on an individual restriction feature is caught locally and
/// that feature is skipped.
#[derive(Debug, Error)]
pub enum NormalizationError {
    /// A `FeatureCollection` input contained no features.
    #[error("Feature collection contains no features")]
    EmptyCollection,

    /// No `coordinates` array could be located anywhere in the input.
    #[error("Geometry is missing coordinates")]
    MissingCoordinates,

    /// The declared geometry type is not polygonal.
    #[error("Unsupported geometry type: {geometry_type}")]
    UnsupportedGeometry {
        /// The offending `type` value.
        geometry_type: String,
    },

    /// A ring has too few points to close into a valid ring.
    #[error("Ring has {points} point(s) and cannot be closed")]
    RingTooShort {
        /// Number of points found in the ring.
        points: usize,
    },

    /// A coordinate was not a `[x, y]` pair of finite numbers.
    #[error("Coordinate at position {index} is not a finite [x, y] pair")]
    InvalidCoordinate {
        /// Zero-based position of the coordinate within its ring.
        index: usize,
    },
}

/// Validity could not be restored by any repair strategy.
///
/// Callers must treat the original geometry as opaque: it cannot safely be
/// fed into boolean operations.
#[derive(Debug, Error)]
#[error("Geometry could not be repaired (strategies tried: {strategies})")]
pub struct RepairFailure {
    /// Comma-separated names of the strategies that were attempted.
    pub strategies: String,
}
