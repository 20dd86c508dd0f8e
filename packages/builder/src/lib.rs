#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Developable-area orchestration.
//!
//! Normalizes a parcel boundary, queries each restriction source over a
//! generous envelope, subtracts every intersecting restriction feature
//! sequentially via the tiered difference engine, and finalizes the
//! accumulated polygon with one last validity check. [`sync`] persists the
//! result into the host's editable layer store.
//!
//! Failure policy: only boundary normalization is fatal. A failing source
//! or restriction feature degrades to zero effect; a failing difference
//! attempt keeps the accumulated geometry and marks the run degraded; a
//! broken final geometry falls back to the original parcel boundary. A
//! broken geometry is never surfaced.

pub mod builder;
pub mod result;
pub mod sync;

pub use builder::{BuildPhase, BuilderConfig, CancellationFlag, DevelopableAreaBuilder};
pub use result::DevelopableAreaResult;
pub use sync::{LayerStore, SyncError, SyncOptions};

use parcel_scope_geometry::NormalizationError;
use thiserror::Error;

/// Errors that abort a developable-area computation.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The parcel boundary itself could not be normalized; there is
    /// nothing to subtract from.
    #[error("Boundary normalization failed: {0}")]
    Boundary(#[from] NormalizationError),

    /// The external cancellation flag was raised between restriction
    /// feature iterations.
    #[error("Computation cancelled")]
    Cancelled,
}
