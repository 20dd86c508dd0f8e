#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Restriction overlay source registry and fetching.
//!
//! Downloads restriction polygons (biodiversity, flood, heritage,
//! easements) from spatial data APIs, windowed to a query envelope.
//! Sources are defined as TOML files embedded at compile time; the
//! [`RestrictionSourceProvider`] trait is the seam injected into the
//! area-builder orchestration so it never reads ambient state.

pub mod fetchers;
pub mod provider;
pub mod registry;

pub use provider::{RegistryProvider, RestrictionSourceProvider};

use thiserror::Error;

/// Errors that can occur while fetching restriction features.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response shape or content error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
