#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Restriction overlay source definition types.
//!
//! Defines the TOML schema for restriction sources (biodiversity, flood,
//! heritage, easements, …) and the envelope used to window their queries.
//! New overlay categories are added as TOML files; the difference engine
//! never changes.

use serde::{Deserialize, Serialize};

/// A restriction overlay source, deserialized from TOML.
///
/// Each source defines how to fetch restriction polygons for one overlay
/// category from a specific spatial data API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestrictionSource {
    /// Unique source identifier (e.g., `"biodiversity"`), also used as the
    /// key in the per-source subtraction counts.
    pub id: String,
    /// Human-readable name (e.g., "Biodiversity Values Map").
    pub name: String,
    /// Fetcher configuration.
    pub fetcher: RestrictionFetcherConfig,
}

impl RestrictionSource {
    /// Returns the source identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// How to fetch restriction polygons for an envelope.
///
/// Each variant corresponds to a different spatial API type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestrictionFetcherConfig {
    /// `ArcGIS` `FeatureServer` or `MapServer` query endpoint, windowed by
    /// an envelope with `geometryType=esriGeometryEnvelope`.
    Arcgis {
        /// Base query URL (up to `.../query`).
        url: String,
        /// Maximum records to request per page (default: 1000).
        max_records: Option<u32>,
    },
    /// Direct `GeoJSON` URL (static file or API returning a standard
    /// `FeatureCollection`); the envelope filter is applied client-side
    /// downstream.
    GeojsonUrl {
        /// Full URL that returns a `GeoJSON` `FeatureCollection`.
        url: String,
    },
}

/// A geographic bounding envelope for windowed source queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryEnvelope {
    /// Western edge.
    pub xmin: f64,
    /// Southern edge.
    pub ymin: f64,
    /// Eastern edge.
    pub xmax: f64,
    /// Northern edge.
    pub ymax: f64,
}

impl QueryEnvelope {
    /// Formats the envelope as the comma-separated `xmin,ymin,xmax,ymax`
    /// string expected by `ArcGIS` query endpoints.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        format!("{},{},{},{}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}
