//! Fetcher dispatch and implementations for different API types.
//!
//! Each fetcher downloads raw `GeoJSON` features for a restriction source,
//! windowed to the query envelope where the API supports it.

pub mod arcgis;
pub mod geojson_url;

use parcel_scope_overlay_models::{QueryEnvelope, RestrictionFetcherConfig, RestrictionSource};

use crate::OverlayError;

/// Fetches raw `GeoJSON` features for a source within an envelope.
///
/// Returns the features array of the `GeoJSON` `FeatureCollection` as
/// `serde_json::Value`s.
///
/// # Errors
///
/// Returns [`OverlayError`] if the HTTP request or response parsing
/// fails.
pub async fn fetch_features(
    client: &reqwest::Client,
    source: &RestrictionSource,
    envelope: &QueryEnvelope,
) -> Result<Vec<serde_json::Value>, OverlayError> {
    match &source.fetcher {
        RestrictionFetcherConfig::Arcgis { url, max_records } => {
            arcgis::fetch(client, url, envelope, *max_records).await
        }
        RestrictionFetcherConfig::GeojsonUrl { url } => geojson_url::fetch(client, url).await,
    }
}
