//! Direct `GeoJSON` URL fetcher.
//!
//! For sources published as a static `FeatureCollection` (or a bare
//! feature array) rather than a queryable service. The envelope filter
//! cannot be pushed to the server; the area builder's bounding pre-check
//! discards far-away features instead.

use crate::OverlayError;

/// Fetches all features from a direct `GeoJSON` URL.
///
/// Accepts either a `FeatureCollection` or a top-level array of
/// features, which some static exports use.
///
/// # Errors
///
/// Returns [`OverlayError`] if the request fails or the response carries
/// no features.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<serde_json::Value>, OverlayError> {
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(OverlayError::Conversion {
            message: format!("GeoJSON request failed with status {}", resp.status()),
        });
    }

    let body: serde_json::Value = resp.json().await?;
    let features = match &body {
        serde_json::Value::Array(features) => features,
        object => object
            .get("features")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| OverlayError::Conversion {
                message: "No features array in GeoJSON response".to_string(),
            })?,
    };

    Ok(features.clone())
}
