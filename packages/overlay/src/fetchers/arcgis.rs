//! `ArcGIS` `FeatureServer` / `MapServer` fetcher.
//!
//! Queries an `ArcGIS` REST endpoint with `f=geojson` and an envelope
//! filter, so only restriction polygons near the parcel come back.
//! Services with transfer limits are paginated via `resultOffset`.

use parcel_scope_overlay_models::QueryEnvelope;

use crate::OverlayError;

/// Fetches all features intersecting `envelope` from an `ArcGIS` query
/// endpoint, paginating while the server reports `exceededTransferLimit`.
///
/// # Errors
///
/// Returns [`OverlayError`] if a request fails, the server reports an
/// API error, or the response has no features array.
pub async fn fetch(
    client: &reqwest::Client,
    base_url: &str,
    envelope: &QueryEnvelope,
    max_records: Option<u32>,
) -> Result<Vec<serde_json::Value>, OverlayError> {
    let record_count = max_records.unwrap_or(1000);
    let geometry = envelope.to_query_string();
    let mut all_features = Vec::new();
    let mut offset = 0u32;

    loop {
        let resp = client
            .get(base_url)
            .query(&[
                ("where", "1=1"),
                ("outFields", "*"),
                ("f", "geojson"),
                ("returnGeometry", "true"),
                ("geometry", geometry.as_str()),
                ("geometryType", "esriGeometryEnvelope"),
                ("spatialRel", "esriSpatialRelIntersects"),
                ("inSR", "4326"),
                ("resultRecordCount", record_count.to_string().as_str()),
                ("resultOffset", offset.to_string().as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(OverlayError::Conversion {
                message: format!("ArcGIS request failed with status {}", resp.status()),
            });
        }

        let page: serde_json::Value = resp.json().await?;
        if page.get("error").is_some() {
            return Err(OverlayError::Conversion {
                message: format!(
                    "ArcGIS API error: {}",
                    page["error"]["message"].as_str().unwrap_or("unknown error")
                ),
            });
        }

        let features = page["features"]
            .as_array()
            .ok_or_else(|| OverlayError::Conversion {
                message: "No features array in ArcGIS response".to_string(),
            })?;
        if features.is_empty() {
            break;
        }
        log::debug!("{base_url}: fetched {} features at offset {offset}", features.len());
        all_features.extend(features.iter().cloned());

        if !page["exceededTransferLimit"].as_bool().unwrap_or(false) {
            break;
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            offset += features.len() as u32;
        }
    }

    Ok(all_features)
}
