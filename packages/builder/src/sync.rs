//! Persists a computed result into the host's editable layer store.
//!
//! The store is an opaque external collaborator exposing `get`/`set`.
//! Layers are `GeoJSON` `FeatureCollection` values under a layer key;
//! single-feature updates use the `<layer key>/<feature id>` key. When the
//! single-feature update fails, the whole collection is rewritten in place
//! and re-persisted; only when both paths fail does the sync error out,
//! leaving the host layer unmodified.

use async_trait::async_trait;
use geo::Area;
use parcel_scope_geometry::AreaGeometry;
use serde_json::Value;
use thiserror::Error;

use crate::DevelopableAreaResult;

/// Opaque host layer persistence.
#[async_trait]
pub trait LayerStore: Send + Sync {
    /// Reads a stored value.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Writes a value.
    ///
    /// # Errors
    ///
    /// Returns the host's failure reason as a string.
    async fn set(&self, key: &str, value: Value) -> Result<(), String>;
}

/// Sync behavior options.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Whether the host layer schema accepts only a single `Polygon`; a
    /// `MultiPolygon` result is then collapsed to its largest-area
    /// constituent (ties broken by first encountered).
    pub requires_single_polygon: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            requires_single_polygon: true,
        }
    }
}

/// Persistence failed via both paths; the host layer is unmodified.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No layer stored under the given key.
    #[error("Layer {key} not found in store")]
    LayerMissing {
        /// The layer key that was looked up.
        key: String,
    },

    /// The layer has no feature with the given id.
    #[error("Feature {feature_id} not found in layer {key}")]
    FeatureMissing {
        /// The layer key.
        key: String,
        /// The feature id that was looked up.
        feature_id: String,
    },

    /// Both the single-feature update and the full-collection rewrite
    /// failed.
    #[error("Sync failed via both paths: update: {update_reason}; rewrite: {rewrite_reason}")]
    BothPathsFailed {
        /// Why the single-feature update failed.
        update_reason: String,
        /// Why the full-collection rewrite failed.
        rewrite_reason: String,
    },
}

/// Merges a result into the matching host feature and persists it.
///
/// # Errors
///
/// Returns [`SyncError`] when the layer or feature cannot be located, or
/// when both persistence paths fail.
pub async fn sync_result(
    store: &dyn LayerStore,
    layer_key: &str,
    feature_id: &str,
    result: &DevelopableAreaResult,
    options: &SyncOptions,
) -> Result<(), SyncError> {
    let mut layer = store
        .get(layer_key)
        .await
        .ok_or_else(|| SyncError::LayerMissing {
            key: layer_key.to_string(),
        })?;

    let features = layer
        .get_mut("features")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| SyncError::LayerMissing {
            key: layer_key.to_string(),
        })?;
    let index =
        features
            .iter()
            .position(|feature| matches_id(feature, feature_id))
            .ok_or_else(|| SyncError::FeatureMissing {
                key: layer_key.to_string(),
                feature_id: feature_id.to_string(),
            })?;

    let merged = merge_into_host_feature(&features[index], result, options);

    // Primary: the host's single-feature update.
    let update_reason = match store
        .set(&format!("{layer_key}/{feature_id}"), merged.clone())
        .await
    {
        Ok(()) => return Ok(()),
        Err(reason) => reason,
    };
    log::warn!("Single-feature update failed ({update_reason}); rewriting full layer");

    // Fallback: rewrite the whole collection in place.
    features[index] = merged;
    match store.set(layer_key, layer).await {
        Ok(()) => Ok(()),
        Err(rewrite_reason) => Err(SyncError::BothPathsFailed {
            update_reason,
            rewrite_reason,
        }),
    }
}

fn matches_id(feature: &Value, feature_id: &str) -> bool {
    let top_level = feature.get("id").and_then(Value::as_str) == Some(feature_id);
    let in_properties = feature
        .pointer("/properties/id")
        .and_then(Value::as_str)
        == Some(feature_id);
    top_level || in_properties
}

/// The host feature with the result's geometry and properties merged in.
fn merge_into_host_feature(
    host: &Value,
    result: &DevelopableAreaResult,
    options: &SyncOptions,
) -> Value {
    let geometry = if options.requires_single_polygon {
        collapse_to_largest(&result.feature.geometry)
    } else {
        result.feature.geometry.clone()
    };

    let mut merged = host.clone();
    merged["geometry"] = geometry.to_geojson();

    if !merged["properties"].is_object() {
        merged["properties"] = Value::Object(serde_json::Map::new());
    }
    if let Some(properties) = merged["properties"].as_object_mut() {
        for (key, value) in result.output_properties() {
            properties.insert(key, value);
        }
    }
    merged
}

/// Collapses a `MultiPolygon` to its largest-area constituent.
fn collapse_to_largest(geometry: &AreaGeometry) -> AreaGeometry {
    let AreaGeometry::MultiPolygon(multi) = geometry else {
        return geometry.clone();
    };

    let mut largest: Option<&geo::Polygon<f64>> = None;
    for polygon in &multi.0 {
        let replace = largest
            .is_none_or(|current| polygon.unsigned_area() > current.unsigned_area());
        if replace {
            largest = Some(polygon);
        }
    }
    largest.map_or(AreaGeometry::Empty, |polygon| {
        AreaGeometry::Polygon(polygon.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use geo::{Coord, LineString, MultiPolygon, Polygon};
    use parcel_scope_geometry::AreaFeature;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};
    use tokio::sync::Mutex;

    struct MemoryStore {
        values: Mutex<BTreeMap<String, Value>>,
        failing_keys: BTreeSet<String>,
    }

    impl MemoryStore {
        fn new(layer_key: &str, layer: Value) -> Self {
            Self {
                values: Mutex::new(BTreeMap::from([(layer_key.to_string(), layer)])),
                failing_keys: BTreeSet::new(),
            }
        }

        fn failing(mut self, key: &str) -> Self {
            self.failing_keys.insert(key.to_string());
            self
        }
    }

    #[async_trait]
    impl LayerStore for MemoryStore {
        async fn get(&self, key: &str) -> Option<Value> {
            self.values.lock().await.get(key).cloned()
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), String> {
            if self.failing_keys.contains(key) {
                return Err(format!("write to {key} rejected"));
            }
            self.values.lock().await.insert(key.to_string(), value);
            Ok(())
        }
    }

    fn square(min: f64, max: f64) -> Polygon<f64> {
        Polygon::new(
            LineString(vec![
                Coord { x: min, y: min },
                Coord { x: max, y: min },
                Coord { x: max, y: max },
                Coord { x: min, y: max },
                Coord { x: min, y: min },
            ]),
            vec![],
        )
    }

    fn result_with(geometry: AreaGeometry) -> DevelopableAreaResult {
        DevelopableAreaResult {
            feature: AreaFeature::new(geometry),
            generated_at: Utc::now(),
            subtracted: BTreeMap::from([("flood".to_string(), 1)]),
        }
    }

    fn host_layer() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                { "id": "other", "geometry": null, "properties": { "zoning": "R2" } },
                { "id": "lot-7", "geometry": null, "properties": { "zoning": "R2" } },
            ],
        })
    }

    #[tokio::test]
    async fn primary_path_writes_single_feature_key() {
        let store = MemoryStore::new("layers/parcels", host_layer());
        let result = result_with(AreaGeometry::Polygon(square(0.0, 1.0)));

        sync_result(&store, "layers/parcels", "lot-7", &result, &SyncOptions::default())
            .await
            .unwrap();

        let written = store.get("layers/parcels/lot-7").await.unwrap();
        assert_eq!(written["properties"]["generatedDevelopableArea"], true);
        assert_eq!(written["properties"]["zoning"], "R2");
        // The layer collection itself was not rewritten.
        let layer = store.get("layers/parcels").await.unwrap();
        assert!(layer["features"][1]["properties"]["generatedDevelopableArea"].is_null());
    }

    #[tokio::test]
    async fn fallback_rewrites_full_collection() {
        let store =
            MemoryStore::new("layers/parcels", host_layer()).failing("layers/parcels/lot-7");
        let result = result_with(AreaGeometry::Polygon(square(0.0, 1.0)));

        sync_result(&store, "layers/parcels", "lot-7", &result, &SyncOptions::default())
            .await
            .unwrap();

        let layer = store.get("layers/parcels").await.unwrap();
        assert_eq!(
            layer["features"][1]["properties"]["generatedDevelopableArea"],
            true
        );
        assert_eq!(layer["features"][0]["properties"].get("generatedDevelopableArea"), None);
    }

    #[tokio::test]
    async fn both_paths_failing_reports_both_reasons() {
        let store = MemoryStore::new("layers/parcels", host_layer())
            .failing("layers/parcels/lot-7")
            .failing("layers/parcels");
        let result = result_with(AreaGeometry::Polygon(square(0.0, 1.0)));

        let error = sync_result(
            &store,
            "layers/parcels",
            "lot-7",
            &result,
            &SyncOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, SyncError::BothPathsFailed { .. }));
        // Host layer untouched.
        let layer = store.get("layers/parcels").await.unwrap();
        assert!(layer["features"][1]["properties"]["generatedDevelopableArea"].is_null());
    }

    #[tokio::test]
    async fn multipolygon_collapses_to_largest_part() {
        let store = MemoryStore::new("layers/parcels", host_layer());
        let result = result_with(AreaGeometry::MultiPolygon(MultiPolygon(vec![
            square(0.0, 1.0),
            square(10.0, 20.0),
        ])));

        sync_result(&store, "layers/parcels", "lot-7", &result, &SyncOptions::default())
            .await
            .unwrap();

        let written = store.get("layers/parcels/lot-7").await.unwrap();
        assert_eq!(written["geometry"]["type"], "Polygon");
        let ring = written["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring[0][0], 10.0);
    }

    #[tokio::test]
    async fn missing_feature_is_an_error() {
        let store = MemoryStore::new("layers/parcels", host_layer());
        let result = result_with(AreaGeometry::Polygon(square(0.0, 1.0)));

        let error = sync_result(
            &store,
            "layers/parcels",
            "lot-99",
            &result,
            &SyncOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(error, SyncError::FeatureMissing { .. }));
    }
}
