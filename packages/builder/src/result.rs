//! The derived developable-area result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parcel_scope_geometry::AreaFeature;
use serde_json::{Map, Value, json};

/// A computed developable area: the derived feature, a generation
/// timestamp, and per-source counts of how many restriction features were
/// actually subtracted (not merely fetched).
#[derive(Debug, Clone)]
pub struct DevelopableAreaResult {
    /// The developable-area feature.
    pub feature: AreaFeature,
    /// When the computation finished.
    pub generated_at: DateTime<Utc>,
    /// Actual subtractions per source id.
    pub subtracted: BTreeMap<String, u64>,
}

impl DevelopableAreaResult {
    /// The marker and bookkeeping properties written into the output
    /// feature.
    #[must_use]
    pub fn output_properties(&self) -> Map<String, Value> {
        let mut properties = self.feature.properties.clone();
        self.feature.provenance.apply_to_properties(&mut properties);
        properties.insert("generatedDevelopableArea".to_string(), Value::Bool(true));
        properties.insert(
            "generatedTimestamp".to_string(),
            Value::String(self.generated_at.to_rfc3339()),
        );
        properties.insert("restrictedAreas".to_string(), json!(self.subtracted));
        properties
    }

    /// Serializes to a `GeoJSON` `FeatureCollection` with exactly one
    /// feature.
    #[must_use]
    pub fn to_feature_collection(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": self.feature.geometry.to_geojson(),
                "properties": self.output_properties(),
            }],
        })
    }
}
