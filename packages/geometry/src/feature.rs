//! Canonical polygonal feature model shared by every pipeline stage.
//!
//! An [`AreaFeature`] is a polygonal geometry plus its `GeoJSON` properties
//! plus the [`Provenance`] tags accumulated so far. Tags are additive:
//! stages union them forward and never drop one.

use geo::{Area, BoundingRect, MultiPolygon, Polygon, Rect};
use serde_json::{Map, Value};

/// Which fallback tier produced a difference result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferenceTier {
    /// Remote exact geometry service.
    Remote,
    /// Local exact boolean difference.
    LocalBoolean,
    /// Manual point-filtering approximation.
    PointFilter,
}

impl DifferenceTier {
    /// Short label used in serialized properties.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Remote => "A",
            Self::LocalBoolean => "B",
            Self::PointFilter => "C",
        }
    }
}

/// Additive provenance tags recording what the pipeline did to a feature.
///
/// Tags survive every stage: merging unions boolean tags and keeps the most
/// recent tier/outcome markers. A downstream consumer can always tell
/// whether a geometry was repaired, approximated, or degraded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Provenance {
    /// Validity had to be restored by a repair strategy.
    pub repaired: bool,
    /// Vertex count was reduced by simplification.
    pub simplified: bool,
    /// Geometry was clipped to a neighbourhood of the boundary.
    pub clipped: bool,
    /// Geometry is a lossy over- or under-approximation.
    pub approximate: bool,
    /// Geometry is explicitly empty (fully subtracted away).
    pub is_empty: bool,
    /// A stage failed and a fallback geometry was substituted.
    pub degraded: bool,
    /// Tier that produced the most recent difference result.
    pub difference_tier: Option<DifferenceTier>,
    /// Whether the most recent difference attempt actually applied.
    pub difference_applied: Option<bool>,
}

impl Provenance {
    /// Unions `other` into `self`. Boolean tags accumulate; the tier and
    /// applied markers take the most recent `Some`.
    pub fn merge(&mut self, other: Self) {
        self.repaired |= other.repaired;
        self.simplified |= other.simplified;
        self.clipped |= other.clipped;
        self.approximate |= other.approximate;
        self.is_empty |= other.is_empty;
        self.degraded |= other.degraded;
        self.difference_tier = other.difference_tier.or(self.difference_tier);
        self.difference_applied = other.difference_applied.or(self.difference_applied);
    }

    /// Writes the set tags into a `GeoJSON` properties map.
    ///
    /// Only tags that are actually set are written, so untouched features
    /// serialize without provenance noise.
    pub fn apply_to_properties(&self, properties: &mut Map<String, Value>) {
        for (key, set) in [
            ("repaired", self.repaired),
            ("simplified", self.simplified),
            ("clipped", self.clipped),
            ("approximate", self.approximate),
            ("isEmpty", self.is_empty),
            ("degraded", self.degraded),
        ] {
            if set {
                properties.insert(key.to_string(), Value::Bool(true));
            }
        }
        if let Some(tier) = self.difference_tier {
            properties.insert(
                "differenceTier".to_string(),
                Value::String(tier.label().to_string()),
            );
        }
        if let Some(applied) = self.difference_applied {
            properties.insert("differenceApplied".to_string(), Value::Bool(applied));
        }
    }
}

/// Polygonal geometry of a feature.
///
/// `Empty` is an explicit state, never an implicit `None`: a fully
/// subtracted feature is tagged rather than silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaGeometry {
    /// Single polygon (outer ring plus optional holes).
    Polygon(Polygon<f64>),
    /// Several non-overlapping polygons.
    MultiPolygon(MultiPolygon<f64>),
    /// Explicitly empty geometry.
    Empty,
}

impl AreaGeometry {
    /// Whether this is the explicit empty geometry.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Total number of vertices across all rings.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.polygons()
            .iter()
            .map(|polygon| {
                polygon.exterior().0.len()
                    + polygon
                        .interiors()
                        .iter()
                        .map(|ring| ring.0.len())
                        .sum::<usize>()
            })
            .sum()
    }

    /// Unsigned planar area. Zero for empty geometry.
    #[must_use]
    pub fn unsigned_area(&self) -> f64 {
        match self {
            Self::Polygon(polygon) => polygon.unsigned_area(),
            Self::MultiPolygon(multi) => multi.unsigned_area(),
            Self::Empty => 0.0,
        }
    }

    /// Axis-aligned bounding rectangle, if the geometry has any extent.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::Polygon(polygon) => polygon.bounding_rect(),
            Self::MultiPolygon(multi) => multi.bounding_rect(),
            Self::Empty => None,
        }
    }

    /// Decomposes into constituent polygons (empty vec for `Empty`).
    #[must_use]
    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        match self {
            Self::Polygon(polygon) => vec![polygon.clone()],
            Self::MultiPolygon(multi) => multi.0.clone(),
            Self::Empty => Vec::new(),
        }
    }

    /// Recombines constituent polygons: none → `Empty`, one → `Polygon`,
    /// several → `MultiPolygon`.
    #[must_use]
    pub fn from_polygons(mut parts: Vec<Polygon<f64>>) -> Self {
        match parts.len() {
            0 => Self::Empty,
            1 => Self::Polygon(parts.remove(0)),
            _ => Self::MultiPolygon(MultiPolygon(parts)),
        }
    }

    /// Converts to a `GeoJSON` geometry value (`null` for empty).
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let geojson_value = match self {
            Self::Polygon(polygon) => geojson::Value::from(polygon),
            Self::MultiPolygon(multi) => geojson::Value::from(multi),
            Self::Empty => return Value::Null,
        };
        serde_json::to_value(geojson::Geometry::new(geojson_value)).unwrap_or(Value::Null)
    }
}

/// A polygonal feature flowing through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaFeature {
    /// The feature's geometry.
    pub geometry: AreaGeometry,
    /// `GeoJSON` properties carried through unchanged.
    pub properties: Map<String, Value>,
    /// Accumulated provenance tags.
    pub provenance: Provenance,
}

impl AreaFeature {
    /// Wraps a geometry with empty properties and no provenance.
    #[must_use]
    pub fn new(geometry: AreaGeometry) -> Self {
        Self {
            geometry,
            properties: Map::new(),
            provenance: Provenance::default(),
        }
    }

    /// Wraps a geometry with the given properties.
    #[must_use]
    pub fn with_properties(geometry: AreaGeometry, properties: Map<String, Value>) -> Self {
        Self {
            geometry,
            properties,
            provenance: Provenance::default(),
        }
    }

    /// An explicitly empty feature inheriting `properties` and `provenance`
    /// from a predecessor, tagged `is_empty`.
    #[must_use]
    pub fn empty_from(predecessor: &Self) -> Self {
        let mut provenance = predecessor.provenance;
        provenance.is_empty = true;
        Self {
            geometry: AreaGeometry::Empty,
            properties: predecessor.properties.clone(),
            provenance,
        }
    }

    /// Serializes to a `GeoJSON` Feature value with provenance tags merged
    /// into the properties.
    #[must_use]
    pub fn to_geojson_feature(&self) -> Value {
        let mut properties = self.properties.clone();
        self.provenance.apply_to_properties(&mut properties);
        serde_json::json!({
            "type": "Feature",
            "geometry": self.geometry.to_geojson(),
            "properties": properties,
        })
    }
}
