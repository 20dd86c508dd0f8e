//! The area-builder state machine.
//!
//! Phases: `Initializing → NormalizingBoundary → QueryingSource(k) →
//! SubtractingSource(k) → Finalizing → Done`, with `ErrorTerminal`
//! reachable only from boundary-normalization failure. Sources and, within
//! each, features are processed strictly in order; the accumulated polygon
//! is exclusively owned by one build for its whole duration.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use geo::Intersects;
use parcel_scope_geometry::{
    AreaFeature, DifferenceEngine, EngineConfig, normalize, reduce, validity,
};
use parcel_scope_overlay::RestrictionSourceProvider;
use parcel_scope_overlay_models::QueryEnvelope;

use crate::{BuildError, DevelopableAreaResult};

/// Area change below which a subtraction is not counted as actual.
const AREA_EPSILON: f64 = 1e-12;

/// Build phases, logged as the orchestration advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Build started, nothing validated yet.
    Initializing,
    /// Canonicalizing the parcel boundary.
    NormalizingBoundary,
    /// Fetching one source's restriction features.
    QueryingSource,
    /// Subtracting one source's restriction features.
    SubtractingSource,
    /// Final validity check on the accumulated polygon.
    Finalizing,
    /// Result ready.
    Done,
    /// Fatal boundary failure.
    ErrorTerminal,
}

impl BuildPhase {
    /// Phase name used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::NormalizingBoundary => "normalizing-boundary",
            Self::QueryingSource => "querying-source",
            Self::SubtractingSource => "subtracting-source",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::ErrorTerminal => "error-terminal",
        }
    }
}

fn enter(phase: BuildPhase) {
    log::debug!("Build phase: {}", phase.label());
}

/// External cancellation flag, honored only between restriction-feature
/// iterations so any single difference attempt runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// A fresh, unraised flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag; the running build stops before its next
    /// restriction feature.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Builder configuration.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Difference engine configuration (repair, reduction, remote tier).
    pub engine: EngineConfig,
    /// Padding around the boundary's bounding box for source queries.
    /// Generous on purpose: the bounding pre-check discards the misses
    /// cheaply, while a tight envelope would clip restrictions that only
    /// graze the parcel.
    pub envelope_padding_km: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            envelope_padding_km: 1.0,
        }
    }
}

/// Orchestrates one developable-area computation per call.
pub struct DevelopableAreaBuilder {
    engine: DifferenceEngine,
    envelope_padding_km: f64,
}

impl DevelopableAreaBuilder {
    /// Creates a builder with the given configuration.
    #[must_use]
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            engine: DifferenceEngine::new(config.engine),
            envelope_padding_km: config.envelope_padding_km,
        }
    }

    /// Computes the developable area for a parcel boundary.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Boundary`] when the parcel boundary cannot
    /// be normalized, and [`BuildError::Cancelled`] when the cancellation
    /// flag is raised. Restriction source and feature failures never
    /// abort the run; they degrade to zero effect.
    pub async fn build(
        &self,
        client: &reqwest::Client,
        provider: &dyn RestrictionSourceProvider,
        boundary: &serde_json::Value,
        cancel: Option<&CancellationFlag>,
    ) -> Result<DevelopableAreaResult, BuildError> {
        enter(BuildPhase::Initializing);

        enter(BuildPhase::NormalizingBoundary);
        let boundary_feature = match normalize::normalize_feature(boundary) {
            Ok(feature) => feature,
            Err(e) => {
                enter(BuildPhase::ErrorTerminal);
                return Err(BuildError::Boundary(e));
            }
        };

        let envelope = self.query_envelope(&boundary_feature);
        let mut accumulated = boundary_feature.clone();
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut any_degraded = false;

        for source in provider.sources() {
            enter(BuildPhase::QueryingSource);
            log::info!("{}: querying restriction features", source.id);
            let features = match provider.query(client, &source, &envelope).await {
                Ok(features) => features,
                Err(e) => {
                    log::warn!("{}: query failed, source has zero effect: {e}", source.id);
                    counts.insert(source.id.clone(), 0);
                    continue;
                }
            };
            log::info!("{}: fetched {} candidate features", source.id, features.len());

            enter(BuildPhase::SubtractingSource);
            let mut subtracted = 0u64;
            for raw in &features {
                if cancel.is_some_and(CancellationFlag::is_cancelled) {
                    log::info!("Build cancelled before next restriction feature");
                    return Err(BuildError::Cancelled);
                }

                let Some(restriction) = self.prepare_restriction(&source.id, raw, &boundary_feature)
                else {
                    continue;
                };

                // Cheap bounding pre-check: most fetched features miss the
                // accumulated polygon because the envelope is generous.
                let overlaps = match (
                    accumulated.geometry.bounding_rect(),
                    restriction.geometry.bounding_rect(),
                ) {
                    (Some(acc_rect), Some(restriction_rect)) => {
                        acc_rect.intersects(&restriction_rect)
                    }
                    _ => false,
                };
                if !overlaps {
                    continue;
                }

                let area_before = accumulated.geometry.unsigned_area();
                let result = self
                    .engine
                    .difference(client, &accumulated, &restriction)
                    .await;

                if result.provenance.difference_applied == Some(false) {
                    // All tiers failed: keep the accumulated geometry and
                    // remember the degradation for the final tagging.
                    log::warn!("{}: difference degraded, geometry unchanged", source.id);
                    any_degraded = true;
                    continue;
                }

                let actual = result.provenance.is_empty
                    || area_before - result.geometry.unsigned_area() > AREA_EPSILON;
                accumulated = result;
                if actual {
                    subtracted += 1;
                }
            }

            log::info!(
                "{}: subtracted {subtracted} of {} features",
                source.id,
                features.len()
            );
            counts.insert(source.id.clone(), subtracted);
        }

        enter(BuildPhase::Finalizing);
        let mut final_feature =
            match validity::repair(&accumulated, &self.engine.config().repair) {
                Ok(repaired) => repaired,
                Err(e) => {
                    // A broken geometry is never surfaced: fall back to the
                    // parcel boundary and mark the result degraded.
                    log::warn!("Final repair failed, falling back to parcel boundary: {e}");
                    any_degraded = true;
                    boundary_feature
                }
            };
        final_feature.provenance.degraded |= any_degraded;

        enter(BuildPhase::Done);
        Ok(DevelopableAreaResult {
            feature: final_feature,
            generated_at: chrono::Utc::now(),
            subtracted: counts,
        })
    }

    /// Normalizes and, when oversized, pre-reduces one raw restriction
    /// feature. `None` skips the feature.
    fn prepare_restriction(
        &self,
        source_id: &str,
        raw: &serde_json::Value,
        boundary: &AreaFeature,
    ) -> Option<AreaFeature> {
        let restriction = match normalize::normalize_feature(raw) {
            Ok(feature) => feature,
            Err(e) => {
                log::debug!("{source_id}: skipping restriction feature: {e}");
                return None;
            }
        };
        if restriction.geometry.is_empty() {
            return None;
        }

        let reducer = &self.engine.config().reducer;
        if restriction.geometry.vertex_count() <= reducer.vertex_threshold {
            return Some(restriction);
        }
        let simplified = reduce::simplify_if_large(&restriction, reducer);
        Some(reduce::clip_to_buffer(
            &simplified,
            &boundary.geometry,
            reducer,
        ))
    }

    /// The generous query envelope around the normalized boundary.
    fn query_envelope(&self, boundary: &AreaFeature) -> QueryEnvelope {
        let padding = self.envelope_padding_km / reduce::KM_PER_DEGREE;
        boundary.geometry.bounding_rect().map_or(
            QueryEnvelope {
                xmin: 0.0,
                ymin: 0.0,
                xmax: 0.0,
                ymax: 0.0,
            },
            |rect| QueryEnvelope {
                xmin: rect.min().x - padding,
                ymin: rect.min().y - padding,
                xmax: rect.max().x + padding,
                ymax: rect.max().y + padding,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parcel_scope_overlay::OverlayError;
    use parcel_scope_overlay_models::{RestrictionFetcherConfig, RestrictionSource};
    use serde_json::{Value, json};
    use std::collections::BTreeSet;

    /// Provider serving canned features from memory, with optional
    /// per-source failures.
    struct StaticProvider {
        sources: Vec<RestrictionSource>,
        features: BTreeMap<String, Vec<Value>>,
        failing: BTreeSet<String>,
    }

    impl StaticProvider {
        fn new() -> Self {
            Self {
                sources: Vec::new(),
                features: BTreeMap::new(),
                failing: BTreeSet::new(),
            }
        }

        fn with_source(mut self, id: &str, features: Vec<Value>) -> Self {
            self.sources.push(source(id));
            self.features.insert(id.to_string(), features);
            self
        }

        fn with_failing_source(mut self, id: &str) -> Self {
            self.sources.push(source(id));
            self.failing.insert(id.to_string());
            self
        }
    }

    fn source(id: &str) -> RestrictionSource {
        RestrictionSource {
            id: id.to_string(),
            name: id.to_string(),
            fetcher: RestrictionFetcherConfig::GeojsonUrl {
                url: "memory://unused".to_string(),
            },
        }
    }

    #[async_trait]
    impl RestrictionSourceProvider for StaticProvider {
        fn sources(&self) -> Vec<RestrictionSource> {
            self.sources.clone()
        }

        async fn query(
            &self,
            _client: &reqwest::Client,
            source: &RestrictionSource,
            _envelope: &QueryEnvelope,
        ) -> Result<Vec<Value>, OverlayError> {
            if self.failing.contains(&source.id) {
                return Err(OverlayError::Conversion {
                    message: "simulated outage".to_string(),
                });
            }
            Ok(self.features.get(&source.id).cloned().unwrap_or_default())
        }
    }

    fn square_feature(min: f64, max: f64) -> Value {
        json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[min, min], [max, min], [max, max], [min, max], [min, min]]],
            },
            "properties": {},
        })
    }

    fn builder() -> DevelopableAreaBuilder {
        DevelopableAreaBuilder::new(BuilderConfig::default())
    }

    #[tokio::test]
    async fn interior_restriction_is_subtracted_and_counted() {
        let provider =
            StaticProvider::new().with_source("biodiversity", vec![square_feature(2.0, 4.0)]);
        let result = builder()
            .build(
                &reqwest::Client::new(),
                &provider,
                &square_feature(0.0, 10.0),
                None,
            )
            .await
            .unwrap();

        assert!((result.feature.geometry.unsigned_area() - 96.0).abs() < 1e-9);
        assert_eq!(result.subtracted["biodiversity"], 1);
        assert!(!result.feature.provenance.degraded);
    }

    #[tokio::test]
    async fn disjoint_restriction_skips_difference_entirely() {
        let provider = StaticProvider::new().with_source("flood", vec![square_feature(100.0, 110.0)]);
        let result = builder()
            .build(
                &reqwest::Client::new(),
                &provider,
                &square_feature(0.0, 10.0),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.subtracted["flood"], 0);
        assert!((result.feature.geometry.unsigned_area() - 100.0).abs() < 1e-9);
        // The skip happens before any tier runs, so no tier tag appears.
        assert_eq!(result.feature.provenance.difference_tier, None);
    }

    #[tokio::test]
    async fn failing_source_degrades_to_zero_effect() {
        let provider = StaticProvider::new()
            .with_failing_source("heritage")
            .with_source("flood", vec![square_feature(2.0, 4.0)]);
        let result = builder()
            .build(
                &reqwest::Client::new(),
                &provider,
                &square_feature(0.0, 10.0),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.subtracted["heritage"], 0);
        assert_eq!(result.subtracted["flood"], 1);
        assert!((result.feature.geometry.unsigned_area() - 96.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn malformed_restriction_feature_is_skipped() {
        let provider = StaticProvider::new().with_source(
            "easements",
            vec![json!({ "type": "Feature", "geometry": null, "properties": {} })],
        );
        let result = builder()
            .build(
                &reqwest::Client::new(),
                &provider,
                &square_feature(0.0, 10.0),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.subtracted["easements"], 0);
        assert!((result.feature.geometry.unsigned_area() - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn malformed_boundary_is_fatal() {
        let provider = StaticProvider::new();
        let result = builder()
            .build(
                &reqwest::Client::new(),
                &provider,
                &json!({ "type": "Feature", "geometry": null, "properties": {} }),
                None,
            )
            .await;
        assert!(matches!(result, Err(BuildError::Boundary(_))));
    }

    #[tokio::test]
    async fn raised_flag_cancels_between_features() {
        let provider =
            StaticProvider::new().with_source("flood", vec![square_feature(2.0, 4.0)]);
        let flag = CancellationFlag::new();
        flag.cancel();
        let result = builder()
            .build(
                &reqwest::Client::new(),
                &provider,
                &square_feature(0.0, 10.0),
                Some(&flag),
            )
            .await;
        assert!(matches!(result, Err(BuildError::Cancelled)));
    }

    #[tokio::test]
    async fn area_is_monotonically_non_increasing_across_sources() {
        let provider = StaticProvider::new()
            .with_source("biodiversity", vec![square_feature(0.0, 3.0)])
            .with_source("flood", vec![square_feature(5.0, 8.0)]);
        let result = builder()
            .build(
                &reqwest::Client::new(),
                &provider,
                &square_feature(0.0, 10.0),
                None,
            )
            .await
            .unwrap();

        let expected = 100.0 - 9.0 - 9.0;
        assert!((result.feature.geometry.unsigned_area() - expected).abs() < 1e-9);
        assert_eq!(result.subtracted["biodiversity"], 1);
        assert_eq!(result.subtracted["flood"], 1);
    }

    #[tokio::test]
    async fn full_cover_restriction_yields_empty_result() {
        let provider =
            StaticProvider::new().with_source("flood", vec![square_feature(0.0, 10.0)]);
        let result = builder()
            .build(
                &reqwest::Client::new(),
                &provider,
                &square_feature(0.0, 10.0),
                None,
            )
            .await
            .unwrap();

        assert!(result.feature.provenance.is_empty);
        assert_eq!(result.subtracted["flood"], 1);
    }
}
