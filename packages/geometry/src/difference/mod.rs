//! Tiered minuend-minus-subtrahend difference.
//!
//! Three strategies are tried strictly in order, each only when the
//! previous one failed or produced an unusable result:
//!
//! - **Tier A** ([`remote`]): a remote exact geometry service. Server-side
//!   implementations tend to tolerate pathological input better than
//!   client-side libraries, so it goes first when configured.
//! - **Tier B** ([`boolean`]): local exact boolean difference.
//! - **Tier C** ([`point_filter`]): manual point-filtering approximation,
//!   guaranteed to terminate.
//!
//! The engine never fails: if every tier is exhausted, the minuend comes
//! back unchanged and tagged `difference_applied: false` so callers can
//! detect the degradation.

mod boolean;
mod point_filter;
mod remote;

pub use remote::RemoteDifferenceConfig;

use thiserror::Error;

use crate::{AreaFeature, ReducerConfig, validity};

/// Tunable engine parameters, including the nested repair and reduction
/// configs shared with the standalone stages.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Repair parameters used before local boolean operations.
    pub repair: crate::RepairConfig,
    /// Reduction parameters used to bound operand size.
    pub reducer: ReducerConfig,
    /// Remote service configuration; `None` disables Tier A entirely.
    pub remote: Option<RemoteDifferenceConfig>,
    /// Parts below this area are discarded when recombining results.
    pub min_part_area: f64,
}

impl EngineConfig {
    /// Area threshold below which a surviving part is considered
    /// degenerate noise from the boolean kernel.
    pub const DEFAULT_MIN_PART_AREA: f64 = 1e-10;
}

/// Why a single tier failed; never surfaced to callers, only logged.
#[derive(Debug, Error)]
pub(crate) enum TierError {
    /// The remote service returned an error payload.
    #[error("remote service error: {0}")]
    Remote(String),

    /// The remote request itself failed (network, timeout, decode).
    #[error("remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The result was empty although the subtrahend does not cover the
    /// minuend.
    #[error("unexpected empty result")]
    UnexpectedEmpty,
}

/// The tiered difference engine.
pub struct DifferenceEngine {
    config: EngineConfig,
}

impl DifferenceEngine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn new(mut config: EngineConfig) -> Self {
        if config.min_part_area <= 0.0 {
            config.min_part_area = EngineConfig::DEFAULT_MIN_PART_AREA;
        }
        Self { config }
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Computes `minuend − subtrahend`.
    ///
    /// Never fails: the first tier whose output is valid (or explicitly
    /// tagged empty) wins; total failure returns the minuend unchanged,
    /// tagged `difference_applied: false`.
    pub async fn difference(
        &self,
        client: &reqwest::Client,
        minuend: &AreaFeature,
        subtrahend: &AreaFeature,
    ) -> AreaFeature {
        if minuend.geometry.is_empty() || subtrahend.geometry.is_empty() {
            return minuend.clone();
        }

        if let Some(remote_config) = &self.config.remote {
            match remote::difference(client, remote_config, &self.config, minuend, subtrahend)
                .await
            {
                Ok(result) if usable(&result) => return result,
                Ok(_) => log::debug!("Remote difference result unusable, falling through"),
                Err(e) => log::debug!("Remote difference failed, falling through: {e}"),
            }
        }

        match boolean::difference(&self.config, minuend, subtrahend) {
            Ok(result) if usable(&result) => return result,
            Ok(_) => log::debug!("Boolean difference result unusable, falling through"),
            Err(e) => log::debug!("Boolean difference failed, falling through: {e}"),
        }

        match point_filter::difference(minuend, subtrahend) {
            Ok(result) if usable(&result) => return result,
            Ok(_) => log::debug!("Point-filter difference result unusable"),
            Err(e) => log::debug!("Point-filter difference failed: {e}"),
        }

        log::warn!("All difference tiers failed; returning minuend unchanged");
        let mut fallback = minuend.clone();
        fallback.provenance.difference_applied = Some(false);
        fallback
    }
}

/// Selection rule shared by all tiers: the output must pass the validity
/// predicate or be explicitly tagged empty.
fn usable(result: &AreaFeature) -> bool {
    result.provenance.is_empty || validity::check(&result.geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AreaGeometry, DifferenceTier};
    use geo::{Coord, LineString, Polygon};
    use std::time::Duration;

    fn square(min: f64, max: f64) -> AreaFeature {
        AreaFeature::new(AreaGeometry::Polygon(Polygon::new(
            LineString(vec![
                Coord { x: min, y: min },
                Coord { x: max, y: min },
                Coord { x: max, y: max },
                Coord { x: min, y: max },
                Coord { x: min, y: min },
            ]),
            vec![],
        )))
    }

    fn engine() -> DifferenceEngine {
        DifferenceEngine::new(EngineConfig::default())
    }

    #[tokio::test]
    async fn interior_restriction_cuts_a_hole() {
        let client = reqwest::Client::new();
        let parcel = square(0.0, 10.0);
        let restriction = square(2.0, 4.0);

        let result = engine().difference(&client, &parcel, &restriction).await;
        assert_eq!(result.provenance.difference_applied, Some(true));
        assert_eq!(
            result.provenance.difference_tier,
            Some(DifferenceTier::LocalBoolean)
        );
        assert!((result.geometry.unsigned_area() - 96.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn self_difference_is_explicitly_empty() {
        let client = reqwest::Client::new();
        let parcel = square(0.0, 10.0);

        let result = engine().difference(&client, &parcel, &parcel).await;
        assert!(result.provenance.is_empty);
        assert!(result.geometry.is_empty());
    }

    #[tokio::test]
    async fn disjoint_subtrahend_leaves_minuend_intact() {
        let client = reqwest::Client::new();
        let parcel = square(0.0, 10.0);
        let distant = square(100.0, 110.0);

        let result = engine().difference(&client, &parcel, &distant).await;
        assert!(
            (result.geometry.unsigned_area() - parcel.geometry.unsigned_area()).abs() < 1e-9
        );
    }

    #[tokio::test]
    async fn area_never_increases() {
        let client = reqwest::Client::new();
        let parcel = square(0.0, 10.0);
        let overlapping = square(5.0, 15.0);

        let result = engine().difference(&client, &parcel, &overlapping).await;
        assert!(result.geometry.unsigned_area() <= parcel.geometry.unsigned_area() + 1e-12);
        assert!((result.geometry.unsigned_area() - 75.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unreachable_remote_falls_through_to_boolean() {
        // Port 9 (discard) is closed; the Tier A request fails fast and the
        // engine must still produce a valid local result.
        let config = EngineConfig {
            remote: Some(
                RemoteDifferenceConfig::new("http://127.0.0.1:9/difference")
                    .with_timeout(Duration::from_millis(250)),
            ),
            ..EngineConfig::default()
        };
        let client = reqwest::Client::new();
        let parcel = square(0.0, 10.0);
        let restriction = square(2.0, 4.0);

        let result = DifferenceEngine::new(config)
            .difference(&client, &parcel, &restriction)
            .await;
        assert_eq!(
            result.provenance.difference_tier,
            Some(DifferenceTier::LocalBoolean)
        );
        assert!((result.geometry.unsigned_area() - 96.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_subtrahend_is_a_noop() {
        let client = reqwest::Client::new();
        let parcel = square(0.0, 10.0);
        let empty = AreaFeature::new(AreaGeometry::Empty);

        let result = engine().difference(&client, &parcel, &empty).await;
        assert_eq!(result.geometry, parcel.geometry);
        assert_eq!(result.provenance.difference_applied, None);
    }
}
