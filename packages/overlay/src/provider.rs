//! Injected restriction-source seam for the area builder.
//!
//! The orchestration receives a [`RestrictionSourceProvider`] rather than
//! reading any ambient layer state, so tests and alternative hosts can
//! substitute their own source lists and query transports.

use async_trait::async_trait;
use parcel_scope_overlay_models::{QueryEnvelope, RestrictionSource};

use crate::OverlayError;

/// Supplies restriction sources and executes their envelope queries.
#[async_trait]
pub trait RestrictionSourceProvider: Send + Sync {
    /// The restriction sources to subtract, in subtraction order.
    fn sources(&self) -> Vec<RestrictionSource>;

    /// Fetches the raw `GeoJSON` features for one source within an
    /// envelope.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError`] if the query fails; the caller degrades
    /// that source to zero effect rather than aborting.
    async fn query(
        &self,
        client: &reqwest::Client,
        source: &RestrictionSource,
        envelope: &QueryEnvelope,
    ) -> Result<Vec<serde_json::Value>, OverlayError>;
}

/// Provider backed by the embedded TOML registry and HTTP fetchers.
#[derive(Debug, Clone, Default)]
pub struct RegistryProvider {
    /// When non-empty, restricts the registry to these source ids.
    only: Vec<String>,
}

impl RegistryProvider {
    /// Provider over the full embedded registry.
    #[must_use]
    pub const fn new() -> Self {
        Self { only: Vec::new() }
    }

    /// Provider restricted to the given source ids (registry order is
    /// preserved; unknown ids are ignored).
    #[must_use]
    pub fn with_sources(only: Vec<String>) -> Self {
        Self { only }
    }
}

#[async_trait]
impl RestrictionSourceProvider for RegistryProvider {
    fn sources(&self) -> Vec<RestrictionSource> {
        crate::registry::all_sources()
            .into_iter()
            .filter(|source| self.only.is_empty() || self.only.iter().any(|id| id == &source.id))
            .collect()
    }

    async fn query(
        &self,
        client: &reqwest::Client,
        source: &RestrictionSource,
        envelope: &QueryEnvelope,
    ) -> Result<Vec<serde_json::Value>, OverlayError> {
        crate::fetchers::fetch_features(client, source, envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_provider_exposes_all_sources_by_default() {
        let provider = RegistryProvider::new();
        assert_eq!(provider.sources().len(), 4);
    }

    #[test]
    fn source_filter_preserves_registry_order() {
        let provider = RegistryProvider::with_sources(vec![
            "flood".to_string(),
            "biodiversity".to_string(),
            "unknown".to_string(),
        ]);
        let ids: Vec<String> = provider
            .sources()
            .iter()
            .map(|source| source.id.clone())
            .collect();
        assert_eq!(ids, vec!["biodiversity", "flood"]);
    }
}
