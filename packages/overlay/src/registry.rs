//! Compile-time registry of restriction overlay sources.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a new overlay category requires creating a TOML file in
//! `sources/` and adding a corresponding entry here; nothing in the
//! difference engine changes.

use parcel_scope_overlay_models::RestrictionSource;

/// Number of registered restriction sources. Updated when new sources
/// are added. Enforced by a test.
#[cfg(test)]
const EXPECTED_SOURCE_COUNT: usize = 4;

/// Embedded TOML source definitions.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    ("biodiversity", include_str!("../sources/biodiversity.toml")),
    ("flood", include_str!("../sources/flood.toml")),
    ("heritage", include_str!("../sources/heritage.toml")),
    ("easements", include_str!("../sources/easements.toml")),
];

/// Returns all registered restriction sources.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught during CI.
#[must_use]
pub fn all_sources() -> Vec<RestrictionSource> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse restriction source '{name}': {e}"))
        })
        .collect()
}
