//! Display-time deduplication of cited sources.

use crate::models::Source;
use std::collections::HashSet;

/// Maximum number of sources shown under an answer.
pub const MAX_DISPLAYED_SOURCES: usize = 4;

/// First occurrence of each distinct URI, in original order.
///
/// URIs are compared as exact strings; no scheme, case or trailing-slash
/// normalization is applied.
pub fn unique_sources(sources: &[Source]) -> Vec<Source> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .filter(|source| seen.insert(source.uri.as_str()))
        .cloned()
        .collect()
}

/// Unique sources capped at [`MAX_DISPLAYED_SOURCES`] for display.
pub fn dedupe(sources: &[Source]) -> Vec<Source> {
    let mut unique = unique_sources(sources);
    unique.truncate(MAX_DISPLAYED_SOURCES);
    unique
}
