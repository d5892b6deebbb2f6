//! Sequences identifier lookups across a caller-supplied, priority-ordered
//! list of active sources, and dispatches single-source field search and
//! detail fetch.
//!
//! First success wins, strictly: once a source returns a usable record, no
//! later source is consulted, even if it would have returned richer data.

use crate::error::Result;
use crate::registry::ProviderRegistry;
use crate::types::{ActiveSource, BookRecord, ProviderHit, SearchOutcome, SearchParams};
use crate::parsers::text::normalize_isbn;
use std::collections::HashMap;
use tracing::{info, warn};

/// Winning result of a multi-source lookup.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub provider: String,
    pub record: BookRecord,
    pub source_url: Option<String>,
}

/// Outcome of a multi-source ISBN lookup: the winning result (if any), the
/// source codes actually called, and per-source error strings for
/// diagnostics. Errors are never surfaced as a hard failure.
#[derive(Debug, Default)]
pub struct IsbnLookup {
    pub result: Option<LookupResult>,
    pub attempted: Vec<String>,
    pub errors: HashMap<String, String>,
}

pub struct Orchestrator {
    registry: ProviderRegistry,
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry) -> Self {
        Orchestrator { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Try each active source in ascending priority order and stop at the
    /// first usable record.
    ///
    /// The caller's list is never mutated; a filtered copy is sorted with a
    /// stable sort, so equal priorities keep their insertion order. Sources
    /// without an implemented adapter are recorded in `errors` but not in
    /// `attempted`, and never abort the loop.
    pub async fn search_isbn(&self, isbn: &str, active_sources: &[ActiveSource]) -> IsbnLookup {
        let clean = normalize_isbn(isbn);
        let mut lookup = IsbnLookup::default();

        let mut candidates: Vec<&ActiveSource> =
            active_sources.iter().filter(|s| s.is_active).collect();
        candidates.sort_by_key(|s| s.priority);

        for source in candidates {
            if !self.registry.is_implemented(&source.code) {
                lookup
                    .errors
                    .insert(source.code.clone(), "Provider not implemented".to_string());
                continue;
            }

            lookup.attempted.push(source.code.clone());

            match self.registry.search(&source.code, &clean).await {
                Ok(hit) => {
                    info!(source = %source.code, "ISBN lookup succeeded");
                    lookup.result = Some(LookupResult {
                        provider: source.code.clone(),
                        record: hit.record,
                        source_url: hit.source_url,
                    });
                    return lookup;
                }
                Err(e) => {
                    warn!(source = %source.code, error = %e, "source lookup failed, trying next");
                    lookup.errors.insert(source.code.clone(), e.to_string());
                }
            }
        }

        lookup
    }

    /// Single-source field search.
    pub async fn search_by_fields(
        &self,
        code: &str,
        params: &SearchParams,
    ) -> Result<SearchOutcome> {
        self.registry.search_by_fields(code, params).await
    }

    /// Single-source detail fetch by edition key.
    pub async fn get_details(&self, code: &str, edition_key: &str) -> Result<ProviderHit> {
        self.registry.get_details(code, edition_key).await
    }
}
