//! Static, read-only registry mapping source codes to adapter instances.
//!
//! Built once at startup and injected into the orchestrator — there is no
//! ambient global provider table. Dispatch by code converts an unknown code
//! into a uniform "Provider not implemented" failure instead of a panic.

use crate::config::{Config, Credentials};
use crate::error::{ProviderError, Result};
use crate::providers;
use crate::types::{BookProvider, ProviderHit, SearchOutcome, SearchParams};
use std::collections::HashMap;

pub struct ProviderRegistry {
    providers: HashMap<&'static str, Box<dyn BookProvider>>,
}

impl ProviderRegistry {
    /// Build the full registry of implemented sources.
    pub fn new(config: &Config, credentials: &Credentials) -> Self {
        let timeout = config.http_timeout();
        let mut all: Vec<Box<dyn BookProvider>> = Vec::new();

        for sru in providers::sru::national_library_providers(timeout) {
            all.push(Box::new(sru));
        }
        all.push(Box::new(providers::libris::LibrisProvider::new(timeout)));
        all.push(Box::new(providers::cerl_hpb::CerlHpbProvider::new()));
        all.push(Box::new(providers::kb_nl::KbNlProvider::new(timeout)));
        all.push(Box::new(providers::library_hub::LibraryHubProvider::new(timeout)));
        all.push(Box::new(providers::bnp::BnpProvider::new(timeout)));
        all.push(Box::new(providers::ndl::NdlProvider::new(timeout)));
        all.push(Box::new(providers::danbib::DanbibProvider::new()));
        all.push(Box::new(providers::open_library::OpenLibraryProvider::new(timeout)));
        all.push(Box::new(providers::google_books::GoogleBooksProvider::new(timeout)));
        all.push(Box::new(providers::finna::FinnaProvider::new(timeout)));
        all.push(Box::new(providers::opac_sbn::OpacSbnProvider::new(timeout)));
        all.push(Box::new(providers::trove::TroveProvider::new(
            credentials.trove_api_key.clone(),
            timeout,
        )));
        all.push(Box::new(providers::europeana::EuropeanaProvider::new(
            credentials.europeana_api_key.clone(),
            timeout,
        )));
        all.push(Box::new(providers::hathitrust::HathiTrustProvider::new()));
        all.push(Box::new(providers::cobiss::CobissProvider::new()));
        all.push(Box::new(providers::bol_nl::BolNlProvider::new(timeout)));
        all.push(Box::new(providers::standaard::StandaardProvider::new(timeout)));

        Self::from_providers(all)
    }

    /// Build a registry from an explicit adapter list. Used by `new` and by
    /// tests that inject stub providers.
    pub fn from_providers(list: Vec<Box<dyn BookProvider>>) -> Self {
        let mut providers = HashMap::new();
        for provider in list {
            providers.insert(provider.code(), provider);
        }
        ProviderRegistry { providers }
    }

    pub fn get(&self, code: &str) -> Option<&dyn BookProvider> {
        self.providers.get(code).map(|p| p.as_ref())
    }

    /// Codes with an implemented adapter, sorted for stable output.
    pub fn implemented_codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<&'static str> = self.providers.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    pub fn is_implemented(&self, code: &str) -> bool {
        self.providers.contains_key(code)
    }

    pub fn supports_field_search(&self, code: &str) -> bool {
        self.get(code).is_some_and(|p| p.supports_field_search())
    }

    pub fn supports_details(&self, code: &str) -> bool {
        self.get(code).is_some_and(|p| p.supports_details())
    }

    /// ISBN lookup on a specific source.
    pub async fn search(&self, code: &str, isbn: &str) -> Result<ProviderHit> {
        match self.get(code) {
            Some(provider) => provider.search(isbn).await,
            None => Err(ProviderError::NotImplemented),
        }
    }

    /// Field search on a specific source; unsupported sources report a
    /// capability error rather than panicking.
    pub async fn search_by_fields(
        &self,
        code: &str,
        params: &SearchParams,
    ) -> Result<SearchOutcome> {
        match self.get(code) {
            Some(provider) => {
                if !provider.supports_field_search() {
                    return Err(ProviderError::Unsupported(format!(
                        "{} does not support field search",
                        code
                    )));
                }
                provider.search_by_fields(params).await
            }
            None => Err(ProviderError::NotImplemented),
        }
    }

    /// Detail fetch on a specific source.
    pub async fn get_details(&self, code: &str, edition_key: &str) -> Result<ProviderHit> {
        match self.get(code) {
            Some(provider) => {
                if !provider.supports_details() {
                    return Err(ProviderError::Unsupported(format!(
                        "{} does not support detail lookup",
                        code
                    )));
                }
                provider.get_details(edition_key).await
            }
            None => Err(ProviderError::NotImplemented),
        }
    }
}
