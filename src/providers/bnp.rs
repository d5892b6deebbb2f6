//! BNP / PORBASE — Biblioteca Nacional de Portugal and the Portuguese union
//! catalog. URN HTTP service returning MODS XML; no key required.
//!
//! PORBASE (union catalog) is used for broader coverage than BNP alone.

use crate::constants::BNP;
use crate::error::{ProviderError, Result};
use crate::parsers::mods::parse_mods_record;
use crate::parsers::text::{ensure_lookup_isbn, normalize_isbn};
use crate::parsers::xml;
use crate::providers::check_status;
use crate::types::{
    BookProvider, ProviderHit, ProviderKind, SearchOutcome, SearchParams, SearchResultItem,
};
use std::time::Duration;
use tracing::instrument;

const BASE_URL: &str = "https://urn.porbase.org/isbn/mods/xml";

pub struct BnpProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl BnpProvider {
    pub fn new(timeout: Duration) -> Self {
        BnpProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl BookProvider for BnpProvider {
    fn code(&self) -> &'static str {
        BNP
    }

    fn name(&self) -> &'static str {
        "BNP / PORBASE (Portugal)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("PT")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let response = self
            .client
            .get(BASE_URL)
            .query(&[("id", clean.as_str())])
            .header("Accept", "application/xml, text/xml")
            .timeout(self.timeout)
            .send()
            .await?;
        let body = check_status(response)?.text().await?;

        // "Registo inexistente" = record does not exist
        if body.contains("inexistente") {
            return Err(ProviderError::isbn_not_found());
        }
        if !body.contains("<mods") && !body.contains("<modsCollection") {
            return Err(ProviderError::Parse("Invalid response format".to_string()));
        }

        let mut record = parse_mods_record(&body);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        // The record's URI identifier makes the best source URL
        let record_uri = xml::element_text_with_attr(&body, "identifier", "type", "uri");
        let source_url = record_uri.unwrap_or_else(|| {
            format!(
                "https://porbase.bnportugal.gov.pt/ipac20/ipac.jsp?menu=search&aspect=basic_search&npp=20&ipp=20&spp=20&profile=porbase&index=ISBN&term={}",
                clean
            )
        });

        Ok(ProviderHit {
            record,
            source_url: Some(source_url),
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    /// The URN service is an ISBN resolver, so field search only works when
    /// an ISBN is supplied; it then wraps the single `search` hit.
    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let Some(isbn) = params.isbn.as_deref().map(normalize_isbn) else {
            return Err(ProviderError::Unsupported(
                "BNP/PORBASE only supports ISBN lookup".to_string(),
            ));
        };

        let hit = self.search(&isbn).await?;
        let item = SearchResultItem::from_record(&hit.record, isbn);
        Ok(SearchOutcome {
            items: vec![item],
            total: 1,
            has_more: false,
        })
    }
}
