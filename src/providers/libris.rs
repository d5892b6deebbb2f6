//! LIBRIS (Sweden) — the Xsearch lightweight API, which returns MARCXML
//! outside the SRU envelope.

use crate::constants::LIBRIS;
use crate::error::{ProviderError, Result};
use crate::parsers::marc;
use crate::parsers::text::{ensure_lookup_isbn, normalize_isbn};
use crate::providers::check_status;
use crate::types::{
    BookProvider, ProviderHit, ProviderKind, SearchOutcome, SearchParams, SearchResultItem,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::instrument;

const XSEARCH_BASE: &str = "http://libris.kb.se/xsearch";

static TOTAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"records="(\d+)""#).unwrap());

pub struct LibrisProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl LibrisProvider {
    pub fn new(timeout: Duration) -> Self {
        LibrisProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn fetch(&self, query: &str, n: usize, start: usize) -> Result<String> {
        let response = self
            .client
            .get(XSEARCH_BASE)
            .query(&[
                ("query", query.to_string()),
                ("format", "marcxml".to_string()),
                ("n", n.to_string()),
                ("start", start.to_string()),
            ])
            .header("Accept", "application/xml, text/xml")
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(check_status(response)?.text().await?)
    }
}

#[async_trait::async_trait]
impl BookProvider for LibrisProvider {
    fn code(&self) -> &'static str {
        LIBRIS
    }

    fn name(&self) -> &'static str {
        "LIBRIS (Sweden)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("SE")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Sru
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        // numm: searches ISBN without e-ISBN
        let xml = self.fetch(&format!("numm:{}", clean), 1, 1).await?;

        let records = marc::extract_records(&xml);
        let Some(first) = records.first() else {
            return Err(ProviderError::isbn_not_found());
        };

        let mut record = marc::parse_marc21(first);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        Ok(ProviderHit {
            record,
            source_url: Some(format!("http://libris.kb.se/hitlist?q=numm:{}", clean)),
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let mut parts = Vec::new();
        if let Some(isbn) = &params.isbn {
            parts.push(format!("numm:{}", normalize_isbn(isbn)));
        }
        if let Some(title) = &params.title {
            parts.push(format!("tit:({})", title));
        }
        if let Some(author) = &params.author {
            parts.push(format!("forf:({})", author));
        }
        if let Some(publisher) = &params.publisher {
            parts.push(format!("forl:({})", publisher));
        }
        if parts.is_empty() {
            return Err(ProviderError::no_search_params());
        }

        let query = parts.join(" AND ");
        let limit = params.limit.unwrap_or(50);
        let offset = params.offset.unwrap_or(0);
        let xml = self.fetch(&query, limit, offset + 1).await?;

        let records = marc::extract_records(&xml);
        let total = TOTAL_RE
            .captures(&xml)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(records.len() as u64);

        let items: Vec<SearchResultItem> = records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let record = marc::parse_marc21(rec);
                SearchResultItem::from_record(&record, format!("libris-{}", offset + i))
            })
            .collect();

        let has_more = (offset as u64 + records.len() as u64) < total;
        Ok(SearchOutcome {
            items,
            total,
            has_more,
        })
    }
}
