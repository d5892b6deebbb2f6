//! Library Hub Discover (UK) — Jisc aggregation of 100+ academic and
//! research library catalogs. SRU transport, but the records are MODS.

use crate::constants::LIBRARY_HUB;
use crate::error::{ProviderError, Result};
use crate::parsers::marc::diagnostic_message;
use crate::parsers::mods::{extract_mods_records, parse_mods_record};
use crate::parsers::text::{ensure_lookup_isbn, normalize_isbn};
use crate::providers::check_status;
use crate::types::{
    BookProvider, ProviderHit, ProviderKind, SearchOutcome, SearchParams, SearchResultItem,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::instrument;

const SRU_BASE: &str = "https://discover.libraryhub.jisc.ac.uk/sru-api";

static TOTAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(?:srw:|zs:)?numberOfRecords>(\d+)</(?:srw:|zs:)?numberOfRecords>").unwrap()
});

pub struct LibraryHubProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl LibraryHubProvider {
    pub fn new(timeout: Duration) -> Self {
        LibraryHubProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn fetch(&self, query: &str, max_records: usize, start_record: usize) -> Result<String> {
        let mut params = vec![
            ("version", "1.1".to_string()),
            ("operation", "searchRetrieve".to_string()),
            ("query", query.to_string()),
            ("maximumRecords", max_records.to_string()),
        ];
        if start_record > 1 {
            params.push(("startRecord", start_record.to_string()));
        }

        let response = self
            .client
            .get(SRU_BASE)
            .query(&params)
            .header("Accept", "application/xml, text/xml")
            .timeout(self.timeout)
            .send()
            .await?;
        let xml = check_status(response)?.text().await?;

        if let Some(message) = diagnostic_message(&xml) {
            return Err(ProviderError::Api { message });
        }
        Ok(xml)
    }

    fn build_query(params: &SearchParams) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(isbn) = &params.isbn {
            parts.push(format!(r#"dc.identifier = "{}""#, normalize_isbn(isbn)));
        }
        if let Some(title) = &params.title {
            parts.push(format!(r#"dc.title = "{}""#, title));
        }
        if let Some(author) = &params.author {
            parts.push(format!(r#"dc.creator = "{}""#, author));
        }
        if let Some(publisher) = &params.publisher {
            parts.push(format!(r#"dc.publisher = "{}""#, publisher));
        }
        (!parts.is_empty()).then(|| parts.join(" and "))
    }
}

#[async_trait::async_trait]
impl BookProvider for LibraryHubProvider {
    fn code(&self) -> &'static str {
        LIBRARY_HUB
    }

    fn name(&self) -> &'static str {
        "Library Hub Discover (UK)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("GB")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Sru
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let query = format!(r#"dc.identifier = "{}""#, clean);
        let xml = self.fetch(&query, 1, 1).await?;

        let records = extract_mods_records(&xml);
        let Some(first) = records.first() else {
            return Err(ProviderError::isbn_not_found());
        };

        let mut record = parse_mods_record(first);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        Ok(ProviderHit {
            record,
            source_url: Some(format!(
                "https://discover.libraryhub.jisc.ac.uk/search?isbn={}",
                clean
            )),
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let Some(query) = Self::build_query(params) else {
            return Err(ProviderError::no_search_params());
        };

        let limit = params.limit.unwrap_or(20);
        let offset = params.offset.unwrap_or(0);
        let start_record = offset + 1;

        let xml = self.fetch(&query, limit, start_record).await?;
        let total = TOTAL_RE
            .captures(&xml)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0);
        let records = extract_mods_records(&xml);

        let items: Vec<SearchResultItem> = records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let record = parse_mods_record(rec);
                // Stateless detail key: query + record position, re-fetched
                // by get_details
                let key = format!("{}|{}", start_record + i, query);
                SearchResultItem::from_record(&record, key)
            })
            .collect();

        let has_more = (offset as u64 + records.len() as u64) < total;
        Ok(SearchOutcome {
            items,
            total,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let Some((start, query)) = edition_key
            .split_once('|')
            .and_then(|(s, q)| s.parse::<usize>().ok().map(|s| (s, q)))
        else {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        };

        let xml = self.fetch(query, 1, start).await?;
        let records = extract_mods_records(&xml);
        let Some(first) = records.first() else {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        };

        let record = parse_mods_record(first);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }

        let source_url = record
            .isbn_13
            .as_deref()
            .or(record.isbn_10.as_deref())
            .map(|isbn| format!("https://discover.libraryhub.jisc.ac.uk/search?isbn={}", isbn));

        Ok(ProviderHit { record, source_url })
    }
}
