//! KB — Koninklijke Bibliotheek (Netherlands).
//!
//! SRU endpoint returning Dublin Core (`dcx` schema), not MARCXML.

use crate::constants::KB_NL;
use crate::error::{ProviderError, Result};
use crate::parsers::dublin_core as dc;
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, extract_page_count, extract_year, normalize_isbn, split_title};
use crate::providers::check_status;
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use std::time::Duration;
use tracing::instrument;

const SRU_BASE: &str = "http://jsru.kb.nl/sru/sru";
const RECORD_SCHEMA: &str = "dcx";
const SRU_VERSION: &str = "1.1";
// GGC = Gemeenschappelijke GegevensCollectie (shared catalog)
const COLLECTION: &str = "GGC";

/// Map a dcx record onto the canonical shape.
pub fn parse_dcx_record(record_xml: &str) -> BookRecord {
    let data = dc::sru_record_data(record_xml);
    let mut record = BookRecord::default();

    // dc:title may carry the subtitle after " : "
    if let Some(title) = dc::dc_text(&data, "dc:title") {
        let (title, subtitle) = split_title(&title);
        record.title = Some(title);
        record.subtitle = subtitle;
    }

    // dc:creator and dcx:creator-personal, deduplicated
    for creator in dc::dc_all(&data, "dc:creator")
        .into_iter()
        .chain(dc::dc_all(&data, "dcx:creator-personal"))
    {
        if !record.authors.contains(&creator) {
            record.authors.push(creator);
        }
    }

    record.publisher = dc::dc_text(&data, "dc:publisher")
        .or_else(|| dc::dc_text(&data, "dcx:publisher"));

    if let Some(date) = dc::dc_text(&data, "dc:date") {
        record.publication_year = extract_year(&date);
    }

    record.language = dc::dc_text(&data, "dc:language");

    // dc:identifier mixes ISBNs, OCLC numbers, and URN:ISBN: forms
    for id in dc::dc_all(&data, "dc:identifier") {
        let raw = id.strip_prefix("URN:ISBN:").unwrap_or(&id);
        assign_isbn(&mut record, raw);
    }
    for isbn in dc::dc_all(&data, "dcx:ISBN") {
        assign_isbn(&mut record, &isbn);
    }

    record.subjects = dc::dc_all(&data, "dc:subject");
    record.description = dc::dc_text(&data, "dc:description");

    if let Some(extent) =
        dc::dc_text(&data, "dcterms:extent").or_else(|| dc::dc_text(&data, "dc:format"))
    {
        record.pages = extract_page_count(&extent);
        record.pagination_description = Some(extent);
    }

    record.format = dc::dc_text(&data, "dc:type");
    record.series = dc::dc_text(&data, "dcx:isPartOf")
        .or_else(|| dc::dc_text(&data, "dcterms:isPartOf"));
    record.publication_place = dc::dc_text(&data, "dcx:place");

    record
}

pub struct KbNlProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl KbNlProvider {
    pub fn new(timeout: Duration) -> Self {
        KbNlProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn fetch(&self, query: &str, start_record: usize, max_records: usize) -> Result<String> {
        let response = self
            .client
            .get(SRU_BASE)
            .query(&[
                ("version", SRU_VERSION.to_string()),
                ("operation", "searchRetrieve".to_string()),
                ("query", query.to_string()),
                ("recordSchema", RECORD_SCHEMA.to_string()),
                ("x-collection", COLLECTION.to_string()),
                ("startRecord", start_record.to_string()),
                ("maximumRecords", max_records.to_string()),
            ])
            .header("Accept", "application/xml, text/xml")
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(check_status(response)?.text().await?)
    }
}

#[async_trait::async_trait]
impl BookProvider for KbNlProvider {
    fn code(&self) -> &'static str {
        KB_NL
    }

    fn name(&self) -> &'static str {
        "KB (Netherlands)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("NL")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Sru
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let xml = self.fetch(&format!("dc.identifier={}", clean), 1, 1).await?;

        let records = dc::sru_records(&xml);
        let Some(first) = records.first() else {
            return Err(ProviderError::isbn_not_found());
        };

        let mut record = parse_dcx_record(first);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        Ok(ProviderHit {
            record,
            source_url: Some(format!(
                "https://opc4.kb.nl/DB=1/SET=1/TTL=1/CMD?ACT=SRCHA&IKT=1007&SRT=YOP&TRM={}",
                clean
            )),
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let mut parts = Vec::new();
        if let Some(isbn) = &params.isbn {
            parts.push(format!("dc.identifier={}", normalize_isbn(isbn)));
        }
        if let Some(title) = &params.title {
            parts.push(format!("dc.title={}", title));
        }
        if let Some(author) = &params.author {
            parts.push(format!("dc.creator={}", author));
        }
        if let Some(publisher) = &params.publisher {
            parts.push(format!("dc.publisher={}", publisher));
        }
        if let Some(from) = &params.year_from {
            parts.push(format!("dc.date>={}", from));
        }
        if let Some(to) = &params.year_to {
            parts.push(format!("dc.date<={}", to));
        }
        if parts.is_empty() {
            return Err(ProviderError::no_search_params());
        }

        let query = parts.join(" and ");
        let limit = params.limit.unwrap_or(20).min(50);
        let offset = params.offset.unwrap_or(0);
        let start_record = offset + 1; // SRU is 1-based

        let xml = self.fetch(&query, start_record, limit).await?;
        let records = dc::sru_records(&xml);
        let total = dc::sru_total(&xml);

        let items: Vec<SearchResultItem> = records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let record = parse_dcx_record(rec);
                SearchResultItem::from_record(&record, format!("kb-{}", start_record + i))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dcx_record_mapping() {
        let xml = r#"<srw:recordData>
            <dc:title>Max Havelaar : of de koffiveilingen</dc:title>
            <dc:creator>Multatuli</dc:creator>
            <dcx:creator-personal>Multatuli</dcx:creator-personal>
            <dc:publisher>De Ruyter</dc:publisher>
            <dc:date>1860</dc:date>
            <dc:language>nl</dc:language>
            <dc:identifier>URN:ISBN:90-214-9672-3</dc:identifier>
            <dcterms:extent>212 p.</dcterms:extent>
          </srw:recordData>"#;
        let record = parse_dcx_record(xml);
        assert_eq!(record.title.as_deref(), Some("Max Havelaar"));
        assert_eq!(record.subtitle.as_deref(), Some("of de koffiveilingen"));
        // dc:creator and dcx:creator-personal are deduplicated
        assert_eq!(record.authors, vec!["Multatuli".to_string()]);
        assert_eq!(record.publication_year.as_deref(), Some("1860"));
        assert_eq!(record.isbn_10.as_deref(), Some("9021496723"));
        assert_eq!(record.pages, Some(212));
    }
}
