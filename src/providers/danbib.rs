//! DanBib — Danish union catalog via the OpenSearch API (DKABM format,
//! a Danish extension of Dublin Core). Public endpoint, no auth.

use crate::constants::DANBIB;
use crate::error::{ProviderError, Result};
use crate::parsers::dublin_core as dc;
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, extract_page_count, extract_year, normalize_isbn, split_title};
use crate::providers::check_status;
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::instrument;

const OPENSEARCH_BASE: &str = "https://opensearch.addi.dk/test_5.2/";
const AGENCY: &str = "100200";
const PROFILE: &str = "test";
pub const TIMEOUT: Duration = Duration::from_secs(15);

static OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<object>(.*?)</object>").unwrap());
static HIT_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hitCount>(\d+)</hitCount>").unwrap());
static SERIES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)\s*;\s*(.+)$").unwrap());

fn extract_objects(xml: &str) -> Vec<String> {
    OBJECT_RE.captures_iter(xml).map(|c| c[1].to_string()).collect()
}

fn hit_count(xml: &str) -> u64 {
    HIT_COUNT_RE
        .captures(xml)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

fn has_more_results(xml: &str) -> bool {
    xml.contains("<more>true</more>")
}

/// Map a DKABM `<object>` onto the canonical shape.
pub fn parse_dkabm_object(object_xml: &str) -> BookRecord {
    let mut record = BookRecord::default();

    // Prefer the full title ("Min kamp : roman. 1. bog"), falling back to
    // the plain dc:title
    if let Some(full) = dc::dc_text_typed(object_xml, "dc:title", "dkdcplus:full") {
        let (title, subtitle) = split_title(&full);
        record.title = Some(title);
        record.subtitle = subtitle;
    } else if let Some(plain) = dc::dc_text(object_xml, "dc:title") {
        record.title = Some(plain);
    }

    // Series title carries the number after " ; " ("Harry Potter ; 4")
    if let Some(series_title) = dc::dc_text_typed(object_xml, "dc:title", "dkdcplus:series") {
        if let Some(caps) = SERIES_RE.captures(&series_title) {
            record.series = Some(caps[1].trim().to_string());
            record.series_number = Some(caps[2].trim().to_string());
        } else {
            record.series = Some(series_title);
        }
    }

    // oss:sort creators come as "Last, First"; dkdcplus:aut as display form
    let sort_authors = dc::dc_all_typed(object_xml, "dc:creator", "oss:sort");
    if !sort_authors.is_empty() {
        for author in sort_authors {
            if !record.authors.contains(&author) {
                record.authors.push(author);
            }
        }
    } else {
        record.authors = dc::dc_all_typed(object_xml, "dc:creator", "dkdcplus:aut");
    }

    if let Some(isbn) = dc::dc_text_typed(object_xml, "dc:identifier", "dkdcplus:ISBN") {
        assign_isbn(&mut record, &isbn);
    }

    record.publisher = dc::dc_text(object_xml, "dc:publisher");
    if let Some(date) = dc::dc_text(object_xml, "dc:date") {
        record.publication_year = extract_year(&date);
    }
    record.language = dc::dc_text_typed(object_xml, "dc:language", "dcterms:ISO639-2");

    // dkdcplus:version, e.g. "2. udgave, 1. oplag (2011)"
    record.edition = dc::dc_text(object_xml, "dkdcplus:version");

    if let Some(extent) = dc::dc_text(object_xml, "dcterms:extent") {
        record.pages = extract_page_count(&extent);
        record.pagination_description = Some(extent);
    }

    record.description = dc::dc_text(object_xml, "dcterms:abstract");
    record.subjects = dc::dc_all_typed(object_xml, "dc:subject", "dkdcplus:DBCS");

    // Translator credit goes into the notes
    if let Some(translator) = dc::dc_text_typed(object_xml, "dc:contributor", "dkdcplus:trl") {
        if !record.authors.contains(&translator) {
            record.notes = Some(format!("Oversætter: {}", translator));
        }
    }

    record
}

fn object_identifier(object_xml: &str) -> Option<String> {
    dc::dc_text(object_xml, "identifier")
}

fn bibliotek_dk_url(identifier: &str) -> String {
    format!(
        "https://bibliotek.dk/materiale/{}",
        crate::providers::percent_encode(identifier)
    )
}

/// Keep only book-type objects; untyped objects pass through.
fn is_book(object_xml: &str) -> bool {
    match dc::dc_text_typed(object_xml, "dc:type", "dkdcplus:BibDK-Type") {
        Some(bib_type) => bib_type == "Bog",
        None => true,
    }
}

fn quote_if_spaced(value: &str) -> String {
    if value.contains(' ') {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

pub struct DanbibProvider {
    client: reqwest::Client,
}

impl DanbibProvider {
    pub fn new() -> Self {
        DanbibProvider {
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self, params: &[(&str, String)]) -> Result<String> {
        let response = self
            .client
            .get(OPENSEARCH_BASE)
            .query(params)
            .header("Accept", "application/xml, text/xml")
            .timeout(TIMEOUT)
            .send()
            .await?;
        Ok(check_status(response)?.text().await?)
    }

    async fn search_request(&self, query: &str, start: usize, step: usize) -> Result<String> {
        self.fetch(&[
            ("action", "search".to_string()),
            ("query", query.to_string()),
            ("agency", AGENCY.to_string()),
            ("profile", PROFILE.to_string()),
            ("start", start.to_string()),
            ("stepValue", step.to_string()),
        ])
        .await
    }
}

impl Default for DanbibProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BookProvider for DanbibProvider {
    fn code(&self) -> &'static str {
        DANBIB
    }

    fn name(&self) -> &'static str {
        "DanBib (bibliotek.dk)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("DK")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        // dkcclterm.is searches standard numbers; term.type=bog limits to books
        let query = format!("dkcclterm.is={} AND term.type=bog", clean);
        let xml = self.search_request(&query, 1, 5).await?;

        let objects = extract_objects(&xml);
        if objects.is_empty() {
            return Err(ProviderError::isbn_not_found());
        }

        let book_obj = objects
            .iter()
            .find(|o| is_book(o))
            .unwrap_or(&objects[0]);
        let mut record = parse_dkabm_object(book_obj);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        let source_url = match object_identifier(book_obj) {
            Some(identifier) => bibliotek_dk_url(&identifier),
            None => format!("https://bibliotek.dk/search?query={}", clean),
        };

        Ok(ProviderHit {
            record,
            source_url: Some(source_url),
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let mut clauses = Vec::new();
        if let Some(isbn) = &params.isbn {
            clauses.push(format!("dkcclterm.is={}", normalize_isbn(isbn)));
        }
        if let Some(title) = &params.title {
            clauses.push(format!("dkcclterm.ti={}", quote_if_spaced(title)));
        }
        if let Some(author) = &params.author {
            clauses.push(format!("dkcclterm.fo={}", quote_if_spaced(author)));
        }
        if let Some(publisher) = &params.publisher {
            clauses.push(format!("dkcclterm.lg={}", quote_if_spaced(publisher)));
        }
        match (&params.year_from, &params.year_to) {
            (Some(from), Some(to)) if from == to => {
                clauses.push(format!("dkcclterm.år={}", from));
            }
            (from, to) => {
                if let Some(from) = from {
                    clauses.push(format!("dkcclterm.år>={}", from));
                }
                if let Some(to) = to {
                    clauses.push(format!("dkcclterm.år<={}", to));
                }
            }
        }
        if clauses.is_empty() {
            return Err(ProviderError::no_search_params());
        }
        // Always limit to books
        clauses.push("term.type=bog".to_string());

        let query = clauses.join(" AND ");
        let limit = params.limit.unwrap_or(20).min(50);
        let offset = params.offset.unwrap_or(0);
        let xml = self.search_request(&query, offset + 1, limit).await?;

        let objects = extract_objects(&xml);
        let total = hit_count(&xml);
        let has_more = has_more_results(&xml);

        let items: Vec<SearchResultItem> = objects
            .iter()
            .filter(|o| is_book(o))
            .enumerate()
            .map(|(i, object_xml)| {
                let record = parse_dkabm_object(object_xml);
                let key = object_identifier(object_xml)
                    .unwrap_or_else(|| format!("danbib-{}", offset + i));
                SearchResultItem::from_record(&record, key)
            })
            .collect();

        Ok(SearchOutcome {
            items,
            total,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    /// The edition key is the DanBib identifier, e.g. "870970-basis:28692765".
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let xml = self
            .fetch(&[
                ("action", "getObject".to_string()),
                ("identifier", edition_key.to_string()),
                ("agency", AGENCY.to_string()),
                ("profile", PROFILE.to_string()),
            ])
            .await?;

        let objects = extract_objects(&xml);
        let Some(first) = objects.first() else {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        };

        let record = parse_dkabm_object(first);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }

        Ok(ProviderHit {
            record,
            source_url: Some(bibliotek_dk_url(edition_key)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dkabm_object_mapping() {
        let object = r#"
          <dkabm:record>
            <dc:title>Min kamp</dc:title>
            <dc:title xsi:type="dkdcplus:full">Min kamp : roman. 1. bog</dc:title>
            <dc:title xsi:type="dkdcplus:series">Min kamp ; 1</dc:title>
            <dc:creator xsi:type="oss:sort">Knausgård, Karl Ove</dc:creator>
            <dc:identifier xsi:type="dkdcplus:ISBN">9788702058531</dc:identifier>
            <dc:publisher>Lindhardt og Ringhof</dc:publisher>
            <dc:date>2010</dc:date>
            <dc:language xsi:type="dcterms:ISO639-2">dan</dc:language>
            <dcterms:extent>487 sider</dcterms:extent>
            <dc:type xsi:type="dkdcplus:BibDK-Type">Bog</dc:type>
          </dkabm:record>
          <identifier>870970-basis:28692765</identifier>"#;
        let record = parse_dkabm_object(object);
        assert_eq!(record.title.as_deref(), Some("Min kamp"));
        assert_eq!(record.subtitle.as_deref(), Some("roman. 1. bog"));
        assert_eq!(record.series.as_deref(), Some("Min kamp"));
        assert_eq!(record.series_number.as_deref(), Some("1"));
        assert_eq!(record.authors, vec!["Knausgård, Karl Ove".to_string()]);
        assert_eq!(record.isbn_13.as_deref(), Some("9788702058531"));
        assert_eq!(record.language.as_deref(), Some("dan"));
        assert_eq!(record.pages, Some(487));
        assert!(is_book(object));
    }

    #[test]
    fn non_book_objects_are_filtered() {
        let object = r#"<dc:type xsi:type="dkdcplus:BibDK-Type">Lydbog</dc:type>"#;
        assert!(!is_book(object));
    }
}
