//! HathiTrust Bibliographic API — 13M+ digitised volumes from research
//! libraries. Identifier lookup only (deliberately no field search).
//!
//! The full endpoint embeds MARC-XML inside the JSON response; the brief
//! fields are the fallback when it is missing. Holding-library info and
//! full-view links go into the notes.

use crate::constants::HATHITRUST;
use crate::error::{ProviderError, Result};
use crate::parsers::marc;
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, extract_year, normalize_isbn};
use crate::providers::check_status;
use crate::types::{BookProvider, BookRecord, ProviderHit, ProviderKind};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

const API_BASE: &str = "https://catalog.hathitrust.org/api/volumes";
pub const TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Default, Deserialize)]
pub struct HathiRecord {
    #[serde(rename = "recordURL", default)]
    pub record_url: String,
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub isbns: Vec<String>,
    #[serde(default)]
    pub oclcs: Vec<String>,
    #[serde(default)]
    pub lccns: Vec<String>,
    #[serde(rename = "publishDates", default)]
    pub publish_dates: Vec<String>,
    #[serde(rename = "marc-xml")]
    pub marc_xml: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HathiItem {
    /// Holding library name
    #[serde(default)]
    pub orig: String,
    #[serde(rename = "itemURL", default)]
    pub item_url: String,
    #[serde(rename = "rightsCode", default)]
    pub rights_code: String,
    #[serde(rename = "usRightsString", default)]
    pub us_rights_string: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HathiResponse {
    #[serde(default)]
    pub records: HashMap<String, HathiRecord>,
    #[serde(default)]
    pub items: Vec<HathiItem>,
}

/// Brief record fields, used when the response carries no MARC-XML.
pub fn parse_brief(record: &HathiRecord) -> BookRecord {
    let mut book = BookRecord::default();

    if let Some(title) = record.titles.first() {
        book.title = Some(title.trim_end_matches(['/', ':', ';', '.', ' ']).trim().to_string());
    }
    if let Some(date) = record.publish_dates.first() {
        book.publication_year = extract_year(date);
    }
    for isbn in &record.isbns {
        assign_isbn(&mut book, isbn);
    }
    book.lccn = record.lccns.first().map(|l| l.trim().to_string());
    book.oclc_number = record.oclcs.first().cloned();

    book
}

/// Which universities hold the book, plus a full-view link when one exists.
pub fn holding_notes(items: &[HathiItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }

    let mut libraries: Vec<&str> = Vec::new();
    for item in items {
        if !libraries.contains(&item.orig.as_str()) {
            libraries.push(&item.orig);
        }
    }

    let mut parts = vec![format!(
        "HathiTrust: held by {} ({} volumes)",
        libraries.join(", "),
        items.len()
    )];

    let full_view = items.iter().find(|i| {
        i.rights_code == "pd"
            || i.rights_code == "pdus"
            || i.us_rights_string.to_lowercase().contains("full view")
    });
    if let Some(item) = full_view {
        parts.push(format!("Full view available: {}", item.item_url));
    }

    Some(parts.join("\n"))
}

fn record_to_book(record: &HathiRecord, items: &[HathiItem]) -> BookRecord {
    let mut book = match &record.marc_xml {
        Some(marc_xml) => marc::parse_marc21(marc_xml),
        None => parse_brief(record),
    };
    if let Some(notes) = holding_notes(items) {
        book.push_note(&notes);
    }
    book
}

pub struct HathiTrustProvider {
    client: reqwest::Client,
}

impl HathiTrustProvider {
    pub fn new() -> Self {
        HathiTrustProvider {
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self, path: &str) -> Result<HathiResponse> {
        let response = self
            .client
            .get(format!("{}{}", API_BASE, path))
            .timeout(TIMEOUT)
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }
}

impl Default for HathiTrustProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BookProvider for HathiTrustProvider {
    fn code(&self) -> &'static str {
        HATHITRUST
    }

    fn name(&self) -> &'static str {
        "HathiTrust Digital Library"
    }

    fn country(&self) -> Option<&'static str> {
        Some("US")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let data = self.fetch(&format!("/full/isbn/{}.json", clean)).await?;

        let Some(record) = data.records.values().next() else {
            return Err(ProviderError::isbn_not_found());
        };

        let mut book = record_to_book(record, &data.items);
        ensure_lookup_isbn(&mut book, &clean);
        if book.title.is_none() {
            return Err(ProviderError::no_title());
        }

        Ok(ProviderHit {
            record: book,
            source_url: (!record.record_url.is_empty()).then(|| record.record_url.clone()),
        })
    }

    // No field search — HathiTrust is an identifier lookup API, not a
    // search API.

    fn supports_details(&self) -> bool {
        true
    }

    /// Full record by HathiTrust record number.
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let data = self
            .fetch(&format!("/full/recordnumber/{}.json", edition_key))
            .await?;

        let Some(record) = data.records.values().next() else {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        };

        let book = record_to_book(record, &data.items);
        Ok(ProviderHit {
            record: book,
            source_url: (!record.record_url.is_empty()).then(|| record.record_url.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brief_record_mapping() {
        let record = HathiRecord {
            record_url: "https://catalog.hathitrust.org/Record/000578050".to_string(),
            titles: vec!["Moby Dick; or, The whale /".to_string()],
            isbns: vec!["9780142437247".to_string()],
            oclcs: vec!["21422".to_string()],
            lccns: vec!["2001041955".to_string()],
            publish_dates: vec!["1851".to_string()],
            marc_xml: None,
        };
        let book = parse_brief(&record);
        assert_eq!(book.title.as_deref(), Some("Moby Dick; or, The whale"));
        assert_eq!(book.publication_year.as_deref(), Some("1851"));
        assert_eq!(book.isbn_13.as_deref(), Some("9780142437247"));
        assert_eq!(book.oclc_number.as_deref(), Some("21422"));
    }

    #[test]
    fn holding_notes_dedupe_libraries() {
        let items = vec![
            HathiItem {
                orig: "University of California".to_string(),
                item_url: "https://babel.hathitrust.org/cgi/pt?id=uc1.b44593".to_string(),
                rights_code: "pd".to_string(),
                us_rights_string: "Full view".to_string(),
            },
            HathiItem {
                orig: "University of California".to_string(),
                item_url: "https://babel.hathitrust.org/cgi/pt?id=uc1.b44594".to_string(),
                rights_code: "ic".to_string(),
                us_rights_string: "Limited (search-only)".to_string(),
            },
        ];
        let notes = holding_notes(&items).unwrap();
        assert!(notes.contains("held by University of California (2 volumes)"));
        assert!(notes.contains("Full view available"));
    }
}
