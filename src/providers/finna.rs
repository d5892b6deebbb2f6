//! Finna — Finnish discovery service aggregating 460+ archives, libraries,
//! and museums. REST JSON API, no auth, CC0 metadata.

use crate::constants::FINNA;
use crate::error::{ProviderError, Result};
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, extract_page_count, extract_year, normalize_isbn};
use crate::providers::check_status;
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

const API_BASE: &str = "https://api.finna.fi/api/v1";

// Fields requested from the API (minimises response size)
const SEARCH_FIELDS: &[&str] = &[
    "title",
    "subTitle",
    "nonPresenterAuthors",
    "publishers",
    "publicationDates",
    "languages",
    "subjects",
    "ISBNs",
    "formats",
    "images",
    "series",
    "physicalDescriptions",
    "summary",
    "id",
];

const DETAIL_FIELDS: &[&str] = &["edition", "classifications"];

#[derive(Debug, Deserialize)]
pub struct FinnaAuthor {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct FinnaFormat {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub translated: String,
}

#[derive(Debug, Deserialize)]
pub struct FinnaSeries {
    pub name: String,
    pub additional: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FinnaClassification {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinnaRecord {
    #[serde(default)]
    pub id: String,
    pub title: Option<String>,
    pub sub_title: Option<String>,
    #[serde(default)]
    pub non_presenter_authors: Vec<FinnaAuthor>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub publication_dates: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    /// Finna subjects are arrays of arrays
    #[serde(default)]
    pub subjects: Vec<Vec<String>>,
    #[serde(rename = "ISBNs", default)]
    pub isbns: Vec<String>,
    #[serde(default)]
    pub formats: Vec<FinnaFormat>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub series: Vec<FinnaSeries>,
    #[serde(default)]
    pub physical_descriptions: Vec<String>,
    #[serde(default)]
    pub summary: Vec<String>,
    pub edition: Option<String>,
    #[serde(default)]
    pub classifications: Vec<FinnaClassification>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinnaSearchResponse {
    #[serde(default)]
    pub result_count: u64,
    #[serde(default)]
    pub records: Vec<FinnaRecord>,
}

/// Map a Finna record onto the canonical shape.
pub fn parse_finna_record(rec: &FinnaRecord) -> BookRecord {
    let mut record = BookRecord::default();

    record.title = rec.title.clone();
    record.subtitle = rec.sub_title.clone();
    record.authors = rec.non_presenter_authors.iter().map(|a| a.name.clone()).collect();
    record.publisher = rec.publishers.first().cloned();

    if let Some(date) = rec.publication_dates.first() {
        record.publication_year = extract_year(date);
    }
    record.language = rec.languages.first().cloned();

    for isbn in &rec.isbns {
        assign_isbn(&mut record, isbn);
    }

    record.subjects = rec.subjects.iter().map(|group| group.join(" -- ")).collect();

    if !rec.summary.is_empty() {
        record.description = Some(rec.summary.join(" "));
    }

    if let Some(desc) = rec.physical_descriptions.first() {
        record.pages = extract_page_count(desc);
        record.pagination_description = Some(desc.clone());
    }

    if let Some(series) = rec.series.first() {
        record.series = Some(series.name.clone());
        record.series_number = series.additional.clone();
    }

    if let Some(format) = rec.formats.iter().find(|f| f.value.contains("Book")) {
        record.format = Some(if format.translated.is_empty() {
            "Book".to_string()
        } else {
            format.translated.clone()
        });
    }

    record.edition = rec.edition.clone();

    // Image paths are relative to the API host
    if let Some(img) = rec.images.first() {
        record.cover_url = Some(if img.starts_with("http") {
            img.clone()
        } else {
            format!("https://api.finna.fi{}", img)
        });
    }

    record.ddc = rec
        .classifications
        .iter()
        .find(|c| c.label == "YKL" || c.label == "UDK" || c.label == "DDC")
        .map(|c| c.value.clone());

    record
}

pub struct FinnaProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl FinnaProvider {
    pub fn new(timeout: Duration) -> Self {
        FinnaProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn field_params(detail: bool) -> Vec<(&'static str, String)> {
        let mut fields: Vec<&str> = SEARCH_FIELDS.to_vec();
        if detail {
            fields.extend_from_slice(DETAIL_FIELDS);
        }
        fields.into_iter().map(|f| ("field[]", f.to_string())).collect()
    }

    async fn get(&self, path: &str, query: Vec<(&str, String)>) -> Result<FinnaSearchResponse> {
        let response = self
            .client
            .get(format!("{}{}", API_BASE, path))
            .query(&query)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }
}

#[async_trait::async_trait]
impl BookProvider for FinnaProvider {
    fn code(&self) -> &'static str {
        FINNA
    }

    fn name(&self) -> &'static str {
        "Finna (Finland)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("FI")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let mut query = vec![
            ("lookfor", clean.clone()),
            ("type", "ISN".to_string()),
            ("limit", "1".to_string()),
        ];
        query.extend(Self::field_params(false));

        let data = self.get("/search", query).await?;
        let Some(rec) = data.records.first() else {
            return Err(ProviderError::isbn_not_found());
        };

        let mut record = parse_finna_record(rec);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        Ok(ProviderHit {
            record,
            source_url: Some(format!("https://finna.fi/Record/{}", rec.id)),
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let mut parts = Vec::new();
        if let Some(isbn) = &params.isbn {
            parts.push(normalize_isbn(isbn));
        }
        if let Some(title) = &params.title {
            parts.push(format!("title:{}", title));
        }
        if let Some(author) = &params.author {
            parts.push(format!("author:{}", author));
        }
        if parts.is_empty() {
            return Err(ProviderError::no_search_params());
        }

        let limit = params.limit.unwrap_or(20).min(100);
        let page = params.offset.map(|o| o / limit + 1).unwrap_or(1);
        let search_type = if params.isbn.is_some() { "ISN" } else { "AllFields" };

        let mut query = vec![
            ("lookfor", parts.join(" ")),
            ("type", search_type.to_string()),
            ("limit", limit.to_string()),
            ("page", page.to_string()),
        ];
        query.extend(Self::field_params(false));

        let data = self.get("/search", query).await?;

        let items: Vec<SearchResultItem> = data
            .records
            .iter()
            .map(|rec| {
                let record = parse_finna_record(rec);
                SearchResultItem::from_record(&record, rec.id.clone())
            })
            .collect();

        let has_more = (page as u64 * limit as u64) < data.result_count;
        Ok(SearchOutcome {
            items,
            total: data.result_count,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    /// The edition key is the Finna record id.
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let mut query = vec![("id", edition_key.to_string())];
        query.extend(Self::field_params(true));

        let data = self.get("/record", query).await?;
        let Some(rec) = data.records.first() else {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        };

        let record = parse_finna_record(rec);
        Ok(ProviderHit {
            record,
            source_url: Some(format!("https://finna.fi/Record/{}", edition_key)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finna_record_mapping() {
        let rec: FinnaRecord = serde_json::from_value(json!({
            "id": "helka.9789510459959",
            "title": "Tuntematon sotilas",
            "nonPresenterAuthors": [{"name": "Linna, Väinö"}],
            "publishers": ["WSOY"],
            "publicationDates": ["2015"],
            "languages": ["fin"],
            "subjects": [["sota", "romaanit"]],
            "ISBNs": ["978-951-0-45995-9"],
            "formats": [{"value": "1/Book/Book/", "translated": "Kirja"}],
            "images": ["/Cover/Show?id=helka.9789510459959"],
            "physicalDescriptions": ["443 sivua"],
            "summary": []
        }))
        .unwrap();

        let record = parse_finna_record(&rec);
        assert_eq!(record.title.as_deref(), Some("Tuntematon sotilas"));
        assert_eq!(record.authors, vec!["Linna, Väinö".to_string()]);
        assert_eq!(record.isbn_13.as_deref(), Some("9789510459959"));
        assert_eq!(record.pages, Some(443));
        assert_eq!(record.subjects, vec!["sota -- romaanit".to_string()]);
        assert_eq!(record.format.as_deref(), Some("Kirja"));
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://api.finna.fi/Cover/Show?id=helka.9789510459959")
        );
    }
}
