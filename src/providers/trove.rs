//! Trove — National Library of Australia discovery service, v3 JSON API.
//! Requires a free API key supplied via `TROVE_API_KEY`.

use crate::constants::TROVE;
use crate::error::{ProviderError, Result};
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, normalize_isbn};
use crate::providers::check_status;
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

const API_BASE: &str = "https://api.trove.nla.gov.au/v3";

#[derive(Debug, Default, Deserialize)]
pub struct TroveLanguage {
    pub value: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TroveIdentifier {
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub id_type: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrovePartOf {
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub part_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TroveWork {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub contributor: Vec<String>,
    /// Publication year
    pub issued: Option<Value>,
    #[serde(rename = "type", default)]
    pub work_type: Vec<String>,
    #[serde(rename = "isPartOf", default)]
    pub is_part_of: Vec<TrovePartOf>,
    #[serde(default)]
    pub subject: Vec<String>,
    #[serde(default)]
    pub language: Vec<TroveLanguage>,
    #[serde(default)]
    pub identifier: Vec<TroveIdentifier>,
    #[serde(rename = "abstract")]
    pub work_abstract: Option<String>,
    #[serde(rename = "troveUrl")]
    pub trove_url: Option<String>,
}

/// Map a Trove work onto the canonical shape.
pub fn parse_trove_work(work: &TroveWork) -> BookRecord {
    let mut record = BookRecord::default();

    // The title may carry a subtitle after " : " and a trailing " /"
    if !work.title.is_empty() {
        let parts: Vec<&str> = work.title.split(" : ").collect();
        record.title = Some(parts[0].trim().trim_end_matches(" /").trim().to_string());
        if parts.len() > 1 {
            record.subtitle = Some(
                parts[1..]
                    .join(" : ")
                    .trim()
                    .trim_end_matches(" /")
                    .trim()
                    .to_string(),
            );
        }
    }

    record.authors = work.contributor.clone();

    record.publication_year = match &work.issued {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    if let Some(lang) = work.language.first() {
        record.language = lang.code.clone().or_else(|| lang.value.clone());
    }

    for id in &work.identifier {
        match id.id_type.as_str() {
            "isbn" => assign_isbn(&mut record, &id.value),
            "oclc" if record.oclc_number.is_none() => {
                record.oclc_number = Some(id.value.clone());
            }
            _ => {}
        }
    }

    record.subjects = work.subject.clone();
    record.description = work.work_abstract.clone();

    record.series = work
        .is_part_of
        .iter()
        .find(|p| p.part_type.as_deref() == Some("series"))
        .and_then(|p| p.value.clone());

    record.format = work.work_type.first().cloned();

    record
}

pub struct TroveProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    timeout: Duration,
}

impl TroveProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        TroveProvider {
            client: reqwest::Client::new(),
            api_key,
            timeout,
        }
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential("TROVE_API_KEY"))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let key = self.key()?.to_string();
        let response = self
            .client
            .get(format!("{}{}", API_BASE, path))
            .query(query)
            .header("Accept", "application/json")
            .header("X-API-KEY", key)
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }

    fn book_category(data: &Value) -> Option<&Value> {
        data["category"]
            .as_array()?
            .iter()
            .find(|c| c["code"].as_str() == Some("book"))
    }
}

#[async_trait::async_trait]
impl BookProvider for TroveProvider {
    fn code(&self) -> &'static str {
        TROVE
    }

    fn name(&self) -> &'static str {
        "Trove (Australia)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("AU")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let data = self
            .get(
                "/result",
                &[
                    ("q", format!("isbn:{}", clean)),
                    ("category", "book".to_string()),
                    ("encoding", "json".to_string()),
                    ("n", "1".to_string()),
                ],
            )
            .await?;

        let works = Self::book_category(&data)
            .and_then(|c| c["records"]["work"].as_array().cloned())
            .unwrap_or_default();
        let Some(first) = works.first() else {
            return Err(ProviderError::isbn_not_found());
        };

        let work: TroveWork = serde_json::from_value(first.clone())?;
        let mut record = parse_trove_work(&work);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        let source_url = work
            .trove_url
            .clone()
            .or_else(|| (!work.url.is_empty()).then(|| work.url.clone()))
            .unwrap_or_else(|| {
                format!("https://trove.nla.gov.au/search?keyword=isbn:{}", clean)
            });

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
        let mut parts = Vec::new();
        if let Some(isbn) = &params.isbn {
            parts.push(format!("isbn:{}", normalize_isbn(isbn)));
        }
        if let Some(title) = &params.title {
            parts.push(format!("title:({})", title));
        }
        if let Some(author) = &params.author {
            parts.push(format!("creator:({})", author));
        }
        if let Some(publisher) = &params.publisher {
            parts.push(format!("publisher:({})", publisher));
        }
        if parts.is_empty() {
            return Err(ProviderError::no_search_params());
        }

        let limit = params.limit.unwrap_or(20).min(100);
        let offset = params.offset.unwrap_or(0);

        // s= is the start offset, n= the count
        let data = self
            .get(
                "/result",
                &[
                    ("q", parts.join(" ")),
                    ("category", "book".to_string()),
                    ("encoding", "json".to_string()),
                    ("n", limit.to_string()),
                    ("s", offset.to_string()),
                ],
            )
            .await?;

        let category = Self::book_category(&data);
        let total = category
            .and_then(|c| c["records"]["total"].as_u64())
            .unwrap_or(0);
        let works = category
            .and_then(|c| c["records"]["work"].as_array().cloned())
            .unwrap_or_default();

        let items: Vec<SearchResultItem> = works
            .iter()
            .filter_map(|w| serde_json::from_value::<TroveWork>(w.clone()).ok())
            .map(|work| {
                let record = parse_trove_work(&work);
                SearchResultItem::from_record(&record, work.id.clone())
            })
            .collect();

        let has_more = (offset as u64 + works.len() as u64) < total;
        Ok(SearchOutcome {
            items,
            total,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    /// The edition key is the Trove work id.
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let data = self
            .get(
                &format!("/work/{}", edition_key),
                &[
                    ("encoding", "json".to_string()),
                    ("include", "holdings".to_string()),
                ],
            )
            .await?;

        let work: TroveWork = serde_json::from_value(data)?;
        let record = parse_trove_work(&work);

        let source_url = work
            .trove_url
            .clone()
            .unwrap_or_else(|| format!("https://trove.nla.gov.au/work/{}", edition_key));

        Ok(ProviderHit {
            record,
            source_url: Some(source_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trove_work_mapping() {
        let work: TroveWork = serde_json::from_value(json!({
            "id": "123456",
            "url": "https://api.trove.nla.gov.au/v3/work/123456",
            "title": "Voss : a novel / Patrick White",
            "contributor": ["White, Patrick, 1912-1990"],
            "issued": 1957,
            "type": ["Book"],
            "identifier": [{"value": "978-0-09-932221-1", "type": "isbn"}],
            "language": [{"code": "eng"}],
            "subject": ["Exploring expeditions"]
        }))
        .unwrap();

        let record = parse_trove_work(&work);
        assert_eq!(record.title.as_deref(), Some("Voss"));
        assert_eq!(record.subtitle.as_deref(), Some("a novel / Patrick White"));
        assert_eq!(record.publication_year.as_deref(), Some("1957"));
        assert_eq!(record.isbn_13.as_deref(), Some("9780099322211"));
        assert_eq!(record.language.as_deref(), Some("eng"));
        assert_eq!(record.format.as_deref(), Some("Book"));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let provider = TroveProvider::new(None, Duration::from_secs(10));
        let err = provider.key().unwrap_err();
        assert_eq!(err.to_string(), "TROVE_API_KEY not configured");
    }
}
