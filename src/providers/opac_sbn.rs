//! OPAC SBN — the Italian union catalog (6,300+ libraries), via the
//! opacmobilegw JSON gateway.

use crate::constants::OPAC_SBN;
use crate::error::{ProviderError, Result};
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, extract_year, split_title};
use crate::parsers::text::normalize_isbn;
use crate::providers::check_status;
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

const API_BASE: &str = "http://opac.sbn.it/opacmobilegw";
const CHANNEL: &str = "VMSBNTT";

static YEAR_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",?\s*(?:stampa\s+)?\[?\d{4}\]?.*$").unwrap());

#[derive(Debug, Default, Deserialize)]
pub struct SbnBriefRecord {
    /// SBN ID, e.g. "IT\ICCU\UBO\4350179"
    #[serde(rename = "codiceIdentificativo", default)]
    pub codice_identificativo: String,
    pub isbn: Option<String>,
    /// Main author
    #[serde(rename = "autorePrincipale")]
    pub autore_principale: Option<String>,
    /// Cover URL
    pub copertina: Option<String>,
    /// Title, possibly with a statement of responsibility after " / "
    pub titolo: Option<String>,
    /// Combined "Place : Publisher, Year"
    pub pubblicazione: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SbnSearchResponse {
    #[serde(rename = "numFound", default)]
    pub num_found: u64,
    #[serde(rename = "briefRecords", default)]
    pub brief_records: Vec<SbnBriefRecord>,
}

/// Split a combined "Place : Publisher, Year" statement.
pub fn parse_pubblicazione(pub_statement: &str) -> (Option<String>, Option<String>, Option<String>) {
    let year = extract_year(pub_statement);

    let (mut place, mut publisher) = (None, None);
    if let Some(colon_idx) = pub_statement.find(':') {
        if colon_idx > 0 {
            let place_raw = pub_statement[..colon_idx]
                .trim()
                .replace(['[', ']'], "");
            if !place_raw.is_empty() {
                place = Some(place_raw);
            }
            let rest = pub_statement[colon_idx + 1..].trim();
            let rest = YEAR_TAIL_RE.replace(rest, "");
            let rest = rest.trim().trim_end_matches(['.', ',', ';']).trim();
            if !rest.is_empty() {
                publisher = Some(rest.to_string());
            }
        }
    }

    (place, publisher, year)
}

/// Map an SBN brief record onto the canonical shape.
pub fn parse_sbn_record(rec: &SbnBriefRecord) -> BookRecord {
    let mut record = BookRecord::default();

    if let Some(titolo) = &rec.titolo {
        let (title, subtitle) = split_title(titolo);
        record.title = Some(title);
        record.subtitle = subtitle;
    }

    if let Some(pub_statement) = &rec.pubblicazione {
        let (place, publisher, year) = parse_pubblicazione(pub_statement);
        record.publication_place = place;
        record.publisher = publisher;
        record.publication_year = year;
    }

    if let Some(author) = &rec.autore_principale {
        record.authors.push(author.clone());
    }
    if let Some(isbn) = &rec.isbn {
        assign_isbn(&mut record, isbn);
    }
    record.cover_url = rec.copertina.clone();

    record
}

fn source_url(bid: &str) -> String {
    format!(
        "https://opac.sbn.it/risultati-ricerca-avanzata/-/opac-adv?search_query={}",
        crate::providers::percent_encode(bid)
    )
}

pub struct OpacSbnProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl OpacSbnProvider {
    pub fn new(timeout: Duration) -> Self {
        OpacSbnProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn get(&self, query: &[(&str, String)]) -> Result<SbnSearchResponse> {
        let response = self
            .client
            .get(format!("{}/search.json", API_BASE))
            .query(query)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }
}

#[async_trait::async_trait]
impl BookProvider for OpacSbnProvider {
    fn code(&self) -> &'static str {
        OPAC_SBN
    }

    fn name(&self) -> &'static str {
        "OPAC SBN (Italy)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("IT")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let data = self
            .get(&[
                ("searchField", "isbn".to_string()),
                ("channel", CHANNEL.to_string()),
                ("fieldstruct", "1".to_string()),
                ("resultForPage", "1".to_string()),
                ("isbn", clean.clone()),
            ])
            .await?;

        let Some(rec) = data.brief_records.first() else {
            return Err(ProviderError::isbn_not_found());
        };

        let mut record = parse_sbn_record(rec);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        Ok(ProviderHit {
            record,
            source_url: Some(source_url(&rec.codice_identificativo)),
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let limit = params.limit.unwrap_or(20);
        let start = params.offset.unwrap_or(0);

        let query: Vec<(&str, String)> = if let Some(isbn) = &params.isbn {
            vec![
                ("searchField", "isbn".to_string()),
                ("channel", CHANNEL.to_string()),
                ("fieldstruct", "1".to_string()),
                ("resultForPage", limit.to_string()),
                ("start", start.to_string()),
                ("isbn", normalize_isbn(isbn)),
            ]
        } else {
            let mut parts = Vec::new();
            if let Some(title) = &params.title {
                parts.push(title.clone());
            }
            if let Some(author) = &params.author {
                parts.push(author.clone());
            }
            if parts.is_empty() {
                return Err(ProviderError::no_search_params());
            }
            vec![
                ("any", parts.join(" ")),
                ("channel", CHANNEL.to_string()),
                ("resultForPage", limit.to_string()),
                ("start", start.to_string()),
            ]
        };

        let data = self.get(&query).await?;

        let items: Vec<SearchResultItem> = data
            .brief_records
            .iter()
            .map(|rec| {
                let record = parse_sbn_record(rec);
                SearchResultItem::from_record(&record, rec.codice_identificativo.clone())
            })
            .collect();

        let total = if data.num_found > 0 {
            data.num_found
        } else {
            items.len() as u64
        };
        let has_more = (start as u64 + data.brief_records.len() as u64) < total;

        Ok(SearchOutcome {
            items,
            total,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    /// The edition key is the codiceIdentificativo (SBN bid).
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let data = self
            .get(&[
                ("searchField", "bid".to_string()),
                ("channel", CHANNEL.to_string()),
                ("fieldstruct", "1".to_string()),
                ("resultForPage", "1".to_string()),
                ("bid", edition_key.to_string()),
            ])
            .await?;

        let Some(rec) = data.brief_records.first() else {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        };

        let record = parse_sbn_record(rec);
        Ok(ProviderHit {
            record,
            source_url: Some(source_url(edition_key)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubblicazione_splitting() {
        let (place, publisher, year) = parse_pubblicazione("Milano : Mondadori, 1999");
        assert_eq!(place.as_deref(), Some("Milano"));
        assert_eq!(publisher.as_deref(), Some("Mondadori"));
        assert_eq!(year.as_deref(), Some("1999"));

        let (place, publisher, year) = parse_pubblicazione("[Torino] : Einaudi, stampa 1963");
        assert_eq!(place.as_deref(), Some("Torino"));
        assert_eq!(publisher.as_deref(), Some("Einaudi"));
        assert_eq!(year.as_deref(), Some("1963"));
    }

    #[test]
    fn title_with_statement_of_responsibility() {
        let rec = SbnBriefRecord {
            titolo: Some("Il nome della rosa : romanzo / Umberto Eco".to_string()),
            ..Default::default()
        };
        let record = parse_sbn_record(&rec);
        assert_eq!(record.title.as_deref(), Some("Il nome della rosa"));
        assert_eq!(record.subtitle.as_deref(), Some("romanzo"));
    }
}
