//! Google Books volumes API — free, no key required for basic usage.

use crate::constants::GOOGLE_BOOKS;
use crate::error::{ProviderError, Result};
use crate::parsers::text::{ensure_lookup_isbn, extract_year, normalize_isbn};
use crate::providers::check_status;
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

const API_BASE: &str = "https://www.googleapis.com/books/v1/volumes";

/// Map a volume's `volumeInfo` onto the canonical shape.
pub fn parse_volume(volume: &Value) -> BookRecord {
    let info = &volume["volumeInfo"];
    let mut record = BookRecord::default();

    record.title = info["title"].as_str().map(str::to_string);
    record.subtitle = info["subtitle"].as_str().map(str::to_string);
    if let Some(authors) = info["authors"].as_array() {
        record.authors = authors
            .iter()
            .filter_map(|a| a.as_str().map(str::to_string))
            .collect();
    }
    record.publisher = info["publisher"].as_str().map(str::to_string);

    // publishedDate can be "2004", "2004-03", or "2004-03-15"
    if let Some(date) = info["publishedDate"].as_str() {
        record.publication_year = extract_year(date);
    }

    if let Some(identifiers) = info["industryIdentifiers"].as_array() {
        for id in identifiers {
            match (id["type"].as_str(), id["identifier"].as_str()) {
                (Some("ISBN_13"), Some(value)) => record.isbn_13 = Some(value.to_string()),
                (Some("ISBN_10"), Some(value)) => record.isbn_10 = Some(value.to_string()),
                _ => {}
            }
        }
    }

    record.cover_url = best_cover(&info["imageLinks"]);
    record.language = info["language"].as_str().map(str::to_string);
    record.pages = info["pageCount"].as_u64().map(|p| p as u32);
    record.description = info["description"].as_str().map(str::to_string);

    if let Some(categories) = info["categories"].as_array() {
        record.subjects = categories
            .iter()
            .filter_map(|c| c.as_str().map(str::to_string))
            .collect();
    }

    // printType "BOOK" is the default and not worth recording
    record.format = info["printType"]
        .as_str()
        .filter(|t| *t != "BOOK")
        .map(str::to_string);

    record
}

/// Prefer the biggest image; Google returns http URLs, upgrade to https.
fn best_cover(images: &Value) -> Option<String> {
    ["extraLarge", "large", "medium", "small", "thumbnail"]
        .iter()
        .find_map(|size| images[*size].as_str())
        .map(|url| url.replacen("http:", "https:", 1))
}

fn thumbnail_cover(images: &Value) -> Option<String> {
    ["smallThumbnail", "thumbnail"]
        .iter()
        .find_map(|size| images[*size].as_str())
        .map(|url| url.replacen("http:", "https:", 1))
}

fn volume_source_url(volume: &Value) -> Option<String> {
    volume["volumeInfo"]["infoLink"]
        .as_str()
        .map(str::to_string)
        .or_else(|| {
            volume["id"]
                .as_str()
                .map(|id| format!("https://books.google.com/books?id={}", id))
        })
}

pub struct GoogleBooksProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl GoogleBooksProvider {
    pub fn new(timeout: Duration) -> Self {
        GoogleBooksProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }
}

#[async_trait::async_trait]
impl BookProvider for GoogleBooksProvider {
    fn code(&self) -> &'static str {
        GOOGLE_BOOKS
    }

    fn name(&self) -> &'static str {
        "Google Books"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let data = self
            .get_json(
                API_BASE,
                &[
                    ("q", format!("isbn:{}", clean)),
                    ("maxResults", "1".to_string()),
                ],
            )
            .await?;

        let Some(volume) = data["items"].get(0) else {
            return Err(ProviderError::isbn_not_found());
        };

        let mut record = parse_volume(volume);
        if record.title.is_none() {
            return Err(ProviderError::Parse("No title in response".to_string()));
        }
        ensure_lookup_isbn(&mut record, &clean);

        Ok(ProviderHit {
            source_url: volume_source_url(volume),
            record,
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let mut query_parts = Vec::new();
        if let Some(title) = &params.title {
            query_parts.push(format!("intitle:{}", title));
        }
        if let Some(author) = &params.author {
            query_parts.push(format!("inauthor:{}", author));
        }
        if let Some(publisher) = &params.publisher {
            query_parts.push(format!("inpublisher:{}", publisher));
        }
        if let Some(isbn) = &params.isbn {
            query_parts.push(format!("isbn:{}", normalize_isbn(isbn)));
        }
        if query_parts.is_empty() {
            return Err(ProviderError::no_search_params());
        }

        let limit = params.limit.unwrap_or(40).min(40); // Google Books max is 40
        let offset = params.offset.unwrap_or(0);
        let data = self
            .get_json(
                API_BASE,
                &[
                    ("q", query_parts.join("+")),
                    ("maxResults", limit.to_string()),
                    ("startIndex", offset.to_string()),
                    ("printType", "books".to_string()),
                    ("orderBy", "relevance".to_string()),
                ],
            )
            .await?;

        let volumes: Vec<&Value> = data["items"].as_array().map(|v| v.iter().collect()).unwrap_or_default();
        let fetched = volumes.len();

        // The API has no year-range filter, so apply it client-side; volumes
        // without a date pass through
        let from: i64 = params
            .year_from
            .as_deref()
            .and_then(|y| y.parse().ok())
            .unwrap_or(0);
        let to: i64 = params
            .year_to
            .as_deref()
            .and_then(|y| y.parse().ok())
            .unwrap_or(9999);
        let volumes: Vec<&Value> = volumes
            .into_iter()
            .filter(|v| {
                let Some(date) = v["volumeInfo"]["publishedDate"].as_str() else {
                    return true;
                };
                let Some(year) = extract_year(date).and_then(|y| y.parse::<i64>().ok()) else {
                    return true;
                };
                year >= from && year <= to
            })
            .collect();

        let items: Vec<SearchResultItem> = volumes
            .iter()
            .map(|volume| {
                let record = parse_volume(volume);
                let mut item = SearchResultItem::from_record(
                    &record,
                    volume["id"].as_str().unwrap_or_default().to_string(),
                );
                // List view uses the small thumbnail rather than full covers
                item.cover_url = thumbnail_cover(&volume["volumeInfo"]["imageLinks"]);
                item
            })
            .collect();

        let total = data["totalItems"].as_u64().unwrap_or(items.len() as u64);
        let has_more = (offset as u64 + fetched as u64) < total;

        Ok(SearchOutcome {
            items,
            total,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    /// The edition key is the Google Books volume ID.
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let url = format!("{}/{}", API_BASE, edition_key);
        let volume = self.get_json(&url, &[]).await?;

        let record = parse_volume(&volume);
        if record.title.is_none() {
            return Err(ProviderError::Parse("No title in response".to_string()));
        }

        Ok(ProviderHit {
            source_url: volume_source_url(&volume).or_else(|| {
                Some(format!("https://books.google.com/books?id={}", edition_key))
            }),
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn volume_mapping() {
        let volume = json!({
            "id": "zyTCAlFPjgYC",
            "volumeInfo": {
                "title": "The Google story",
                "subtitle": "inside the hottest business, media and technology success of our time",
                "authors": ["David A. Vise", "Mark Malseed"],
                "publisher": "Random House Digital",
                "publishedDate": "2005-11-15",
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "055380457X"},
                    {"type": "ISBN_13", "identifier": "9780553804577"}
                ],
                "pageCount": 207,
                "printType": "BOOK",
                "categories": ["Browsers (Computer programs)"],
                "language": "en",
                "imageLinks": {
                    "smallThumbnail": "http://books.google.com/books/content?id=zyTCAlFPjgYC&zoom=5",
                    "thumbnail": "http://books.google.com/books/content?id=zyTCAlFPjgYC&zoom=1"
                },
                "infoLink": "http://books.google.com/books?id=zyTCAlFPjgYC"
            }
        });

        let record = parse_volume(&volume);
        assert_eq!(record.title.as_deref(), Some("The Google story"));
        assert_eq!(record.authors.len(), 2);
        assert_eq!(record.publication_year.as_deref(), Some("2005"));
        assert_eq!(record.isbn_13.as_deref(), Some("9780553804577"));
        assert_eq!(record.isbn_10.as_deref(), Some("055380457X"));
        assert_eq!(record.pages, Some(207));
        assert_eq!(record.language.as_deref(), Some("en"));
        // printType BOOK is the default and should be dropped
        assert_eq!(record.format, None);
        // http covers are upgraded to https
        assert!(record.cover_url.unwrap().starts_with("https://"));
    }

    #[test]
    fn volume_without_title_stays_titleless() {
        let record = parse_volume(&json!({"id": "x", "volumeInfo": {}}));
        assert_eq!(record.title, None);
    }
}
