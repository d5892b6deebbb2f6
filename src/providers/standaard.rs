//! Standaard Boekhandel (Belgium) — autocomplete API for search plus
//! JSON-LD structured data from product pages. No auth, no WAF.

use crate::constants::STANDAARD;
use crate::error::{ProviderError, Result};
use crate::parsers::text::{extract_year, normalize_isbn};
use crate::providers::{check_status, BROWSER_USER_AGENT};
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const BASE_URL: &str = "https://www.standaardboekhandel.be";
const AUTOCOMPLETE_PATH: &str =
    "/services/Ecom-SB/nl-BE/SuggestionSearch/Autocomplete?dataSource=%7BDECFDF39-DC39-4706-B61B-27D0FB06CE38%7D";

static URL_ISBN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{13}|\d{10})(?:\?|$|#)").unwrap());
static URL_ISBN_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(\d{10,13})$").unwrap());
static SCHEMA_FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"schema\.org/(\w+)$").unwrap());

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteItem {
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub text: String,
    /// Usually the author name
    pub sub_text: Option<String>,
    /// e.g. "/p/le-petit-prince-9782070408504"
    #[serde(default)]
    pub relative_url: String,
    pub image_url: Option<String>,
    /// "BOOK", "EBOOK", ...
    pub product_type_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutocompleteGroup {
    #[serde(default)]
    pub autocompletes: Vec<AutocompleteItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutocompleteResponse {
    #[serde(default)]
    pub autocomplete: Vec<AutocompleteGroup>,
}

/// ISBN embedded in a product URL like "/p/le-petit-prince-9782070408504".
pub fn isbn_from_url(url: &str) -> Option<String> {
    URL_ISBN_RE
        .captures(url)
        .or_else(|| URL_ISBN_SUFFIX_RE.captures(url))
        .map(|c| c[1].to_string())
}

/// Map a JSON-LD `Book` object onto the canonical shape.
pub fn parse_json_ld(json_ld: &Value, relative_url: &str) -> BookRecord {
    let mut record = BookRecord::default();

    record.title = json_ld["name"].as_str().map(str::to_string);
    record.description = json_ld["description"].as_str().map(str::to_string);

    // author/publisher appear as a single object or an array of objects
    let names = |field: &Value| -> Vec<String> {
        match field {
            Value::Array(arr) => arr
                .iter()
                .filter_map(|a| a["name"].as_str().or(a.as_str()).map(str::to_string))
                .collect(),
            Value::Object(_) => field["name"]
                .as_str()
                .map(|n| vec![n.to_string()])
                .unwrap_or_default(),
            Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    };
    record.authors = names(&json_ld["author"]);
    record.publisher = names(&json_ld["publisher"]).into_iter().next();

    record.cover_url = json_ld["image"]
        .as_str()
        .or_else(|| json_ld["image"]["url"].as_str())
        .map(str::to_string);

    // workExample carries the edition facts: ISBN, date, pages, format
    let work = &json_ld["workExample"];
    if let Some(isbn) = work["isbn"].as_str() {
        let clean = normalize_isbn(isbn);
        if clean.len() == 13 {
            record.isbn_13 = Some(clean);
        } else if clean.len() == 10 {
            record.isbn_10 = Some(clean);
        }
    }
    if let Some(date) = work["datePublished"].as_str() {
        record.publication_year = extract_year(date);
    }
    record.pages = work["numberOfPages"]
        .as_u64()
        .map(|p| p as u32)
        .or_else(|| {
            work["numberOfPages"]
                .as_str()
                .and_then(|p| p.parse().ok())
        });
    if let Some(format_url) = work["bookFormat"].as_str() {
        // Schema.org format like "http://schema.org/Paperback"
        record.format = SCHEMA_FORMAT_RE
            .captures(format_url)
            .map(|c| c[1].to_string());
    }

    // The URL-embedded ISBN is the fallback
    if record.isbn_13.is_none() && record.isbn_10.is_none() {
        if let Some(isbn) = isbn_from_url(relative_url) {
            if isbn.len() == 13 {
                record.isbn_13 = Some(isbn);
            } else {
                record.isbn_10 = Some(isbn);
            }
        }
    }

    record
}

/// Find the JSON-LD `Book` block embedded in a product page.
pub fn extract_book_json_ld(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    for element in document.select(&selector) {
        if let Ok(parsed) = serde_json::from_str::<Value>(&element.inner_html()) {
            if parsed["@type"].as_str() == Some("Book") {
                return Some(parsed);
            }
        }
    }
    None
}

fn autocomplete_to_item(item: &AutocompleteItem) -> SearchResultItem {
    let isbn = isbn_from_url(&item.relative_url);
    SearchResultItem {
        title: if item.text.is_empty() {
            item.search_text.clone()
        } else {
            item.text.clone()
        },
        authors: item.sub_text.clone().into_iter().collect(),
        isbn_13: isbn.clone().filter(|i| i.len() == 13),
        isbn_10: isbn.filter(|i| i.len() == 10),
        cover_url: item.image_url.clone(),
        format: (item.product_type_name.as_deref() == Some("EBOOK"))
            .then(|| "eBook".to_string()),
        // The relative product URL doubles as the detail key
        edition_key: item.relative_url.clone(),
        ..Default::default()
    }
}

pub struct StandaardProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl StandaardProvider {
    pub fn new(timeout: Duration) -> Self {
        StandaardProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn autocomplete(&self, query: &str) -> Result<Vec<AutocompleteItem>> {
        let response = self
            .client
            .post(format!("{}{}", BASE_URL, AUTOCOMPLETE_PATH))
            .header("User-Agent", BROWSER_USER_AGENT)
            .form(&[("searchText", query)])
            .timeout(self.timeout)
            .send()
            .await?;
        let data: AutocompleteResponse = check_status(response)?.json().await?;

        // Only product entries (not category/author suggestion links)
        Ok(data
            .autocomplete
            .into_iter()
            .flat_map(|group| group.autocompletes)
            .filter(|item| item.relative_url.starts_with("/p/"))
            .collect())
    }

    async fn fetch_product(&self, relative_url: &str) -> Result<(Option<Value>, String)> {
        let full_url = format!("{}{}", BASE_URL, relative_url);
        let response = self
            .client
            .get(&full_url)
            .header("User-Agent", BROWSER_USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await?;
        let html = check_status(response)?.text().await?;
        Ok((extract_book_json_ld(&html), full_url))
    }
}

#[async_trait::async_trait]
impl BookProvider for StandaardProvider {
    fn code(&self) -> &'static str {
        STANDAARD
    }

    fn name(&self) -> &'static str {
        "Standaard Boekhandel"
    }

    fn country(&self) -> Option<&'static str> {
        Some("BE")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Html
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);

        // Step 1: locate the product via autocomplete
        let items = self.autocomplete(&clean).await?;
        if items.is_empty() {
            return Err(ProviderError::NotFound("No results found".to_string()));
        }
        let best = items
            .iter()
            .find(|item| item.relative_url.contains(&clean))
            .unwrap_or(&items[0]);

        // Step 2: full details from the product page's structured data
        let (json_ld, full_url) = self.fetch_product(&best.relative_url).await?;
        let Some(json_ld) = json_ld else {
            // No JSON-LD block: fall back to what autocomplete gave us
            debug!("product page has no JSON-LD, using autocomplete fields");
            let record = BookRecord {
                title: Some(if best.text.is_empty() {
                    best.search_text.clone()
                } else {
                    best.text.clone()
                }),
                authors: best.sub_text.clone().into_iter().collect(),
                isbn_13: (clean.len() == 13).then(|| clean.clone()),
                isbn_10: (clean.len() == 10).then(|| clean.clone()),
                cover_url: best.image_url.clone(),
                ..Default::default()
            };
            return Ok(ProviderHit {
                record,
                source_url: Some(full_url),
            });
        };

        let record = parse_json_ld(&json_ld, &best.relative_url);
        if record.title.is_none() {
            return Err(ProviderError::Parse(
                "No title in structured data".to_string(),
            ));
        }

        Ok(ProviderHit {
            record,
            source_url: Some(full_url),
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let mut query_parts = Vec::new();
        if let Some(isbn) = &params.isbn {
            query_parts.push(normalize_isbn(isbn));
        }
        if let Some(title) = &params.title {
            query_parts.push(title.clone());
        }
        if let Some(author) = &params.author {
            query_parts.push(author.clone());
        }
        // The autocomplete barely understands publisher terms; only useful alone
        if let Some(publisher) = &params.publisher {
            if params.title.is_none() && params.author.is_none() {
                query_parts.push(publisher.clone());
            }
        }
        if query_parts.is_empty() {
            return Err(ProviderError::no_search_params());
        }

        let items = self.autocomplete(&query_parts.join(" ")).await?;
        let results: Vec<SearchResultItem> = items
            .iter()
            .filter(|item| {
                matches!(
                    item.product_type_name.as_deref(),
                    None | Some("BOOK") | Some("EBOOK")
                )
            })
            .map(autocomplete_to_item)
            .collect();

        // The autocomplete returns ~10 items at most; page client-side
        let offset = params.offset.unwrap_or(0);
        let limit = params.limit.unwrap_or(20);
        let total = results.len() as u64;
        let paged: Vec<SearchResultItem> =
            results.into_iter().skip(offset).take(limit).collect();
        let has_more = (offset as u64 + paged.len() as u64) < total;

        Ok(SearchOutcome {
            items: paged,
            total,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    /// The edition key is the relative product URL.
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let (json_ld, full_url) = self.fetch_product(edition_key).await?;
        let Some(json_ld) = json_ld else {
            return Err(ProviderError::Parse(
                "No structured data found on product page".to_string(),
            ));
        };

        let record = parse_json_ld(&json_ld, edition_key);
        if record.title.is_none() {
            return Err(ProviderError::Parse(
                "No title in structured data".to_string(),
            ));
        }

        Ok(ProviderHit {
            record,
            source_url: Some(full_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_ld_book_mapping() {
        let json_ld = json!({
            "@type": "Book",
            "name": "Le petit prince",
            "author": [{"@type": "Person", "name": "Antoine de Saint-Exupéry"}],
            "publisher": [{"@type": "Organization", "name": "Gallimard"}],
            "image": {"@type": "ImageObject", "url": "https://img.example/petit-prince.jpg"},
            "workExample": {
                "isbn": "9782070408504",
                "datePublished": "1999-03-01",
                "numberOfPages": 97,
                "bookFormat": "http://schema.org/Paperback"
            }
        });
        let record = parse_json_ld(&json_ld, "/p/le-petit-prince-9782070408504");
        assert_eq!(record.title.as_deref(), Some("Le petit prince"));
        assert_eq!(record.authors, vec!["Antoine de Saint-Exupéry".to_string()]);
        assert_eq!(record.publisher.as_deref(), Some("Gallimard"));
        assert_eq!(record.isbn_13.as_deref(), Some("9782070408504"));
        assert_eq!(record.publication_year.as_deref(), Some("1999"));
        assert_eq!(record.pages, Some(97));
        assert_eq!(record.format.as_deref(), Some("Paperback"));
    }

    #[test]
    fn json_ld_block_is_located_in_html() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@type":"Organization","name":"shop"}</script>
            <script type="application/ld+json">{"@type":"Book","name":"Found it"}</script>
            </head><body></body></html>"#;
        let json_ld = extract_book_json_ld(html).unwrap();
        assert_eq!(json_ld["name"].as_str(), Some("Found it"));
    }

    #[test]
    fn url_isbn_extraction() {
        assert_eq!(
            isbn_from_url("/p/le-petit-prince-9782070408504").as_deref(),
            Some("9782070408504")
        );
        assert_eq!(isbn_from_url("/p/some-book"), None);
    }
}
