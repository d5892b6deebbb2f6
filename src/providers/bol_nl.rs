//! Bol.com (Netherlands/Belgium) — scraped web shop.
//!
//! Two-step flow: the search page either redirects to a product page
//! directly, or lists product links to follow. Product pages are parsed
//! with Dutch label/value regexes, with JSON-LD fragments as fallback for
//! title/author/cover.

use crate::constants::BOL_NL;
use crate::error::{ProviderError, Result};
use crate::parsers::text::{extract_year, normalize_isbn};
use crate::parsers::xml::decode_entities;
use crate::providers::{check_status, BROWSER_USER_AGENT};
use crate::types::{BookProvider, BookRecord, ProviderHit, ProviderKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, instrument};

static PDP_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<h1[^>]*class="[^"]*pdp-header__title[^"]*"[^>]*>([^<]+)</h1>"#).unwrap()
});
static H1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<h1[^>]*>([^<]+)</h1>").unwrap());
static JSON_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""name"\s*:\s*"([^"]+)""#).unwrap());
static PRODUCT_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href="(/nl/nl/p/[^"]+)""#).unwrap());
static SUBTITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Subtitel[^<]*<[^>]+>([^<]+)").unwrap());
static AUTHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Auteur[^<]*<[^>]+>([^<]+)").unwrap());
static AUTHOR_JSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"author"\s*:\s*\[\s*\{[^}]*"name"\s*:\s*"([^"]+)""#).unwrap()
});
static PUBLISHER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Uitgever[^<]*<[^>]+>([^<]+)").unwrap());
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Verschijningsdatum[^<]*<[^>]+>([^<]+)").unwrap());
static YEAR_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Jaar[^<]*<[^>]+>(\d{4})").unwrap());
static PAGES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Aantal pagina['’]?s[^<]*<[^>]+>(\d+)").unwrap());
static LANG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Taal[^<]*<[^>]+>([^<]+)").unwrap());
static ISBN13_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ISBN13[^<]*<[^>]+>([0-9-]+)").unwrap());
static ISBN13_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"isbn"\s*:\s*"(\d{13})""#).unwrap());
static ISBN13_DASHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{3}-\d-\d{2,5}-\d{4,5}-\d)").unwrap());
static ISBN10_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ISBN10[^<]*<[^>]+>([0-9X-]+)").unwrap());
static COVER_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"image"\s*:\s*"([^"]+)""#).unwrap());
static FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Bindwijze[^<]*<[^>]+>([^<]+)").unwrap());

/// Parse a bol.com product page into the canonical shape.
pub fn parse_product_page(html: &str) -> Result<BookRecord> {
    let mut record = BookRecord::default();

    record.title = H1_RE
        .captures(html)
        .map(|c| decode_entities(&c[1]))
        .or_else(|| JSON_NAME_RE.captures(html).map(|c| decode_entities(&c[1])));
    if record.title.is_none() {
        return Err(ProviderError::Parse(
            "Could not parse title from page".to_string(),
        ));
    }

    record.subtitle = SUBTITLE_RE.captures(html).map(|c| decode_entities(&c[1]));

    for caps in AUTHOR_RE.captures_iter(html) {
        let author = decode_entities(&caps[1]);
        if !author.is_empty() && !record.authors.contains(&author) {
            record.authors.push(author);
        }
    }
    if record.authors.is_empty() {
        if let Some(caps) = AUTHOR_JSON_RE.captures(html) {
            record.authors.push(decode_entities(&caps[1]));
        }
    }

    record.publisher = PUBLISHER_RE.captures(html).map(|c| decode_entities(&c[1]));

    record.publication_year = DATE_RE
        .captures(html)
        .and_then(|c| extract_year(&decode_entities(&c[1])))
        .or_else(|| YEAR_LABEL_RE.captures(html).map(|c| c[1].to_string()));

    record.pages = PAGES_RE.captures(html).and_then(|c| c[1].parse().ok());
    record.language = LANG_RE.captures(html).map(|c| decode_entities(&c[1]));

    record.isbn_13 = ISBN13_LABEL_RE
        .captures(html)
        .map(|c| c[1].replace('-', ""))
        .or_else(|| ISBN13_JSON_RE.captures(html).map(|c| c[1].to_string()))
        .or_else(|| {
            ISBN13_DASHED_RE
                .captures(html)
                .map(|c| c[1].replace('-', ""))
        });
    record.isbn_10 = ISBN10_LABEL_RE.captures(html).map(|c| c[1].replace('-', ""));

    record.cover_url = COVER_JSON_RE.captures(html).map(|c| c[1].to_string());
    record.format = FORMAT_RE.captures(html).map(|c| decode_entities(&c[1]));

    Ok(record)
}

pub struct BolNlProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl BolNlProvider {
    pub fn new(timeout: Duration) -> Self {
        BolNlProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<(String, String)> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", BROWSER_USER_AGENT)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "nl-NL,nl;q=0.9,en;q=0.8")
            .timeout(self.timeout)
            .send()
            .await?;
        let response = check_status(response)?;
        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok((final_url, body))
    }
}

#[async_trait::async_trait]
impl BookProvider for BolNlProvider {
    fn code(&self) -> &'static str {
        BOL_NL
    }

    fn name(&self) -> &'static str {
        "Bol.com"
    }

    fn country(&self) -> Option<&'static str> {
        Some("NL")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Html
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let search_url = format!("https://www.bol.com/nl/nl/s/?searchtext={}", clean);
        let (final_url, html) = self.fetch_page(&search_url).await?;

        // A direct ISBN match redirects to the product page
        if PDP_TITLE_RE.is_match(&html) {
            debug!("search redirected straight to a product page");
            let record = parse_product_page(&html)?;
            return Ok(ProviderHit {
                record,
                source_url: Some(final_url),
            });
        }

        // Otherwise follow the first product link in the results
        let Some(caps) = PRODUCT_LINK_RE.captures(&html) else {
            return Err(ProviderError::NotFound("No results found".to_string()));
        };
        let product_url = format!("https://www.bol.com{}", &caps[1]);
        let (final_url, product_html) = self.fetch_page(&product_url).await?;

        let record = parse_product_page(&product_html)?;
        Ok(ProviderHit {
            record,
            source_url: Some(final_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_page_parsing() {
        let html = r#"
            <h1 class="pdp-header__title">Het Achterhuis</h1>
            <div>Auteur</div><a>Anne Frank</a>
            <div>Uitgever</div><span>Prometheus</span>
            <div>Verschijningsdatum</div><span>juni 2019</span>
            <div>Aantal pagina's</div><span>352</span>
            <div>Taal</div><span>Nederlands</span>
            <div>ISBN13</div><span>978-90-446-4094-1</span>
            <div>Bindwijze</div><span>Paperback</span>
            "#;
        let record = parse_product_page(html).unwrap();
        assert_eq!(record.title.as_deref(), Some("Het Achterhuis"));
        assert_eq!(record.authors, vec!["Anne Frank".to_string()]);
        assert_eq!(record.publisher.as_deref(), Some("Prometheus"));
        assert_eq!(record.publication_year.as_deref(), Some("2019"));
        assert_eq!(record.pages, Some(352));
        assert_eq!(record.isbn_13.as_deref(), Some("9789044640941"));
        assert_eq!(record.format.as_deref(), Some("Paperback"));
    }

    #[test]
    fn pages_without_title_fail() {
        assert!(parse_product_page("<div>no book here</div>").is_err());
    }
}
