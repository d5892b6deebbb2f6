//! COBISS — union catalog network covering Slovenia, Serbia, North
//! Macedonia, Bosnia & Herzegovina, Montenegro, Bulgaria, Albania, and
//! Kosovo.
//!
//! There is no public API; the legacy COBISS+ interface returns
//! server-rendered HTML, parsed with label/value regexes. Expert search
//! uses CQL-style prefixes: BN= (ISBN), TI= (title), AU= (author),
//! PY= (year). Slovenia has the largest catalog and is searched first.

use crate::constants::COBISS;
use crate::error::{ProviderError, Result};
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, extract_page_count, extract_year, normalize_isbn, split_title};
use crate::parsers::xml::{decode_entities, strip_tags};
use crate::providers::{check_status, LOOKUP_USER_AGENT};
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_COUNTRY: &str = "si";
const LANG: &str = "en";
// Legacy interface: server-rendered HTML. Modern interface: SPA, used only
// for user-facing record URLs.
const SEARCH_BASE: &str = "https://plus-legacy.cobiss.net/cobiss";
const RECORD_BASE: &str = "https://plus.cobiss.net/cobiss";

const COUNTRY_ORDER: [&str; 8] = ["si", "sr", "bg", "mk", "bh", "cg", "al", "ks"];

pub const TIMEOUT: Duration = Duration::from_secs(12);

static OG_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"property="og:title"\s+content="([^"]+)""#).unwrap());
static TITLE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)<title[^>]*>(.*?)</title>").unwrap());
static COBISS_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*::\s*COBISS.*$").unwrap());
static CONOR_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"/conor/[^"]*"[^>]*>([^<]+)</a>"#).unwrap());
static ISBN_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ISBN[^<\d]*(?:<[^>]*>)*\s*[-–:]?\s*([\d][\d\s-]{8,16}[\dXx])").unwrap()
});
static LANGUAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Language|Jezik)\s*(?:<[^>]*>)*\s*[-–:]\s*(?:<[^>]*>)*\s*([a-zA-Z]+)")
        .unwrap()
});
static PUBLICATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?si)(?:Publication and manufacture|Založništvo|Izdanje|Impresum)[^<]*(?:<[^>]*>)*\s*[-–:]\s*(?:<[^>]*>)*(.*?)</(?:td|div|dd|p)>",
    )
    .unwrap()
});
static YEAR_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Publish date|Leto izida|Godina|Publication year|Leto)[^<]*(?:<[^>]*>)*\s*[-–:]\s*(?:<[^>]*>)*\s*(\d{4})").unwrap()
});
static PHYSICAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?si)(?:Physical desc|Fizični opis)[^<]*(?:<[^>]*>)*\s*[-–:]\s*(?:<[^>]*>)*(.*?)</(?:td|div|dd|p)>",
    )
    .unwrap()
});
static PAGES_LOCAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:str\.|p\.|pages|stran)").unwrap());
static TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?si)(?:Type of material|Vrsta gradiva)[^<]*(?:<[^>]*>)*\s*[-–:]\s*(?:<[^>]*>)*(.*?)</(?:td|div|dd|span)>",
    )
    .unwrap()
});
static EDITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?si)(?:Edition|Izdaja)[^<]*(?:<[^>]*>)*\s*[-–:]\s*(?:<[^>]*>)*(.*?)</(?:td|div|dd)>")
        .unwrap()
});
static SERIES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?si)(?:Series|Zbirka)[^<]*(?:<[^>]*>)*\s*[-–:]\s*(?:<[^>]*>)*(.*?)</(?:td|div|dd)>")
        .unwrap()
});
static UDC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:UDC|UDK)[^<\d]*(?:<[^>]*>)*\s*[-–:]?\s*([\d][\d.:;\[\]()\-]*)").unwrap()
});
static BIB_URL_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/bib/(\d+)").unwrap());

/// Record ids linked from a search results page (`/cobiss/{cc}/{lang}/bib/{id}`).
pub fn extract_record_ids(html: &str, country: &str) -> Vec<String> {
    let Ok(re) = Regex::new(&format!(r"/cobiss/{}/{}/bib/(\d+)", country, LANG)) else {
        return Vec::new();
    };
    let mut ids = Vec::new();
    for caps in re.captures_iter(html) {
        let id = caps[1].to_string();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Parse a COBISS+ record detail page into the canonical shape.
pub fn parse_record_html(html: &str) -> BookRecord {
    let mut record = BookRecord::default();

    // Title: og:title meta first, page <title> as fallback; both carry a
    // ":: COBISS" suffix and ISBD punctuation
    let raw_title = OG_TITLE_RE
        .captures(html)
        .map(|c| decode_entities(&c[1]))
        .or_else(|| TITLE_TAG_RE.captures(html).map(|c| strip_tags(&c[1])));
    if let Some(raw) = raw_title {
        let cleaned = COBISS_SUFFIX_RE.replace(&raw, "").trim().to_string();
        if cleaned.len() > 2 {
            let (title, subtitle) = split_title(&cleaned);
            record.title = Some(title);
            record.subtitle = subtitle;
        }
    }

    // Authors link to CONOR authority records
    for caps in CONOR_LINK_RE.captures_iter(html) {
        let name = strip_tags(&caps[1]);
        if name.len() > 2 && !record.authors.contains(&name) {
            record.authors.push(name);
        }
    }

    // "Publication and manufacture" section: Place : Publisher, Year
    if let Some(caps) = PUBLICATION_RE.captures(html) {
        let raw = strip_tags(&caps[1]);
        if !raw.is_empty() {
            record.publication_year = extract_year(&raw);
            if let Some(colon_idx) = raw.find(':') {
                if colon_idx > 0 {
                    record.publication_place =
                        Some(raw[..colon_idx].trim().replace(['[', ']'], ""));
                    let rest = raw[colon_idx + 1..].trim();
                    let rest = Regex::new(r",?\s*(?:cop\.?\s*)?\[?\d{4}\]?.*$")
                        .map(|re| re.replace(rest, "").to_string())
                        .unwrap_or_else(|_| rest.to_string());
                    let rest = rest.trim().trim_end_matches(['.', ',', ';']).trim();
                    if !rest.is_empty() {
                        record.publisher = Some(rest.to_string());
                    }
                }
            }
        }
    }
    if record.publication_year.is_none() {
        record.publication_year = YEAR_LABEL_RE.captures(html).map(|c| c[1].to_string());
    }

    for caps in ISBN_LABEL_RE.captures_iter(html) {
        assign_isbn(&mut record, &caps[1]);
    }

    record.language = LANGUAGE_RE
        .captures(html)
        .map(|c| c[1].trim().to_lowercase());

    if let Some(caps) = TYPE_RE.captures(html) {
        let format = strip_tags(&caps[1]);
        if !format.is_empty() {
            record.format = Some(format);
        }
    }

    if let Some(caps) = PHYSICAL_RE.captures(html) {
        let raw = strip_tags(&caps[1]);
        if !raw.is_empty() {
            record.pages = PAGES_LOCAL_RE
                .captures(&raw)
                .and_then(|c| c[1].parse().ok())
                .or_else(|| extract_page_count(&raw));
            record.pagination_description = Some(raw);
        }
    }

    if let Some(caps) = EDITION_RE.captures(html) {
        let edition = strip_tags(&caps[1]);
        if !edition.is_empty() {
            record.edition = Some(edition);
        }
    }
    if let Some(caps) = SERIES_RE.captures(html) {
        let series = strip_tags(&caps[1]);
        if !series.is_empty() {
            record.series = Some(series);
        }
    }

    // UDC is the closest available classification; stored in the DDC slot
    record.ddc = UDC_RE.captures(html).map(|c| c[1].trim().to_string());

    record
}

fn search_url(country: &str, query: &str) -> String {
    format!(
        "{}/{}/{}/bib/search/expert?c={}&db=cobib&mat=allmaterials",
        SEARCH_BASE,
        country,
        LANG,
        crate::providers::percent_encode(query)
    )
}

fn record_url(country: &str, cobiss_id: &str, legacy: bool) -> String {
    let base = if legacy { SEARCH_BASE } else { RECORD_BASE };
    format!("{}/{}/{}/bib/{}", base, country, LANG, cobiss_id)
}

pub struct CobissProvider {
    client: reqwest::Client,
}

impl CobissProvider {
    pub fn new() -> Self {
        CobissProvider {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch a page, following redirects; returns (final URL, body).
    async fn fetch_html(&self, url: &str) -> Result<(String, String)> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("User-Agent", LOOKUP_USER_AGENT)
            .timeout(TIMEOUT)
            .send()
            .await?;
        let response = check_status(response)?;
        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok((final_url, body))
    }

    async fn search_country(&self, country: &str, clean_isbn: &str) -> Result<ProviderHit> {
        let query = format!("BN={}", clean_isbn);
        let (final_url, html) = self.fetch_html(&search_url(country, &query)).await?;

        // A single hit redirects straight to the record page
        if let Some(caps) = BIB_URL_ID_RE.captures(&final_url) {
            let id = caps[1].to_string();
            let mut record = parse_record_html(&html);
            if record.title.is_some() {
                ensure_lookup_isbn(&mut record, clean_isbn);
                return Ok(ProviderHit {
                    record,
                    source_url: Some(record_url(country, &id, false)),
                });
            }
        }

        // Multiple results: fetch the first record's detail page
        let record_ids = extract_record_ids(&html, country);
        let Some(first_id) = record_ids.first() else {
            return Err(ProviderError::isbn_not_found());
        };

        let (_, record_html) = self.fetch_html(&record_url(country, first_id, true)).await?;
        let mut record = parse_record_html(&record_html);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, clean_isbn);

        Ok(ProviderHit {
            record,
            source_url: Some(record_url(country, first_id, false)),
        })
    }

    fn parse_search_results(&self, html: &str, country: &str) -> (Vec<SearchResultItem>, u64) {
        let total = Regex::new(r"(?i)(?:hits|zadetkov|rezultata|rezultati)\s*:\s*(\d[\d,.]*)")
            .ok()
            .and_then(|re| re.captures(html).map(|c| c[1].replace([',', '.'], "")))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);

        let record_ids = extract_record_ids(html, country);
        let mut items = Vec::new();

        for id in &record_ids {
            let Some(id_idx) = html.find(&format!("/bib/{}", id)) else {
                continue;
            };
            // A context window around the link holds the title, author, and
            // publication fragments for this result
            let mut start = id_idx.saturating_sub(500);
            while !html.is_char_boundary(start) {
                start -= 1;
            }
            let mut end = (id_idx + 1500).min(html.len());
            while !html.is_char_boundary(end) {
                end -= 1;
            }
            let context = &html[start..end];

            let link_re =
                Regex::new(&format!(r#"(?s)/bib/{}[^"]*"[^>]*>(.*?)</a>"#, id)).ok();
            let raw_title = link_re
                .and_then(|re| re.captures(context).map(|c| strip_tags(&c[1])))
                .unwrap_or_default();
            if raw_title.is_empty() {
                continue;
            }
            let (title, subtitle) = split_title(&raw_title);

            let mut item = SearchResultItem {
                title,
                subtitle,
                edition_key: format!("{}:{}", country, id),
                ..Default::default()
            };

            for caps in CONOR_LINK_RE.captures_iter(context) {
                let name = strip_tags(&caps[1]);
                if name.len() > 2 && !item.authors.contains(&name) {
                    item.authors.push(name);
                }
            }
            if let Some(caps) = ISBN_LABEL_RE.captures(context) {
                let clean = normalize_isbn(&caps[1]);
                if clean.len() == 13 {
                    item.isbn_13 = Some(clean);
                } else if clean.len() == 10 {
                    item.isbn_10 = Some(clean);
                }
            }
            if let Some(caps) = YEAR_LABEL_RE.captures(context) {
                item.publication_year = Some(caps[1].to_string());
            }

            items.push(item);
        }

        // Record links with no parseable context still get minimal entries
        if items.is_empty() && !record_ids.is_empty() {
            for id in &record_ids {
                items.push(SearchResultItem {
                    title: format!("COBISS record {}", id),
                    edition_key: format!("{}:{}", country, id),
                    ..Default::default()
                });
            }
        }

        let total = if total > 0 { total } else { items.len() as u64 };
        (items, total)
    }
}

impl Default for CobissProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BookProvider for CobissProvider {
    fn code(&self) -> &'static str {
        COBISS
    }

    fn name(&self) -> &'static str {
        "COBISS"
    }

    /// Primary country; the catalog covers 8.
    fn country(&self) -> Option<&'static str> {
        Some("SI")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Html
    }

    /// Tries each member country's shared database in order, stopping at
    /// the first one that has the ISBN.
    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);

        for country in COUNTRY_ORDER {
            match self.search_country(country, &clean).await {
                Ok(hit) => return Ok(hit),
                Err(e) => debug!(country, error = %e, "COBISS country lookup missed"),
            }
        }

        Err(ProviderError::NotFound(
            "ISBN not found in any COBISS catalog".to_string(),
        ))
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let country = DEFAULT_COUNTRY;

        let query = if let Some(isbn) = &params.isbn {
            format!("BN={}", normalize_isbn(isbn))
        } else {
            let mut parts = Vec::new();
            if let Some(title) = &params.title {
                parts.push(format!("TI={}", title));
            }
            if let Some(author) = &params.author {
                parts.push(format!("AU={}", author));
            }
            match (&params.year_from, &params.year_to) {
                (Some(from), Some(to)) => parts.push(format!("PY={}:{}", from, to)),
                (Some(from), None) => parts.push(format!("PY={}", from)),
                _ => {}
            }
            if parts.is_empty() {
                return Err(ProviderError::no_search_params());
            }
            parts.join(" AND ")
        };

        let (_, html) = self.fetch_html(&search_url(country, &query)).await?;
        let (items, total) = self.parse_search_results(&html, country);
        let has_more = (items.len() as u64) < total;

        Ok(SearchOutcome {
            items,
            total,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    /// The edition key is "{country}:{cobiss_id}".
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let (country, cobiss_id) = edition_key
            .split_once(':')
            .unwrap_or((DEFAULT_COUNTRY, edition_key));

        let (_, html) = self.fetch_html(&record_url(country, cobiss_id, true)).await?;
        let record = parse_record_html(&html);
        if record.title.is_none() {
            return Err(ProviderError::Parse("Could not parse record".to_string()));
        }

        Ok(ProviderHit {
            record,
            source_url: Some(record_url(country, cobiss_id, false)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_page_parsing() {
        let html = r#"<html><head>
            <meta property="og:title" content="Alamut : roman / Vladimir Bartol :: COBISS+" />
            </head><body>
            <a href="/conor/123">Bartol, Vladimir</a>
            <tr><td>Publication and manufacture</td><td> - Ljubljana : Sanje, 2002</td></tr>
            <tr><td>ISBN</td><td> - 961-6387-50-3</td></tr>
            <tr><td>Language</td><td> - slovenian</td></tr>
            <tr><td>Physical desc.</td><td> - 451 str.</td></tr>
            <tr><td>UDC</td><td> - 821.163.6-311.2</td></tr>
            </body></html>"#;
        let record = parse_record_html(html);
        assert_eq!(record.title.as_deref(), Some("Alamut"));
        assert_eq!(record.subtitle.as_deref(), Some("roman"));
        assert_eq!(record.authors, vec!["Bartol, Vladimir".to_string()]);
        assert_eq!(record.publication_place.as_deref(), Some("Ljubljana"));
        assert_eq!(record.publisher.as_deref(), Some("Sanje"));
        assert_eq!(record.publication_year.as_deref(), Some("2002"));
        assert_eq!(record.isbn_10.as_deref(), Some("9616387503"));
        assert_eq!(record.language.as_deref(), Some("slovenian"));
        assert_eq!(record.pages, Some(451));
        assert_eq!(record.ddc.as_deref(), Some("821.163.6-311.2"));
    }

    #[test]
    fn record_ids_are_deduplicated() {
        let html = r#"<a href="/cobiss/si/en/bib/12345">x</a>
                      <a href="/cobiss/si/en/bib/12345">x</a>
                      <a href="/cobiss/si/en/bib/67890">y</a>"#;
        assert_eq!(extract_record_ids(html, "si"), vec!["12345", "67890"]);
    }
}
