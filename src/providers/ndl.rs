//! NDL — National Diet Library (Japan).
//!
//! OpenSearch API returning RSS with Dublin Core plus `dcndl:` extensions.
//! No auth required.

use crate::constants::NDL;
use crate::error::{ProviderError, Result};
use crate::parsers::dublin_core as dc;
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, extract_page_count, extract_year, normalize_isbn, split_title};
use crate::parsers::xml;
use crate::providers::check_status;
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::instrument;

const OPENSEARCH_BASE: &str = "https://ndlsearch.ndl.go.jp/api/opensearch";

static ITEM_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d+)(?:\?|$)").unwrap());
static BIBID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"bibid=(\d+)").unwrap());
static DDC_SUBJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<dc:subject\s+xsi:type="dcndl:DDC"[^>]*>([^<]+)</dc:subject>"#).unwrap()
});
static NDC_SUBJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<dc:subject\s+xsi:type="dcndl:NDC[^"]*"[^>]*>([^<]+)</dc:subject>"#).unwrap()
});

/// Map an NDL RSS `<item>` onto the canonical shape.
pub fn parse_ndl_item(item_xml: &str) -> BookRecord {
    let mut record = BookRecord::default();

    if let Some(title) = dc::dc_text(item_xml, "dc:title") {
        let (title, subtitle) = split_title(&title);
        record.title = Some(title);
        record.subtitle = subtitle;
    }

    record.authors = dc::dc_all(item_xml, "dc:creator");
    record.publisher = dc::dc_text(item_xml, "dc:publisher");

    if let Some(date) =
        dc::dc_text(item_xml, "dc:date").or_else(|| dc::dc_text(item_xml, "dcterms:issued"))
    {
        record.publication_year = extract_year(&date);
    }

    record.language = dc::dc_text(item_xml, "dc:language");

    for id in dc::dc_all(item_xml, "dc:identifier") {
        assign_isbn(&mut record, &id);
    }
    for isbn in dc::dc_all(item_xml, "dcndl:ISBN") {
        assign_isbn(&mut record, &isbn);
    }

    // Plain dc:subject elements are topical headings; the typed ones are
    // classification numbers handled below
    record.subjects = dc::dc_all(item_xml, "dc:subject")
        .into_iter()
        .filter(|s| !s.chars().all(|c| c.is_ascii_digit() || c == '.'))
        .collect();
    record.description = dc::dc_text(item_xml, "dc:description");

    if let Some(extent) = dc::dc_text(item_xml, "dcterms:extent") {
        record.pages = extract_page_count(&extent);
        record.pagination_description = Some(extent);
    }

    record.series = dc::dc_text(item_xml, "dcndl:seriesTitle");
    record.edition = dc::dc_text(item_xml, "dcndl:edition");

    // DDC where present, NDC (Japanese classification) as fallback
    record.ddc = DDC_SUBJECT_RE
        .captures(item_xml)
        .map(|c| xml::decode_entities(&c[1]))
        .or_else(|| {
            NDC_SUBJECT_RE
                .captures(item_xml)
                .map(|c| xml::decode_entities(&c[1]))
        });

    record
}

fn item_url(item_xml: &str) -> Option<String> {
    dc::dc_text(item_xml, "link").or_else(|| dc::dc_text(item_xml, "guid"))
}

pub struct NdlProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl NdlProvider {
    pub fn new(timeout: Duration) -> Self {
        NdlProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn fetch(&self, params: &[(&str, String)]) -> Result<String> {
        let response = self
            .client
            .get(OPENSEARCH_BASE)
            .query(params)
            .header("Accept", "application/rss+xml, application/xml, text/xml")
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(check_status(response)?.text().await?)
    }
}

#[async_trait::async_trait]
impl BookProvider for NdlProvider {
    fn code(&self) -> &'static str {
        NDL
    }

    fn name(&self) -> &'static str {
        "NDL (Japan)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("JP")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let xml = self
            .fetch(&[("isbn", clean.clone()), ("cnt", "1".to_string())])
            .await?;

        let items = dc::rss_items(&xml);
        let Some(first) = items.first() else {
            return Err(ProviderError::isbn_not_found());
        };

        let mut record = parse_ndl_item(first);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        let source_url = item_url(first)
            .unwrap_or_else(|| format!("https://ndlsearch.ndl.go.jp/search?isbn={}", clean));

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
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(isbn) = &params.isbn {
            query.push(("isbn", normalize_isbn(isbn)));
        }
        if let Some(title) = &params.title {
            query.push(("title", title.clone()));
        }
        if let Some(author) = &params.author {
            query.push(("creator", author.clone()));
        }
        if let Some(publisher) = &params.publisher {
            query.push(("publisher", publisher.clone()));
        }
        if let Some(from) = &params.year_from {
            query.push(("from", from.clone()));
        }
        if let Some(to) = &params.year_to {
            query.push(("until", to.clone()));
        }
        if query.is_empty() {
            return Err(ProviderError::no_search_params());
        }

        let limit = params.limit.unwrap_or(20).min(200);
        let offset = params.offset.unwrap_or(0);
        query.push(("cnt", limit.to_string()));
        query.push(("idx", (offset + 1).to_string())); // 1-based

        let xml = self.fetch(&query).await?;
        let rss_items = dc::rss_items(&xml);
        let total = dc::open_search_total(&xml);

        let items: Vec<SearchResultItem> = rss_items
            .iter()
            .enumerate()
            .map(|(i, item_xml)| {
                let record = parse_ndl_item(item_xml);
                // NDL record id from the item URL where available
                let url = item_url(item_xml);
                let key = url
                    .as_deref()
                    .and_then(|u| {
                        ITEM_ID_RE
                            .captures(u)
                            .or_else(|| BIBID_RE.captures(u))
                            .map(|c| c[1].to_string())
                    })
                    .unwrap_or_else(|| format!("ndl-{}", offset + i));
                SearchResultItem::from_record(&record, key)
            })
            .collect();

        let has_more = (offset as u64 + rss_items.len() as u64) < total;
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
    fn ndl_item_mapping() {
        let item = r#"
          <dc:title>吾輩は猫である : 小説</dc:title>
          <dc:creator>夏目漱石</dc:creator>
          <dc:publisher>岩波書店</dc:publisher>
          <dc:date>1990</dc:date>
          <dc:language>jpn</dc:language>
          <dc:identifier xsi:type="dcndl:ISBN">4-00-310101-6</dc:identifier>
          <dcterms:extent>654p</dcterms:extent>
          <dcndl:seriesTitle>岩波文庫</dcndl:seriesTitle>
          <link>https://ndlsearch.ndl.go.jp/books/R100000002-I000001852332</link>"#;
        let record = parse_ndl_item(item);
        assert_eq!(record.title.as_deref(), Some("吾輩は猫である"));
        assert_eq!(record.subtitle.as_deref(), Some("小説"));
        assert_eq!(record.authors, vec!["夏目漱石".to_string()]);
        assert_eq!(record.isbn_10.as_deref(), Some("4003101016"));
        assert_eq!(record.pages, Some(654));
        assert_eq!(record.series.as_deref(), Some("岩波文庫"));
    }
}
