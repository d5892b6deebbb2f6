//! Shared SRU (Search/Retrieve via URL) adapter.
//!
//! The national-library catalogs in this family speak the same protocol with
//! different endpoints, record schemas, and CQL index names, so one
//! config-driven adapter covers all of them. Responses are MARCXML, or
//! UNIMARC XML for the libraries flagged as such (BnF, SUDOC).

use crate::error::{ProviderError, Result};
use crate::parsers::marc;
use crate::parsers::text::{ensure_lookup_isbn, normalize_isbn};
use crate::providers::check_status;
use crate::types::{
    BookProvider, ProviderHit, ProviderKind, SearchOutcome, SearchParams, SearchResultItem,
};
use std::time::Duration;
use tracing::{debug, instrument};

/// CQL index names, which vary per library. A `None` index means the
/// library cannot be queried on that field.
#[derive(Debug, Clone, Copy, Default)]
pub struct SruIndexes {
    pub isbn: Option<&'static str>,
    pub title: Option<&'static str>,
    pub author: Option<&'static str>,
    pub publisher: Option<&'static str>,
    pub year: Option<&'static str>,
}

/// Per-library SRU configuration.
#[derive(Debug, Clone)]
pub struct SruConfig {
    pub code: &'static str,
    pub name: &'static str,
    pub country: Option<&'static str>,
    pub base_url: &'static str,
    /// Record schema to request ("marcxml", "MARC21-xml", "unimarcXchange", ...)
    pub record_schema: &'static str,
    pub version: &'static str,
    pub indexes: SruIndexes,
    /// Human-navigable record URL with an `{isbn}` placeholder.
    pub source_url_pattern: Option<&'static str>,
    /// True for the UNIMARC-based libraries — tag numbering differs entirely.
    pub unimarc: bool,
}

pub struct SruProvider {
    config: SruConfig,
    client: reqwest::Client,
    timeout: Duration,
}

/// Build a CQL conjunction from the searchable params this library indexes.
pub fn build_cql(params: &SearchParams, indexes: &SruIndexes) -> Option<String> {
    let mut parts = Vec::new();
    if let (Some(isbn), Some(idx)) = (&params.isbn, indexes.isbn) {
        parts.push(format!("{}=\"{}\"", idx, normalize_isbn(isbn)));
    }
    if let (Some(title), Some(idx)) = (&params.title, indexes.title) {
        parts.push(format!("{}=\"{}\"", idx, title));
    }
    if let (Some(author), Some(idx)) = (&params.author, indexes.author) {
        parts.push(format!("{}=\"{}\"", idx, author));
    }
    if let (Some(publisher), Some(idx)) = (&params.publisher, indexes.publisher) {
        parts.push(format!("{}=\"{}\"", idx, publisher));
    }
    if let (Some(from), Some(idx)) = (&params.year_from, indexes.year) {
        parts.push(format!("{}>=\"{}\"", idx, from));
    }
    if let (Some(to), Some(idx)) = (&params.year_to, indexes.year) {
        parts.push(format!("{}<=\"{}\"", idx, to));
    }
    (!parts.is_empty()).then(|| parts.join(" and "))
}

impl SruProvider {
    pub fn new(config: SruConfig, timeout: Duration) -> Self {
        SruProvider {
            config,
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn fetch(&self, query: &str, start_record: u32, max_records: u32) -> Result<String> {
        let mut params = vec![
            ("version", self.config.version.to_string()),
            ("operation", "searchRetrieve".to_string()),
            ("query", query.to_string()),
            ("recordSchema", self.config.record_schema.to_string()),
            ("maximumRecords", max_records.to_string()),
        ];
        if start_record > 1 {
            params.push(("startRecord", start_record.to_string()));
        }

        debug!(endpoint = self.config.base_url, query, "SRU searchRetrieve");
        let response = self
            .client
            .get(self.config.base_url)
            .query(&params)
            .header("Accept", "application/xml, text/xml")
            .timeout(self.timeout)
            .send()
            .await?;
        let xml = check_status(response)?.text().await?;

        if let Some(message) = marc::diagnostic_message(&xml) {
            return Err(ProviderError::Api { message });
        }
        Ok(xml)
    }

    fn parse_hit(&self, record_xml: &str, clean_isbn: &str) -> Result<ProviderHit> {
        let mut record = marc::parse_record(record_xml, self.config.unimarc);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, clean_isbn);

        let source_url = self.config.source_url_pattern.and_then(|pattern| {
            record
                .isbn_13
                .as_deref()
                .or(record.isbn_10.as_deref())
                .map(|isbn| pattern.replace("{isbn}", isbn))
        });

        Ok(ProviderHit { record, source_url })
    }
}

#[async_trait::async_trait]
impl BookProvider for SruProvider {
    fn code(&self) -> &'static str {
        self.config.code
    }

    fn name(&self) -> &'static str {
        self.config.name
    }

    fn country(&self) -> Option<&'static str> {
        self.config.country
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Sru
    }

    #[instrument(skip(self), fields(source = self.config.code))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let Some(isbn_index) = self.config.indexes.isbn else {
            return Err(ProviderError::Unsupported(
                "ISBN search not supported".to_string(),
            ));
        };

        let query = format!("{}=\"{}\"", isbn_index, clean);
        let xml = self.fetch(&query, 1, 1).await?;

        let records = marc::extract_records(&xml);
        let Some(first) = records.first() else {
            return Err(ProviderError::isbn_not_found());
        };
        self.parse_hit(first, &clean)
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    #[instrument(skip(self, params), fields(source = self.config.code))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let Some(query) = build_cql(params, &self.config.indexes) else {
            return Err(ProviderError::no_search_params());
        };

        let limit = params.limit.unwrap_or(20).min(50) as u32;
        let offset = params.offset.unwrap_or(0) as u32;
        let start_record = offset + 1; // SRU is 1-based

        let xml = self.fetch(&query, start_record, limit).await?;
        let total = marc::number_of_records(&xml);
        let records = marc::extract_records(&xml);

        let items: Vec<SearchResultItem> = records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let record = marc::parse_record(rec, self.config.unimarc);
                // Edition keys encode the query and record position so
                // get_details can re-fetch the exact record statelessly.
                let key = detail_key(start_record + i as u32, &query);
                SearchResultItem::from_record(&record, key)
            })
            .collect();

        let has_more = (offset as u64 + records.len() as u64) < total;
        Ok(SearchOutcome {
            items,
            total,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(source = self.config.code))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let Some((start_record, query)) = parse_detail_key(edition_key) else {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        };

        let xml = self.fetch(query, start_record, 1).await?;
        let records = marc::extract_records(&xml);
        let Some(first) = records.first() else {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        };
        self.parse_hit(first, "")
    }
}

/// Opaque edition key: the record's 1-based SRU position plus the query
/// that produced it.
pub fn detail_key(start_record: u32, query: &str) -> String {
    format!("{}|{}", start_record, query)
}

pub fn parse_detail_key(edition_key: &str) -> Option<(u32, &str)> {
    let (start, query) = edition_key.split_once('|')?;
    Some((start.parse().ok()?, query))
}

/// The SRU-protocol national-library family.
pub fn national_library_providers(timeout: Duration) -> Vec<SruProvider> {
    let configs = vec![
        SruConfig {
            code: crate::constants::LOC,
            name: "Library of Congress",
            country: Some("US"),
            base_url: "https://lx2.loc.gov/sru/lcdb",
            record_schema: "marcxml",
            version: "1.1",
            indexes: SruIndexes {
                isbn: Some("bath.isbn"),
                title: Some("dc.title"),
                author: Some("dc.creator"),
                // dc.publisher is not supported by LoC SRU
                publisher: None,
                year: Some("dc.date"),
            },
            source_url_pattern: Some("https://lccn.loc.gov/{isbn}"),
            unimarc: false,
        },
        SruConfig {
            code: crate::constants::BNF,
            name: "Bibliothèque nationale de France",
            country: Some("FR"),
            base_url: "https://catalogue.bnf.fr/api/SRU",
            record_schema: "unimarcXchange",
            version: "1.2",
            indexes: SruIndexes {
                isbn: Some("bib.isbn"),
                title: Some("bib.title"),
                author: Some("bib.author"),
                publisher: Some("bib.publisher"),
                year: Some("bib.publicationdate"),
            },
            source_url_pattern: Some(
                "https://catalogue.bnf.fr/rechercher.do?critere1=ISBN&recherche1={isbn}",
            ),
            unimarc: true,
        },
        SruConfig {
            code: crate::constants::DNB,
            name: "Deutsche Nationalbibliothek",
            country: Some("DE"),
            base_url: "https://services.dnb.de/sru/dnb",
            record_schema: "MARC21-xml",
            version: "1.1",
            indexes: SruIndexes {
                isbn: Some("dnb.num"),
                title: Some("dnb.tit"),
                author: Some("dnb.atr"),
                publisher: Some("dnb.vlg"),
                year: Some("dnb.jhr"),
            },
            source_url_pattern: Some("https://d-nb.info/{isbn}"),
            unimarc: false,
        },
        // K10plus is the merged union catalog of the GBV and SWB consortia
        SruConfig {
            code: crate::constants::K10PLUS,
            name: "K10plus (GBV/SWB)",
            country: Some("DE"),
            base_url: "https://sru.k10plus.de/opac-de-627",
            record_schema: "marcxml",
            version: "1.1",
            indexes: SruIndexes {
                isbn: Some("pica.isb"),
                title: Some("pica.tit"),
                author: Some("pica.per"),
                publisher: Some("pica.vlg"),
                year: Some("pica.jah"),
            },
            source_url_pattern: Some(
                "https://kxp.k10plus.de/DB=2.1/CMD?ACT=SRCHA&IKT=1007&TRM={isbn}",
            ),
            unimarc: false,
        },
        // SUDOC is the French university union catalog managed by ABES
        SruConfig {
            code: crate::constants::SUDOC,
            name: "SUDOC (France)",
            country: Some("FR"),
            base_url: "https://www.sudoc.abes.fr/cbs/sru/",
            record_schema: "unimarc",
            version: "1.1",
            indexes: SruIndexes {
                isbn: Some("isb"),
                title: Some("mti"),
                author: Some("aut"),
                publisher: Some("edi"),
                year: Some("apu"),
            },
            source_url_pattern: Some(
                "https://www.sudoc.abes.fr/cbs/DB=2.1/CMD?ACT=SRCHA&IKT=7&TRM={isbn}",
            ),
            unimarc: true,
        },
        SruConfig {
            code: crate::constants::BNE,
            name: "Biblioteca Nacional de España",
            country: Some("ES"),
            base_url: "https://catalogo.bne.es/view/sru/34BNE_INST",
            record_schema: "marcxml",
            version: "1.2",
            indexes: SruIndexes {
                isbn: Some("alma.isbn"),
                title: Some("alma.title"),
                author: Some("alma.creator"),
                publisher: None,
                year: Some("alma.main_pub_date"),
            },
            source_url_pattern: Some("https://catalogo.bne.es/search?query=alma.isbn={isbn}"),
            unimarc: false,
        },
        // SLSP runs Alma for the Swiss National Library + 500 academic libraries
        SruConfig {
            code: crate::constants::SLSP,
            name: "Swisscovery (SLSP)",
            country: Some("CH"),
            base_url: "https://swisscovery.slsp.ch/view/sru/41SLSP_NETWORK",
            record_schema: "marcxml",
            version: "1.2",
            indexes: SruIndexes {
                isbn: Some("alma.isbn"),
                title: Some("alma.title"),
                author: Some("alma.creator"),
                publisher: None,
                year: Some("alma.main_pub_date"),
            },
            source_url_pattern: Some(
                "https://swisscovery.slsp.ch/search?query=any,contains,{isbn}",
            ),
            unimarc: false,
        },
    ];

    configs
        .into_iter()
        .map(|config| SruProvider::new(config, timeout))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexes() -> SruIndexes {
        SruIndexes {
            isbn: Some("bath.isbn"),
            title: Some("dc.title"),
            author: Some("dc.creator"),
            publisher: None,
            year: Some("dc.date"),
        }
    }

    #[test]
    fn cql_joins_with_and() {
        let params = SearchParams {
            title: Some("Dune".to_string()),
            author: Some("Herbert".to_string()),
            year_from: Some("1965".to_string()),
            ..Default::default()
        };
        assert_eq!(
            build_cql(&params, &indexes()).as_deref(),
            Some(r#"dc.title="Dune" and dc.creator="Herbert" and dc.date>="1965""#)
        );
    }

    #[test]
    fn cql_skips_unindexed_fields() {
        let params = SearchParams {
            publisher: Some("Chilton".to_string()),
            ..Default::default()
        };
        assert_eq!(build_cql(&params, &indexes()), None);
    }

    #[test]
    fn cql_normalizes_isbn() {
        let params = SearchParams {
            isbn: Some("978-0-441-17271-9".to_string()),
            ..Default::default()
        };
        assert_eq!(
            build_cql(&params, &indexes()).as_deref(),
            Some(r#"bath.isbn="9780441172719""#)
        );
    }

    #[test]
    fn detail_key_round_trip() {
        let key = detail_key(7, r#"dc.title="Dune""#);
        assert_eq!(parse_detail_key(&key), Some((7, r#"dc.title="Dune""#)));
        assert_eq!(parse_detail_key("not a key"), None);
    }
}
