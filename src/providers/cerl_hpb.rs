//! CERL HPB — Heritage of the Printed Book (1455–1830).
//!
//! SRU endpoint with PICA indexes, MARCXML records, PPN edition keys. Rare
//! books carry their value in notes: author life dates, printer/binder
//! roles, illustrations, and dimensions are all folded into the record.

use crate::constants::CERL_HPB;
use crate::error::{ProviderError, Result};
use crate::parsers::marc::{self, DataField};
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, extract_page_count, extract_year, normalize_isbn};
use crate::providers::check_status;
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use std::time::Duration;
use tracing::instrument;

const SRU_BASE: &str = "http://sru.k10plus.de/hpb";
pub const TIMEOUT: Duration = Duration::from_secs(15);

fn trim_marc(value: &str) -> String {
    value.trim_end_matches([',', '.', ';', ':', '/', ' ']).trim().to_string()
}

/// Parse an HPB MARCXML record, keeping the rare-book extras.
pub fn parse_hpb_record(record_xml: &str) -> BookRecord {
    let mut record = BookRecord::default();

    // 245 — title/subtitle
    if let Some(f245) = marc::datafields(record_xml, "245").first() {
        record.title = f245.first('a').map(trim_marc).filter(|t| !t.is_empty());
        record.subtitle = f245.first('b').map(trim_marc).filter(|t| !t.is_empty());
    }

    let mut author_dates = Vec::new();
    let mut contributors = Vec::new();

    // 100 — main entry
    for field in marc::datafields(record_xml, "100") {
        if let Some(name) = field.first('a') {
            let clean = trim_marc(name);
            if let Some(dates) = field.first('d') {
                author_dates.push(format!("{} ({})", clean, trim_marc(dates)));
            }
            record.authors.push(clean);
        }
    }

    // 700 — added entries; only role "aut" (or none) counts as author,
    // everything else (printer, binder, illustrator) is a contributor
    for field in marc::datafields(record_xml, "700") {
        let Some(name) = field.first('a') else { continue };
        let clean = trim_marc(name);
        let role = field.first('e').or_else(|| field.first('4')).unwrap_or("");
        let dates = field.first('d').map(trim_marc);

        if role.is_empty() || role == "aut" {
            if !record.authors.contains(&clean) {
                if let Some(dates) = &dates {
                    author_dates.push(format!("{} ({})", clean, dates));
                }
                record.authors.push(clean);
            }
        } else {
            let entry = match (&dates, role) {
                (Some(dates), "oth") => format!("{} ({})", clean, dates),
                (None, "oth") => clean,
                (Some(dates), role) => format!("{} ({}) [{}]", clean, dates, role),
                (None, role) => format!("{} [{}]", clean, role),
            };
            contributors.push(entry);
        }
    }

    // 250 — edition
    if let Some(f250) = marc::datafields(record_xml, "250").first() {
        record.edition = f250.first('a').map(trim_marc).filter(|v| !v.is_empty());
    }

    // 264 preferred over 260 for early printed books
    let pub_fields = {
        let f264 = marc::datafields(record_xml, "264");
        if f264.is_empty() {
            marc::datafields(record_xml, "260")
        } else {
            f264
        }
    };
    if let Some(pub_field) = pub_fields.first() {
        record.publication_place = pub_field.first('a').map(trim_marc).filter(|v| !v.is_empty());
        record.publisher = pub_field.first('b').map(trim_marc).filter(|v| !v.is_empty());
        // "[1745?]", "MDCCXLV [1745]", "anno 1665" — take the digit run
        record.publication_year = pub_field.first('c').and_then(extract_year);
    }
    if record.publication_year.is_none() {
        record.publication_year = marc::year_from_008(record_xml);
    }

    // 300 — extent, illustrations, dimensions
    if let Some(f300) = marc::datafields(record_xml, "300").first() {
        if let Some(extent) = f300.first('a') {
            record.pages = extract_page_count(extent);
            record.pagination_description = Some(trim_marc(extent));
        }
        let mut phys = Vec::new();
        if let Some(illus) = f300.first('b') {
            phys.push(format!("Illustrations: {}", trim_marc(illus)));
        }
        if let Some(dim) = f300.first('c') {
            phys.push(format!("Dimensions: {}", trim_marc(dim)));
        }
        if !phys.is_empty() {
            record.format = Some(phys.join("; "));
        }
    }

    // 490 — series
    if let Some(f490) = marc::datafields(record_xml, "490").first() {
        record.series = f490.first('a').map(trim_marc).filter(|v| !v.is_empty());
        record.series_number = f490.first('v').map(trim_marc).filter(|v| !v.is_empty());
    }

    // 020 — ISBNs (later reprints/facsimiles only)
    for field in marc::datafields(record_xml, "020") {
        if let Some(raw) = field.first('a') {
            assign_isbn(&mut record, raw);
        }
    }

    // 041/008 — language
    record.language = marc::datafields(record_xml, "041")
        .first()
        .and_then(|f: &DataField| f.first('a'))
        .filter(|l| *l != "und")
        .map(str::to_string);
    if record.language.is_none() {
        if let Some(cf) = marc::controlfield(record_xml, "008") {
            let lang: String = cf.chars().skip(35).take(3).collect();
            let lang = lang.trim().to_string();
            if lang.len() == 3 && lang != "und" {
                record.language = Some(lang);
            }
        }
    }

    // 650 — subjects
    record.subjects = marc::datafields(record_xml, "650")
        .iter()
        .filter_map(|f| f.first('a').map(trim_marc))
        .filter(|s| !s.is_empty())
        .collect();

    // 710 — corporate names (presses, publishers) join the contributors
    for field in marc::datafields(record_xml, "710") {
        if let Some(name) = field.first('a') {
            let clean = trim_marc(name);
            if Some(&clean) != record.publication_place.as_ref() {
                contributors.push(clean);
            }
        }
    }

    // Combined notes: author dates, contributors, then 500 general notes
    // (provenance, binding, inscriptions)
    let mut note_parts = Vec::new();
    if !author_dates.is_empty() {
        note_parts.push(format!("Author dates: {}", author_dates.join("; ")));
    }
    if !contributors.is_empty() {
        note_parts.push(format!("Contributors: {}", contributors.join("; ")));
    }
    for field in marc::datafields(record_xml, "500") {
        if let Some(note) = field.first('a') {
            note_parts.push(note.to_string());
        }
    }
    if !note_parts.is_empty() {
        record.notes = Some(note_parts.join("\n"));
    }

    record
}

/// PPN (Pica Production Number) from controlfield 001.
pub fn ppn(record_xml: &str) -> Option<String> {
    marc::controlfield(record_xml, "001")
}

fn source_url(ppn: &str) -> String {
    format!("https://opac.k10plus.de/DB=9.1/PPNSET?PPN={}", ppn)
}

pub struct CerlHpbProvider {
    client: reqwest::Client,
}

impl CerlHpbProvider {
    pub fn new() -> Self {
        CerlHpbProvider {
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self, query: &str, start_record: usize, max_records: usize) -> Result<String> {
        let response = self
            .client
            .get(SRU_BASE)
            .query(&[
                ("version", "1.1".to_string()),
                ("operation", "searchRetrieve".to_string()),
                ("query", query.to_string()),
                ("startRecord", start_record.to_string()),
                ("maximumRecords", max_records.to_string()),
                ("recordSchema", "marcxml".to_string()),
            ])
            .timeout(TIMEOUT)
            .send()
            .await?;
        Ok(check_status(response)?.text().await?)
    }
}

impl Default for CerlHpbProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BookProvider for CerlHpbProvider {
    fn code(&self) -> &'static str {
        CERL_HPB
    }

    fn name(&self) -> &'static str {
        "CERL HPB (Heritage of the Printed Book)"
    }

    fn country(&self) -> Option<&'static str> {
        Some("EU")
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Sru
    }

    /// ISBN search — uncommon for HPB (pre-1830 books rarely have ISBNs)
    /// but later reprints and facsimiles do.
    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let xml = self.fetch(&format!("pica.isn={}", clean), 1, 1).await?;

        if marc::number_of_records(&xml) == 0 {
            return Err(ProviderError::isbn_not_found());
        }
        let records = marc::extract_records(&xml);
        let Some(first) = records.first() else {
            return Err(ProviderError::Parse("No records in response".to_string()));
        };

        let mut record = parse_hpb_record(first);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        ensure_lookup_isbn(&mut record, &clean);

        Ok(ProviderHit {
            source_url: ppn(first).map(|p| source_url(&p)),
            record,
        })
    }

    fn supports_field_search(&self) -> bool {
        true
    }

    /// Multi-field search over the HPB PICA indexes.
    #[instrument(skip(self, params))]
    async fn search_by_fields(&self, params: &SearchParams) -> Result<SearchOutcome> {
        let mut parts = Vec::new();
        if let Some(isbn) = &params.isbn {
            parts.push(format!("pica.isn={}", normalize_isbn(isbn)));
        }
        if let Some(title) = &params.title {
            parts.push(format!("pica.tit={}", title));
        }
        if let Some(author) = &params.author {
            parts.push(format!("pica.per={}", author));
        }
        if let Some(publisher) = &params.publisher {
            parts.push(format!("pica.ver={}", publisher));
        }
        // HPB only supports exact year match via pica.yop; ranges are ignored
        match (&params.year_from, &params.year_to) {
            (Some(from), Some(to)) if from == to => parts.push(format!("pica.yop={}", from)),
            (Some(from), None) => parts.push(format!("pica.yop={}", from)),
            _ => {}
        }
        if parts.is_empty() {
            return Err(ProviderError::no_search_params());
        }

        let query = parts.join(" and ");
        let limit = params.limit.unwrap_or(20).min(100);
        let offset = params.offset.unwrap_or(0);
        let xml = self.fetch(&query, offset + 1, limit).await?;

        let total = marc::number_of_records(&xml);
        let records = marc::extract_records(&xml);

        let items: Vec<SearchResultItem> = records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let record = parse_hpb_record(rec);
                let key = ppn(rec).unwrap_or_else(|| format!("hpb-{}", offset + i));
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

    /// Full record by PPN.
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let xml = self.fetch(&format!("pica.ppn={}", edition_key), 1, 1).await?;

        let records = marc::extract_records(&xml);
        let Some(first) = records.first() else {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        };

        let record = parse_hpb_record(first);
        Ok(ProviderHit {
            source_url: ppn(first).map(|p| source_url(&p)),
            record,
        })
    }
}
