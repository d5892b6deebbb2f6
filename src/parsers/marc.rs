//! MARC-XML reader shared by the SRU family of national-library sources.
//!
//! Handles both MARC21 and the UNIMARC variant (BnF, SUDOC), with or without
//! a `marc:` namespace prefix on every element. Extraction is regex-based
//! and tolerant: a field that cannot be read is omitted, and only a missing
//! title makes the resulting record unusable.

use crate::parsers::text::{assign_isbn, clean_trailing, extract_page_count, extract_year};
use crate::parsers::xml::decode_entities;
use crate::types::BookRecord;
use once_cell::sync::Lazy;
use regex::Regex;

static RECORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<(?:marc:)?record[\s>].*?</(?:marc:)?record>").unwrap());
static NUM_RECORDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(?:srw:|zs:)?numberOfRecords>(\d+)</(?:srw:|zs:)?numberOfRecords>").unwrap()
});
static DIAG_MESSAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:srw:|zs:)?message>([^<]+)</(?:srw:|zs:)?message>").unwrap());
static SUBFIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<(?:marc:)?subfield[^>]*code="(\w)"[^>]*>(.*?)</(?:marc:)?subfield>"#)
        .unwrap()
});

/// Extract each `<record>` block from an SRU searchRetrieve response.
pub fn extract_records(xml: &str) -> Vec<String> {
    RECORD_RE.find_iter(xml).map(|m| m.as_str().to_string()).collect()
}

/// `numberOfRecords` from the SRU envelope, zero when missing.
pub fn number_of_records(xml: &str) -> u64 {
    NUM_RECORDS_RE
        .captures(xml)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// SRU diagnostics are reported inside the response body; surface the
/// message when one is present.
pub fn diagnostic_message(xml: &str) -> Option<String> {
    if !xml.contains("<diagnostic>") && !xml.contains("<srw:diagnostic>") {
        return None;
    }
    DIAG_MESSAGE_RE
        .captures(xml)
        .map(|c| decode_entities(&c[1]))
}

/// One datafield occurrence: indicators plus repeatable subfields in order.
#[derive(Debug, Clone)]
pub struct DataField {
    pub ind1: String,
    pub ind2: String,
    pub subfields: Vec<(char, String)>,
}

impl DataField {
    /// First value of a subfield code.
    pub fn first(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a subfield code.
    pub fn all(&self, code: char) -> Vec<&str> {
        self.subfields
            .iter()
            .filter(|(c, _)| *c == code)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// All datafields with the given tag, in document order.
pub fn datafields(record_xml: &str, tag: &str) -> Vec<DataField> {
    let Ok(re) = Regex::new(&format!(
        r#"(?s)<(?:marc:)?datafield([^>]*tag="{tag}"[^>]*)>(.*?)</(?:marc:)?datafield>"#
    )) else {
        return Vec::new();
    };
    let ind_re = |attr: &str, attrs: &str| -> String {
        Regex::new(&format!(r#"{attr}="([^"]*)""#))
            .ok()
            .and_then(|r| r.captures(attrs).map(|c| c[1].to_string()))
            .unwrap_or_default()
    };
    re.captures_iter(record_xml)
        .map(|caps| {
            let attrs = &caps[1];
            let body = &caps[2];
            let subfields = SUBFIELD_RE
                .captures_iter(body)
                .filter_map(|sc| {
                    let code = sc[1].chars().next()?;
                    let value = decode_entities(&sc[2]);
                    (!value.is_empty()).then_some((code, value))
                })
                .collect();
            DataField {
                ind1: ind_re("ind1", attrs),
                ind2: ind_re("ind2", attrs),
                subfields,
            }
        })
        .collect()
}

/// Value of a controlfield by tag (001, 008, ...).
pub fn controlfield(record_xml: &str, tag: &str) -> Option<String> {
    let re = Regex::new(&format!(
        r#"<(?:marc:)?controlfield[^>]*tag="{tag}"[^>]*>([^<]*)</(?:marc:)?controlfield>"#
    ))
    .ok()?;
    re.captures(record_xml).map(|c| decode_entities(&c[1]))
}

fn first_subfield(record_xml: &str, tag: &str, code: char) -> Option<String> {
    datafields(record_xml, tag)
        .first()
        .and_then(|f| f.first(code))
        .map(str::to_string)
}

/// Language from controlfield 008 positions 35-37; blank and "|||" mean
/// absent.
fn language_from_008(record_xml: &str) -> Option<String> {
    let cf = controlfield(record_xml, "008")?;
    let lang: String = cf.chars().skip(35).take(3).collect();
    let lang = lang.trim().to_string();
    (lang.len() == 3 && lang != "|||" && lang != "und").then_some(lang)
}

/// Fallback publication year from controlfield 008 positions 7-10.
pub fn year_from_008(record_xml: &str) -> Option<String> {
    let cf = controlfield(record_xml, "008")?;
    let year: String = cf.chars().skip(7).take(4).collect();
    (year.len() == 4 && year.chars().all(|c| c.is_ascii_digit())).then_some(year)
}

/// Map a MARC21 record onto the canonical shape.
pub fn parse_marc21(record_xml: &str) -> BookRecord {
    let mut record = BookRecord::default();

    // 245 — title / subtitle
    if let Some(f245) = datafields(record_xml, "245").first() {
        record.title = f245.first('a').and_then(clean_trailing);
        record.subtitle = f245.first('b').and_then(clean_trailing);
    }

    // 100/700 — authors, deduplicated
    for tag in ["100", "700"] {
        for field in datafields(record_xml, tag) {
            if let Some(name) = field.first('a').and_then(clean_trailing) {
                if !record.authors.contains(&name) {
                    record.authors.push(name);
                }
            }
        }
    }

    // 260/264 — publication info
    let pub_fields = {
        let f260 = datafields(record_xml, "260");
        if f260.is_empty() {
            datafields(record_xml, "264")
        } else {
            f260
        }
    };
    if let Some(pub_field) = pub_fields.first() {
        record.publication_place = pub_field.first('a').and_then(clean_trailing);
        record.publisher = pub_field.first('b').and_then(clean_trailing);
        record.publication_year = pub_field.first('c').and_then(extract_year);
    }

    // 020 — ISBNs
    for field in datafields(record_xml, "020") {
        if let Some(raw) = field.first('a') {
            assign_isbn(&mut record, raw);
        }
    }

    // 300 — physical description
    if let Some(extent) = first_subfield(record_xml, "300", 'a') {
        record.pages = extract_page_count(&extent);
        record.pagination_description = clean_trailing(&extent);
    }

    // 010 — LCCN
    record.lccn = first_subfield(record_xml, "010", 'a').map(|v| v.trim().to_string());

    // 035 — OCLC number
    for field in datafields(record_xml, "035") {
        if let Some(val) = field.first('a') {
            if val.contains("OCoLC") {
                record.oclc_number = Some(val.replace("(OCoLC)", "").trim().to_string());
                break;
            }
        }
    }

    // 082 — DDC, 050 — LCC
    record.ddc = first_subfield(record_xml, "082", 'a');
    if let Some(f050) = datafields(record_xml, "050").first() {
        let lcc: Vec<&str> = [f050.first('a'), f050.first('b')]
            .into_iter()
            .flatten()
            .collect();
        if !lcc.is_empty() {
            record.lcc = Some(lcc.join(" "));
        }
    }

    // 650 — subjects
    record.subjects = datafields(record_xml, "650")
        .iter()
        .filter_map(|f| f.first('a').and_then(clean_trailing))
        .collect();

    // 500 — notes
    let notes: Vec<String> = datafields(record_xml, "500")
        .iter()
        .filter_map(|f| f.first('a').map(str::to_string))
        .collect();
    if !notes.is_empty() {
        record.notes = Some(notes.join("; "));
    }

    // 520 — summary
    record.description = first_subfield(record_xml, "520", 'a');

    // 041 — language, controlfield 008 as fallback
    record.language = first_subfield(record_xml, "041", 'a')
        .filter(|l| !l.trim().is_empty())
        .or_else(|| language_from_008(record_xml));

    // 250 — edition, 490 — series
    record.edition = first_subfield(record_xml, "250", 'a').and_then(|v| clean_trailing(&v));
    if let Some(f490) = datafields(record_xml, "490").first() {
        record.series = f490.first('a').and_then(clean_trailing);
        record.series_number = f490
            .first('v')
            .map(|v| v.trim_end_matches(['.', ' ']).to_string());
    }

    record
}

/// Map a UNIMARC record (BnF, SUDOC) onto the canonical shape. The tag
/// numbering differs entirely from MARC21.
pub fn parse_unimarc(record_xml: &str) -> BookRecord {
    let mut record = BookRecord::default();

    // 200 — title $a / subtitle $e
    let f200 = datafields(record_xml, "200");
    if let Some(f) = f200.first() {
        record.title = f.first('a').and_then(clean_trailing);
        record.subtitle = f.first('e').and_then(clean_trailing);
    }

    // 700/701 — authors: surname $a, given name $b
    for tag in ["700", "701"] {
        for field in datafields(record_xml, tag) {
            let surname = field.first('a').and_then(clean_trailing);
            let given = field.first('b').and_then(clean_trailing);
            if let Some(surname) = surname {
                let name = match given {
                    Some(given) => format!("{}, {}", surname, given),
                    None => surname,
                };
                record.authors.push(name);
            }
        }
    }
    // Fallback: 200 $f statement of responsibility
    if record.authors.is_empty() {
        if let Some(resp) = f200.first().and_then(|f| f.first('f')).and_then(clean_trailing) {
            record.authors.push(resp);
        }
    }

    // 210 — publication: place $a, publisher $c, date $d
    if let Some(f210) = datafields(record_xml, "210").first() {
        record.publication_place = f210.first('a').and_then(clean_trailing);
        record.publisher = f210.first('c').and_then(clean_trailing);
        record.publication_year = f210.first('d').and_then(extract_year);
    }

    // 010 — ISBN $a
    for field in datafields(record_xml, "010") {
        if let Some(raw) = field.first('a') {
            assign_isbn(&mut record, raw);
        }
    }

    // 215 — physical description $a
    if let Some(extent) = first_subfield(record_xml, "215", 'a') {
        record.pages = extract_page_count(&extent);
        record.pagination_description = clean_trailing(&extent);
    }

    // 101 — language $a
    record.language = first_subfield(record_xml, "101", 'a');

    // 205 — edition, 225 — series, 330 — summary
    record.edition = first_subfield(record_xml, "205", 'a').and_then(|v| clean_trailing(&v));
    record.series = first_subfield(record_xml, "225", 'a').and_then(|v| clean_trailing(&v));
    record.description = first_subfield(record_xml, "330", 'a');

    // 606 — subjects
    record.subjects = datafields(record_xml, "606")
        .iter()
        .filter_map(|f| f.first('a').and_then(clean_trailing))
        .collect();

    // 300 — notes (general note in UNIMARC)
    let notes: Vec<String> = datafields(record_xml, "300")
        .iter()
        .filter_map(|f| f.first('a').map(str::to_string))
        .collect();
    if !notes.is_empty() {
        record.notes = Some(notes.join("; "));
    }

    record
}

/// Dispatch on the source's record format.
pub fn parse_record(record_xml: &str, unimarc: bool) -> BookRecord {
    if unimarc {
        parse_unimarc(record_xml)
    } else {
        parse_marc21(record_xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARC_FIXTURE: &str = r#"
      <record xmlns="http://www.loc.gov/MARC21/slim">
        <controlfield tag="001">123456789</controlfield>
        <controlfield tag="008">040315s2004    gw ||||| |||| 00||||ger  </controlfield>
        <datafield tag="020" ind1=" " ind2=" ">
          <subfield code="a">978-3-16-148410-0 (pbk.)</subfield>
        </datafield>
        <datafield tag="100" ind1="1" ind2=" ">
          <subfield code="a">Mann, Thomas,</subfield>
        </datafield>
        <datafield tag="245" ind1="1" ind2="0">
          <subfield code="a">Der Zauberberg :</subfield>
          <subfield code="b">Roman /</subfield>
        </datafield>
        <datafield tag="260" ind1=" " ind2=" ">
          <subfield code="a">Frankfurt am Main :</subfield>
          <subfield code="b">Fischer,</subfield>
          <subfield code="c">2004.</subfield>
        </datafield>
        <datafield tag="300" ind1=" " ind2=" ">
          <subfield code="a">xvi, 352 p. ;</subfield>
        </datafield>
        <datafield tag="650" ind1=" " ind2="0">
          <subfield code="a">Sanatoriums</subfield>
        </datafield>
        <datafield tag="700" ind1="1" ind2=" ">
          <subfield code="a">Mann, Thomas,</subfield>
        </datafield>
      </record>"#;

    #[test]
    fn marc21_basic_mapping() {
        let record = parse_marc21(MARC_FIXTURE);
        assert_eq!(record.title.as_deref(), Some("Der Zauberberg"));
        assert_eq!(record.subtitle.as_deref(), Some("Roman"));
        // 700 duplicate of the 100 entry is deduplicated
        assert_eq!(record.authors, vec!["Mann, Thomas".to_string()]);
        assert_eq!(record.publisher.as_deref(), Some("Fischer"));
        assert_eq!(record.publication_place.as_deref(), Some("Frankfurt am Main"));
        assert_eq!(record.publication_year.as_deref(), Some("2004"));
        assert_eq!(record.isbn_13.as_deref(), Some("9783161484100"));
        assert_eq!(record.pages, Some(352));
        assert_eq!(record.pagination_description.as_deref(), Some("xvi, 352 p."));
        assert_eq!(record.subjects, vec!["Sanatoriums".to_string()]);
        // 041 absent → language from 008 positions 35-37
        assert_eq!(record.language.as_deref(), Some("ger"));
    }

    #[test]
    fn namespaced_records_are_extracted() {
        let xml = format!(
            "<srw:searchRetrieveResponse><srw:numberOfRecords>1</srw:numberOfRecords>\
             <marc:record>{}</marc:record></srw:searchRetrieveResponse>",
            "<marc:datafield tag=\"245\" ind1=\" \" ind2=\" \">\
             <marc:subfield code=\"a\">Namespaced title</marc:subfield></marc:datafield>"
        );
        assert_eq!(number_of_records(&xml), 1);
        let records = extract_records(&xml);
        assert_eq!(records.len(), 1);
        let record = parse_marc21(&records[0]);
        assert_eq!(record.title.as_deref(), Some("Namespaced title"));
    }

    #[test]
    fn record_without_245_has_no_title() {
        let xml = r#"<record><datafield tag="100" ind1=" " ind2=" ">
            <subfield code="a">Anonymous</subfield></datafield></record>"#;
        let record = parse_marc21(xml);
        assert_eq!(record.title, None);
    }

    #[test]
    fn unimarc_mapping() {
        let xml = r#"
          <record>
            <datafield tag="010" ind1=" " ind2=" ">
              <subfield code="a">2-07-040850-4</subfield>
            </datafield>
            <datafield tag="200" ind1="1" ind2=" ">
              <subfield code="a">Le petit prince</subfield>
              <subfield code="f">Antoine de Saint-Exupéry</subfield>
            </datafield>
            <datafield tag="210" ind1=" " ind2=" ">
              <subfield code="a">Paris</subfield>
              <subfield code="c">Gallimard</subfield>
              <subfield code="d">1999</subfield>
            </datafield>
            <datafield tag="215" ind1=" " ind2=" ">
              <subfield code="a">97 p.</subfield>
            </datafield>
            <datafield tag="700" ind1=" " ind2="1">
              <subfield code="a">Saint-Exupéry</subfield>
              <subfield code="b">Antoine de</subfield>
            </datafield>
          </record>"#;
        let record = parse_unimarc(xml);
        assert_eq!(record.title.as_deref(), Some("Le petit prince"));
        assert_eq!(record.authors, vec!["Saint-Exupéry, Antoine de".to_string()]);
        assert_eq!(record.publisher.as_deref(), Some("Gallimard"));
        assert_eq!(record.publication_year.as_deref(), Some("1999"));
        assert_eq!(record.isbn_10.as_deref(), Some("2070408504"));
        assert_eq!(record.pages, Some(97));
    }

    #[test]
    fn diagnostics_are_detected() {
        let xml = "<srw:diagnostics><diagnostic><srw:message>Unsupported index</srw:message>\
                   </diagnostic></srw:diagnostics>";
        assert_eq!(diagnostic_message(xml).as_deref(), Some("Unsupported index"));
        assert_eq!(diagnostic_message("<records/>"), None);
    }

    #[test]
    fn controlfield_and_year_fallback() {
        assert_eq!(
            controlfield(MARC_FIXTURE, "001").as_deref(),
            Some("123456789")
        );
        assert_eq!(year_from_008(MARC_FIXTURE).as_deref(), Some("2004"));
    }
}
