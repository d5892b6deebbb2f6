//! MODS XML reader, used by the UK Library Hub SRU endpoint and the
//! Portuguese PORBASE URN service.
//!
//! Tag-name based extraction tolerant of the `mods:` prefix, attribute
//! order, and self-closing variants.

use crate::parsers::text::{assign_isbn, clean_trailing, extract_page_count, extract_year};
use crate::parsers::xml;
use crate::types::BookRecord;
use once_cell::sync::Lazy;
use regex::Regex;

static MODS_RECORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<(?:mods:)?mods[\s>].*?</(?:mods:)?mods>").unwrap());

/// Both plain and `mods:`-prefixed spellings of a tag, tried in order.
fn text(xml_str: &str, tag: &str) -> Option<String> {
    xml::element_text(xml_str, tag).or_else(|| xml::element_text(xml_str, &format!("mods:{tag}")))
}

fn blocks(xml_str: &str, tag: &str) -> Vec<String> {
    let mut found = xml::element_blocks(xml_str, tag);
    if found.is_empty() {
        found = xml::element_blocks(xml_str, &format!("mods:{tag}"));
    }
    found
}

/// Extract each `<mods>` record from a MODS or SRU-wrapped response.
pub fn extract_mods_records(xml_str: &str) -> Vec<String> {
    MODS_RECORD_RE
        .find_iter(xml_str)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Map a MODS record onto the canonical shape.
pub fn parse_mods_record(record_xml: &str) -> BookRecord {
    let mut record = BookRecord::default();

    // Title — first <titleInfo> without a type attribute is the main title;
    // typed titleInfo entries are alternative/abbreviated titles.
    let title_infos = blocks(record_xml, "titleInfo");
    for ti in &title_infos {
        if ti.contains("type=") {
            continue;
        }
        record.title = text(ti, "title").and_then(|t| clean_trailing(&t));
        record.subtitle = text(ti, "subTitle").and_then(|t| clean_trailing(&t));
        if record.title.is_some() {
            break;
        }
    }
    if record.title.is_none() {
        if let Some(ti) = title_infos.first() {
            record.title = text(ti, "title").and_then(|t| clean_trailing(&t));
            record.subtitle = text(ti, "subTitle").and_then(|t| clean_trailing(&t));
        }
    }

    // Authors — <name type="personal"><namePart>, any <name> as fallback
    let name_blocks = blocks(record_xml, "name");
    let personal: Vec<&String> = name_blocks
        .iter()
        .filter(|b| b.contains(r#"type="personal""#))
        .collect();
    let candidates: Vec<&String> = if personal.is_empty() {
        name_blocks.iter().collect()
    } else {
        personal
    };
    for block in candidates {
        let parts = xml::all_element_texts(block, "namePart");
        let parts = if parts.is_empty() {
            xml::all_element_texts(block, "mods:namePart")
        } else {
            parts
        };
        if !parts.is_empty() {
            if let Some(name) = clean_trailing(&parts.join(", ")) {
                if !record.authors.contains(&name) {
                    record.authors.push(name);
                }
            }
        }
    }

    // Publication — <originInfo> publisher / placeTerm / dated fields / edition
    if let Some(oi) = blocks(record_xml, "originInfo").first() {
        record.publisher = text(oi, "publisher").and_then(|v| clean_trailing(&v));
        record.publication_place = xml::element_text_with_attr(oi, "placeTerm", "type", "text")
            .or_else(|| text(oi, "placeTerm"))
            .and_then(|v| clean_trailing(&v));
        // Year precedence: dateIssued, then dateOther, then dateCreated
        for tag in ["dateIssued", "dateOther", "dateCreated"] {
            if let Some(year) = text(oi, tag).and_then(|d| extract_year(&d)) {
                record.publication_year = Some(year);
                break;
            }
        }
        record.edition = text(oi, "edition").and_then(|v| clean_trailing(&v));
    }

    // ISBN — <identifier type="isbn">
    for id_block in blocks(record_xml, "identifier") {
        if !id_block.contains(r#"type="isbn""#) {
            continue;
        }
        if let Some(raw) = text(&id_block, "identifier") {
            assign_isbn(&mut record, &raw);
        }
    }

    // Pages — <physicalDescription><extent>
    if let Some(pd) = blocks(record_xml, "physicalDescription").first() {
        if let Some(extent) = text(pd, "extent") {
            record.pages = extract_page_count(&extent);
            record.pagination_description = clean_trailing(&extent);
        }
    }

    // Language — <languageTerm type="code"> preferred
    record.language = xml::element_text_with_attr(record_xml, "languageTerm", "type", "code")
        .or_else(|| {
            xml::element_text_with_attr(record_xml, "mods:languageTerm", "type", "code")
        })
        .or_else(|| text(record_xml, "languageTerm"));

    // Subjects — <subject><topic>
    for subject in blocks(record_xml, "subject") {
        for topic in xml::all_element_texts(&subject, "topic")
            .into_iter()
            .chain(xml::all_element_texts(&subject, "mods:topic"))
        {
            if let Some(topic) = clean_trailing(&topic) {
                if !record.subjects.contains(&topic) {
                    record.subjects.push(topic);
                }
            }
        }
    }

    // Description and notes
    record.description = text(record_xml, "abstract");
    let notes = xml::all_element_texts(record_xml, "note");
    let notes = if notes.is_empty() {
        xml::all_element_texts(record_xml, "mods:note")
    } else {
        notes
    };
    if !notes.is_empty() {
        record.notes = Some(notes.join("; "));
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODS_FIXTURE: &str = r#"
      <mods xmlns="http://www.loc.gov/mods/v3">
        <titleInfo>
          <title>Os Lus&#237;adas</title>
          <subTitle>edi&#231;&#227;o cr&#237;tica</subTitle>
        </titleInfo>
        <name type="personal">
          <namePart>Cam&#245;es, Lu&#237;s de</namePart>
        </name>
        <originInfo>
          <place><placeTerm type="text">Lisboa</placeTerm></place>
          <publisher>Imprensa Nacional</publisher>
          <dateIssued>1972</dateIssued>
        </originInfo>
        <identifier type="isbn">972-27-0001-5</identifier>
        <physicalDescription><extent>641 p.</extent></physicalDescription>
        <language><languageTerm type="code">por</languageTerm></language>
        <subject><topic>Epic poetry, Portuguese</topic></subject>
      </mods>"#;

    #[test]
    fn mods_basic_mapping() {
        let record = parse_mods_record(MODS_FIXTURE);
        assert_eq!(record.title.as_deref(), Some("Os Lusíadas"));
        assert_eq!(record.subtitle.as_deref(), Some("edição crítica"));
        assert_eq!(record.authors, vec!["Camões, Luís de".to_string()]);
        assert_eq!(record.publisher.as_deref(), Some("Imprensa Nacional"));
        assert_eq!(record.publication_place.as_deref(), Some("Lisboa"));
        assert_eq!(record.publication_year.as_deref(), Some("1972"));
        assert_eq!(record.isbn_10.as_deref(), Some("9722700015"));
        assert_eq!(record.pages, Some(641));
        assert_eq!(record.language.as_deref(), Some("por"));
        assert_eq!(record.subjects, vec!["Epic poetry, Portuguese".to_string()]);
    }

    #[test]
    fn prefixed_records_are_extracted() {
        let wrapped = format!(
            "<srw:records><srw:recordData><mods:mods>{}</mods:mods></srw:recordData></srw:records>",
            "<mods:titleInfo><mods:title>Prefixed</mods:title></mods:titleInfo>"
        );
        let records = extract_mods_records(&wrapped);
        assert_eq!(records.len(), 1);
        let record = parse_mods_record(&records[0]);
        assert_eq!(record.title.as_deref(), Some("Prefixed"));
    }

    #[test]
    fn typed_title_info_is_skipped() {
        let xml = r#"<mods>
            <titleInfo type="alternative"><title>Alt title</title></titleInfo>
            <titleInfo><title>Main title</title></titleInfo>
          </mods>"#;
        let record = parse_mods_record(xml);
        assert_eq!(record.title.as_deref(), Some("Main title"));
    }
}
