//! Dublin Core extraction for the OpenSearch/SRU feeds that wrap `dc:*`
//! elements in RSS items (NDL), SRU records (KB Netherlands), or DKABM
//! objects (DanBib).

use crate::parsers::xml;
use once_cell::sync::Lazy;
use regex::Regex;

static RSS_ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<item>(.*?)</item>").unwrap());
static OPENSEARCH_TOTAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<openSearch:totalResults>(\d+)</openSearch:totalResults>").unwrap()
});
static SRU_RECORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<(?:srw:)?record>(.*?)</(?:srw:)?record>").unwrap());
static SRU_RECORD_DATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<(?:srw:)?recordData>(.*?)</(?:srw:)?recordData>").unwrap());
static SRU_TOTAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:srw:)?numberOfRecords>(\d+)</").unwrap());

/// All `<item>` blocks of an RSS-wrapped OpenSearch response.
pub fn rss_items(xml_str: &str) -> Vec<String> {
    RSS_ITEM_RE
        .captures_iter(xml_str)
        .map(|c| c[1].to_string())
        .collect()
}

/// `openSearch:totalResults`, zero when missing.
pub fn open_search_total(xml_str: &str) -> u64 {
    OPENSEARCH_TOTAL_RE
        .captures(xml_str)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// Inner content of each `<srw:record>` in an SRU response.
pub fn sru_records(xml_str: &str) -> Vec<String> {
    SRU_RECORD_RE
        .captures_iter(xml_str)
        .map(|c| c[1].to_string())
        .collect()
}

/// The `<recordData>` payload of an SRU record, or the record itself when
/// the wrapper is absent.
pub fn sru_record_data(record_xml: &str) -> String {
    SRU_RECORD_DATA_RE
        .captures(record_xml)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| record_xml.to_string())
}

/// SRU `numberOfRecords`, zero when missing.
pub fn sru_total(xml_str: &str) -> u64 {
    SRU_TOTAL_RE
        .captures(xml_str)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// First `dc:`-style element text (pass the full namespaced tag).
pub fn dc_text(xml_str: &str, tag: &str) -> Option<String> {
    xml::element_text(xml_str, tag)
}

/// All `dc:`-style element texts.
pub fn dc_all(xml_str: &str, tag: &str) -> Vec<String> {
    xml::all_element_texts(xml_str, tag)
}

/// First element text qualified with `xsi:type="<type>"`, used by the DKABM
/// and dcndl extensions (e.g. `dc:title` with `dkdcplus:full`).
pub fn dc_text_typed(xml_str: &str, tag: &str, xsi_type: &str) -> Option<String> {
    xml::element_text_with_attr(xml_str, tag, "xsi:type", xsi_type)
}

/// All element texts qualified with `xsi:type="<type>"`.
pub fn dc_all_typed(xml_str: &str, tag: &str, xsi_type: &str) -> Vec<String> {
    xml::all_element_texts_with_attr(xml_str, tag, "xsi:type", xsi_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rss_items_and_total() {
        let xml = "<rss><channel><openSearch:totalResults>42</openSearch:totalResults>\
                   <item><dc:title>A</dc:title></item><item><dc:title>B</dc:title></item>\
                   </channel></rss>";
        assert_eq!(open_search_total(xml), 42);
        let items = rss_items(xml);
        assert_eq!(items.len(), 2);
        assert_eq!(dc_text(&items[0], "dc:title").as_deref(), Some("A"));
    }

    #[test]
    fn sru_record_envelope() {
        let xml = "<srw:searchRetrieveResponse><srw:numberOfRecords>1</srw:numberOfRecords>\
                   <srw:records><srw:record><srw:recordData><dc:title>X</dc:title>\
                   </srw:recordData></srw:record></srw:records></srw:searchRetrieveResponse>";
        assert_eq!(sru_total(xml), 1);
        let records = sru_records(xml);
        assert_eq!(records.len(), 1);
        let data = sru_record_data(&records[0]);
        assert_eq!(dc_text(&data, "dc:title").as_deref(), Some("X"));
    }

    #[test]
    fn typed_elements() {
        let xml = r#"<dc:title xsi:type="dkdcplus:full">Min kamp : roman</dc:title>
                     <dc:title>Min kamp</dc:title>"#;
        assert_eq!(
            dc_text_typed(xml, "dc:title", "dkdcplus:full").as_deref(),
            Some("Min kamp : roman")
        );
    }
}
