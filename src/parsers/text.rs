//! Cross-cutting extraction rules shared by all wire-format parsers.
//!
//! Every helper is best-effort: `None` means the field is absent and should
//! be omitted from the record, never a hard failure.

use crate::types::BookRecord;
use once_cell::sync::Lazy;
use regex::Regex;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").unwrap());

// Page-unit abbreviations across the supported catalogs:
// p./pp./pages (en), S. (de), sivua (fi), sider (da), str./stran (sl/hr)
static PAGES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*(?:p\b|p\.|pp\.?|pages?\b|S\.|sivua\b|sider\b|str\.|stran\b)").unwrap());

static TRAILING_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,:;/]+$").unwrap());

/// Strip hyphens and whitespace from an identifier. Idempotent.
pub fn normalize_isbn(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// Classified ISBN value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isbn {
    Thirteen(String),
    Ten(String),
}

/// Classify a raw ISBN string: 13 digits with a 978/979 prefix is ISBN-13,
/// 9 digits plus a digit/X check character is ISBN-10. Hyphens, whitespace,
/// and parenthetical qualifiers ("(pbk.)") are stripped first.
pub fn classify_isbn(raw: &str) -> Option<Isbn> {
    let mut clean = normalize_isbn(raw);
    if let Some(paren) = clean.find('(') {
        clean.truncate(paren);
    }
    let clean = clean.trim().to_string();

    if clean.len() == 13
        && clean.chars().all(|c| c.is_ascii_digit())
        && (clean.starts_with("978") || clean.starts_with("979"))
    {
        return Some(Isbn::Thirteen(clean));
    }
    if clean.len() == 10 {
        let (head, tail) = clean.split_at(9);
        if head.chars().all(|c| c.is_ascii_digit())
            && tail.chars().all(|c| c.is_ascii_digit() || c == 'X' || c == 'x')
        {
            return Some(Isbn::Ten(clean.to_uppercase()));
        }
    }
    None
}

/// Classify `raw` and fill the matching empty ISBN slot of `record`.
/// An already-populated slot is never overwritten.
pub fn assign_isbn(record: &mut BookRecord, raw: &str) {
    match classify_isbn(raw) {
        Some(Isbn::Thirteen(v)) if record.isbn_13.is_none() => record.isbn_13 = Some(v),
        Some(Isbn::Ten(v)) if record.isbn_10.is_none() => record.isbn_10 = Some(v),
        _ => {}
    }
}

/// Fill the matching ISBN slot with the normalized identifier that was
/// looked up, so the caller's search key always survives into the record.
pub fn ensure_lookup_isbn(record: &mut BookRecord, clean_isbn: &str) {
    if record.isbn_13.is_none() && clean_isbn.len() == 13 {
        record.isbn_13 = Some(clean_isbn.to_string());
    }
    if record.isbn_10.is_none() && clean_isbn.len() == 10 {
        record.isbn_10 = Some(clean_isbn.to_string());
    }
}

/// First run of four consecutive digits in a date-like string.
pub fn extract_year(text: &str) -> Option<String> {
    YEAR_RE.find(text).map(|m| m.as_str().to_string())
}

/// First integer immediately followed by a page-unit abbreviation.
pub fn extract_page_count(text: &str) -> Option<u32> {
    PAGES_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Split an ISBD-punctuated title into (title, subtitle). The statement of
/// responsibility after " / " is stripped from both parts; the subtitle is
/// whatever follows the first " : ".
pub fn split_title(raw: &str) -> (String, Option<String>) {
    let without_sor = raw.split(" / ").next().unwrap_or(raw).trim();
    match without_sor.split_once(" : ") {
        Some((title, subtitle)) => {
            let subtitle = subtitle.trim();
            (
                title.trim().to_string(),
                (!subtitle.is_empty()).then(|| subtitle.to_string()),
            )
        }
        None => (without_sor.to_string(), None),
    }
}

/// Clean trailing ISBD punctuation from a field value
/// (e.g. "London :" → "London"). Empty results collapse to `None`.
pub fn clean_trailing(value: &str) -> Option<String> {
    let cleaned = TRAILING_PUNCT_RE.replace(value, "").trim().to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_isbn("978-0-306-40615-7");
        assert_eq!(once, "9780306406157");
        assert_eq!(normalize_isbn(&once), once);
    }

    #[test]
    fn classify_isbn_13() {
        assert_eq!(
            classify_isbn("9780306406157"),
            Some(Isbn::Thirteen("9780306406157".to_string()))
        );
        assert_eq!(
            classify_isbn("979-10-90636-07-1"),
            Some(Isbn::Thirteen("9791090636071".to_string()))
        );
        // 13 digits without a 978/979 prefix is not an ISBN-13
        assert_eq!(classify_isbn("1234567890123"), None);
    }

    #[test]
    fn classify_isbn_10() {
        assert_eq!(
            classify_isbn("0-306-40615-2"),
            Some(Isbn::Ten("0306406152".to_string()))
        );
        assert_eq!(
            classify_isbn("155404295x"),
            Some(Isbn::Ten("155404295X".to_string()))
        );
    }

    #[test]
    fn classify_strips_qualifiers() {
        assert_eq!(
            classify_isbn("9780306406157 (pbk.)"),
            Some(Isbn::Thirteen("9780306406157".to_string()))
        );
    }

    #[test]
    fn thirteen_digit_values_never_land_in_isbn_10() {
        let mut record = BookRecord::default();
        assign_isbn(&mut record, "9780306406157");
        assert_eq!(record.isbn_13.as_deref(), Some("9780306406157"));
        assert_eq!(record.isbn_10, None);
    }

    #[test]
    fn year_extraction() {
        assert_eq!(extract_year("2004-03-15").as_deref(), Some("2004"));
        assert_eq!(extract_year("c. 1871").as_deref(), Some("1871"));
        assert_eq!(extract_year("[19--]"), None);
    }

    #[test]
    fn page_count_extraction() {
        assert_eq!(extract_page_count("xvi, 352 p."), Some(352));
        assert_eq!(extract_page_count("487 sider"), Some(487));
        assert_eq!(extract_page_count("210 sivua"), Some(210));
        assert_eq!(extract_page_count("3 maps"), None);
    }

    #[test]
    fn title_subtitle_split() {
        let (title, subtitle) =
            split_title("Biblia sacra : vulgatae editionis / edited by somebody");
        assert_eq!(title, "Biblia sacra");
        assert_eq!(subtitle.as_deref(), Some("vulgatae editionis"));

        let (title, subtitle) = split_title("Plain title");
        assert_eq!(title, "Plain title");
        assert_eq!(subtitle, None);
    }

    #[test]
    fn trailing_punctuation_cleanup() {
        assert_eq!(clean_trailing("London :").as_deref(), Some("London"));
        assert_eq!(clean_trailing("Acta, ;/").as_deref(), Some("Acta"));
        assert_eq!(clean_trailing("  "), None);
    }

    #[test]
    fn lookup_isbn_is_preserved() {
        let mut record = BookRecord::default();
        ensure_lookup_isbn(&mut record, "9780306406157");
        assert_eq!(record.isbn_13.as_deref(), Some("9780306406157"));
        // an existing value is not overwritten
        ensure_lookup_isbn(&mut record, "9781111111111");
        assert_eq!(record.isbn_13.as_deref(), Some("9780306406157"));
    }
}
