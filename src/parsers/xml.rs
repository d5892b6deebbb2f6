//! Tolerant, regex-based XML/HTML text extraction.
//!
//! The external catalog feeds are too loosely namespaced for strict XML
//! parsing — attribute order varies, namespace prefixes come and go, and
//! some endpoints emit fragments. These helpers extract element text on a
//! best-effort basis; an element that cannot be found is simply absent.

use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_ENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(\d+);").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Decode the named entities the catalogs actually emit, plus numeric
/// character references.
pub fn decode_entities(text: &str) -> String {
    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    NUMERIC_ENTITY_RE
        .replace_all(&decoded, |caps: &regex::Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .trim()
        .to_string()
}

/// Drop all tags and collapse whitespace, decoding entities.
pub fn strip_tags(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    decode_entities(&WS_RE.replace_all(&text, " "))
}

fn escape_tag(tag: &str) -> String {
    regex::escape(tag)
}

/// Text of the first `<tag ...>...</tag>` element. The tag is matched
/// literally (pass the namespaced name, e.g. "dc:title"); inner markup is
/// stripped.
pub fn element_text(xml: &str, tag: &str) -> Option<String> {
    let re = Regex::new(&format!(
        r"(?s)<{t}(?:\s[^>]*)?>(.*?)</{t}>",
        t = escape_tag(tag)
    ))
    .ok()?;
    let inner = re.captures(xml)?.get(1)?.as_str();
    let text = strip_tags(inner);
    (!text.is_empty()).then_some(text)
}

/// Text of every matching `<tag>` element, empties skipped.
pub fn all_element_texts(xml: &str, tag: &str) -> Vec<String> {
    let Ok(re) = Regex::new(&format!(
        r"(?s)<{t}(?:\s[^>]*)?>(.*?)</{t}>",
        t = escape_tag(tag)
    )) else {
        return Vec::new();
    };
    re.captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| strip_tags(m.as_str()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Full element blocks (`<tag ...>...</tag>`) for nested extraction.
pub fn element_blocks(xml: &str, tag: &str) -> Vec<String> {
    let Ok(re) = Regex::new(&format!(
        r"(?s)<{t}(?:\s[^>]*)?>.*?</{t}>",
        t = escape_tag(tag)
    )) else {
        return Vec::new();
    };
    re.find_iter(xml).map(|m| m.as_str().to_string()).collect()
}

/// Value of `attr` on the first `<tag>` element carrying it.
pub fn element_attr(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let re = Regex::new(&format!(
        r#"<{t}[^>]*\s{a}="([^"]*)""#,
        t = escape_tag(tag),
        a = regex::escape(attr)
    ))
    .ok()?;
    re.captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str()))
}

/// Text of the first `<tag>` whose attributes contain `attr="value"`.
pub fn element_text_with_attr(xml: &str, tag: &str, attr: &str, value: &str) -> Option<String> {
    let re = Regex::new(&format!(
        r#"(?s)<{t}[^>]*{a}="{v}"[^>]*>(.*?)</{t}>"#,
        t = escape_tag(tag),
        a = regex::escape(attr),
        v = regex::escape(value)
    ))
    .ok()?;
    let inner = re.captures(xml)?.get(1)?.as_str();
    let text = strip_tags(inner);
    (!text.is_empty()).then_some(text)
}

/// Texts of every `<tag>` whose attributes contain `attr="value"`.
pub fn all_element_texts_with_attr(
    xml: &str,
    tag: &str,
    attr: &str,
    value: &str,
) -> Vec<String> {
    let Ok(re) = Regex::new(&format!(
        r#"(?s)<{t}[^>]*{a}="{v}"[^>]*>(.*?)</{t}>"#,
        t = escape_tag(tag),
        a = regex::escape(attr),
        v = regex::escape(value)
    )) else {
        return Vec::new();
    };
    re.captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| strip_tags(m.as_str()))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_decode() {
        assert_eq!(decode_entities("Tom &amp; Jerry &#233;"), "Tom & Jerry é");
    }

    #[test]
    fn element_text_tolerates_attributes() {
        let xml = r#"<dc:title xsi:type="full">War &amp; Peace</dc:title>"#;
        assert_eq!(element_text(xml, "dc:title").as_deref(), Some("War & Peace"));
    }

    #[test]
    fn attr_qualified_lookup() {
        let xml = concat!(
            r#"<dc:creator xsi:type="oss:sort">Knausgård, Karl Ove</dc:creator>"#,
            r#"<dc:creator>Someone Else</dc:creator>"#,
        );
        assert_eq!(
            element_text_with_attr(xml, "dc:creator", "xsi:type", "oss:sort").as_deref(),
            Some("Knausgård, Karl Ove")
        );
    }

    #[test]
    fn nested_markup_is_stripped() {
        let xml = "<dc:title>Outer <b>inner</b> text</dc:title>";
        assert_eq!(
            element_text(xml, "dc:title").as_deref(),
            Some("Outer inner text")
        );
    }
}
