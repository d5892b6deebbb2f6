use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};

/// Transport family of a catalog source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Api,
    Sru,
    Html,
}

/// Normalized bibliographic record — the unified output of every adapter.
///
/// Every field is optional; the orchestrator treats a record without a title
/// as absent, and adapters fail with "No title in record" before returning
/// one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Ordered author names. Sources disagree on how personal names are
    /// split, so duplicates are permitted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Four-digit year kept as a string (eras and uncertain dates are common).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    /// Free-text extent, e.g. "xvi, 352 p."
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_description: Option<String>,
    /// ISO code or free text — sources disagree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn_13: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn_10: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lccn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oclc_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcc: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl BookRecord {
    /// Append a line to the notes field.
    pub fn push_note(&mut self, note: &str) {
        match &mut self.notes {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(note);
            }
            None => self.notes = Some(note.to_string()),
        }
    }
}

/// Lighter-weight shape for multi-result field search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn_13: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn_10: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Opaque, source-specific token. Only meaningful when passed back into
    /// the same adapter's `get_details`.
    pub edition_key: String,
}

impl SearchResultItem {
    /// Build a list item from a full record, falling back to "Untitled".
    pub fn from_record(record: &BookRecord, edition_key: String) -> Self {
        SearchResultItem {
            title: record
                .title
                .clone()
                .unwrap_or_else(|| "Untitled".to_string()),
            subtitle: record.subtitle.clone(),
            authors: record.authors.clone(),
            publisher: record.publisher.clone(),
            publication_year: record.publication_year.clone(),
            isbn_13: record.isbn_13.clone(),
            isbn_10: record.isbn_10.clone(),
            cover_url: record.cover_url.clone(),
            format: record.format.clone(),
            edition_key,
        }
    }
}

/// Multi-field query parameters. Any subset may be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl SearchParams {
    /// True when no searchable field is set (limit/offset do not count).
    pub fn is_empty(&self) -> bool {
        self.isbn.is_none()
            && self.title.is_none()
            && self.author.is_none()
            && self.publisher.is_none()
            && self.year_from.is_none()
            && self.year_to.is_none()
    }
}

/// Result set of a field search, with the source's pagination metadata
/// where the response includes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub items: Vec<SearchResultItem>,
    pub total: u64,
    pub has_more: bool,
}

/// Success payload of `search`/`get_details`: the record plus an optional
/// human-navigable URL for it at the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHit {
    pub record: BookRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Caller-supplied descriptor of an enabled catalog source. The orchestrator
/// only reads `is_active` and `priority`; it never mutates the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSource {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub kind: ProviderKind,
    pub base_url: String,
    pub is_active: bool,
    /// Lower sorts first.
    pub priority: i32,
}

impl ActiveSource {
    /// Minimal descriptor for a known source, used by the CLI.
    pub fn enabled(code: &str, name: &str, kind: ProviderKind, priority: i32) -> Self {
        ActiveSource {
            code: code.to_string(),
            name: name.to_string(),
            country: None,
            kind,
            base_url: String::new(),
            is_active: true,
            priority,
        }
    }
}

/// Core trait every catalog source adapter implements.
///
/// All three operations issue outbound network calls and convert every
/// transport/parse failure into `ProviderError` — nothing panics past the
/// adapter boundary. `search` is required; the other two are optional and
/// callers detect support via the `supports_*` methods rather than calling
/// and catching.
#[async_trait::async_trait]
pub trait BookProvider: Send + Sync {
    /// Stable source code, e.g. "dnb" or "open_library".
    fn code(&self) -> &'static str;

    /// Human-readable source name.
    fn name(&self) -> &'static str;

    /// ISO country code of the catalog, if it has one.
    fn country(&self) -> Option<&'static str> {
        None
    }

    /// Transport family of this source.
    fn kind(&self) -> ProviderKind;

    /// Look a book up by ISBN (already normalized: no hyphens/spaces).
    async fn search(&self, isbn: &str) -> Result<ProviderHit>;

    /// Whether `search_by_fields` is implemented for this source.
    fn supports_field_search(&self) -> bool {
        false
    }

    /// Multi-field query returning zero or more list items.
    async fn search_by_fields(&self, _params: &SearchParams) -> Result<SearchOutcome> {
        Err(ProviderError::Unsupported(format!(
            "{} does not support field search",
            self.code()
        )))
    }

    /// Whether `get_details` is implemented for this source.
    fn supports_details(&self) -> bool {
        false
    }

    /// Exchange an edition key from this adapter's own `search_by_fields`
    /// for a full record.
    async fn get_details(&self, _edition_key: &str) -> Result<ProviderHit> {
        Err(ProviderError::Unsupported(format!(
            "{} does not support detail lookup",
            self.code()
        )))
    }
}
