//! Europeana Search & Record APIs — 200M+ records from European cultural
//! institutions. Requires a free API key supplied via `EUROPEANA_API_KEY`.
//!
//! The Record API wraps fields in language-aware maps ("en"/"def"/...), the
//! Search API in plain arrays; `first_val`/`all_vals` flatten both.

use crate::constants::EUROPEANA;
use crate::error::{ProviderError, Result};
use crate::parsers::text::{assign_isbn, ensure_lookup_isbn, extract_page_count, extract_year, normalize_isbn};
use crate::providers::check_status;
use crate::types::{
    BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome, SearchParams,
    SearchResultItem,
};
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

const SEARCH_URL: &str = "https://api.europeana.eu/record/v2/search.json";
const RECORD_URL: &str = "https://api.europeana.eu/record/v2";

/// First value of a lang-aware map or plain array; "en" wins, then "def",
/// then whatever is there.
pub fn first_val(field: &Value) -> Option<String> {
    match field {
        Value::Array(arr) => arr.first().and_then(|v| v.as_str()).map(str::to_string),
        Value::Object(map) => {
            for lang in ["en", "def"] {
                if let Some(v) = map.get(lang).and_then(|v| v[0].as_str()) {
                    return Some(v.to_string());
                }
            }
            map.values().find_map(|v| v[0].as_str()).map(str::to_string)
        }
        _ => None,
    }
}

/// All values of a lang-aware map or plain array, deduplicated.
pub fn all_vals(field: &Value) -> Vec<String> {
    let mut result = Vec::new();
    let mut push = |v: &Value| {
        if let Some(s) = v.as_str() {
            if !result.contains(&s.to_string()) {
                result.push(s.to_string());
            }
        }
    };
    match field {
        Value::Array(arr) => arr.iter().for_each(&mut push),
        Value::Object(map) => map
            .values()
            .filter_map(|v| v.as_array())
            .flatten()
            .for_each(&mut push),
        _ => {}
    }
    result
}

fn strict_isbn(record: &mut BookRecord, identifiers: &[String]) {
    for id in identifiers {
        assign_isbn(record, id);
    }
}

fn pages_from(extents: &[String]) -> Option<u32> {
    extents.iter().find_map(|e| extract_page_count(e))
}

fn year_from(dates: &[String]) -> Option<String> {
    dates.iter().find_map(|d| extract_year(d))
}

/// Map a Search API item onto the canonical shape.
pub fn parse_search_item(item: &Value) -> BookRecord {
    let mut record = BookRecord::default();

    record.title = item["title"][0].as_str().map(str::to_string);
    record.authors = all_vals(&item["dcCreator"]);
    record.publisher = item["dcPublisher"][0].as_str().map(str::to_string);

    let mut dates = all_vals(&item["year"]);
    dates.extend(all_vals(&item["dcDate"]));
    record.publication_year = year_from(&dates);

    let extents = {
        let e = all_vals(&item["dctermsExtent"]);
        if e.is_empty() {
            all_vals(&item["dcFormat"])
        } else {
            e
        }
    };
    record.pages = pages_from(&extents);
    record.pagination_description = extents.first().cloned();

    record.language = item["dcLanguage"][0].as_str().map(str::to_string);
    strict_isbn(&mut record, &all_vals(&item["dcIdentifier"]));
    record.cover_url = item["edmPreview"][0].as_str().map(str::to_string);
    record.description = item["dcDescription"][0].as_str().map(str::to_string);
    record.subjects = all_vals(&item["dcSubject"]);
    record.format = item["dcFormat"][0].as_str().map(str::to_string);

    record
}

/// Map a Record API response onto the canonical shape. The provider proxy
/// (first one) carries the source metadata.
pub fn parse_record_response(data: &Value) -> BookRecord {
    let mut record = BookRecord::default();
    let Some(proxy) = data["object"]["proxies"].get(0) else {
        return record;
    };

    record.title = first_val(&proxy["dcTitle"]);
    record.authors = all_vals(&proxy["dcCreator"]);
    record.publisher = first_val(&proxy["dcPublisher"]);
    record.publication_year = year_from(&all_vals(&proxy["dcDate"]));

    let mut extents = all_vals(&proxy["dctermsExtent"]);
    extents.extend(all_vals(&proxy["dcFormat"]));
    record.pages = pages_from(&extents);
    record.pagination_description = first_val(&proxy["dctermsExtent"]);

    record.language = first_val(&proxy["dcLanguage"]);
    strict_isbn(&mut record, &all_vals(&proxy["dcIdentifier"]));
    record.cover_url = data["object"]["europeanaAggregation"]["edmPreview"]
        .as_str()
        .map(str::to_string);
    record.description = first_val(&proxy["dcDescription"]);
    record.subjects = all_vals(&proxy["dcSubject"]);
    record.format = first_val(&proxy["dcFormat"]);
    record.notes = first_val(&proxy["dcSource"]);

    record
}

pub struct EuropeanaProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    timeout: Duration,
}

impl EuropeanaProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        EuropeanaProvider {
            client: reqwest::Client::new(),
            api_key,
            timeout,
        }
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential("EUROPEANA_API_KEY"))
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }
}

#[async_trait::async_trait]
impl BookProvider for EuropeanaProvider {
    fn code(&self) -> &'static str {
        EUROPEANA
    }

    fn name(&self) -> &'static str {
        "Europeana"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let key = self.key()?.to_string();
        let clean = normalize_isbn(isbn);

        // ISBN matches in dcIdentifier; TYPE:TEXT keeps it to books
        let data = self
            .get_json(
                SEARCH_URL,
                &[
                    ("wskey", key),
                    ("query", format!("\"{}\"", clean)),
                    ("qf", "TYPE:TEXT".to_string()),
                    ("rows", "5".to_string()),
                    ("profile", "standard".to_string()),
                ],
            )
            .await?;

        let items = data["items"].as_array().cloned().unwrap_or_default();
        if data["success"].as_bool() != Some(true) || items.is_empty() {
            return Err(ProviderError::isbn_not_found());
        }

        // Prefer the item whose identifiers actually contain the ISBN
        let best = items
            .iter()
            .find(|item| {
                all_vals(&item["dcIdentifier"])
                    .iter()
                    .any(|id| normalize_isbn(id).contains(&clean))
            })
            .unwrap_or(&items[0]);

        let mut record = parse_search_item(best);
        if record.title.is_none() {
            return Err(ProviderError::Parse("No title in response".to_string()));
        }
        ensure_lookup_isbn(&mut record, &clean);

        let source_url = best["guid"].as_str().map(str::to_string).unwrap_or_else(|| {
            format!(
                "https://www.europeana.eu/item{}",
                best["id"].as_str().unwrap_or_default()
            )
        });

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
        let key = self.key()?.to_string();

        let mut query_parts = Vec::new();
        if let Some(isbn) = &params.isbn {
            query_parts.push(format!("\"{}\"", normalize_isbn(isbn)));
        }
        if let Some(title) = &params.title {
            query_parts.push(format!("proxy_dc_title:(\"{}\")", title));
        }
        if let Some(author) = &params.author {
            query_parts.push(format!("proxy_dc_creator:(\"{}\")", author));
        }
        if let Some(publisher) = &params.publisher {
            query_parts.push(format!("proxy_dc_publisher:(\"{}\")", publisher));
        }
        if query_parts.is_empty() {
            return Err(ProviderError::no_search_params());
        }

        let rows = params.limit.unwrap_or(50).min(100); // Europeana max is 100
        let start = params.offset.unwrap_or(0) + 1; // 1-based

        let mut query = vec![
            ("wskey", key),
            ("query", query_parts.join(" AND ")),
            ("qf", "TYPE:TEXT".to_string()), // books only
            ("rows", rows.to_string()),
            ("start", start.to_string()),
            ("profile", "standard".to_string()),
        ];
        match (&params.year_from, &params.year_to) {
            (Some(from), to) => query.push((
                "qf",
                format!("YEAR:[{} TO {}]", from, to.as_deref().unwrap_or("*")),
            )),
            (None, Some(to)) => query.push(("qf", format!("YEAR:[* TO {}]", to))),
            (None, None) => {}
        }

        let data = self.get_json(SEARCH_URL, &query).await?;
        let total = data["totalResults"].as_u64().unwrap_or(0);
        let items_json = data["items"].as_array().cloned().unwrap_or_default();

        let items: Vec<SearchResultItem> = items_json
            .iter()
            .map(|item| {
                let record = parse_search_item(item);
                SearchResultItem::from_record(
                    &record,
                    item["id"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let has_more = (start as u64 - 1 + items_json.len() as u64) < total;
        Ok(SearchOutcome {
            items,
            total,
            has_more,
        })
    }

    fn supports_details(&self) -> bool {
        true
    }

    /// The edition key is the Europeana record id, e.g. "/2021672/resource_xyz".
    #[instrument(skip(self))]
    async fn get_details(&self, edition_key: &str) -> Result<ProviderHit> {
        let key = self.key()?.to_string();
        let url = format!("{}{}.json", RECORD_URL, edition_key);
        let data = self.get_json(&url, &[("wskey", key)]).await?;

        if data["success"].as_bool() == Some(false) {
            return Err(ProviderError::NotFound("Record not found".to_string()));
        }

        let record = parse_record_response(&data);
        if record.title.is_none() {
            return Err(ProviderError::Parse("No title in response".to_string()));
        }

        Ok(ProviderHit {
            record,
            source_url: Some(format!("https://www.europeana.eu/item{}", edition_key)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lang_aware_maps_flatten() {
        let field = json!({"def": ["Candide"], "en": ["Candide, or Optimism"]});
        assert_eq!(first_val(&field).as_deref(), Some("Candide, or Optimism"));

        let arr = json!(["a", "b", "a"]);
        assert_eq!(all_vals(&arr), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn search_item_mapping() {
        let item = json!({
            "id": "/9200386/BibliographicResource_3000045111111",
            "title": ["Candide"],
            "dcCreator": ["Voltaire"],
            "dcPublisher": ["Cramer"],
            "dcDate": ["1759"],
            "dcIdentifier": ["978-2-07-037510-9"],
            "dcLanguage": ["fr"],
            "dctermsExtent": ["299 p."]
        });
        let record = parse_search_item(&item);
        assert_eq!(record.title.as_deref(), Some("Candide"));
        assert_eq!(record.authors, vec!["Voltaire".to_string()]);
        assert_eq!(record.publication_year.as_deref(), Some("1759"));
        assert_eq!(record.isbn_13.as_deref(), Some("9782070375109"));
        assert_eq!(record.pages, Some(299));
    }
}
