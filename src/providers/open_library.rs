//! Open Library — free JSON API, no key required.
//!
//! The edition endpoint stores authors as references that have to be
//! resolved with one extra request each.

use crate::constants::OPEN_LIBRARY;
use crate::error::{ProviderError, Result};
use crate::parsers::text::{extract_year, normalize_isbn};
use crate::providers::check_status;
use crate::types::{BookProvider, BookRecord, ProviderHit, ProviderKind};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct OpenLibraryProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenLibraryProvider {
    pub fn new(timeout: Duration) -> Self {
        OpenLibraryProvider {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn resolve_author(&self, key: &str) -> Option<String> {
        let url = format!("https://openlibrary.org{}.json", key);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let data: Value = response.json().await.ok()?;
        data["name"].as_str().map(str::to_string)
    }
}

#[async_trait::async_trait]
impl BookProvider for OpenLibraryProvider {
    fn code(&self) -> &'static str {
        OPEN_LIBRARY
    }

    fn name(&self) -> &'static str {
        "Open Library"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Api
    }

    #[instrument(skip(self))]
    async fn search(&self, isbn: &str) -> Result<ProviderHit> {
        let clean = normalize_isbn(isbn);
        let url = format!("https://openlibrary.org/isbn/{}.json", clean);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Err(ProviderError::isbn_not_found());
        }
        let data: Value = check_status(response)?.json().await?;

        let mut record = BookRecord::default();

        record.title = data["title"]
            .as_str()
            .or_else(|| data["full_title"].as_str())
            .map(str::to_string);
        if record.title.is_none() {
            return Err(ProviderError::no_title());
        }
        record.subtitle = data["subtitle"].as_str().map(str::to_string);

        // Authors are stored as references; resolve each one, skipping any
        // that fail
        if let Some(author_refs) = data["authors"].as_array() {
            for author_ref in author_refs {
                if let Some(key) = author_ref["key"].as_str() {
                    match self.resolve_author(key).await {
                        Some(name) => record.authors.push(name),
                        None => debug!(key, "skipping unresolvable author reference"),
                    }
                }
            }
        }

        record.publisher = data["publishers"][0].as_str().map(str::to_string);
        if let Some(date) = data["publish_date"].as_str() {
            record.publication_year = extract_year(date);
        }

        if let Some(cover_id) = data["covers"][0].as_i64() {
            record.cover_url = Some(format!(
                "https://covers.openlibrary.org/b/id/{}-L.jpg",
                cover_id
            ));
        }

        if let Some(raw) = data["isbn_13"][0].as_str() {
            record.isbn_13 = Some(raw.replace('-', ""));
        }
        if let Some(raw) = data["isbn_10"][0].as_str() {
            record.isbn_10 = Some(raw.replace('-', ""));
        }

        record.pages = data["number_of_pages"].as_u64().map(|p| p as u32);
        record.series = data["series"][0].as_str().map(str::to_string);
        record.edition = data["edition_name"].as_str().map(str::to_string);
        record.format = data["physical_format"].as_str().map(str::to_string);
        // Descriptions are either a plain string or {type, value}
        record.description = data["description"]
            .as_str()
            .or_else(|| data["description"]["value"].as_str())
            .map(str::to_string);

        if record.authors.is_empty() {
            warn!(isbn = %clean, "Open Library edition has no resolvable authors");
        }

        Ok(ProviderHit {
            record,
            source_url: Some(format!("https://openlibrary.org/isbn/{}", clean)),
        })
    }
}
