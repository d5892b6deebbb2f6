//! One adapter module per external catalog source.

pub mod bnp;
pub mod bol_nl;
pub mod cerl_hpb;
pub mod cobiss;
pub mod danbib;
pub mod europeana;
pub mod finna;
pub mod google_books;
pub mod hathitrust;
pub mod kb_nl;
pub mod library_hub;
pub mod libris;
pub mod ndl;
pub mod opac_sbn;
pub mod open_library;
pub mod sru;
pub mod standaard;
pub mod trove;

use crate::error::{ProviderError, Result};

/// Browser User-Agent for the scraped shop sources that reject default
/// clients.
pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Polite identification for the catalog endpoints that want one.
pub(crate) const LOOKUP_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; bibfetch/0.1; bibliographic lookup)";

/// Map a non-2xx response to a uniform "HTTP <status>" failure.
pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ProviderError::Status(response.status().as_u16()))
    }
}

/// Percent-encode a value for hand-built URLs (source links, expert-search
/// queries). Query parameters sent through reqwest use `.query()` instead.
pub(crate) fn percent_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
