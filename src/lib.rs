pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod parsers;
pub mod providers;
pub mod registry;
pub mod types;

pub use error::{ProviderError, Result};
pub use orchestrator::{IsbnLookup, LookupResult, Orchestrator};
pub use registry::ProviderRegistry;
pub use types::{
    ActiveSource, BookProvider, BookRecord, ProviderHit, ProviderKind, SearchOutcome,
    SearchParams, SearchResultItem,
};
