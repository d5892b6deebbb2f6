use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Parse(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("{0} not configured")]
    MissingCredential(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("Provider not implemented")]
    NotImplemented,
}

impl ProviderError {
    /// "ISBN not found" — the standard not-found failure for identifier lookup.
    pub fn isbn_not_found() -> Self {
        ProviderError::NotFound("ISBN not found".to_string())
    }

    /// "No title in record" — a response parsed but yielded no usable title.
    pub fn no_title() -> Self {
        ProviderError::Parse("No title in record".to_string())
    }

    /// "No search parameters" — field search invoked with an empty parameter set.
    pub fn no_search_params() -> Self {
        ProviderError::Unsupported("No search parameters".to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
