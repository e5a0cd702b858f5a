use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Every proxy in the list failed for one URL.
    #[error("All proxies failed for {url}")]
    FetchExhausted { url: String },

    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("Item missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// Every feed in a group failed. The only feed-level failure that propagates.
    #[error("All feeds in the {group} group failed")]
    AggregationExhausted { group: String },

    #[error("Cache corrupt: {0}")]
    CacheCorrupt(String),

    /// Blocking load failed and no fallback could be served.
    #[error("{0}")]
    Unavailable(String),

    #[error("HTTP client error: {0}")]
    FetchError(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::StoreError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
