//! Custom error types for pubmed-abstracts.
//!
//! Errors fall into three groups: bad input caught before any request is made,
//! upstream failures from E-utilities, and records missing a required field.
//! None of them are retried; every one aborts the whole search.

use thiserror::Error;

/// Main error type for pubmed-abstracts operations.
#[derive(Debug, Error)]
pub enum PubmedError {
    /// Invalid search input or configuration (empty keyword, reversed dates)
    #[error("Input error: {0}")]
    Input(String),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Rate limited by E-utilities
    #[error("Rate limited by E-utilities")]
    RateLimited,

    /// E-utilities returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message from the response
        message: String,
    },

    /// Malformed search or fetch response
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required field is absent from a fetched record
    #[error("Missing field in record: {0}")]
    MissingField(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization/deserialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PubmedError {
    /// True for errors raised by the database round trip rather than by the caller's input
    /// or by the record contents.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited | Self::Api { .. } | Self::Parse(_)
        )
    }
}

impl From<quick_xml::Error> for PubmedError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for PubmedError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Result type alias using `PubmedError`
pub type Result<T> = std::result::Result<T, PubmedError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a missing-field error naming `path`
    fn ok_or_missing(self, path: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, path: &str) -> Result<T> {
        self.ok_or_else(|| PubmedError::MissingField(path.to_string()))
    }
}
