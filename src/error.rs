//! Error types for the kabala library.

use thiserror::Error;

/// Main error type for the kabala library.
///
/// Unrecognized receipt input is never an error: the parsers degrade to
/// empty/null fields instead. These variants cover I/O, persistence, config
/// and model-call failures only.
#[derive(Error, Debug)]
pub enum KabalaError {
    /// Configuration problem (bad file, missing API key, disabled backend).
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP-level failure talking to the generative model.
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The model answered, but not with anything usable.
    #[error("model response error: {0}")]
    Model(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite store failure.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// PDF could not be read at all.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the kabala library.
pub type Result<T> = std::result::Result<T, KabalaError>;
