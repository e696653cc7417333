//! Error types for refactor-index-store.

use std::fmt;
use thiserror::Error;

/// Error kinds, matching the ingestion pipeline's abstract error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required input missing or invalid.
    Config,
    /// Database open/migrate/invariant violation.
    Schema,
    /// Insert/query failure propagated from the database driver.
    Store,
    /// A requested commit / symbol / path was not present.
    NotFound,
    /// The requested full-text index is absent.
    FtsUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Schema => "schema",
            ErrorKind::Store => "store",
            ErrorKind::NotFound => "not_found",
            ErrorKind::FtsUnavailable => "fts_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct Error {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Store, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn fts_unavailable(index: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::FtsUnavailable,
            format!("fts index unavailable: {}", index.into()),
        )
    }

    /// Serialize this error to the JSON blob stashed on a failed run row.
    pub fn to_error_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind.as_str(),
            "message": self.message,
        })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::store(format!("sqlite error: {}", err)).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Config, format!("json error: {}", err)).with_source(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
