//! Error type for the script module (C6).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] refactor_index_store::Error),

    #[error("invalid fileset pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("write trace sink: {0}")]
    Trace(#[from] std::io::Error),

    #[error("queryRefs: symbol hash must not be empty")]
    EmptySymbolHash,
}
