//! Error taxonomy for extraction passes (§7): config, tool, and parse
//! failures on top of the store's own error kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Required input missing or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// An external tool exited non-zero; stderr is preserved verbatim.
    #[error("tool error running `{tool}`: {stderr}")]
    Tool { tool: String, stderr: String },

    /// A tool's output did not match the expected grammar.
    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Store(#[from] refactor_index_store::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    pub fn tool(tool: impl Into<String>, stderr: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            stderr: stderr.into(),
        }
    }

    /// Converts to the store's `ErrorKind`/JSON shape so every pass can
    /// record a uniform `error_json` regardless of which layer failed.
    pub fn to_store_error(&self) -> refactor_index_store::Error {
        match self {
            Error::Store(e) => refactor_index_store::Error::new(e.kind, e.message.clone()),
            Error::Config(msg) => refactor_index_store::Error::config(msg.clone()),
            Error::Tool { tool, stderr } => {
                refactor_index_store::Error::store(format!("tool `{}` failed: {}", tool, stderr))
            }
            Error::Parse(msg) => refactor_index_store::Error::store(format!("parse error: {}", msg)),
            Error::Io(e) => refactor_index_store::Error::store(format!("io error: {}", e)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
