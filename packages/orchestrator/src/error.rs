//! Error taxonomy for the range orchestrator (C4).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid commit state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("worktree error for commit {commit}: {message}")]
    Worktree { commit: String, message: String },

    #[error("range cancelled at commit {commit}")]
    Cancelled { commit: String },

    #[error(transparent)]
    Store(#[from] refactor_index_store::Error),

    #[error(transparent)]
    Extract(#[from] refactor_index_extract::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    pub fn config(msg: impl Into<String>) -> Self {
        OrchestratorError::Config(msg.into())
    }

    pub fn worktree(commit: impl Into<String>, message: impl Into<String>) -> Self {
        OrchestratorError::Worktree {
            commit: commit.into(),
            message: message.into(),
        }
    }
}
