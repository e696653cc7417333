//! Range orchestrator for refactor-index (C4): disposable per-commit
//! worktrees driving the extraction passes in `packages/extract` over a git
//! ref range.

pub mod commit_state;
pub mod error;
pub mod orchestrator;
pub mod worktree;

pub use commit_state::{CommitRun, CommitState};
pub use error::{OrchestratorError, Result};
pub use orchestrator::{orchestrate_range, CommitPasses, CrossReferencesRangeConfig, RangeConfig, RangeReport, RefTargetSpec};
pub use worktree::Worktree;
