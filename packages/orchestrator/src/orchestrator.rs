//! `orchestrate_range` (§4): runs the commits pass over a ref range, then for
//! each commit (in ascending, `--reverse`, order) materializes a disposable
//! worktree and drives the opted-in extraction passes against it, tagging
//! every row with that commit's id.
//!
//! Grounded on the teacher's `checkpoint`/`job` state-machine discipline
//! (`codegraph-orchestration::job::JobStateMachine`), generalized from
//! multi-stage pipeline jobs down to commit-scoped pass invocations
//! ([`crate::commit_state::CommitRun`]), and on `tokio-util`'s
//! `CancellationToken` for cooperative cancellation between passes.

use std::path::{Path, PathBuf};

use refactor_index_extract::passes::code_units::{ingest_code_units, CodeUnitsConfig, CodeUnitsSummary};
use refactor_index_extract::passes::commits::{ingest_commits, CommitsConfig};
use refactor_index_extract::passes::cross_references::{
    ingest_cross_references, CrossReferencesConfig, CrossReferencesSummary, RefTarget,
};
use refactor_index_extract::passes::diff::{ingest_diff, DiffConfig, DiffSummary};
use refactor_index_extract::passes::doc_hits::{ingest_doc_hits, DocHitsConfig, DocHitsSummary};
use refactor_index_extract::passes::symbols::{ingest_symbols, SymbolsConfig, SymbolsSummary};
use refactor_index_extract::passes::tree_sitter::{ingest_tree_sitter, TreeSitterConfig, TreeSitterSummary};
use refactor_index_extract::tools;
use tokio_util::sync::CancellationToken;

use crate::commit_state::CommitRun;
use crate::error::{OrchestratorError, Result};
use crate::worktree::Worktree;

#[derive(Debug, Clone)]
pub struct RefTargetSpec {
    pub symbol_hash: String,
    pub file_path: String,
    pub line: i64,
    pub col: i64,
}

#[derive(Debug, Clone)]
pub struct CrossReferencesRangeConfig {
    pub tool_bin: String,
    pub targets: Vec<RefTargetSpec>,
}

#[derive(Debug, Clone)]
pub struct RangeConfig {
    pub repo_path: PathBuf,
    pub db_path: PathBuf,
    pub from_ref: String,
    pub to_ref: String,
    pub sources_dir: PathBuf,
    /// Parent directory disposable per-commit worktrees are created under.
    /// `None` uses a process-owned temp dir named after the lineage run.
    pub worktrees_root: Option<PathBuf>,
    pub run_symbols: bool,
    pub run_code_units: bool,
    pub ignore_package_errors: bool,
    pub doc_hits_terms_file: Option<PathBuf>,
    pub tree_sitter_queries_yaml: Option<PathBuf>,
    pub cross_references: Option<CrossReferencesRangeConfig>,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::new(),
            db_path: PathBuf::new(),
            from_ref: String::new(),
            to_ref: String::new(),
            sources_dir: PathBuf::new(),
            worktrees_root: None,
            run_symbols: true,
            run_code_units: true,
            ignore_package_errors: false,
            doc_hits_terms_file: None,
            tree_sitter_queries_yaml: None,
            cross_references: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommitPasses {
    pub hash: String,
    pub commit_id: i64,
    pub diff: Option<DiffSummary>,
    pub symbols: Option<SymbolsSummary>,
    pub code_units: Option<CodeUnitsSummary>,
    pub doc_hits: Option<DocHitsSummary>,
    pub tree_sitter: Option<TreeSitterSummary>,
    pub cross_references: Option<CrossReferencesSummary>,
}

#[derive(Debug, Clone)]
pub struct RangeReport {
    pub lineage_run_id: i64,
    pub per_commit: Vec<CommitPasses>,
}

/// Runs the commits pass over `cfg.from_ref..cfg.to_ref`, then one
/// disposable-worktree pass invocation per discovered commit. The first pass
/// failure aborts the whole range (§4.4): the failing commit's worktree is
/// best-effort removed via [`Worktree`]'s `Drop`, and rows already committed
/// for earlier commits keep their `success` status.
pub fn orchestrate_range(cfg: &RangeConfig, cancel: &CancellationToken) -> Result<RangeReport> {
    let commits_summary = ingest_commits(&CommitsConfig {
        db_path: cfg.db_path.clone(),
        repo_path: cfg.repo_path.clone(),
        from_ref: cfg.from_ref.clone(),
        to_ref: cfg.to_ref.clone(),
    })?;

    let worktrees_root = cfg
        .worktrees_root
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(format!("refactor-index-orchestrator-{}", commits_summary.run_id)));

    let mut per_commit = Vec::with_capacity(commits_summary.commits.len());

    for (hash, commit_id) in &commits_summary.commits {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled { commit: hash.clone() });
        }

        let mut run = CommitRun::new(hash.clone());
        run.start()?;

        match run_commit_passes(cfg, hash, *commit_id, &worktrees_root, cancel) {
            Ok(passes) => {
                run.complete()?;
                per_commit.push(passes);
            }
            Err(e) => {
                let _ = run.fail(e.to_string());
                return Err(e);
            }
        }
    }

    Ok(RangeReport {
        lineage_run_id: commits_summary.run_id,
        per_commit,
    })
}

fn run_commit_passes(
    cfg: &RangeConfig,
    hash: &str,
    commit_id: i64,
    worktrees_root: &Path,
    cancel: &CancellationToken,
) -> Result<CommitPasses> {
    let mut passes = CommitPasses {
        hash: hash.to_string(),
        commit_id,
        ..Default::default()
    };

    let use_root_diff = !has_parent(&cfg.repo_path, hash);
    let from_ref = if use_root_diff { String::new() } else { format!("{}^", hash) };
    passes.diff = Some(ingest_diff(&DiffConfig {
        db_path: cfg.db_path.clone(),
        repo_path: cfg.repo_path.clone(),
        from_ref,
        to_ref: hash.to_string(),
        sources_dir: cfg.sources_dir.clone(),
        use_root_diff,
    })?);

    check_cancelled(cancel, hash)?;
    let worktree = Worktree::add(&cfg.repo_path, worktrees_root, hash)?;

    if cfg.run_symbols {
        passes.symbols = Some(ingest_symbols(&SymbolsConfig {
            db_path: cfg.db_path.clone(),
            root_path: worktree.path().to_path_buf(),
            commit_id: Some(commit_id),
            ignore_package_errors: cfg.ignore_package_errors,
        })?);
    }
    check_cancelled(cancel, hash)?;

    if cfg.run_code_units {
        passes.code_units = Some(ingest_code_units(&CodeUnitsConfig {
            db_path: cfg.db_path.clone(),
            root_path: worktree.path().to_path_buf(),
            commit_id: Some(commit_id),
            ignore_package_errors: cfg.ignore_package_errors,
        })?);
    }
    check_cancelled(cancel, hash)?;

    if let Some(terms_file) = &cfg.doc_hits_terms_file {
        passes.doc_hits = Some(ingest_doc_hits(&DocHitsConfig {
            db_path: cfg.db_path.clone(),
            root_dir: worktree.path().to_path_buf(),
            terms_file: terms_file.clone(),
            commit_id: Some(commit_id),
            sources_dir: cfg.sources_dir.clone(),
        })?);
    }
    check_cancelled(cancel, hash)?;

    if let Some(queries_yaml) = &cfg.tree_sitter_queries_yaml {
        passes.tree_sitter = Some(ingest_tree_sitter(&TreeSitterConfig {
            db_path: cfg.db_path.clone(),
            root_dir: worktree.path().to_path_buf(),
            queries_yaml: queries_yaml.clone(),
            commit_id: Some(commit_id),
            sources_dir: cfg.sources_dir.clone(),
        })?);
    }
    check_cancelled(cancel, hash)?;

    if let Some(xrefs) = &cfg.cross_references {
        let targets = xrefs
            .targets
            .iter()
            .map(|t| RefTarget {
                symbol_hash: t.symbol_hash.clone(),
                file_path: t.file_path.clone(),
                line: t.line,
                col: t.col,
                commit_id: Some(commit_id),
            })
            .collect();
        passes.cross_references = Some(ingest_cross_references(&CrossReferencesConfig {
            db_path: cfg.db_path.clone(),
            repo_path: worktree.path().to_path_buf(),
            sources_dir: cfg.sources_dir.clone(),
            tool_bin: Some(xrefs.tool_bin.clone()),
            targets,
        })?);
    }

    Ok(passes)
}

fn check_cancelled(cancel: &CancellationToken, hash: &str) -> Result<()> {
    if cancel.is_cancelled() {
        Err(OrchestratorError::Cancelled { commit: hash.to_string() })
    } else {
        Ok(())
    }
}

fn has_parent(repo: &Path, hash: &str) -> bool {
    tools::git_text(repo, &["rev-parse", &format!("{}^", hash)]).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn git(repo: &Path, args: &[&str]) {
        let status = Command::new("git").args(args).current_dir(repo).status().unwrap();
        assert!(status.success());
    }

    #[test]
    fn orchestrates_a_two_commit_range() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        git(&repo, &["config", "user.email", "a@b.c"]);
        git(&repo, &["config", "user.name", "tester"]);

        std::fs::write(repo.join("lib.rs"), "pub fn one() -> i32 { 1 }\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "-q", "-m", "first"]);

        std::fs::write(repo.join("lib.rs"), "pub fn one() -> i32 { 1 }\npub fn two() -> i32 { 2 }\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "-q", "-m", "second"]);

        let db_path = dir.path().join("index.sqlite");
        let sources_dir = dir.path().join("sources");
        let cfg = RangeConfig {
            repo_path: repo,
            db_path,
            from_ref: "HEAD~1".into(),
            to_ref: "HEAD".into(),
            sources_dir,
            ..Default::default()
        };

        let report = orchestrate_range(&cfg, &CancellationToken::new()).unwrap();
        assert_eq!(report.per_commit.len(), 2);
        for commit in &report.per_commit {
            assert!(commit.diff.is_some());
            assert!(commit.symbols.is_some());
            assert!(commit.code_units.is_some());
        }
        let last = report.per_commit.last().unwrap();
        assert!(last.symbols.as_ref().unwrap().symbols_defined >= 2);
    }

    #[test]
    fn cancellation_before_start_aborts_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        git(&repo, &["config", "user.email", "a@b.c"]);
        git(&repo, &["config", "user.name", "tester"]);
        std::fs::write(repo.join("a.txt"), "x\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "-q", "-m", "init"]);

        let db_path = dir.path().join("index.sqlite");
        let sources_dir = dir.path().join("sources");
        let cfg = RangeConfig {
            repo_path: repo,
            db_path,
            from_ref: "HEAD".into(),
            to_ref: "HEAD".into(),
            sources_dir,
            ..Default::default()
        };

        let token = CancellationToken::new();
        token.cancel();
        let result = orchestrate_range(&cfg, &token);
        assert!(matches!(result, Err(OrchestratorError::Cancelled { .. })));
    }
}
