//! Typed rows and identifiers shared by `store` and `query`.

use serde::{Deserialize, Serialize};

pub type RunId = i64;
pub type FileId = i64;
pub type SymbolDefId = i64;
pub type CodeUnitId = i64;
pub type CommitId = i64;
pub type DiffFileId = i64;
pub type DiffHunkId = i64;

/// Arguments recorded against a `meta_runs` row at creation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub tool_version: Option<String>,
    pub git_from: Option<String>,
    pub git_to: Option<String>,
    pub root_path: Option<String>,
    pub args_json: Option<serde_json::Value>,
    pub sources_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiffFile {
    pub run_id: RunId,
    pub file_id: Option<FileId>,
    pub status: String,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiffHunk {
    pub diff_file_id: DiffFileId,
    pub old_start: i64,
    pub old_lines: i64,
    pub new_start: i64,
    pub new_lines: i64,
}

#[derive(Debug, Clone)]
pub struct DiffLine {
    pub hunk_id: DiffHunkId,
    pub kind: String,
    pub line_no_old: Option<i64>,
    pub line_no_new: Option<i64>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SymbolDef {
    pub pkg: String,
    pub name: String,
    pub kind: String,
    pub recv: Option<String>,
    pub signature: Option<String>,
    pub symbol_hash: String,
}

#[derive(Debug, Clone)]
pub struct SymbolOccurrence {
    pub run_id: RunId,
    pub commit_id: Option<CommitId>,
    pub file_id: FileId,
    pub symbol_def_id: SymbolDefId,
    pub line: i64,
    pub col: i64,
    pub is_exported: bool,
}

#[derive(Debug, Clone)]
pub struct CodeUnitDef {
    pub kind: String,
    pub name: String,
    pub pkg: String,
    pub recv: Option<String>,
    pub signature: Option<String>,
    pub unit_hash: String,
}

#[derive(Debug, Clone)]
pub struct CodeUnitSnapshot {
    pub run_id: RunId,
    pub commit_id: Option<CommitId>,
    pub file_id: FileId,
    pub code_unit_id: CodeUnitId,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub body_hash: String,
    pub body_text: String,
    pub doc_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub run_id: RunId,
    pub hash: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_date: Option<String>,
    pub committer_date: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommitFile {
    pub commit_id: CommitId,
    pub file_id: FileId,
    pub status: String,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub blob_old: Option<String>,
    pub blob_new: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileBlob {
    pub commit_id: CommitId,
    pub file_id: FileId,
    pub blob_sha: String,
    pub size_bytes: Option<i64>,
    pub line_count: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SymbolRef {
    pub run_id: RunId,
    pub commit_id: Option<CommitId>,
    pub symbol_def_id: SymbolDefId,
    pub file_id: FileId,
    pub line: i64,
    pub col: i64,
    pub is_decl: bool,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct SymbolRefUnresolved {
    pub run_id: RunId,
    pub commit_id: Option<CommitId>,
    pub symbol_hash: String,
    pub file_id: FileId,
    pub line: i64,
    pub col: i64,
    pub is_decl: bool,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct DocHit {
    pub run_id: RunId,
    pub commit_id: Option<CommitId>,
    pub file_id: FileId,
    pub line: i64,
    pub col: i64,
    pub term: String,
    pub match_text: String,
}

#[derive(Debug, Clone)]
pub struct TreeSitterCapture {
    pub run_id: RunId,
    pub commit_id: Option<CommitId>,
    pub file_id: FileId,
    pub query_name: String,
    pub capture_name: String,
    pub node_type: Option<String>,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub snippet: String,
}

/// Collapses an empty string to `NULL`, matching the original's `nullIfEmpty`.
pub fn null_if_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
