//! Diff pass (§4.3.1): parses `git diff --name-status -z` and
//! `git diff -U0 --no-color` between two refs into `diff_files` /
//! `diff_hunks` / `diff_lines` rows.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use refactor_index_store::{store as db, RunConfig, Store};

use crate::common::write_raw_output;
use crate::diff::{parse_name_status, parse_unified_diff};
use crate::errors::{Error, Result};

pub const TOOL_VERSION: &str = "refactor-index-extract/0.1";

#[derive(Debug, Clone)]
pub struct DiffConfig {
    pub db_path: PathBuf,
    pub repo_path: PathBuf,
    pub from_ref: String,
    pub to_ref: String,
    pub sources_dir: PathBuf,
    pub use_root_diff: bool,
}

#[derive(Debug, Clone)]
pub struct DiffSummary {
    pub run_id: i64,
    pub files: usize,
    pub hunks: usize,
    pub lines: usize,
}

pub fn ingest_diff(cfg: &DiffConfig) -> Result<DiffSummary> {
    if cfg.repo_path.as_os_str().is_empty() {
        return Err(Error::config("repo path is required"));
    }
    let repo_path = cfg
        .repo_path
        .canonicalize()
        .map_err(|e| Error::config(format!("resolve repo path: {}", e)))?;

    let mut store = Store::open(&cfg.db_path)?;

    let args_json = serde_json::json!({
        "from": cfg.from_ref,
        "to": cfg.to_ref,
        "repo": repo_path.to_string_lossy(),
        "sources_dir": cfg.sources_dir.to_string_lossy(),
        "root_diff": cfg.use_root_diff,
    });
    let run_id = store.create_run(&RunConfig {
        tool_version: Some(TOOL_VERSION.into()),
        git_from: Some(cfg.from_ref.clone()),
        git_to: Some(cfg.to_ref.clone()),
        root_path: Some(repo_path.to_string_lossy().into_owned()),
        args_json: Some(args_json),
        sources_dir: Some(cfg.sources_dir.to_string_lossy().into_owned()),
    })?;

    let (files, hunks, lines) = super::run_in_transaction(&mut store, run_id, |tx| {
        run_diff_body(tx, cfg, &repo_path, run_id)
    })?;

    Ok(DiffSummary {
        run_id,
        files,
        hunks,
        lines,
    })
}

fn run_diff_body(
    tx: &rusqlite::Transaction,
    cfg: &DiffConfig,
    repo_path: &Path,
    run_id: i64,
) -> Result<(usize, usize, usize)> {
    let name_status_args: Vec<&str> = if cfg.use_root_diff {
        vec!["diff", "--root", "--name-status", "-z", &cfg.to_ref]
    } else {
        vec!["diff", "--name-status", "-z", &cfg.from_ref, &cfg.to_ref]
    };
    let name_status_output = crate::tools::git(repo_path, &name_status_args)?;
    write_raw_output(
        tx,
        &cfg.sources_dir,
        run_id,
        None,
        "git-name-status",
        "git-name-status.txt",
        &name_status_output,
    )?;
    let entries = parse_name_status(&name_status_output)?;

    let patch_args: Vec<&str> = if cfg.use_root_diff {
        vec!["diff", "--root", "-U0", "--no-color", &cfg.to_ref]
    } else {
        vec!["diff", "-U0", "--no-color", &cfg.from_ref, &cfg.to_ref]
    };
    let patch_output = crate::tools::git(repo_path, &patch_args)?;
    write_raw_output(
        tx,
        &cfg.sources_dir,
        run_id,
        None,
        "git-diff-u0",
        "git-diff-u0.patch",
        &patch_output,
    )?;

    let mut path_to_diff_file_id: HashMap<String, i64> = HashMap::new();
    let mut file_count = 0usize;
    for entry in &entries {
        let primary_path = entry.primary_path().to_string();
        let file_id = db::get_or_create_file(tx, &primary_path)?;
        if !entry.old_path.is_empty() {
            db::get_or_create_file(tx, &entry.old_path)?;
        }
        if !entry.new_path.is_empty() {
            db::get_or_create_file(tx, &entry.new_path)?;
        }
        let diff_file_id = db::insert_diff_file(
            tx,
            &refactor_index_store::DiffFile {
                run_id,
                file_id: Some(file_id),
                status: entry.status.clone(),
                old_path: (!entry.old_path.is_empty()).then(|| entry.old_path.clone()),
                new_path: (!entry.new_path.is_empty()).then(|| entry.new_path.clone()),
            },
        )?;
        file_count += 1;
        path_to_diff_file_id.insert(primary_path, diff_file_id);
        if !entry.old_path.is_empty() {
            path_to_diff_file_id.insert(entry.old_path.clone(), diff_file_id);
        }
        if !entry.new_path.is_empty() {
            path_to_diff_file_id.insert(entry.new_path.clone(), diff_file_id);
        }
    }

    let patches = parse_unified_diff(&patch_output)?;
    let mut hunk_count = 0usize;
    let mut line_count = 0usize;
    for patch in &patches {
        let diff_file_id = resolve_diff_file_id(&path_to_diff_file_id, &patch.old_path, &patch.new_path);
        let Some(diff_file_id) = diff_file_id else { continue };
        for hunk in &patch.hunks {
            let hunk_id = db::insert_diff_hunk(
                tx,
                &refactor_index_store::DiffHunk {
                    diff_file_id,
                    old_start: hunk.old_start,
                    old_lines: hunk.old_lines,
                    new_start: hunk.new_start,
                    new_lines: hunk.new_lines,
                },
            )?;
            hunk_count += 1;
            for line in &hunk.lines {
                db::insert_diff_line(
                    tx,
                    &refactor_index_store::DiffLine {
                        hunk_id,
                        kind: line.kind.to_string(),
                        line_no_old: line.old_line,
                        line_no_new: line.new_line,
                        text: line.text.clone(),
                    },
                )?;
                line_count += 1;
            }
        }
    }

    Ok((file_count, hunk_count, line_count))
}

fn resolve_diff_file_id(index: &HashMap<String, i64>, old_path: &str, new_path: &str) -> Option<i64> {
    if !new_path.is_empty() {
        if let Some(id) = index.get(new_path) {
            return Some(*id);
        }
    }
    if !old_path.is_empty() {
        if let Some(id) = index.get(old_path) {
            return Some(*id);
        }
    }
    None
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
    fn diff_golden_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        git(&repo, &["config", "user.email", "a@b.c"]);
        git(&repo, &["config", "user.name", "tester"]);

        std::fs::write(repo.join("fileA.txt"), "alpha\nbeta\n").unwrap();
        std::fs::write(repo.join("fileB.txt"), "one\n").unwrap();
        std::fs::write(repo.join("fileC.txt"), "gone\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "-q", "-m", "f"]);

        std::fs::write(repo.join("fileA.txt"), "alpha\nbeta2\n").unwrap();
        git(&repo, &["mv", "fileB.txt", "fileB_renamed.txt"]);
        std::fs::remove_file(repo.join("fileC.txt")).unwrap();
        std::fs::write(repo.join("fileD.txt"), "new\n").unwrap();
        git(&repo, &["add", "-A"]);
        git(&repo, &["commit", "-q", "-m", "t"]);

        let db_path = dir.path().join("index.sqlite");
        let sources_dir = dir.path().join("sources");
        let summary = ingest_diff(&DiffConfig {
            db_path,
            repo_path: repo,
            from_ref: "HEAD~1".into(),
            to_ref: "HEAD".into(),
            sources_dir,
            use_root_diff: false,
        })
        .unwrap();

        assert_eq!(summary.files, 4);
        assert!(summary.hunks >= 1);
        assert!(summary.lines >= 1);
    }
}
