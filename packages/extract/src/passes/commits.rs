//! Commits pass (§4.3.2): walks a commit range and records commits,
//! commit-files, and file blobs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use refactor_index_store::{store as db, CommitFile, CommitInfo, FileBlob, RunConfig, Store};

use crate::diff::parse_name_status;
use crate::errors::{Error, Result};
use crate::passes::diff::TOOL_VERSION;

#[derive(Debug, Clone)]
pub struct CommitsConfig {
    pub db_path: PathBuf,
    pub repo_path: PathBuf,
    pub from_ref: String,
    pub to_ref: String,
}

#[derive(Debug, Clone)]
pub struct CommitsSummary {
    pub run_id: i64,
    pub commit_count: usize,
    pub file_count: usize,
    pub blob_count: usize,
    /// Commit hashes in ascending order, paired with their `commits.id` rows.
    pub commits: Vec<(String, i64)>,
}

pub fn ingest_commits(cfg: &CommitsConfig) -> Result<CommitsSummary> {
    if cfg.from_ref.trim().is_empty() || cfg.to_ref.trim().is_empty() {
        return Err(Error::config("from/to refs are required"));
    }

    let mut store = Store::open(&cfg.db_path)?;

    let args_json = serde_json::json!({
        "from": cfg.from_ref,
        "to": cfg.to_ref,
        "repo": cfg.repo_path.to_string_lossy(),
    });
    let run_id = store.create_run(&RunConfig {
        tool_version: Some(TOOL_VERSION.into()),
        git_from: Some(cfg.from_ref.clone()),
        git_to: Some(cfg.to_ref.clone()),
        root_path: Some(cfg.repo_path.to_string_lossy().into_owned()),
        args_json: Some(args_json),
        sources_dir: None,
    })?;

    let (commits, file_count, blob_count) = super::run_in_transaction(&mut store, run_id, |tx| {
        run_commits_body(tx, cfg, run_id)
    })?;

    Ok(CommitsSummary {
        run_id,
        commit_count: commits.len(),
        file_count,
        blob_count,
        commits,
    })
}

fn run_commits_body(
    tx: &rusqlite::Transaction,
    cfg: &CommitsConfig,
    run_id: i64,
) -> Result<(Vec<(String, i64)>, usize, usize)> {
    let repo = cfg.repo_path.as_path();
    let from_hash = resolve_commit_hash(repo, &cfg.from_ref)?;
    let to_hash = resolve_commit_hash(repo, &cfg.to_ref)?;

    let range = format!("{}..{}", from_hash, to_hash);
    let list_output = crate::tools::git_text(repo, &["rev-list", "--reverse", &range])?;
    let mut hashes = split_lines(&list_output);

    let root_commits = load_root_commits(repo)?;
    if root_commits.contains(&from_hash) {
        hashes.insert(0, from_hash.clone());
    }

    let mut commits = Vec::new();
    let mut file_count = 0usize;
    let mut blob_count = 0usize;

    for hash in &hashes {
        let info = load_commit_info(repo, hash)?;
        let commit_id = db::insert_commit(
            tx,
            &CommitInfo {
                run_id,
                hash: info.hash.clone(),
                author_name: Some(info.author_name),
                author_email: Some(info.author_email),
                author_date: Some(info.author_date),
                committer_date: Some(info.committer_date),
                subject: Some(info.subject),
                body: Some(info.body),
            },
        )?;
        commits.push((hash.clone(), commit_id));

        let name_status = crate::tools::git(repo, &["diff-tree", "--no-commit-id", "-r", "--name-status", "-z", hash])?;
        let entries = parse_name_status(&name_status)?;

        for entry in &entries {
            let primary_path = entry.primary_path().to_string();
            let file_id = db::get_or_create_file(tx, &primary_path)?;
            if !entry.old_path.is_empty() && entry.old_path != primary_path {
                db::get_or_create_file(tx, &entry.old_path)?;
            }
            if !entry.new_path.is_empty() && entry.new_path != primary_path {
                db::get_or_create_file(tx, &entry.new_path)?;
            }

            let blob_new = if !entry.new_path.is_empty() {
                git_blob_sha(repo, hash, &entry.new_path).ok()
            } else {
                None
            };
            let blob_old = if !entry.old_path.is_empty() {
                let parent = format!("{}^", hash);
                git_blob_sha(repo, &parent, &entry.old_path).ok()
            } else {
                None
            };

            db::insert_commit_file(
                tx,
                &CommitFile {
                    commit_id,
                    file_id,
                    status: entry.status.clone(),
                    old_path: (!entry.old_path.is_empty()).then(|| entry.old_path.clone()),
                    new_path: (!entry.new_path.is_empty()).then(|| entry.new_path.clone()),
                    blob_old: blob_old.clone(),
                    blob_new: blob_new.clone(),
                },
            )?;
            file_count += 1;

            if let Some(blob_sha) = &blob_new {
                let (size_bytes, line_count) = blob_stats(repo, blob_sha);
                db::insert_file_blob(
                    tx,
                    &FileBlob {
                        commit_id,
                        file_id,
                        blob_sha: blob_sha.clone(),
                        size_bytes,
                        line_count,
                    },
                )?;
                blob_count += 1;
            }
        }
    }

    Ok((commits, file_count, blob_count))
}

struct ParsedCommit {
    hash: String,
    author_name: String,
    author_email: String,
    author_date: String,
    committer_date: String,
    subject: String,
    body: String,
}

fn load_commit_info(repo: &Path, hash: &str) -> Result<ParsedCommit> {
    let format = "%H\x1f%an\x1f%ae\x1f%ad\x1f%cd\x1f%s\x1f%b";
    let out = crate::tools::git_text(repo, &["show", "-s", "--date=iso-strict", &format!("--format={}", format), hash])?;
    let parts: Vec<&str> = out.trim().split('\x1f').collect();
    if parts.len() < 7 {
        return Err(Error::parse("unexpected commit format"));
    }
    Ok(ParsedCommit {
        hash: parts[0].to_string(),
        author_name: parts[1].to_string(),
        author_email: parts[2].to_string(),
        author_date: parts[3].to_string(),
        committer_date: parts[4].to_string(),
        subject: parts[5].to_string(),
        body: parts[6].trim().to_string(),
    })
}

fn git_blob_sha(repo: &Path, commit: &str, path: &str) -> Result<String> {
    let out = crate::tools::git_text(repo, &["rev-parse", &format!("{}:{}", commit, path)])?;
    Ok(out.trim().to_string())
}

fn blob_stats(repo: &Path, blob_sha: &str) -> (Option<i64>, Option<i64>) {
    let Ok(size_out) = crate::tools::git_text(repo, &["cat-file", "-s", blob_sha]) else {
        return (None, None);
    };
    let Ok(size) = size_out.trim().parse::<i64>() else {
        return (None, None);
    };
    let Ok(content) = crate::tools::git(repo, &["cat-file", "-p", blob_sha]) else {
        return (Some(size), None);
    };
    let line_count = content.iter().filter(|&&b| b == b'\n').count() as i64;
    (Some(size), Some(line_count))
}

fn split_lines(data: &str) -> Vec<String> {
    data.trim()
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

fn resolve_commit_hash(repo: &Path, reference: &str) -> Result<String> {
    if reference.trim().is_empty() {
        return Err(Error::config("ref is required"));
    }
    let out = crate::tools::git_text(repo, &["rev-parse", reference])?;
    let hash = out.trim().to_string();
    if hash.is_empty() {
        return Err(Error::parse("empty commit hash"));
    }
    Ok(hash)
}

fn load_root_commits(repo: &Path) -> Result<HashSet<String>> {
    let out = crate::tools::git_text(repo, &["rev-list", "--max-parents=0", "--all"])?;
    Ok(split_lines(&out).into_iter().collect())
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
    fn commits_golden_scenario() {
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
        let summary = ingest_commits(&CommitsConfig {
            db_path,
            repo_path: repo,
            from_ref: "HEAD~1".into(),
            to_ref: "HEAD".into(),
        })
        .unwrap();

        assert_eq!(summary.commit_count, 2);
        assert!(summary.file_count >= 5);
        assert!(summary.blob_count >= 3);
    }
}
