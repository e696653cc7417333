//! Disposable per-commit worktrees (§4): `git worktree add --force` on
//! entry, best-effort `remove --force` + `prune` on drop, so a panicking or
//! early-returning pass invocation never leaves a stale worktree behind.

use std::path::{Path, PathBuf};

use refactor_index_extract::tools;

use crate::error::{OrchestratorError, Result};

pub struct Worktree {
    repo: PathBuf,
    path: PathBuf,
    hash: String,
}

impl Worktree {
    pub fn add(repo: &Path, worktrees_root: &Path, hash: &str) -> Result<Self> {
        std::fs::create_dir_all(worktrees_root)?;
        let path = worktrees_root.join(hash);
        let path_str = path
            .to_str()
            .ok_or_else(|| OrchestratorError::config("worktree path is not valid UTF-8"))?;
        tools::git(repo, &["worktree", "add", "--force", path_str, hash])
            .map_err(|e| OrchestratorError::worktree(hash, e.to_string()))?;
        Ok(Self {
            repo: repo.to_path_buf(),
            path,
            hash: hash.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove(&self) {
        if let Some(path_str) = self.path.to_str() {
            if let Err(e) = tools::git(&self.repo, &["worktree", "remove", "--force", path_str]) {
                tracing::warn!(commit = %self.hash, error = %e, "worktree remove failed, pruning anyway");
            }
        }
        let _ = tools::git(&self.repo, &["worktree", "prune"]);
    }
}

impl Drop for Worktree {
    fn drop(&mut self) {
        self.remove();
    }
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
    fn add_materializes_files_and_drop_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        git(&repo, &["config", "user.email", "a@b.c"]);
        git(&repo, &["config", "user.name", "tester"]);
        std::fs::write(repo.join("a.txt"), "hello\n").unwrap();
        git(&repo, &["add", "."]);
        git(&repo, &["commit", "-q", "-m", "init"]);
        let hash = {
            let out = Command::new("git")
                .args(["rev-parse", "HEAD"])
                .current_dir(&repo)
                .output()
                .unwrap();
            String::from_utf8(out.stdout).unwrap().trim().to_string()
        };

        let worktrees_root = dir.path().join("worktrees");
        let wt_path = {
            let wt = Worktree::add(&repo, &worktrees_root, &hash).unwrap();
            assert!(wt.path().join("a.txt").is_file());
            wt.path().to_path_buf()
        };
        assert!(!wt_path.exists());
    }
}
