//! External tool invocation (§6): bit-exact command lines via subprocess,
//! grounded on `examples/pustynsky-search-index/src/git/mod.rs`'s `run_git`
//! helper. `git2` is deliberately not used — spec §6 requires textual output
//! the parsers depend on byte-for-byte, which a libgit2 binding would not
//! reproduce.

use std::path::Path;
use std::process::Command;

use crate::errors::{Error, Result};

fn run(mut cmd: Command, tool: &str) -> Result<Vec<u8>> {
    let output = cmd
        .output()
        .map_err(|e| Error::tool(tool, format!("failed to execute: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stderr = if stderr.is_empty() {
            format!("{} command failed", tool)
        } else {
            stderr
        };
        return Err(Error::tool(tool, stderr));
    }
    Ok(output.stdout)
}

/// `rg` returns exit code 1 for "no matches", which is not an error.
fn run_allow_no_match(mut cmd: Command, tool: &str) -> Result<Vec<u8>> {
    let output = cmd
        .output()
        .map_err(|e| Error::tool(tool, format!("failed to execute: {}", e)))?;
    if output.status.code() == Some(1) {
        return Ok(Vec::new());
    }
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stderr = if stderr.is_empty() {
            format!("{} command failed", tool)
        } else {
            stderr
        };
        return Err(Error::tool(tool, stderr));
    }
    Ok(output.stdout)
}

pub fn git(repo: &Path, args: &[&str]) -> Result<Vec<u8>> {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo).args(args);
    run(cmd, "git")
}

pub fn git_text(repo: &Path, args: &[&str]) -> Result<String> {
    let bytes = git(repo, args)?;
    String::from_utf8(bytes).map_err(|e| Error::tool("git", format!("non-utf8 output: {}", e)))
}

/// `rg --line-number --column --no-heading --color=never -F <term> <root>`
pub fn ripgrep(root: &Path, term: &str) -> Result<Vec<u8>> {
    let mut cmd = Command::new("rg");
    cmd.arg("--line-number")
        .arg("--column")
        .arg("--no-heading")
        .arg("--color=never")
        .arg("-F")
        .arg(term)
        .arg(root);
    run_allow_no_match(cmd, "rg")
}

/// Invokes the configured cross-reference tool, defaulting to `gopls`'s
/// command shape generalized to a configurable binary (see
/// `CrossRefToolConfig`): `<bin> prepare_rename <pos>` then
/// `<bin> references -declaration <pos>`.
pub fn refs_tool(bin: &str, repo: &Path, args: &[&str]) -> Result<Vec<u8>> {
    let mut cmd = Command::new(bin);
    cmd.current_dir(repo).args(args);
    run(cmd, bin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn git_rev_parse_head_on_fresh_repo() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path();
        Command::new("git").arg("init").arg("-q").current_dir(repo).status().unwrap();
        Command::new("git")
            .args(["config", "user.email", "a@b.c"])
            .current_dir(repo)
            .status()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "tester"])
            .current_dir(repo)
            .status()
            .unwrap();
        fs::write(repo.join("a.txt"), "hello\n").unwrap();
        Command::new("git").args(["add", "."]).current_dir(repo).status().unwrap();
        Command::new("git")
            .args(["commit", "-q", "-m", "init"])
            .current_dir(repo)
            .status()
            .unwrap();

        let out = git_text(repo, &["rev-parse", "HEAD"]).unwrap();
        assert_eq!(out.trim().len(), 40);
    }
}
