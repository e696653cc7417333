//! Shared helpers for extraction passes: raw-output sidecar writes, path
//! normalization (§4.3 common contract, §6 sidecar layout), and the
//! parallel file walk shared by the symbols/code-units loaders.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rusqlite::Transaction;
use walkdir::WalkDir;

use crate::errors::Result;
use crate::rust_source::{parse_file_declarations, Decl};

/// Writes `data` under `<sources_dir>/<run_id>/<subdir?>/<file_name>` and
/// records the raw-outputs row in the caller's transaction.
pub fn write_raw_output(
    tx: &Transaction,
    sources_dir: &Path,
    run_id: i64,
    subdir: Option<&str>,
    source: &str,
    file_name: &str,
    data: &[u8],
) -> Result<PathBuf> {
    let mut dir = sources_dir.join(run_id.to_string());
    if let Some(subdir) = subdir {
        dir = dir.join(subdir);
    }
    fs::create_dir_all(&dir)?;
    let path = dir.join(file_name);
    fs::write(&path, data)?;
    refactor_index_store::store::write_raw_output(tx, run_id, source, &path.to_string_lossy())?;
    Ok(path)
}

/// Makes `path` relative to `root` with forward slashes, leaving non-prefixed
/// paths untouched.
pub fn to_root_relative(root: &Path, path: &Path) -> String {
    if let Ok(rel) = path.strip_prefix(root) {
        rel.to_string_lossy().replace('\\', "/")
    } else {
        path.to_string_lossy().replace('\\', "/")
    }
}

/// Normalizes body text for hashing and storage (§3: CRLF→LF, trailing
/// whitespace per line stripped).
pub fn normalize_body(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(|line| line.trim_end_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hex SHA-256, used for both symbol hashes and body hashes (§3).
pub fn sha256_hex(data: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One `.rs` file's read+parse outcome from [`parse_rust_files_parallel`].
pub struct ParsedSourceFile {
    pub rel_path: String,
    pub pkg: String,
    pub outcome: Result<Vec<Decl>>,
}

/// Walks `root` for `.rs` files (sorted for deterministic insert order) and
/// parses each one in parallel via `rayon`, standing in for the original
/// `go/packages` loader's whole-module concurrent load. DB writes stay
/// strictly sequential — every pass owns exactly one transaction (§4.1) — so
/// only the read+parse half of the loader benefits from parallelism.
pub fn parse_rust_files_parallel(root: &Path, module_path_for: impl Fn(&str) -> String + Sync) -> Vec<ParsedSourceFile> {
    let mut rel_paths: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("rs"))
        .map(|e| to_root_relative(root, e.path()))
        .collect();
    rel_paths.sort();

    rel_paths
        .into_par_iter()
        .map(|rel_path| {
            let pkg = module_path_for(&rel_path);
            let outcome = fs::read_to_string(root.join(&rel_path))
                .map_err(crate::errors::Error::Io)
                .and_then(|source| parse_file_declarations(&pkg, &source));
            ParsedSourceFile { rel_path, pkg, outcome }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_body_collapses_crlf_and_trailing_whitespace() {
        let a = normalize_body("fn main() {\r\n    foo();   \r\n}\r\n");
        let b = normalize_body("fn main() {\n    foo();\n}\n");
        assert_eq!(a, b);
    }

    #[test]
    fn sha256_hex_is_deterministic() {
        assert_eq!(sha256_hex("abc"), sha256_hex("abc"));
        assert_ne!(sha256_hex("abc"), sha256_hex("abd"));
    }
}
