//! Doc hits pass (§4.3.5): runs `rg` once per term in a terms file over a
//! root directory and records `doc_hits` rows.
//!
//! Grounded on `examples/original_source/pkg/refactorindex/ingest_doc_hits.go`.

use std::collections::HashMap;
use std::path::PathBuf;

use refactor_index_store::{store as db, DocHit, RunConfig, Store};

use crate::errors::{Error, Result};

pub const TOOL_VERSION: &str = "refactor-index-extract/0.1";

#[derive(Debug, Clone)]
pub struct DocHitsConfig {
    pub db_path: PathBuf,
    pub root_dir: PathBuf,
    pub terms_file: PathBuf,
    pub commit_id: Option<i64>,
    pub sources_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DocHitsSummary {
    pub run_id: i64,
    pub terms: usize,
    pub hits: usize,
    pub files: usize,
    pub skipped: usize,
}

pub fn ingest_doc_hits(cfg: &DocHitsConfig) -> Result<DocHitsSummary> {
    let root_dir = cfg
        .root_dir
        .canonicalize()
        .map_err(|e| Error::config(format!("resolve root dir: {}", e)))?;
    let terms = read_terms_file(&cfg.terms_file)?;

    let mut store = Store::open(&cfg.db_path)?;
    let args_json = serde_json::json!({
        "root": root_dir.to_string_lossy(),
        "termsFile": cfg.terms_file.to_string_lossy(),
    });
    let run_id = store.create_run(&RunConfig {
        tool_version: Some(TOOL_VERSION.into()),
        root_path: Some(root_dir.to_string_lossy().into_owned()),
        args_json: Some(args_json),
        sources_dir: Some(cfg.sources_dir.to_string_lossy().into_owned()),
        ..Default::default()
    })?;

    let (hits, files, skipped) =
        super::run_in_transaction(&mut store, run_id, |tx| run_doc_hits_body(tx, cfg, &root_dir, &terms, run_id))?;

    Ok(DocHitsSummary {
        run_id,
        terms: terms.len(),
        hits,
        files,
        skipped,
    })
}

fn run_doc_hits_body(
    tx: &rusqlite::Transaction,
    cfg: &DocHitsConfig,
    root_dir: &std::path::Path,
    terms: &[String],
    run_id: i64,
) -> Result<(usize, usize, usize)> {
    let mut file_ids: HashMap<String, i64> = HashMap::new();
    let mut hit_count = 0usize;
    let mut skip_count = 0usize;

    for term in terms {
        if term.is_empty() {
            continue;
        }
        let out = crate::tools::ripgrep(root_dir, term)?;
        let file_name = format!("rg-{}.txt", slugify(term));
        crate::common::write_raw_output(tx, &cfg.sources_dir, run_id, Some("doc-hits"), "rg", &file_name, &out)?;

        let text = String::from_utf8_lossy(&out);
        for line in text.trim().lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((file_path, line_num, col_num, match_text)) = parse_ripgrep_line(line) else {
                skip_count += 1;
                continue;
            };
            let rel_path = if std::path::Path::new(&file_path).is_absolute() {
                crate::common::to_root_relative(root_dir, std::path::Path::new(&file_path))
            } else {
                file_path
            };
            let file_id = match file_ids.get(&rel_path) {
                Some(&id) => id,
                None => {
                    let id = db::get_or_create_file(tx, &rel_path)?;
                    file_ids.insert(rel_path.clone(), id);
                    id
                }
            };
            db::insert_doc_hit(
                tx,
                &DocHit {
                    run_id,
                    commit_id: cfg.commit_id,
                    file_id,
                    line: line_num,
                    col: col_num,
                    term: term.clone(),
                    match_text,
                },
            )?;
            hit_count += 1;
        }
    }

    Ok((hit_count, file_ids.len(), skip_count))
}

fn read_terms_file(path: &std::path::Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::config(format!("read terms file: {}", e)))?;
    Ok(content
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect())
}

fn parse_ripgrep_line(line: &str) -> Option<(String, i64, i64, String)> {
    let parts: Vec<&str> = line.splitn(4, ':').collect();
    if parts.len() < 4 {
        return None;
    }
    let line_num: i64 = parts[1].parse().ok()?;
    let col_num: i64 = parts[2].parse().ok()?;
    Some((parts[0].to_string(), line_num, col_num, parts[3].to_string()))
}

fn slugify(term: &str) -> String {
    let mut out = term.to_lowercase();
    for (from, to) in [(' ', '-'), ('/', '-'), ('\\', '-'), (':', '-'), ('#', '-'), ('\t', '-')] {
        out = out.replace(from, &to.to_string());
    }
    let trimmed = out.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "term".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Hello World/Test"), "hello-world-test");
        assert_eq!(slugify("###"), "term");
    }

    #[test]
    fn parse_ripgrep_line_splits_four_ways() {
        let (path, line, col, text) = parse_ripgrep_line("src/lib.rs:12:5:fn add() {").unwrap();
        assert_eq!(path, "src/lib.rs");
        assert_eq!(line, 12);
        assert_eq!(col, 5);
        assert_eq!(text, "fn add() {");
    }

    #[test]
    fn doc_hits_golden_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.rs"), "fn add(a: i32, b: i32) -> i32 { a + b }\n").unwrap();
        std::fs::write(root.join("b.rs"), "// TODO remove\nfn sub() {}\n").unwrap();

        let terms_file = dir.path().join("terms.txt");
        std::fs::write(&terms_file, "# comment\nTODO\nfn add\n").unwrap();

        let db_path = dir.path().join("index.sqlite");
        let sources_dir = dir.path().join("sources");
        let summary = ingest_doc_hits(&DocHitsConfig {
            db_path,
            root_dir: root,
            terms_file,
            commit_id: None,
            sources_dir,
        })
        .unwrap();

        assert_eq!(summary.terms, 2);
        assert!(summary.hits >= 2);
        assert_eq!(summary.skipped, 0);
    }
}
