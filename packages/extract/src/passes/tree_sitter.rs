//! Tree-sitter captures pass (§4.3.6): runs a set of named tree-sitter
//! queries over Rust sources under a root and records one `ts_captures` row
//! per capture.
//!
//! Grounded on
//! `examples/original_source/pkg/refactorindex/ingest_tree_sitter.go`'s
//! YAML-driven `QueryBuilder`. The original is multi-language (dispatches on
//! `cfg.Language`); this rewrite indexes Rust sources only, so the language
//! parameter collapses to a fixed `tree_sitter_rust` grammar and the YAML
//! config maps query name -> query source directly instead of
//! language -> query name -> source.

use std::collections::HashMap;
use std::path::PathBuf;

use refactor_index_store::{store as db, RunConfig, Store, TreeSitterCapture};
use tree_sitter::{Parser, Query, QueryCursor};
use walkdir::WalkDir;

use crate::errors::{Error, Result};

pub const TOOL_VERSION: &str = "refactor-index-extract/0.1";

#[derive(Debug, Clone)]
pub struct TreeSitterConfig {
    pub db_path: PathBuf,
    pub root_dir: PathBuf,
    pub queries_yaml: PathBuf,
    pub commit_id: Option<i64>,
    pub sources_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TreeSitterSummary {
    pub run_id: i64,
    pub files: usize,
    pub captures: usize,
    pub queries: usize,
    pub skipped: usize,
}

pub fn ingest_tree_sitter(cfg: &TreeSitterConfig) -> Result<TreeSitterSummary> {
    let root_dir = cfg
        .root_dir
        .canonicalize()
        .map_err(|e| Error::config(format!("resolve root dir: {}", e)))?;
    let queries = load_queries(&cfg.queries_yaml)?;
    if queries.is_empty() {
        return Err(Error::config("queries yaml defines no queries"));
    }

    let mut store = Store::open(&cfg.db_path)?;
    let args_json = serde_json::json!({
        "root": root_dir.to_string_lossy(),
        "queries": cfg.queries_yaml.to_string_lossy(),
    });
    let run_id = store.create_run(&RunConfig {
        tool_version: Some(TOOL_VERSION.into()),
        root_path: Some(root_dir.to_string_lossy().into_owned()),
        args_json: Some(args_json),
        sources_dir: Some(cfg.sources_dir.to_string_lossy().into_owned()),
        ..Default::default()
    })?;

    let compiled = compile_queries(&queries)?;

    let (files, captures, query_count, skipped) =
        super::run_in_transaction(&mut store, run_id, |tx| run_body(tx, cfg, &root_dir, &compiled, run_id))?;

    Ok(TreeSitterSummary {
        run_id,
        files,
        captures,
        queries: query_count,
        skipped,
    })
}

fn load_queries(path: &std::path::Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::config(format!("read queries yaml: {}", e)))?;
    serde_yaml::from_str(&content).map_err(|e| Error::config(format!("parse queries yaml: {}", e)))
}

fn compile_queries(queries: &HashMap<String, String>) -> Result<Vec<(String, Query)>> {
    let language = tree_sitter_rust::language();
    queries
        .iter()
        .map(|(name, source)| {
            Query::new(&language, source)
                .map(|q| (name.clone(), q))
                .map_err(|e| Error::config(format!("compile query `{}`: {}", name, e)))
        })
        .collect()
}

fn run_body(
    tx: &rusqlite::Transaction,
    cfg: &TreeSitterConfig,
    root_dir: &std::path::Path,
    compiled: &[(String, Query)],
    run_id: i64,
) -> Result<(usize, usize, usize, usize)> {
    let mut file_ids: HashMap<String, i64> = HashMap::new();
    let mut capture_count = 0usize;
    let mut query_count = 0usize;
    let mut skip_count = 0usize;

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_rust::language())
        .map_err(|e| Error::config(format!("set tree-sitter language: {}", e)))?;

    for entry in WalkDir::new(root_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || entry.path().extension().and_then(|e| e.to_str()) != Some("rs") {
            continue;
        }
        let rel_path = crate::common::to_root_relative(root_dir, entry.path());
        if rel_path.is_empty() {
            skip_count += 1;
            continue;
        }
        let source = match std::fs::read_to_string(entry.path()) {
            Ok(s) => s,
            Err(_) => {
                skip_count += 1;
                continue;
            }
        };
        let Some(tree) = parser.parse(&source, None) else {
            skip_count += 1;
            continue;
        };

        let file_id = *file_ids
            .entry(rel_path.clone())
            .or_insert(db::get_or_create_file(tx, &rel_path)?);

        for (query_name, query) in compiled {
            query_count += 1;
            let mut cursor = QueryCursor::new();
            let matches = cursor.matches(query, tree.root_node(), source.as_bytes());
            for m in matches {
                for capture in m.captures {
                    let node = capture.node;
                    let capture_name = query.capture_names()[capture.index as usize].to_string();
                    let start = node.start_position();
                    let end = node.end_position();
                    let snippet = node.utf8_text(source.as_bytes()).unwrap_or_default().to_string();
                    db::insert_tree_sitter_capture(
                        tx,
                        &TreeSitterCapture {
                            run_id,
                            commit_id: cfg.commit_id,
                            file_id,
                            query_name: query_name.clone(),
                            capture_name,
                            node_type: Some(node.kind().to_string()),
                            start_line: start.row as i64 + 1,
                            start_col: start.column as i64 + 1,
                            end_line: end.row as i64 + 1,
                            end_col: end.column as i64 + 1,
                            snippet,
                        },
                    )?;
                    capture_count += 1;
                }
            }
        }
    }

    Ok((file_ids.len(), capture_count, query_count, skip_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_sitter_golden_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.rs"), "pub fn add(a: i32, b: i32) -> i32 { a + b }\n").unwrap();

        let queries_yaml = dir.path().join("queries.yaml");
        std::fs::write(&queries_yaml, "functions: \"(function_item name: (identifier) @fn.name) @fn.def\"\n").unwrap();

        let db_path = dir.path().join("index.sqlite");
        let sources_dir = dir.path().join("sources");
        let summary = ingest_tree_sitter(&TreeSitterConfig {
            db_path,
            root_dir: root,
            queries_yaml,
            commit_id: None,
            sources_dir,
        })
        .unwrap();

        assert_eq!(summary.files, 1);
        assert!(summary.captures >= 2);
    }
}
