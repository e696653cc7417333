//! Code units pass (§4.3.4): like the symbols pass, but records the full body
//! text/hash and doc comment for each declaration as a `code_unit_snapshots`
//! row, deduped by `unit_hash` across runs.
//!
//! Grounded on `examples/original_source/pkg/refactorindex/ingest_code_units.go`.

use std::path::PathBuf;

use refactor_index_store::{store as db, CodeUnitDef, CodeUnitSnapshot, RunConfig, Store};

use crate::common::parse_rust_files_parallel;
use crate::errors::{Error, Result};

pub const TOOL_VERSION: &str = "refactor-index-extract/0.1";

#[derive(Debug, Clone)]
pub struct CodeUnitsConfig {
    pub db_path: PathBuf,
    pub root_path: PathBuf,
    pub commit_id: Option<i64>,
    pub ignore_package_errors: bool,
}

#[derive(Debug, Clone)]
pub struct CodeUnitsSummary {
    pub run_id: i64,
    pub files_scanned: usize,
    pub units_defined: usize,
    pub snapshots: usize,
    pub parse_errors: usize,
}

pub fn ingest_code_units(cfg: &CodeUnitsConfig) -> Result<CodeUnitsSummary> {
    if !cfg.root_path.is_dir() {
        return Err(Error::config(format!("root path is not a directory: {}", cfg.root_path.display())));
    }
    let root_path = cfg
        .root_path
        .canonicalize()
        .map_err(|e| Error::config(format!("resolve root path: {}", e)))?;

    let mut store = Store::open(&cfg.db_path)?;
    let args_json = serde_json::json!({ "root": root_path.to_string_lossy() });
    let run_id = store.create_run(&RunConfig {
        tool_version: Some(TOOL_VERSION.into()),
        root_path: Some(root_path.to_string_lossy().into_owned()),
        args_json: Some(args_json),
        ..Default::default()
    })?;

    let summary = super::run_in_transaction(&mut store, run_id, |tx| run_code_units_body(tx, cfg, &root_path, run_id))?;
    Ok(summary)
}

fn run_code_units_body(
    tx: &rusqlite::Transaction,
    cfg: &CodeUnitsConfig,
    root_path: &std::path::Path,
    run_id: i64,
) -> Result<CodeUnitsSummary> {
    let mut files_scanned = 0usize;
    let mut units_defined = 0usize;
    let mut snapshots = 0usize;
    let mut parse_errors = 0usize;

    for parsed in parse_rust_files_parallel(root_path, super::symbols::module_path_for) {
        files_scanned += 1;
        let decls = match parsed.outcome {
            Ok(d) => d,
            Err(e) => {
                parse_errors += 1;
                if !cfg.ignore_package_errors {
                    return Err(e);
                }
                db::insert_run_kv(
                    tx,
                    run_id,
                    "go_packages_error",
                    &serde_json::json!({ "path": parsed.rel_path, "error": e.to_string() }),
                )?;
                continue;
            }
        };

        let file_id = db::get_or_create_file(tx, &parsed.rel_path)?;
        for decl in decls.iter().filter(|d| is_body_carrying(&d.kind)) {
            let body_text = decl.normalized_body();
            let body_hash = crate::common::sha256_hex(&body_text);
            let code_unit_id = db::get_or_create_code_unit(
                tx,
                &CodeUnitDef {
                    kind: decl.kind.clone(),
                    name: decl.name.clone(),
                    pkg: decl.pkg.clone(),
                    recv: decl.recv.clone(),
                    signature: decl.signature.clone(),
                    unit_hash: decl.symbol_hash(),
                },
            )?;
            units_defined += 1;
            db::insert_code_unit_snapshot(
                tx,
                &CodeUnitSnapshot {
                    run_id,
                    commit_id: cfg.commit_id,
                    file_id,
                    code_unit_id,
                    start_line: decl.start_line,
                    start_col: decl.start_col,
                    end_line: decl.end_line,
                    end_col: decl.end_col,
                    body_hash,
                    body_text,
                    doc_text: decl.doc.clone(),
                },
            )?;
            snapshots += 1;
        }
    }

    Ok(CodeUnitsSummary {
        run_id,
        files_scanned,
        units_defined,
        snapshots,
        parse_errors,
    })
}

/// A code unit is a body-carrying entity (§3): function, method, or type.
/// `const`/`var`/`symbol` (traits) declarations have no body to snapshot.
fn is_body_carrying(kind: &str) -> bool {
    matches!(kind, "func" | "method" | "type")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_units_golden_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(
            root.join("src/lib.rs"),
            r#"
/// Adds two numbers.
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

pub const ANSWER: i32 = 42;
"#,
        )
        .unwrap();

        let db_path = dir.path().join("index.sqlite");
        let summary = ingest_code_units(&CodeUnitsConfig {
            db_path,
            root_path: root,
            commit_id: None,
            ignore_package_errors: true,
        })
        .unwrap();

        assert_eq!(summary.units_defined, 1);
        assert_eq!(summary.snapshots, 1);
        assert_eq!(summary.parse_errors, 0);
    }

    #[test]
    fn is_body_carrying_excludes_const_var_and_trait() {
        assert!(is_body_carrying("func"));
        assert!(is_body_carrying("method"));
        assert!(is_body_carrying("type"));
        assert!(!is_body_carrying("const"));
        assert!(!is_body_carrying("var"));
        assert!(!is_body_carrying("symbol"));
    }
}
