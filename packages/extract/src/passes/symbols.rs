//! Symbols pass (§4.3.3): walks Rust sources under a root and records
//! `symbol_defs`/`symbol_occurrences` rows, one occurrence per declaration
//! site per run.
//!
//! Grounded on `examples/original_source/pkg/refactorindex/ingest_symbols.go`'s
//! `go/packages`-driven walk, rewritten over `syn` (see [`crate::rust_source`]).
//! Parse failures are best-effort (§4.4): a file that fails to parse is
//! recorded under `run_kv["parse_error"]` rather than aborting the run.

use std::path::PathBuf;

use refactor_index_store::{store as db, RunConfig, Store, SymbolDef, SymbolOccurrence};

use crate::common::parse_rust_files_parallel;
use crate::errors::{Error, Result};

pub const TOOL_VERSION: &str = "refactor-index-extract/0.1";

#[derive(Debug, Clone)]
pub struct SymbolsConfig {
    pub db_path: PathBuf,
    pub root_path: PathBuf,
    pub commit_id: Option<i64>,
    /// §3.4: record parse failures via `run_kv` and continue instead of
    /// aborting the pass.
    pub ignore_package_errors: bool,
}

#[derive(Debug, Clone)]
pub struct SymbolsSummary {
    pub run_id: i64,
    pub files_scanned: usize,
    pub symbols_defined: usize,
    pub occurrences: usize,
    pub parse_errors: usize,
}

pub fn ingest_symbols(cfg: &SymbolsConfig) -> Result<SymbolsSummary> {
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

    let summary = super::run_in_transaction(&mut store, run_id, |tx| run_symbols_body(tx, cfg, &root_path, run_id))?;
    Ok(summary)
}

fn run_symbols_body(
    tx: &rusqlite::Transaction,
    cfg: &SymbolsConfig,
    root_path: &std::path::Path,
    run_id: i64,
) -> Result<SymbolsSummary> {
    let mut files_scanned = 0usize;
    let mut symbols_defined = 0usize;
    let mut occurrences = 0usize;
    let mut parse_errors = 0usize;

    for parsed in parse_rust_files_parallel(root_path, module_path_for) {
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
        for decl in &decls {
            let symbol_def_id = db::get_or_create_symbol_def(
                tx,
                &SymbolDef {
                    pkg: decl.pkg.clone(),
                    name: decl.name.clone(),
                    kind: decl.kind.clone(),
                    recv: decl.recv.clone(),
                    signature: decl.signature.clone(),
                    symbol_hash: decl.symbol_hash(),
                },
            )?;
            symbols_defined += 1;
            db::insert_symbol_occurrence(
                tx,
                &SymbolOccurrence {
                    run_id,
                    commit_id: cfg.commit_id,
                    file_id,
                    symbol_def_id,
                    line: decl.start_line,
                    col: decl.start_col,
                    is_exported: decl.exported,
                },
            )?;
            occurrences += 1;
        }
    }

    Ok(SymbolsSummary {
        run_id,
        files_scanned,
        symbols_defined,
        occurrences,
        parse_errors,
    })
}

/// Turns a repo-relative path like `packages/store/src/schema.rs` into a
/// `::`-joined module path, dropping `src/` and `mod.rs`/`lib.rs` terminals.
pub(crate) fn module_path_for(rel_path: &str) -> String {
    let trimmed = rel_path.trim_end_matches(".rs");
    let parts: Vec<&str> = trimmed
        .split('/')
        .filter(|p| !p.is_empty() && *p != "src")
        .collect();
    match parts.last() {
        Some(&"mod") | Some(&"lib") | Some(&"main") => parts[..parts.len() - 1].join("::"),
        _ => parts.join("::"),
    }
}
