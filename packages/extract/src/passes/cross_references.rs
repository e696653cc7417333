//! Cross-references pass (§4.3.7): for each configured target, looks up its
//! declaration position, invokes a configurable reference-lookup tool, and
//! records the results as `symbol_refs` (resolved) or
//! `symbol_refs_unresolved` rows.
//!
//! Grounded on
//! `examples/original_source/pkg/refactorindex/ingest_gopls_refs.go`, with
//! `gopls` generalized to a *configurable* tool binary (§3.3's resolved Open
//! Question): when `cfg.tool_bin` is `None` the pass is a no-op that reports
//! zero targets processed, so it is testable against synthetic tool output
//! without a live language server.

use std::path::PathBuf;

use refactor_index_store::{store as db, RunConfig, Store, SymbolRef, SymbolRefUnresolved};

use crate::errors::{Error, Result};

pub const TOOL_VERSION: &str = "refactor-index-extract/0.1";

#[derive(Debug, Clone)]
pub struct RefTarget {
    pub symbol_hash: String,
    pub file_path: String,
    pub line: i64,
    pub col: i64,
    pub commit_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CrossReferencesConfig {
    pub db_path: PathBuf,
    pub repo_path: PathBuf,
    pub sources_dir: PathBuf,
    /// Binary name for the reference-lookup tool (e.g. `gopls`). `None`
    /// means no tool is configured and the pass is a no-op.
    pub tool_bin: Option<String>,
    pub targets: Vec<RefTarget>,
}

#[derive(Debug, Clone)]
pub struct CrossReferencesSummary {
    pub run_id: i64,
    pub targets: usize,
    pub references: usize,
    pub raw_outputs: usize,
    pub skipped: usize,
}

pub fn ingest_cross_references(cfg: &CrossReferencesConfig) -> Result<CrossReferencesSummary> {
    let repo_path = cfg
        .repo_path
        .canonicalize()
        .map_err(|e| Error::config(format!("resolve repo path: {}", e)))?;

    let mut store = Store::open(&cfg.db_path)?;
    let args_json = serde_json::json!({ "repo": repo_path.to_string_lossy() });
    let run_id = store.create_run(&RunConfig {
        tool_version: Some(TOOL_VERSION.into()),
        root_path: Some(repo_path.to_string_lossy().into_owned()),
        args_json: Some(args_json),
        sources_dir: Some(cfg.sources_dir.to_string_lossy().into_owned()),
        ..Default::default()
    })?;

    let Some(tool_bin) = cfg.tool_bin.clone() else {
        store.finish_run(run_id)?;
        return Ok(CrossReferencesSummary {
            run_id,
            targets: 0,
            references: 0,
            raw_outputs: 0,
            skipped: 0,
        });
    };

    let (references, raw_outputs, skipped) =
        super::run_in_transaction(&mut store, run_id, |tx| run_body(tx, cfg, &repo_path, &tool_bin, run_id))?;

    Ok(CrossReferencesSummary {
        run_id,
        targets: cfg.targets.len(),
        references,
        raw_outputs,
        skipped,
    })
}

fn run_body(
    tx: &rusqlite::Transaction,
    cfg: &CrossReferencesConfig,
    repo_path: &std::path::Path,
    tool_bin: &str,
    run_id: i64,
) -> Result<(usize, usize, usize)> {
    let mut reference_count = 0usize;
    let mut raw_count = 0usize;
    let mut skipped = 0usize;

    for (idx, target) in cfg.targets.iter().enumerate() {
        if target.symbol_hash.is_empty() {
            continue;
        }
        if target.file_path.is_empty() || target.line == 0 || target.col == 0 {
            skipped += 1;
            continue;
        }
        let symbol_id = db::get_symbol_def_id_by_hash(tx, &target.symbol_hash)?;

        let abs_path = if std::path::Path::new(&target.file_path).is_absolute() {
            PathBuf::from(&target.file_path)
        } else {
            repo_path.join(&target.file_path)
        };
        let position = format!("{}:{}:{}", abs_path.display(), target.line, target.col);

        crate::tools::refs_tool(tool_bin, repo_path, &["prepare_rename", &position])?;
        let refs = crate::tools::refs_tool(tool_bin, repo_path, &["references", "-declaration", &position])?;

        let file_name = format!("{}-references-{}.txt", tool_bin, idx);
        crate::common::write_raw_output(tx, &cfg.sources_dir, run_id, Some(tool_bin), tool_bin, &file_name, &refs)?;
        raw_count += 1;

        let text = String::from_utf8_lossy(&refs);
        for line in text.trim().lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(loc) = parse_reference_location(line) else {
                continue;
            };
            let rel_path = if std::path::Path::new(&loc.file_path).is_absolute() {
                crate::common::to_root_relative(repo_path, std::path::Path::new(&loc.file_path))
            } else {
                loc.file_path.clone()
            };
            let file_id = db::get_or_create_file(tx, &rel_path)?;
            let is_decl = loc.line == target.line && loc.col == target.col && same_file_path(&loc.file_path, &abs_path.to_string_lossy());

            match symbol_id {
                Some(symbol_def_id) => {
                    db::insert_symbol_ref(
                        tx,
                        &SymbolRef {
                            run_id,
                            commit_id: target.commit_id,
                            symbol_def_id,
                            file_id,
                            line: loc.line,
                            col: loc.col,
                            is_decl,
                            source: tool_bin.to_string(),
                        },
                    )?;
                }
                None => {
                    db::insert_symbol_ref_unresolved(
                        tx,
                        &SymbolRefUnresolved {
                            run_id,
                            commit_id: target.commit_id,
                            symbol_hash: target.symbol_hash.clone(),
                            file_id,
                            line: loc.line,
                            col: loc.col,
                            is_decl,
                            source: tool_bin.to_string(),
                        },
                    )?;
                }
            }
            reference_count += 1;
        }
    }

    Ok((reference_count, raw_count, skipped))
}

struct RefLocation {
    file_path: String,
    line: i64,
    col: i64,
}

/// Parses one reference-tool output line, handling the three geometries a
/// language server may emit: `path:line:col`, `path:line:col-line:col`, and
/// `path:line:col:line:col`. Trailing numeric fields are consumed first so
/// colons embedded in Windows-style drive paths don't misparse.
fn parse_reference_location(line: &str) -> Option<RefLocation> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() < 3 {
        return None;
    }

    if parts.len() == 4 && parts[parts.len() - 2].contains('-') {
        let file = parts[..parts.len() - 3].join(":");
        let line_num: i64 = parts[parts.len() - 3].parse().ok()?;
        let col_part = parts[parts.len() - 2].split('-').next()?;
        let col_num: i64 = col_part.parse().ok()?;
        return Some(RefLocation { file_path: file, line: line_num, col: col_num });
    }

    if parts.len() >= 5 {
        let start_line: Option<i64> = parts[parts.len() - 4].parse().ok();
        let start_col: Option<i64> = parts[parts.len() - 3].parse().ok();
        let end_line_ok = parts[parts.len() - 2].parse::<i64>().is_ok();
        let end_col_ok = parts[parts.len() - 1].parse::<i64>().is_ok();
        if let (Some(start_line), Some(start_col), true, true) = (start_line, start_col, end_line_ok, end_col_ok) {
            let file = parts[..parts.len() - 4].join(":");
            return Some(RefLocation { file_path: file, line: start_line, col: start_col });
        }
    }

    let col_part = parts[parts.len() - 1];
    let line_part = parts[parts.len() - 2];
    let file = parts[..parts.len() - 2].join(":");

    let col_part = col_part.split('-').next()?;
    let line_part = line_part.split('-').next()?;

    let line_num: i64 = line_part.parse().ok()?;
    let col_num: i64 = col_part.parse().ok()?;
    Some(RefLocation { file_path: file, line: line_num, col: col_num })
}

fn same_file_path(a: &str, b: &str) -> bool {
    std::path::Path::new(a) == std::path::Path::new(b)
}
