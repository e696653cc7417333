//! `Module`: the read-only surface the embedded scripting host drives (C6).
//!
//! Grounded on the teacher's `async-trait` port-trait shapes
//! (`codegraph-storage::domain::CodeSnapshotStore`): a trait describing the
//! four query operations, implemented here against
//! [`refactor_index_store::query`] instead of a domain repository.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use refactor_index_store::query::{
    self, DiffFileRow, DocHitFilter, DocHitRow, FileRow, SymbolFilter, SymbolRefFilter, SymbolRefRow, SymbolRow,
};
use refactor_index_store::{RunId, Store};
use tokio::sync::Mutex;

use crate::errors::{Error, Result};
use crate::fileset::{Fileset, FilesetSpec};
use crate::trace::Trace;

/// Default result cap (§5); callers may lower it but never raise a filter's
/// own `limit` past it.
pub const DEFAULT_MAX_RESULTS: i64 = 5000;

/// A [`SymbolRow`] enriched with the client-computed `def_span` the spec's
/// `querySymbols` result shape requires, re-sorted `(pkg, name, kind, file,
/// line, col)` — a different order than the store's own `(run, pkg, name,
/// file, line, col)` listing order.
#[derive(Debug, Clone)]
pub struct SymbolResult {
    pub row: SymbolRow,
    pub def_span: String,
}

fn def_span(row: &SymbolRow) -> String {
    format!("{}:{}:{}", row.file, row.line, row.col)
}

#[async_trait]
pub trait QueryPort: Send + Sync {
    async fn query_symbols(&self, filter: SymbolFilter) -> Result<Vec<SymbolResult>>;
    async fn query_refs(&self, symbol_hash: &str, limit: i64, offset: i64) -> Result<Vec<SymbolRefRow>>;
    async fn query_doc_hits(
        &self,
        terms: &[String],
        fileset: Option<&FilesetSpec>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DocHitRow>>;
    async fn query_files(&self, limit: i64, offset: i64, fileset: Option<&FilesetSpec>) -> Result<Vec<FileRow>>;
}

/// The scripting host's handle onto a single open store. Queries serialize
/// through a `tokio::sync::Mutex` since `rusqlite::Connection` is `Send` but
/// not `Sync`.
pub struct Module {
    store: Arc<Mutex<Store>>,
    trace: Trace,
    max_results: i64,
}

impl Module {
    pub fn new(store: Arc<Mutex<Store>>, trace_sink: Option<PathBuf>) -> Self {
        Self {
            store,
            trace: Trace::new(trace_sink),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: i64) -> Self {
        self.max_results = max_results;
        self
    }

    fn cap(&self, limit: i64) -> i64 {
        if limit <= 0 || limit > self.max_results {
            self.max_results
        } else {
            limit
        }
    }
}

#[async_trait]
impl QueryPort for Module {
    async fn query_symbols(&self, mut filter: SymbolFilter) -> Result<Vec<SymbolResult>> {
        filter.limit = self.cap(filter.limit);
        let args = serde_json::json!({
            "run_id": filter.run_id,
            "pkg": filter.pkg,
            "name": filter.name,
            "kind": filter.kind,
            "path": filter.path,
            "exported_only": filter.exported_only,
            "limit": filter.limit,
            "offset": filter.offset,
        });
        let mut rows = {
            let store = self.store.lock().await;
            query::list_symbols(store.connection(), &filter)?
        };
        rows.sort_by(|a, b| {
            (&a.pkg, &a.name, &a.kind, &a.file, a.line, a.col).cmp(&(&b.pkg, &b.name, &b.kind, &b.file, b.line, b.col))
        });
        self.trace.record("query_symbols", args, rows.len())?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let span = def_span(&row);
                SymbolResult { row, def_span: span }
            })
            .collect())
    }

    async fn query_refs(&self, symbol_hash: &str, limit: i64, offset: i64) -> Result<Vec<SymbolRefRow>> {
        if symbol_hash.is_empty() {
            return Err(Error::EmptySymbolHash);
        }
        let limit = self.cap(limit);
        let filter = SymbolRefFilter {
            symbol_hash: Some(symbol_hash.to_string()),
            limit,
            offset,
            ..Default::default()
        };
        let args = serde_json::json!({
            "symbol_hash": symbol_hash,
            "limit": limit,
            "offset": offset,
        });
        let mut rows = {
            let store = self.store.lock().await;
            query::list_symbol_refs(store.connection(), &filter)?
        };
        rows.sort_by(|a, b| (&a.file, a.line, a.col, &a.symbol_hash).cmp(&(&b.file, b.line, b.col, &b.symbol_hash)));
        self.trace.record("query_refs", args, rows.len())?;
        Ok(rows)
    }

    async fn query_doc_hits(
        &self,
        terms: &[String],
        fileset: Option<&FilesetSpec>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DocHitRow>> {
        let limit = self.cap(limit);
        let args = serde_json::json!({
            "terms": terms,
            "fileset": fileset.is_some(),
            "limit": limit,
            "offset": offset,
        });
        let filter = DocHitFilter {
            terms: terms.to_vec(),
            ..Default::default()
        };
        let mut rows = {
            let store = self.store.lock().await;
            query::list_doc_hits(store.connection(), &filter)?
        };
        if let Some(spec) = fileset {
            let compiled = Fileset::compile(spec)?;
            rows.retain(|h| compiled.matches(&h.file));
        }
        rows.sort_by(|a, b| (&a.file, a.line, a.col, &a.term).cmp(&(&b.file, b.line, b.col, &b.term)));
        let rows: Vec<DocHitRow> = rows.into_iter().skip(offset.max(0) as usize).take(limit.max(0) as usize).collect();
        self.trace.record("query_doc_hits", args, rows.len())?;
        Ok(rows)
    }

    async fn query_files(&self, limit: i64, offset: i64, fileset: Option<&FilesetSpec>) -> Result<Vec<FileRow>> {
        let limit = self.cap(limit);
        let args = serde_json::json!({"limit": limit, "offset": offset, "fileset": fileset.is_some()});
        let rows = match fileset {
            None => {
                let store = self.store.lock().await;
                query::list_files(store.connection(), limit, offset)?
            }
            Some(spec) => {
                let compiled = Fileset::compile(spec)?;
                let all = {
                    let store = self.store.lock().await;
                    query::list_files(store.connection(), 0, 0)?
                };
                all.into_iter()
                    .filter(|f| compiled.matches(&f.path))
                    .skip(offset.max(0) as usize)
                    .take(limit.max(0) as usize)
                    .collect()
            }
        };
        self.trace.record("query_files", args, rows.len())?;
        Ok(rows)
    }
}

/// Read-only listing of `diff_files` for a run; not part of [`QueryPort`]
/// since the spec names only the four query methods, but exposed for callers
/// that already hold a run id from an orchestrated range.
impl Module {
    pub async fn list_diff_files(&self, run_id: RunId, limit: i64, offset: i64) -> Result<Vec<DiffFileRow>> {
        let limit = self.cap(limit);
        let store = self.store.lock().await;
        Ok(query::list_diff_files(store.connection(), run_id, limit, offset)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(store: &mut Store) -> refactor_index_store::RunId {
        let run_id = store.create_run(&refactor_index_store::RunConfig::default()).unwrap();
        let tx = store.begin().unwrap();
        let file_id = refactor_index_store::store::get_or_create_file(&tx, "src/lib.rs").unwrap();
        refactor_index_store::store::get_or_create_file(&tx, "src/generated/schema.rs").unwrap();
        let symbol_id = refactor_index_store::store::get_or_create_symbol_def(
            &tx,
            &refactor_index_store::SymbolDef {
                pkg: "crate".into(),
                name: "run".into(),
                kind: "func".into(),
                recv: None,
                signature: Some("fn run()".into()),
                symbol_hash: "hash1".into(),
            },
        )
        .unwrap();
        refactor_index_store::store::insert_symbol_occurrence(
            &tx,
            &refactor_index_store::SymbolOccurrence {
                run_id,
                commit_id: None,
                symbol_def_id: symbol_id,
                file_id,
                line: 10,
                col: 1,
                is_exported: true,
            },
        )
        .unwrap();
        tx.commit().unwrap();
        run_id
    }

    #[tokio::test]
    async fn query_symbols_caps_at_max_results() {
        let mut store = Store::open_in_memory().unwrap();
        seed(&mut store);
        let module = Module::new(Arc::new(Mutex::new(store)), None).with_max_results(1);
        let rows = module
            .query_symbols(SymbolFilter {
                limit: 1000,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(rows.len() <= 1);
    }

    #[tokio::test]
    async fn query_symbols_includes_def_span() {
        let mut store = Store::open_in_memory().unwrap();
        seed(&mut store);
        let module = Module::new(Arc::new(Mutex::new(store)), None);
        let rows = module.query_symbols(SymbolFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].def_span, "src/lib.rs:10:1");
        assert!(rows[0].row.exported);
    }

    #[tokio::test]
    async fn query_refs_rejects_empty_hash() {
        let mut store = Store::open_in_memory().unwrap();
        seed(&mut store);
        let module = Module::new(Arc::new(Mutex::new(store)), None);
        let result = module.query_refs("", 0, 0).await;
        assert!(matches!(result, Err(Error::EmptySymbolHash)));
    }

    #[tokio::test]
    async fn query_files_respects_fileset_exclude() {
        let mut store = Store::open_in_memory().unwrap();
        seed(&mut store);
        let module = Module::new(Arc::new(Mutex::new(store)), None);
        let spec = FilesetSpec {
            include: vec![],
            exclude: vec!["**/generated/**".into()],
        };
        let rows = module.query_files(0, 0, Some(&spec)).await.unwrap();
        assert!(rows.iter().all(|f| !f.path.contains("generated")));
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn query_doc_hits_filters_terms_and_fileset_sorted() {
        let mut store = Store::open_in_memory().unwrap();
        let run_id = store.create_run(&refactor_index_store::RunConfig::default()).unwrap();
        {
            let tx = store.begin().unwrap();
            let lib = refactor_index_store::store::get_or_create_file(&tx, "src/lib.rs").unwrap();
            let gen = refactor_index_store::store::get_or_create_file(&tx, "src/generated/schema.rs").unwrap();
            for (file_id, line, term) in [(lib, 5, "TODO"), (lib, 2, "FIXME"), (gen, 1, "TODO")] {
                refactor_index_store::store::insert_doc_hit(
                    &tx,
                    &refactor_index_store::DocHit {
                        run_id,
                        commit_id: None,
                        file_id,
                        line,
                        col: 1,
                        term: term.into(),
                        match_text: format!("{} here", term),
                    },
                )
                .unwrap();
            }
            tx.commit().unwrap();
        }
        let module = Module::new(Arc::new(Mutex::new(store)), None);

        let rows = module
            .query_doc_hits(&["TODO".to_string()], None, 0, 0)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.term == "TODO"));

        let spec = FilesetSpec {
            include: vec![],
            exclude: vec!["**/generated/**".into()],
        };
        let filtered = module.query_doc_hits(&[], Some(&spec), 0, 0).await.unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| !r.file.contains("generated")));
        assert_eq!(filtered[0].line, 2);
        assert_eq!(filtered[1].line, 5);
    }

    #[tokio::test]
    async fn trace_sink_records_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let trace_path = dir.path().join("trace.jsonl");
        let mut store = Store::open_in_memory().unwrap();
        seed(&mut store);
        let module = Module::new(Arc::new(Mutex::new(store)), Some(trace_path.clone()));
        module.query_files(0, 0, None).await.unwrap();
        module.query_symbols(SymbolFilter::default()).await.unwrap();

        let content = std::fs::read_to_string(&trace_path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
