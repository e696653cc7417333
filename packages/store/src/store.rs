//! The analytic store (C1): connection management, run lifecycle, and the
//! typed insert / get-or-create primitives used by every extraction pass.
//!
//! Grounded on `examples/original_source/pkg/refactorindex/store.go`'s
//! `Store` type, translated from `database/sql` to `rusqlite`.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::{Error, Result};
use crate::schema;
use crate::types::*;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if absent) the sqlite file at `path`, enables foreign
    /// keys, and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::init_schema(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::init_schema(&mut conn)?;
        Ok(Self { conn })
    }

    /// Begins the single transaction a pass runs its work inside of (§4.1).
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    /// Exposes the raw connection for read-only queries (see `query` module).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Inserts a `running` row and returns its id. Pair with a `RunGuard` so
    /// an early return or panic still finalizes the row.
    pub fn create_run(&self, cfg: &RunConfig) -> Result<RunId> {
        let started_at = Utc::now().to_rfc3339();
        let args_json = cfg
            .args_json
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO meta_runs (started_at, tool_version, git_from, git_to, root_path, args_json, sources_dir, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'running')",
            params![
                started_at,
                cfg.tool_version,
                cfg.git_from,
                cfg.git_to,
                cfg.root_path,
                args_json,
                cfg.sources_dir,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_run(&self, run_id: RunId) -> Result<()> {
        let finished_at = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE meta_runs SET status = 'success', finished_at = ?1 WHERE id = ?2",
            params![finished_at, run_id],
        )?;
        Ok(())
    }

    pub fn mark_run_failed(&self, run_id: RunId, err: &Error) -> Result<()> {
        let finished_at = Utc::now().to_rfc3339();
        let error_json = serde_json::to_string(&err.to_error_json())?;
        self.conn.execute(
            "UPDATE meta_runs SET status = 'failed', finished_at = ?1, error_json = ?2 WHERE id = ?3",
            params![finished_at, error_json, run_id],
        )?;
        Ok(())
    }

    /// Starts a run and wraps it in a guard that marks it failed on drop
    /// unless the caller already finalized it.
    pub fn start_run(&self, cfg: &RunConfig) -> Result<(RunId, RunGuard<'_>)> {
        let run_id = self.create_run(cfg)?;
        Ok((run_id, RunGuard::new(self, run_id)))
    }
}

/// Finalizes a run on drop if neither `succeed` nor `fail` was called,
/// mirroring the teacher's `JobStateMachine` transition discipline applied
/// to the two-outcome run lifecycle.
pub struct RunGuard<'a> {
    store: &'a Store,
    run_id: RunId,
    done: bool,
}

impl<'a> RunGuard<'a> {
    fn new(store: &'a Store, run_id: RunId) -> Self {
        Self {
            store,
            run_id,
            done: false,
        }
    }

    pub fn succeed(mut self) -> Result<()> {
        self.store.finish_run(self.run_id)?;
        self.done = true;
        Ok(())
    }

    pub fn fail(mut self, err: &Error) -> Result<()> {
        self.store.mark_run_failed(self.run_id, err)?;
        self.done = true;
        Ok(())
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            let err = Error::store("run dropped without explicit success/failure");
            let _ = self.store.mark_run_failed(self.run_id, &err);
        }
    }
}

/// Dedup-by-unique-key insert: `INSERT OR IGNORE` then `SELECT id`, exactly
/// as the original's `GetOrCreateFile`/`GetOrCreateSymbolDef`/`GetOrCreateCodeUnit`.
pub fn get_or_create_file(tx: &Transaction, path: &str) -> Result<FileId> {
    get_or_create_file_with(tx, path, None, None, None)
}

pub fn get_or_create_file_with(
    tx: &Transaction,
    path: &str,
    ext: Option<&str>,
    file_exists: Option<bool>,
    is_binary: Option<bool>,
) -> Result<FileId> {
    tx.execute(
        "INSERT OR IGNORE INTO files (path, ext, file_exists, is_binary) VALUES (?1, ?2, ?3, ?4)",
        params![path, ext, file_exists.map(bool_to_int), is_binary.map(bool_to_int)],
    )?;
    let id: FileId = tx.query_row("SELECT id FROM files WHERE path = ?1", params![path], |r| {
        r.get(0)
    })?;
    Ok(id)
}

pub fn insert_diff_file(tx: &Transaction, d: &DiffFile) -> Result<DiffFileId> {
    tx.execute(
        "INSERT INTO diff_files (run_id, file_id, status, old_path, new_path) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![d.run_id, d.file_id, d.status, d.old_path, d.new_path],
    )?;
    Ok(tx.last_insert_rowid())
}

pub fn insert_diff_hunk(tx: &Transaction, h: &DiffHunk) -> Result<DiffHunkId> {
    tx.execute(
        "INSERT INTO diff_hunks (diff_file_id, old_start, old_lines, new_start, new_lines) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![h.diff_file_id, h.old_start, h.old_lines, h.new_start, h.new_lines],
    )?;
    Ok(tx.last_insert_rowid())
}

pub fn insert_diff_line(tx: &Transaction, l: &DiffLine) -> Result<()> {
    tx.execute(
        "INSERT INTO diff_lines (hunk_id, kind, line_no_old, line_no_new, text) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![l.hunk_id, l.kind, l.line_no_old, l.line_no_new, l.text],
    )?;
    Ok(())
}

pub fn get_or_create_symbol_def(tx: &Transaction, s: &SymbolDef) -> Result<SymbolDefId> {
    tx.execute(
        "INSERT OR IGNORE INTO symbol_defs (pkg, name, kind, recv, signature, symbol_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![s.pkg, s.name, s.kind, s.recv, s.signature, s.symbol_hash],
    )?;
    let id: SymbolDefId = tx.query_row(
        "SELECT id FROM symbol_defs WHERE symbol_hash = ?1",
        params![s.symbol_hash],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn insert_symbol_occurrence(tx: &Transaction, o: &SymbolOccurrence) -> Result<()> {
    tx.execute(
        "INSERT INTO symbol_occurrences (run_id, commit_id, file_id, symbol_def_id, line, col, is_exported) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            o.run_id,
            o.commit_id,
            o.file_id,
            o.symbol_def_id,
            o.line,
            o.col,
            bool_to_int(o.is_exported)
        ],
    )?;
    Ok(())
}

pub fn get_or_create_code_unit(tx: &Transaction, c: &CodeUnitDef) -> Result<CodeUnitId> {
    tx.execute(
        "INSERT OR IGNORE INTO code_units (kind, name, pkg, recv, signature, unit_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![c.kind, c.name, c.pkg, c.recv, c.signature, c.unit_hash],
    )?;
    let id: CodeUnitId = tx.query_row(
        "SELECT id FROM code_units WHERE unit_hash = ?1",
        params![c.unit_hash],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn insert_code_unit_snapshot(tx: &Transaction, s: &CodeUnitSnapshot) -> Result<()> {
    tx.execute(
        "INSERT INTO code_unit_snapshots \
         (run_id, commit_id, file_id, code_unit_id, start_line, start_col, end_line, end_col, body_hash, body_text, doc_text) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            s.run_id,
            s.commit_id,
            s.file_id,
            s.code_unit_id,
            s.start_line,
            s.start_col,
            s.end_line,
            s.end_col,
            s.body_hash,
            s.body_text,
            s.doc_text,
        ],
    )?;
    Ok(())
}

pub fn insert_commit(tx: &Transaction, c: &CommitInfo) -> Result<CommitId> {
    tx.execute(
        "INSERT INTO commits (run_id, hash, author_name, author_email, author_date, committer_date, subject, body) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            c.run_id,
            c.hash,
            c.author_name,
            c.author_email,
            c.author_date,
            c.committer_date,
            c.subject,
            c.body,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

pub fn insert_commit_file(tx: &Transaction, c: &CommitFile) -> Result<()> {
    tx.execute(
        "INSERT INTO commit_files (commit_id, file_id, status, old_path, new_path, blob_old, blob_new) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            c.commit_id,
            c.file_id,
            c.status,
            c.old_path,
            c.new_path,
            c.blob_old,
            c.blob_new,
        ],
    )?;
    Ok(())
}

pub fn insert_file_blob(tx: &Transaction, b: &FileBlob) -> Result<()> {
    tx.execute(
        "INSERT OR IGNORE INTO file_blobs (commit_id, file_id, blob_sha, size_bytes, line_count) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![b.commit_id, b.file_id, b.blob_sha, b.size_bytes, b.line_count],
    )?;
    Ok(())
}

/// Looks up a `symbol_defs.id` by its content hash, for cross-reference
/// resolution (mirrors `GetSymbolDefIDByHash`).
pub fn get_symbol_def_id_by_hash(tx: &Transaction, symbol_hash: &str) -> Result<Option<SymbolDefId>> {
    let id = tx
        .query_row(
            "SELECT id FROM symbol_defs WHERE symbol_hash = ?1",
            params![symbol_hash],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn insert_symbol_ref(tx: &Transaction, r: &SymbolRef) -> Result<()> {
    tx.execute(
        "INSERT INTO symbol_refs (run_id, commit_id, symbol_def_id, file_id, line, col, is_decl, source) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            r.run_id,
            r.commit_id,
            r.symbol_def_id,
            r.file_id,
            r.line,
            r.col,
            bool_to_int(r.is_decl),
            r.source,
        ],
    )?;
    Ok(())
}

pub fn insert_symbol_ref_unresolved(tx: &Transaction, r: &SymbolRefUnresolved) -> Result<()> {
    tx.execute(
        "INSERT INTO symbol_refs_unresolved (run_id, commit_id, symbol_hash, file_id, line, col, is_decl, source) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            r.run_id,
            r.commit_id,
            r.symbol_hash,
            r.file_id,
            r.line,
            r.col,
            bool_to_int(r.is_decl),
            r.source,
        ],
    )?;
    Ok(())
}

pub fn insert_doc_hit(tx: &Transaction, h: &DocHit) -> Result<()> {
    tx.execute(
        "INSERT INTO doc_hits (run_id, commit_id, file_id, line, col, term, match_text) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![h.run_id, h.commit_id, h.file_id, h.line, h.col, h.term, h.match_text],
    )?;
    Ok(())
}

pub fn insert_tree_sitter_capture(tx: &Transaction, c: &TreeSitterCapture) -> Result<()> {
    tx.execute(
        "INSERT INTO ts_captures \
         (run_id, commit_id, file_id, query_name, capture_name, node_type, start_line, start_col, end_line, end_col, snippet) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            c.run_id,
            c.commit_id,
            c.file_id,
            c.query_name,
            c.capture_name,
            c.node_type,
            c.start_line,
            c.start_col,
            c.end_line,
            c.end_col,
            c.snippet,
        ],
    )?;
    Ok(())
}

/// Best-effort advisory info recorded against a run (§4.4 best-effort mode);
/// never surfaced as a hard error.
pub fn insert_run_kv(tx: &Transaction, run_id: RunId, key: &str, value: &serde_json::Value) -> Result<()> {
    let value_json = serde_json::to_string(value)?;
    tx.execute(
        "INSERT INTO run_kv (run_id, key, value_json) VALUES (?1, ?2, ?3)",
        params![run_id, key, value_json],
    )?;
    Ok(())
}

pub fn write_raw_output(tx: &Transaction, run_id: RunId, source: &str, path: &str) -> Result<()> {
    let created_at = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO raw_outputs (run_id, source, path, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![run_id, source, path, created_at],
    )?;
    Ok(())
}

fn bool_to_int(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RunConfig {
        RunConfig {
            tool_version: Some("test".into()),
            ..Default::default()
        }
    }

    #[test]
    fn run_lifecycle_succeeds_explicitly() {
        let store = Store::open_in_memory().unwrap();
        let (run_id, guard) = store.start_run(&cfg()).unwrap();
        guard.succeed().unwrap();

        let status: String = store
            .conn
            .query_row("SELECT status FROM meta_runs WHERE id = ?1", params![run_id], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "success");
    }

    #[test]
    fn run_guard_marks_failed_on_drop() {
        let store = Store::open_in_memory().unwrap();
        let run_id = {
            let (run_id, _guard) = store.start_run(&cfg()).unwrap();
            run_id
        };

        let status: String = store
            .conn
            .query_row("SELECT status FROM meta_runs WHERE id = ?1", params![run_id], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "failed");
    }

    #[test]
    fn get_or_create_file_is_idempotent() {
        let mut store = Store::open_in_memory().unwrap();
        let tx = store.begin().unwrap();
        let id1 = get_or_create_file(&tx, "src/lib.rs").unwrap();
        let id2 = get_or_create_file(&tx, "src/lib.rs").unwrap();
        assert_eq!(id1, id2);
        tx.commit().unwrap();
    }

    #[test]
    fn get_or_create_symbol_def_dedupes_by_hash() {
        let mut store = Store::open_in_memory().unwrap();
        let tx = store.begin().unwrap();
        let s = SymbolDef {
            pkg: "crate::foo".into(),
            name: "bar".into(),
            kind: "fn".into(),
            recv: None,
            signature: Some("fn bar()".into()),
            symbol_hash: "deadbeef".into(),
        };
        let id1 = get_or_create_symbol_def(&tx, &s).unwrap();
        let id2 = get_or_create_symbol_def(&tx, &s).unwrap();
        assert_eq!(id1, id2);
        tx.commit().unwrap();
    }

    #[test]
    fn insert_diff_chain_round_trips() {
        let mut store = Store::open_in_memory().unwrap();
        let run_id = store.create_run(&RunConfig::default()).unwrap();
        let tx = store.begin().unwrap();
        let file_id = get_or_create_file(&tx, "a.rs").unwrap();
        let diff_file_id = insert_diff_file(
            &tx,
            &DiffFile {
                run_id,
                file_id: Some(file_id),
                status: "M".into(),
                old_path: Some("a.rs".into()),
                new_path: Some("a.rs".into()),
            },
        )
        .unwrap();
        let hunk_id = insert_diff_hunk(
            &tx,
            &DiffHunk {
                diff_file_id,
                old_start: 1,
                old_lines: 1,
                new_start: 1,
                new_lines: 2,
            },
        )
        .unwrap();
        insert_diff_line(
            &tx,
            &DiffLine {
                hunk_id,
                kind: "add".into(),
                line_no_old: None,
                line_no_new: Some(2),
                text: "new line".into(),
            },
        )
        .unwrap();
        tx.commit().unwrap();

        let count: i64 = store
            .conn
            .query_row("SELECT count(*) FROM diff_lines", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
