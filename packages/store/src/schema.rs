//! Schema creation and online migration.
//!
//! `init_schema` is idempotent: base tables, added columns, and FTS indexes
//! are all created with `IF NOT EXISTS`/existence checks so re-opening an
//! already-migrated database is a no-op beyond the version-row insert.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 6;

const BASE_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_versions (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meta_runs (
    id INTEGER PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    tool_version TEXT,
    git_from TEXT,
    git_to TEXT,
    root_path TEXT,
    args_json TEXT,
    sources_dir TEXT
);

CREATE TABLE IF NOT EXISTS raw_outputs (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    source TEXT NOT NULL,
    path TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id)
);

CREATE TABLE IF NOT EXISTS run_kv (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    key TEXT NOT NULL,
    value_json TEXT NOT NULL,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id)
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    ext TEXT,
    file_exists INTEGER,
    is_binary INTEGER
);

CREATE TABLE IF NOT EXISTS diff_files (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    file_id INTEGER,
    status TEXT NOT NULL,
    old_path TEXT,
    new_path TEXT,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id),
    FOREIGN KEY(file_id) REFERENCES files(id)
);

CREATE TABLE IF NOT EXISTS diff_hunks (
    id INTEGER PRIMARY KEY,
    diff_file_id INTEGER NOT NULL,
    old_start INTEGER NOT NULL,
    old_lines INTEGER NOT NULL,
    new_start INTEGER NOT NULL,
    new_lines INTEGER NOT NULL,
    FOREIGN KEY(diff_file_id) REFERENCES diff_files(id)
);

CREATE TABLE IF NOT EXISTS diff_lines (
    id INTEGER PRIMARY KEY,
    hunk_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    line_no_old INTEGER,
    line_no_new INTEGER,
    text TEXT NOT NULL,
    FOREIGN KEY(hunk_id) REFERENCES diff_hunks(id)
);

CREATE TABLE IF NOT EXISTS symbol_defs (
    id INTEGER PRIMARY KEY,
    pkg TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    recv TEXT,
    signature TEXT,
    symbol_hash TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS symbol_occurrences (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    symbol_def_id INTEGER NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    is_exported INTEGER NOT NULL,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id),
    FOREIGN KEY(file_id) REFERENCES files(id),
    FOREIGN KEY(symbol_def_id) REFERENCES symbol_defs(id)
);

CREATE TABLE IF NOT EXISTS code_units (
    id INTEGER PRIMARY KEY,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    pkg TEXT NOT NULL,
    recv TEXT,
    signature TEXT,
    unit_hash TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS code_unit_snapshots (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    code_unit_id INTEGER NOT NULL,
    start_line INTEGER NOT NULL,
    start_col INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_col INTEGER NOT NULL,
    body_hash TEXT NOT NULL,
    body_text TEXT NOT NULL,
    doc_text TEXT,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id),
    FOREIGN KEY(file_id) REFERENCES files(id),
    FOREIGN KEY(code_unit_id) REFERENCES code_units(id)
);

CREATE TABLE IF NOT EXISTS commits (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    hash TEXT NOT NULL,
    author_name TEXT,
    author_email TEXT,
    author_date TEXT,
    committer_date TEXT,
    subject TEXT,
    body TEXT,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id)
);

CREATE TABLE IF NOT EXISTS commit_files (
    id INTEGER PRIMARY KEY,
    commit_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    old_path TEXT,
    new_path TEXT,
    blob_old TEXT,
    blob_new TEXT,
    FOREIGN KEY(commit_id) REFERENCES commits(id),
    FOREIGN KEY(file_id) REFERENCES files(id)
);

CREATE TABLE IF NOT EXISTS file_blobs (
    id INTEGER PRIMARY KEY,
    commit_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    blob_sha TEXT NOT NULL,
    size_bytes INTEGER,
    line_count INTEGER,
    FOREIGN KEY(commit_id) REFERENCES commits(id),
    FOREIGN KEY(file_id) REFERENCES files(id),
    UNIQUE(commit_id, file_id, blob_sha)
);

CREATE TABLE IF NOT EXISTS symbol_refs (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    commit_id INTEGER,
    symbol_def_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    is_decl INTEGER NOT NULL,
    source TEXT NOT NULL,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id),
    FOREIGN KEY(commit_id) REFERENCES commits(id),
    FOREIGN KEY(symbol_def_id) REFERENCES symbol_defs(id),
    FOREIGN KEY(file_id) REFERENCES files(id)
);

CREATE TABLE IF NOT EXISTS symbol_refs_unresolved (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    commit_id INTEGER,
    symbol_hash TEXT NOT NULL,
    file_id INTEGER NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    is_decl INTEGER NOT NULL,
    source TEXT NOT NULL,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id),
    FOREIGN KEY(commit_id) REFERENCES commits(id),
    FOREIGN KEY(file_id) REFERENCES files(id)
);

CREATE TABLE IF NOT EXISTS doc_hits (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    commit_id INTEGER,
    file_id INTEGER NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    term TEXT NOT NULL,
    match_text TEXT NOT NULL,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id),
    FOREIGN KEY(commit_id) REFERENCES commits(id),
    FOREIGN KEY(file_id) REFERENCES files(id)
);

CREATE TABLE IF NOT EXISTS ts_captures (
    id INTEGER PRIMARY KEY,
    run_id INTEGER NOT NULL,
    commit_id INTEGER,
    file_id INTEGER NOT NULL,
    query_name TEXT NOT NULL,
    capture_name TEXT NOT NULL,
    node_type TEXT,
    start_line INTEGER NOT NULL,
    start_col INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_col INTEGER NOT NULL,
    snippet TEXT NOT NULL,
    FOREIGN KEY(run_id) REFERENCES meta_runs(id),
    FOREIGN KEY(commit_id) REFERENCES commits(id),
    FOREIGN KEY(file_id) REFERENCES files(id)
);

CREATE INDEX IF NOT EXISTS idx_diff_files_run_id ON diff_files(run_id);
CREATE INDEX IF NOT EXISTS idx_diff_hunks_diff_file_id ON diff_hunks(diff_file_id);
CREATE INDEX IF NOT EXISTS idx_diff_lines_hunk_id ON diff_lines(hunk_id);
CREATE INDEX IF NOT EXISTS idx_symbol_defs_hash ON symbol_defs(symbol_hash);
CREATE INDEX IF NOT EXISTS idx_symbol_occurrences_run_id ON symbol_occurrences(run_id);
CREATE INDEX IF NOT EXISTS idx_symbol_occurrences_symbol_id ON symbol_occurrences(symbol_def_id);
CREATE INDEX IF NOT EXISTS idx_code_units_hash ON code_units(unit_hash);
CREATE INDEX IF NOT EXISTS idx_code_unit_snapshots_run_id ON code_unit_snapshots(run_id);
CREATE INDEX IF NOT EXISTS idx_commits_run_id ON commits(run_id);
CREATE INDEX IF NOT EXISTS idx_commits_hash ON commits(hash);
CREATE INDEX IF NOT EXISTS idx_commit_files_commit_id ON commit_files(commit_id);
CREATE INDEX IF NOT EXISTS idx_file_blobs_commit_id ON file_blobs(commit_id);
CREATE INDEX IF NOT EXISTS idx_symbol_refs_run_id ON symbol_refs(run_id);
CREATE INDEX IF NOT EXISTS idx_symbol_refs_symbol_id ON symbol_refs(symbol_def_id);
CREATE INDEX IF NOT EXISTS idx_symbol_refs_commit_id ON symbol_refs(commit_id);
CREATE INDEX IF NOT EXISTS idx_symbol_refs_unresolved_run_id ON symbol_refs_unresolved(run_id);
CREATE INDEX IF NOT EXISTS idx_doc_hits_run_id ON doc_hits(run_id);
CREATE INDEX IF NOT EXISTS idx_ts_captures_run_id ON ts_captures(run_id);
CREATE INDEX IF NOT EXISTS idx_ts_captures_commit_id ON ts_captures(commit_id);
CREATE INDEX IF NOT EXISTS idx_raw_outputs_run_id ON raw_outputs(run_id);
CREATE INDEX IF NOT EXISTS idx_run_kv_run_id ON run_kv(run_id);
"#;

/// One (base table, rowid-bearing columns, fts columns) triple per §4.1/§6 FTS index.
struct FtsSpec {
    fts_table: &'static str,
    base_table: &'static str,
    /// Column list shared by the base table and the contentless FTS table.
    columns: &'static [&'static str],
}

const FTS_SPECS: &[FtsSpec] = &[
    FtsSpec {
        fts_table: "doc_hits_fts",
        base_table: "doc_hits",
        columns: &["match_text"],
    },
    FtsSpec {
        fts_table: "diff_lines_fts",
        base_table: "diff_lines",
        columns: &["text"],
    },
    FtsSpec {
        fts_table: "code_unit_snapshots_fts",
        base_table: "code_unit_snapshots",
        columns: &["body_text", "doc_text"],
    },
    FtsSpec {
        fts_table: "symbol_defs_fts",
        base_table: "symbol_defs",
        columns: &["name", "signature", "pkg"],
    },
    FtsSpec {
        fts_table: "commits_fts",
        base_table: "commits",
        columns: &["subject", "body"],
    },
    FtsSpec {
        fts_table: "files_fts",
        base_table: "files",
        columns: &["path"],
    },
];

/// Idempotent schema bring-up: base tables, nullable commit_id columns, run
/// status/error_json columns, and contentless FTS5 indexes with sync triggers.
pub fn init_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(BASE_TABLES_SQL)?;
    add_column_if_missing(&tx, "symbol_occurrences", "commit_id", "INTEGER")?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_symbol_occurrences_commit_id ON symbol_occurrences(commit_id)",
        [],
    )?;
    add_column_if_missing(&tx, "code_unit_snapshots", "commit_id", "INTEGER")?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_code_unit_snapshots_commit_id ON code_unit_snapshots(commit_id)",
        [],
    )?;
    add_column_if_missing(&tx, "meta_runs", "status", "TEXT NOT NULL DEFAULT 'running'")?;
    add_column_if_missing(&tx, "meta_runs", "error_json", "TEXT")?;

    for spec in FTS_SPECS {
        create_fts_index(&tx, spec)?;
    }

    let applied_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
    tx.execute(
        "INSERT OR IGNORE INTO schema_versions (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![SCHEMA_VERSION, applied_at],
    )?;

    tx.commit()?;
    Ok(())
}

fn add_column_if_missing(
    tx: &rusqlite::Transaction,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<()> {
    let mut stmt = tx.prepare(&format!("PRAGMA table_info({})", table))?;
    let has_column = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .any(|name| name == column);
    if !has_column {
        tx.execute(
            &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl),
            [],
        )?;
    }
    Ok(())
}

fn create_fts_index(tx: &rusqlite::Transaction, spec: &FtsSpec) -> Result<()> {
    let mut stmt = tx.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
    )?;
    let exists = stmt.exists(rusqlite::params![spec.fts_table])?;
    if exists {
        return Ok(());
    }

    let cols = spec.columns.join(", ");
    tx.execute(
        &format!(
            "CREATE VIRTUAL TABLE {} USING fts5({}, content='{}', content_rowid='id')",
            spec.fts_table, cols, spec.base_table
        ),
        [],
    )?;

    for (trigger_name, event, body) in fts_trigger_bodies(spec) {
        tx.execute(
            &format!(
                "CREATE TRIGGER {} AFTER {} ON {} BEGIN {} END",
                trigger_name, event, spec.base_table, body
            ),
            [],
        )?;
    }

    tx.execute(
        &format!(
            "INSERT INTO {}({}) VALUES('rebuild')",
            spec.fts_table, spec.fts_table
        ),
        [],
    )?;
    Ok(())
}

fn fts_trigger_bodies(spec: &FtsSpec) -> Vec<(String, &'static str, String)> {
    let col_list = spec.columns.join(", ");
    let new_values = spec
        .columns
        .iter()
        .map(|c| format!("new.{}", c))
        .collect::<Vec<_>>()
        .join(", ");
    let old_values = spec
        .columns
        .iter()
        .map(|c| format!("old.{}", c))
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        (
            format!("{}_ai", spec.base_table),
            "INSERT",
            format!(
                "INSERT INTO {}(rowid, {}) VALUES (new.id, {});",
                spec.fts_table, col_list, new_values
            ),
        ),
        (
            format!("{}_ad", spec.base_table),
            "DELETE",
            format!(
                "INSERT INTO {}({}, rowid, {}) VALUES ('delete', old.id, {});",
                spec.fts_table, spec.fts_table, col_list, old_values
            ),
        ),
        (
            format!("{}_au", spec.base_table),
            "UPDATE",
            format!(
                "INSERT INTO {}({}, rowid, {}) VALUES ('delete', old.id, {}); \
                 INSERT INTO {}(rowid, {}) VALUES (new.id, {});",
                spec.fts_table, spec.fts_table, col_list, old_values, spec.fts_table, col_list, new_values
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_schema_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        init_schema(&mut conn).unwrap();
        init_schema(&mut conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT version FROM schema_versions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn fts_tracks_base_table_inserts_updates_deletes() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        init_schema(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO meta_runs (id, started_at) VALUES (1, '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO files (id, path) VALUES (1, 'a.rs')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO doc_hits (run_id, file_id, line, col, term, match_text) VALUES (1, 1, 1, 1, 'TODO', 'TODO: fix this')",
            [],
        )
        .unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM doc_hits_fts WHERE doc_hits_fts MATCH 'fix'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);

        conn.execute("DELETE FROM doc_hits WHERE id = 1", []).unwrap();
        let count_after_delete: i64 = conn
            .query_row(
                "SELECT count(*) FROM doc_hits_fts WHERE doc_hits_fts MATCH 'fix'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count_after_delete, 0);
    }
}
