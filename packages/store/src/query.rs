//! Read-only query layer (C5): listing and full-text search over a store.

use rusqlite::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::types::*;

/// `limit <= 0` means unbounded, per §2.4.
fn limit_clause(limit: i64) -> String {
    if limit > 0 {
        format!("LIMIT {}", limit)
    } else {
        String::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolFilter {
    pub run_id: Option<RunId>,
    pub pkg: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub path: Option<String>,
    pub exported_only: bool,
    pub limit: i64,
    pub offset: i64,
}

/// One declaration-site sighting, joined occurrences → defs → files (§4.5
/// Symbol inventory). `file`/`line`/`col`/`exported` describe the occurrence,
/// not just the symbol identity, so the same symbol def can appear once per
/// run per occurrence.
#[derive(Debug, Clone)]
pub struct SymbolRow {
    pub id: SymbolDefId,
    pub run_id: RunId,
    pub pkg: String,
    pub name: String,
    pub kind: String,
    pub recv: Option<String>,
    pub signature: Option<String>,
    pub symbol_hash: String,
    pub file_id: FileId,
    pub file: String,
    pub line: i64,
    pub col: i64,
    pub exported: bool,
}

fn symbol_row(row: &Row) -> rusqlite::Result<SymbolRow> {
    Ok(SymbolRow {
        id: row.get(0)?,
        pkg: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        recv: row.get(4)?,
        signature: row.get(5)?,
        symbol_hash: row.get(6)?,
        run_id: row.get(7)?,
        file_id: row.get(8)?,
        file: row.get(9)?,
        line: row.get(10)?,
        col: row.get(11)?,
        exported: row.get::<_, i64>(12)? != 0,
    })
}

/// Symbol inventory (§4.5): joins `symbol_occurrences` → `symbol_defs` →
/// `files`, ordered `(run, pkg, name, file, line, col)`.
pub fn list_symbols(conn: &Connection, f: &SymbolFilter) -> Result<Vec<SymbolRow>> {
    let mut sql = String::from(
        "SELECT sd.id, sd.pkg, sd.name, sd.kind, sd.recv, sd.signature, sd.symbol_hash, \
                so.run_id, so.file_id, fi.path, so.line, so.col, so.is_exported \
         FROM symbol_occurrences so \
         JOIN symbol_defs sd ON sd.id = so.symbol_def_id \
         JOIN files fi ON fi.id = so.file_id",
    );
    let mut conditions = Vec::new();
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(run_id) = f.run_id {
        conditions.push("so.run_id = ?".to_string());
        bind.push(Box::new(run_id));
    }
    if let Some(pkg) = &f.pkg {
        conditions.push("sd.pkg = ?".to_string());
        bind.push(Box::new(pkg.clone()));
    }
    if let Some(name) = &f.name {
        conditions.push("sd.name = ?".to_string());
        bind.push(Box::new(name.clone()));
    }
    if let Some(kind) = &f.kind {
        conditions.push("sd.kind = ?".to_string());
        bind.push(Box::new(kind.clone()));
    }
    if let Some(path) = &f.path {
        conditions.push("fi.path = ?".to_string());
        bind.push(Box::new(path.clone()));
    }
    if f.exported_only {
        conditions.push("so.is_exported != 0".to_string());
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY so.run_id, sd.pkg, sd.name, fi.path, so.line, so.col");
    sql.push(' ');
    sql.push_str(&limit_clause(f.limit));
    if f.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", f.offset));
    }

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(params_refs.as_slice(), symbol_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// §4.5 "Symbol refs (resolved)" predicates: run, symbol-hash, path.
#[derive(Debug, Clone, Default)]
pub struct SymbolRefFilter {
    pub run_id: Option<RunId>,
    pub symbol_def_id: Option<SymbolDefId>,
    pub symbol_hash: Option<String>,
    pub file_id: Option<FileId>,
    pub path: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct SymbolRefRow {
    pub symbol_def_id: SymbolDefId,
    pub symbol_hash: String,
    pub file_id: FileId,
    pub file: String,
    pub line: i64,
    pub col: i64,
    pub is_decl: bool,
    pub source: String,
}

/// Symbol refs, resolved (§4.5): ordered `(run, file, line, col)`.
pub fn list_symbol_refs(conn: &Connection, f: &SymbolRefFilter) -> Result<Vec<SymbolRefRow>> {
    let mut sql = String::from(
        "SELECT sr.symbol_def_id, sd.symbol_hash, sr.file_id, fi.path, sr.line, sr.col, sr.is_decl, sr.source \
         FROM symbol_refs sr \
         JOIN symbol_defs sd ON sd.id = sr.symbol_def_id \
         JOIN files fi ON fi.id = sr.file_id",
    );
    let mut conditions = Vec::new();
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(run_id) = f.run_id {
        conditions.push("sr.run_id = ?".to_string());
        bind.push(Box::new(run_id));
    }
    if let Some(id) = f.symbol_def_id {
        conditions.push("sr.symbol_def_id = ?".to_string());
        bind.push(Box::new(id));
    }
    if let Some(hash) = &f.symbol_hash {
        conditions.push("sd.symbol_hash = ?".to_string());
        bind.push(Box::new(hash.clone()));
    }
    if let Some(id) = f.file_id {
        conditions.push("sr.file_id = ?".to_string());
        bind.push(Box::new(id));
    }
    if let Some(path) = &f.path {
        conditions.push("fi.path = ?".to_string());
        bind.push(Box::new(path.clone()));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY sr.run_id, fi.path, sr.line, sr.col");
    sql.push(' ');
    sql.push_str(&limit_clause(f.limit));
    if f.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", f.offset));
    }

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(params_refs.as_slice(), |row| {
            Ok(SymbolRefRow {
                symbol_def_id: row.get(0)?,
                symbol_hash: row.get(1)?,
                file_id: row.get(2)?,
                file: row.get(3)?,
                line: row.get(4)?,
                col: row.get(5)?,
                is_decl: row.get::<_, i64>(6)? != 0,
                source: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct SymbolRefUnresolvedRow {
    pub symbol_hash: String,
    pub file_id: FileId,
    pub line: i64,
    pub col: i64,
    pub is_decl: bool,
    pub source: String,
}

pub fn list_symbol_refs_unresolved(
    conn: &Connection,
    run_id: RunId,
    limit: i64,
    offset: i64,
) -> Result<Vec<SymbolRefUnresolvedRow>> {
    let sql = format!(
        "SELECT symbol_hash, file_id, line, col, is_decl, source FROM symbol_refs_unresolved \
         WHERE run_id = ?1 ORDER BY file_id, line, col {} {}",
        limit_clause(limit),
        if offset > 0 {
            format!("OFFSET {}", offset)
        } else {
            String::new()
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![run_id], |row| {
            Ok(SymbolRefUnresolvedRow {
                symbol_hash: row.get(0)?,
                file_id: row.get(1)?,
                line: row.get(2)?,
                col: row.get(3)?,
                is_decl: row.get::<_, i64>(4)? != 0,
                source: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct DiffFileRow {
    pub id: DiffFileId,
    pub status: String,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
}

/// Diff files (§4.5): ordered `(run, file)`, with the joined file's path
/// (falling back to `new_path`/`old_path` for entries with no `file_id`)
/// as the file key.
pub fn list_diff_files(conn: &Connection, run_id: RunId, limit: i64, offset: i64) -> Result<Vec<DiffFileRow>> {
    let sql = format!(
        "SELECT df.id, df.status, df.old_path, df.new_path \
         FROM diff_files df LEFT JOIN files fi ON fi.id = df.file_id \
         WHERE df.run_id = ?1 \
         ORDER BY COALESCE(fi.path, df.new_path, df.old_path), df.id {} {}",
        limit_clause(limit),
        if offset > 0 {
            format!("OFFSET {}", offset)
        } else {
            String::new()
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![run_id], |row| {
            Ok(DiffFileRow {
                id: row.get(0)?,
                status: row.get(1)?,
                old_path: row.get(2)?,
                new_path: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// §4.5 "Doc hits" predicates: run, term set, path.
#[derive(Debug, Clone, Default)]
pub struct DocHitFilter {
    pub run_id: Option<RunId>,
    /// A "term set": when non-empty, only hits whose `term` is in this set
    /// are returned.
    pub terms: Vec<String>,
    pub path: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct DocHitRow {
    pub file_id: FileId,
    pub file: String,
    pub line: i64,
    pub col: i64,
    pub term: String,
    pub match_text: String,
}

fn doc_hit_row(row: &Row) -> rusqlite::Result<DocHitRow> {
    Ok(DocHitRow {
        file_id: row.get(0)?,
        file: row.get(1)?,
        line: row.get(2)?,
        col: row.get(3)?,
        term: row.get(4)?,
        match_text: row.get(5)?,
    })
}

/// Doc hits (§4.5): joins `doc_hits` → `files`, ordered `(run, file, line,
/// col)`.
pub fn list_doc_hits(conn: &Connection, f: &DocHitFilter) -> Result<Vec<DocHitRow>> {
    let mut sql = String::from(
        "SELECT dh.file_id, fi.path, dh.line, dh.col, dh.term, dh.match_text \
         FROM doc_hits dh JOIN files fi ON fi.id = dh.file_id",
    );
    let mut conditions = Vec::new();
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(run_id) = f.run_id {
        conditions.push("dh.run_id = ?".to_string());
        bind.push(Box::new(run_id));
    }
    if !f.terms.is_empty() {
        let placeholders = vec!["?"; f.terms.len()].join(", ");
        conditions.push(format!("dh.term IN ({})", placeholders));
        for term in &f.terms {
            bind.push(Box::new(term.clone()));
        }
    }
    if let Some(path) = &f.path {
        conditions.push("fi.path = ?".to_string());
        bind.push(Box::new(path.clone()));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY dh.run_id, fi.path, dh.line, dh.col");
    sql.push(' ');
    sql.push_str(&limit_clause(f.limit));
    if f.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", f.offset));
    }

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(params_refs.as_slice(), doc_hit_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: FileId,
    pub path: String,
    pub ext: Option<String>,
}

pub fn list_files(conn: &Connection, limit: i64, offset: i64) -> Result<Vec<FileRow>> {
    let sql = format!(
        "SELECT id, path, ext FROM files ORDER BY path {} {}",
        limit_clause(limit),
        if offset > 0 {
            format!("OFFSET {}", offset)
        } else {
            String::new()
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(FileRow {
                id: row.get(0)?,
                path: row.get(1)?,
                ext: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn assert_fts_table_exists(conn: &Connection, table: &str) -> Result<()> {
    let exists: bool = conn
        .query_row(
            "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |r| r.get(0),
        )
        .unwrap_or(false);
    if !exists {
        return Err(Error::fts_unavailable(table));
    }
    Ok(())
}

/// Full-text search over `doc_hits.match_text`, joined back to base rows.
pub fn search_doc_hits(conn: &Connection, query: &str, run_id: Option<RunId>, limit: i64) -> Result<Vec<DocHitRow>> {
    assert_fts_table_exists(conn, "doc_hits_fts")?;
    let mut sql = String::from(
        "SELECT d.file_id, fi.path, d.line, d.col, d.term, d.match_text FROM doc_hits_fts f \
         JOIN doc_hits d ON d.id = f.rowid JOIN files fi ON fi.id = d.file_id \
         WHERE f.doc_hits_fts MATCH ?1",
    );
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.to_string())];
    if let Some(run_id) = run_id {
        sql.push_str(" AND d.run_id = ?2");
        bind.push(Box::new(run_id));
    }
    sql.push_str(" ORDER BY rank ");
    sql.push_str(&limit_clause(limit));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(params_refs.as_slice(), doc_hit_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct DiffLineRow {
    pub diff_file_id: DiffFileId,
    pub file: Option<String>,
    pub kind: String,
    pub line_no_old: Option<i64>,
    pub line_no_new: Option<i64>,
    pub text: String,
}

/// Full-text search over `diff_lines.text`, joined back through
/// `diff_hunks` → `diff_files` → `files`.
pub fn search_diff_lines(conn: &Connection, query: &str, run_id: Option<RunId>, limit: i64) -> Result<Vec<DiffLineRow>> {
    assert_fts_table_exists(conn, "diff_lines_fts")?;
    let mut sql = String::from(
        "SELECT df.id, fi.path, dl.kind, dl.line_no_old, dl.line_no_new, dl.text \
         FROM diff_lines_fts f \
         JOIN diff_lines dl ON dl.id = f.rowid \
         JOIN diff_hunks dh ON dh.id = dl.hunk_id \
         JOIN diff_files df ON df.id = dh.diff_file_id \
         LEFT JOIN files fi ON fi.id = df.file_id \
         WHERE f.diff_lines_fts MATCH ?1",
    );
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.to_string())];
    if let Some(run_id) = run_id {
        sql.push_str(" AND df.run_id = ?2");
        bind.push(Box::new(run_id));
    }
    sql.push_str(" ORDER BY rank ");
    sql.push_str(&limit_clause(limit));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(params_refs.as_slice(), |row| {
            Ok(DiffLineRow {
                diff_file_id: row.get(0)?,
                file: row.get(1)?,
                kind: row.get(2)?,
                line_no_old: row.get(3)?,
                line_no_new: row.get(4)?,
                text: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct CodeUnitSnapshotRow {
    pub id: CodeUnitId,
    pub file: String,
    pub kind: String,
    pub name: String,
    pub pkg: String,
    pub recv: Option<String>,
    pub signature: Option<String>,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub doc_text: Option<String>,
}

/// Full-text search over `code_unit_snapshots.body_text`/`doc_text`, joined
/// back through `code_units` and `files`.
pub fn search_code_unit_snapshots(
    conn: &Connection,
    query: &str,
    run_id: Option<RunId>,
    limit: i64,
) -> Result<Vec<CodeUnitSnapshotRow>> {
    assert_fts_table_exists(conn, "code_unit_snapshots_fts")?;
    let mut sql = String::from(
        "SELECT cus.id, fi.path, cu.kind, cu.name, cu.pkg, cu.recv, cu.signature, \
                cus.start_line, cus.start_col, cus.end_line, cus.end_col, cus.doc_text \
         FROM code_unit_snapshots_fts f \
         JOIN code_unit_snapshots cus ON cus.id = f.rowid \
         JOIN code_units cu ON cu.id = cus.code_unit_id \
         JOIN files fi ON fi.id = cus.file_id \
         WHERE f.code_unit_snapshots_fts MATCH ?1",
    );
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.to_string())];
    if let Some(run_id) = run_id {
        sql.push_str(" AND cus.run_id = ?2");
        bind.push(Box::new(run_id));
    }
    sql.push_str(" ORDER BY rank ");
    sql.push_str(&limit_clause(limit));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(params_refs.as_slice(), |row| {
            Ok(CodeUnitSnapshotRow {
                id: row.get(0)?,
                file: row.get(1)?,
                kind: row.get(2)?,
                name: row.get(3)?,
                pkg: row.get(4)?,
                recv: row.get(5)?,
                signature: row.get(6)?,
                start_line: row.get(7)?,
                start_col: row.get(8)?,
                end_line: row.get(9)?,
                end_col: row.get(10)?,
                doc_text: row.get(11)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct CommitRow {
    pub id: CommitId,
    pub hash: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_date: Option<String>,
    pub committer_date: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Full-text search over `commits.subject`/`body`.
pub fn search_commits(conn: &Connection, query: &str, run_id: Option<RunId>, limit: i64) -> Result<Vec<CommitRow>> {
    assert_fts_table_exists(conn, "commits_fts")?;
    let mut sql = String::from(
        "SELECT c.id, c.hash, c.author_name, c.author_email, c.author_date, c.committer_date, c.subject, c.body \
         FROM commits_fts f JOIN commits c ON c.id = f.rowid \
         WHERE f.commits_fts MATCH ?1",
    );
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.to_string())];
    if let Some(run_id) = run_id {
        sql.push_str(" AND c.run_id = ?2");
        bind.push(Box::new(run_id));
    }
    sql.push_str(" ORDER BY rank ");
    sql.push_str(&limit_clause(limit));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(params_refs.as_slice(), |row| {
            Ok(CommitRow {
                id: row.get(0)?,
                hash: row.get(1)?,
                author_name: row.get(2)?,
                author_email: row.get(3)?,
                author_date: row.get(4)?,
                committer_date: row.get(5)?,
                subject: row.get(6)?,
                body: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Full-text search over `symbol_defs` name/signature/pkg, joined back to
/// each matching def's occurrences so the result carries the same
/// `file`/`line`/`col` shape as [`list_symbols`].
pub fn search_symbols(conn: &Connection, query: &str, limit: i64) -> Result<Vec<SymbolRow>> {
    assert_fts_table_exists(conn, "symbol_defs_fts")?;
    let sql = format!(
        "SELECT s.id, s.pkg, s.name, s.kind, s.recv, s.signature, s.symbol_hash, \
                so.run_id, so.file_id, fi.path, so.line, so.col, so.is_exported \
         FROM symbol_defs_fts f \
         JOIN symbol_defs s ON s.id = f.rowid \
         JOIN symbol_occurrences so ON so.symbol_def_id = s.id \
         JOIN files fi ON fi.id = so.file_id \
         WHERE f.symbol_defs_fts MATCH ?1 ORDER BY rank {}",
        limit_clause(limit)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![query], symbol_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Full-text search over `files.path`.
pub fn search_files(conn: &Connection, query: &str, limit: i64) -> Result<Vec<FileRow>> {
    assert_fts_table_exists(conn, "files_fts")?;
    let sql = format!(
        "SELECT f.id, f.path, f.ext FROM files_fts ff JOIN files f ON f.id = ff.rowid \
         WHERE ff.files_fts MATCH ?1 ORDER BY rank {}",
        limit_clause(limit)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![query], |row| {
            Ok(FileRow {
                id: row.get(0)?,
                path: row.get(1)?,
                ext: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn list_files_orders_by_path() {
        let mut store = Store::open_in_memory().unwrap();
        {
            let tx = store.begin().unwrap();
            crate::store::get_or_create_file(&tx, "b.rs").unwrap();
            crate::store::get_or_create_file(&tx, "a.rs").unwrap();
            tx.commit().unwrap();
        }
        let files = list_files(store.connection(), 0, 0).unwrap();
        assert_eq!(files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(), vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn search_symbols_requires_fts_table() {
        let store = Store::open_in_memory().unwrap();
        let result = search_symbols(store.connection(), "foo", 10);
        assert!(result.is_ok());
    }

    #[test]
    fn search_doc_hits_finds_inserted_term() {
        let mut store = Store::open_in_memory().unwrap();
        {
            let tx = store.begin().unwrap();
            let run_id = 1;
            tx.execute(
                "INSERT INTO meta_runs (id, started_at) VALUES (1, '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
            let file_id = crate::store::get_or_create_file(&tx, "a.rs").unwrap();
            crate::store::insert_doc_hit(
                &tx,
                &crate::types::DocHit {
                    run_id,
                    commit_id: None,
                    file_id,
                    line: 1,
                    col: 1,
                    term: "TODO".into(),
                    match_text: "TODO: refactor this module".into(),
                },
            )
            .unwrap();
            tx.commit().unwrap();
        }
        let hits = search_doc_hits(store.connection(), "refactor", Some(1), 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn list_doc_hits_filters_by_term_set_and_path() {
        let mut store = Store::open_in_memory().unwrap();
        let run_id = store.create_run(&RunConfig::default()).unwrap();
        {
            let tx = store.begin().unwrap();
            let a = crate::store::get_or_create_file(&tx, "a.rs").unwrap();
            let b = crate::store::get_or_create_file(&tx, "b.rs").unwrap();
            for (file_id, term) in [(a, "TODO"), (a, "FIXME"), (b, "TODO")] {
                crate::store::insert_doc_hit(
                    &tx,
                    &crate::types::DocHit {
                        run_id,
                        commit_id: None,
                        file_id,
                        line: 1,
                        col: 1,
                        term: term.into(),
                        match_text: format!("{} here", term),
                    },
                )
                .unwrap();
            }
            tx.commit().unwrap();
        }

        let by_term = list_doc_hits(
            store.connection(),
            &DocHitFilter {
                terms: vec!["TODO".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_term.len(), 2);
        assert!(by_term.iter().all(|h| h.term == "TODO"));

        let by_path = list_doc_hits(
            store.connection(),
            &DocHitFilter {
                path: Some("a.rs".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_path.len(), 2);
        assert!(by_path.iter().all(|h| h.file == "a.rs"));
    }

    #[test]
    fn list_diff_files_orders_by_file_path() {
        let mut store = Store::open_in_memory().unwrap();
        let run_id = store.create_run(&RunConfig::default()).unwrap();
        {
            let tx = store.begin().unwrap();
            let b = crate::store::get_or_create_file(&tx, "b.rs").unwrap();
            let a = crate::store::get_or_create_file(&tx, "a.rs").unwrap();
            crate::store::insert_diff_file(
                &tx,
                &crate::types::DiffFile {
                    run_id,
                    file_id: Some(b),
                    status: "M".into(),
                    old_path: None,
                    new_path: Some("b.rs".into()),
                },
            )
            .unwrap();
            crate::store::insert_diff_file(
                &tx,
                &crate::types::DiffFile {
                    run_id,
                    file_id: Some(a),
                    status: "A".into(),
                    old_path: None,
                    new_path: Some("a.rs".into()),
                },
            )
            .unwrap();
            tx.commit().unwrap();
        }
        let files = list_diff_files(store.connection(), run_id, 0, 0).unwrap();
        assert_eq!(
            files.iter().map(|f| f.new_path.clone().unwrap()).collect::<Vec<_>>(),
            vec!["a.rs".to_string(), "b.rs".to_string()]
        );
    }

    #[test]
    fn search_diff_lines_finds_inserted_text() {
        let mut store = Store::open_in_memory().unwrap();
        let run_id = store.create_run(&RunConfig::default()).unwrap();
        {
            let tx = store.begin().unwrap();
            let file_id = crate::store::get_or_create_file(&tx, "a.rs").unwrap();
            let diff_file_id = crate::store::insert_diff_file(
                &tx,
                &crate::types::DiffFile {
                    run_id,
                    file_id: Some(file_id),
                    status: "M".into(),
                    old_path: None,
                    new_path: Some("a.rs".into()),
                },
            )
            .unwrap();
            let hunk_id = crate::store::insert_diff_hunk(
                &tx,
                &crate::types::DiffHunk {
                    diff_file_id,
                    old_start: 1,
                    old_lines: 1,
                    new_start: 1,
                    new_lines: 1,
                },
            )
            .unwrap();
            crate::store::insert_diff_line(
                &tx,
                &crate::types::DiffLine {
                    hunk_id,
                    kind: "add".into(),
                    line_no_old: None,
                    line_no_new: Some(1),
                    text: "fn widget_factory() {}".into(),
                },
            )
            .unwrap();
            tx.commit().unwrap();
        }
        let hits = search_diff_lines(store.connection(), "widget", Some(run_id), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file.as_deref(), Some("a.rs"));
    }

    #[test]
    fn search_code_unit_snapshots_finds_inserted_body() {
        let mut store = Store::open_in_memory().unwrap();
        let run_id = store.create_run(&RunConfig::default()).unwrap();
        {
            let tx = store.begin().unwrap();
            let file_id = crate::store::get_or_create_file(&tx, "a.rs").unwrap();
            let code_unit_id = crate::store::get_or_create_code_unit(
                &tx,
                &crate::types::CodeUnitDef {
                    kind: "func".into(),
                    name: "widget_factory".into(),
                    pkg: "crate".into(),
                    recv: None,
                    signature: Some("fn widget_factory()".into()),
                    unit_hash: "hash-wf".into(),
                },
            )
            .unwrap();
            crate::store::insert_code_unit_snapshot(
                &tx,
                &crate::types::CodeUnitSnapshot {
                    run_id,
                    commit_id: None,
                    file_id,
                    code_unit_id,
                    start_line: 1,
                    start_col: 1,
                    end_line: 3,
                    end_col: 1,
                    body_hash: "bh".into(),
                    body_text: "fn widget_factory() { make_widget() }".into(),
                    doc_text: None,
                },
            )
            .unwrap();
            tx.commit().unwrap();
        }
        let hits = search_code_unit_snapshots(store.connection(), "make_widget", Some(run_id), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "widget_factory");
        assert_eq!(hits[0].file, "a.rs");
    }

    #[test]
    fn search_commits_finds_inserted_subject() {
        let mut store = Store::open_in_memory().unwrap();
        let run_id = store.create_run(&RunConfig::default()).unwrap();
        {
            let tx = store.begin().unwrap();
            crate::store::insert_commit(
                &tx,
                &crate::types::CommitInfo {
                    run_id,
                    hash: "abc123".into(),
                    author_name: Some("tester".into()),
                    author_email: Some("a@b.c".into()),
                    author_date: Some("2024-01-01T00:00:00Z".into()),
                    committer_date: Some("2024-01-01T00:00:00Z".into()),
                    subject: Some("refactor widget pipeline".into()),
                    body: None,
                },
            )
            .unwrap();
            tx.commit().unwrap();
        }
        let hits = search_commits(store.connection(), "widget", Some(run_id), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].hash, "abc123");
    }
}
