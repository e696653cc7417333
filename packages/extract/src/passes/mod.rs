//! The six independent extraction passes (C3), each owning its run lifecycle
//! and writing raw tool outputs under `<sourcesDir>/<runId>/…` (§4.3).

pub mod code_units;
pub mod commits;
pub mod cross_references;
pub mod diff;
pub mod doc_hits;
pub mod symbols;
pub mod tree_sitter;

use refactor_index_store::Store;

use crate::errors::Result;

/// Runs `body` inside one transaction against `store`, finalizing `run_id` to
/// `success` on commit or `failed` (with the error recorded) otherwise —
/// the common pass contract shared by every extraction pass (§4.3 step 3-4).
pub(crate) fn run_in_transaction<T>(
    store: &mut Store,
    run_id: i64,
    body: impl FnOnce(&rusqlite::Transaction) -> Result<T>,
) -> Result<T> {
    let outcome = (|| -> Result<T> {
        let tx = store.begin()?;
        let value = body(&tx)?;
        tx.commit().map_err(refactor_index_store::Error::from)?;
        Ok(value)
    })();

    match &outcome {
        Ok(_) => store.finish_run(run_id)?,
        Err(e) => store.mark_run_failed(run_id, &e.to_store_error())?,
    }
    outcome
}
