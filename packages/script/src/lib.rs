//! Query module facing the embedded scripting host (C6).
//!
//! [`Module`] exposes the four read-only queries the host calls
//! (`query_symbols`, `query_refs`, `query_doc_hits`, `query_files`), each
//! delegating to [`refactor_index_store::query`], capped at a configurable
//! result limit, and optionally traced to a JSONL sink. [`fileset`] is the
//! pure include/exclude glob matcher `query_files` applies client-side.

pub mod errors;
pub mod fileset;
pub mod module;
pub mod trace;

pub use errors::{Error, Result};
pub use fileset::{Fileset, FilesetSpec};
pub use module::{Module, QueryPort, DEFAULT_MAX_RESULTS};
