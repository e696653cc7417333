//! Analytic SQLite store and read-only query layer for `refactor-index`.
//!
//! One file per run of the ingestion pipeline accumulates diffs, commits,
//! symbol definitions and references, code unit snapshots, doc hits, and
//! tree-sitter captures under a single `meta_runs` row (C1). The `query`
//! module exposes read-only listings and full-text search over that data
//! (C5).

pub mod error;
pub mod query;
pub mod schema;
pub mod store;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use schema::SCHEMA_VERSION;
pub use store::{RunGuard, Store};
pub use types::*;
