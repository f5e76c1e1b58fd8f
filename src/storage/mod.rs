//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - sources(source_id, path)
//! - project_parts(project_part_id, name, arguments)
//! - project_part_sources(source_id, project_part_id)
//! - file_statuses(source_id, project_part_id, size, last_modified, results_digest)
//! - symbols(symbol_id, usr, name, kind, source_id, project_part_id)
//! - locations(symbol_id, source_id, line, col, role)

pub mod schema;
pub mod database;
pub mod symbols;

pub use database::Database;
pub use symbols::{ApplyOutcome, DbStats, IndexedFile, StoredProjectPart, SymbolStorage};
