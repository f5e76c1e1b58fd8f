//! Symbol storage
//!
//! Durable store of symbols, their locations and their project part
//! associations. Every mutation is a single transaction, so no reader ever
//! sees a half-updated file, and every mutation is idempotent.

use super::Database;
use crate::filepath::FileId;
use crate::indexer::IndexingTask;
use crate::project::ProjectPartId;
use crate::status::FileStatus;
use crate::symbol::{CollectedSymbols, LocationRecord, LocationRole, SymbolId, SymbolKind, SymbolRecord};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// What `apply_results` did with a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Prior records of the file were replaced
    Applied { symbols: usize, locations: usize },
    /// The stored records already match the result set
    Unchanged,
    /// The file no longer belongs to the task's project part; nothing was written
    Stale,
}

/// Index state of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub file: FileId,
    pub project_part: ProjectPartId,
    /// Status of the file when its results were applied
    pub status: FileStatus,
}

/// A project part as last written to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProjectPart {
    pub id: ProjectPartId,
    pub arguments: Vec<String>,
    pub files: Vec<FileId>,
}

/// SQLite-backed storage for symbol and location records
pub struct SymbolStorage {
    database: Arc<Database>,
    writes: AtomicU64,
}

impl SymbolStorage {
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            writes: AtomicU64::new(0),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Number of transactions that changed stored data
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self, wrote: bool) {
        if wrote {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    // ========== Project Part Operations ==========

    /// Insert or update a project part and make it the owner of `files`.
    ///
    /// Files taken over from another part lose the records they were indexed
    /// with under that part.
    pub fn update_project_part(&self, id: &ProjectPartId, arguments: &[String], files: &[FileId]) -> Result<()> {
        let arguments_json = serde_json::to_string(arguments)?;
        self.database.write(|tx| {
            tx.execute(
                r#"
                INSERT INTO project_parts (name, arguments) VALUES (?1, ?2)
                ON CONFLICT(name) DO UPDATE SET arguments = excluded.arguments
                "#,
                params![id.as_str(), arguments_json],
            )?;
            let part_row = part_row(tx, id)?.ok_or_else(|| Error::InvalidProjectPart {
                id: id.0.clone(),
                reason: "project part vanished during update".to_string(),
            })?;

            tx.execute(
                "DELETE FROM project_part_sources WHERE project_part_id = ?1",
                params![part_row],
            )?;

            let mut retire_symbols = tx.prepare_cached(
                "DELETE FROM symbols WHERE source_id = ?1 AND project_part_id != ?2",
            )?;
            let mut retire_status = tx.prepare_cached(
                "DELETE FROM file_statuses WHERE source_id = ?1 AND project_part_id != ?2",
            )?;
            let mut insert = tx.prepare_cached(
                "INSERT OR REPLACE INTO project_part_sources (source_id, project_part_id) VALUES (?1, ?2)",
            )?;
            for file in files {
                retire_symbols.execute(params![file.0, part_row])?;
                retire_status.execute(params![file.0, part_row])?;
                insert.execute(params![file.0, part_row])?;
            }
            Ok(())
        })?;
        self.record_write(true);
        Ok(())
    }

    /// Get a stored project part with its files
    pub fn fetch_project_part(&self, id: &ProjectPartId) -> Result<Option<StoredProjectPart>> {
        self.database.read(|conn| {
            let row: Option<(i64, String)> = conn
                .query_row(
                    "SELECT project_part_id, arguments FROM project_parts WHERE name = ?1",
                    params![id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((part_row, arguments)) = row else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT source_id FROM project_part_sources WHERE project_part_id = ?1 ORDER BY source_id",
            )?;
            let files = stmt
                .query_map(params![part_row], |row| Ok(FileId(row.get(0)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(Some(StoredProjectPart {
                id: id.clone(),
                arguments: serde_json::from_str(&arguments)?,
                files,
            }))
        })
    }

    /// Get the ids of every stored project part
    pub fn fetch_project_part_ids(&self) -> Result<Vec<ProjectPartId>> {
        self.database.read(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM project_parts ORDER BY name")?;
            let ids = stmt
                .query_map([], |row| Ok(ProjectPartId(row.get(0)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }

    /// Delete a project part and every record of its files.
    ///
    /// Returns false when the part was not stored.
    pub fn remove_project_part(&self, id: &ProjectPartId) -> Result<bool> {
        let removed = self.database.write(|tx| {
            let Some(part_row) = part_row(tx, id)? else {
                return Ok(false);
            };
            tx.execute(
                "DELETE FROM locations WHERE symbol_id IN (SELECT symbol_id FROM symbols WHERE project_part_id = ?1)",
                params![part_row],
            )?;
            tx.execute("DELETE FROM symbols WHERE project_part_id = ?1", params![part_row])?;
            tx.execute("DELETE FROM file_statuses WHERE project_part_id = ?1", params![part_row])?;
            tx.execute(
                "DELETE FROM project_part_sources WHERE project_part_id = ?1",
                params![part_row],
            )?;
            tx.execute("DELETE FROM project_parts WHERE project_part_id = ?1", params![part_row])?;
            Ok(true)
        })?;
        self.record_write(removed);
        Ok(removed)
    }

    // ========== File Operations ==========

    /// Get the index state of a file, if it has been indexed
    pub fn fetch_indexed_file(&self, file: FileId) -> Result<Option<IndexedFile>> {
        self.database.read(|conn| {
            conn.query_row(
                r#"
                SELECT fs.size, fs.last_modified, pp.name
                FROM file_statuses fs
                JOIN project_parts pp ON pp.project_part_id = fs.project_part_id
                WHERE fs.source_id = ?1
                "#,
                params![file.0],
                |row| {
                    let size: i64 = row.get(0)?;
                    Ok(IndexedFile {
                        file,
                        status: FileStatus::new(size as u64, row.get(1)?),
                        project_part: ProjectPartId(row.get(2)?),
                    })
                },
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Replace every record of the task's file with `results`.
    ///
    /// `status` is the file status observed right before collecting.
    pub fn apply_results(
        &self,
        task: &IndexingTask,
        status: FileStatus,
        results: &CollectedSymbols,
    ) -> Result<ApplyOutcome> {
        let digest = results.digest();
        let (outcome, wrote) = self.database.write(|tx| {
            let Some(part_row) = part_row(tx, &task.project_part)? else {
                return Ok((ApplyOutcome::Stale, false));
            };
            let owner: Option<i64> = tx
                .query_row(
                    "SELECT project_part_id FROM project_part_sources WHERE source_id = ?1",
                    params![task.file_id.0],
                    |row| row.get(0),
                )
                .optional()?;
            if owner != Some(part_row) {
                return Ok((ApplyOutcome::Stale, false));
            }

            let existing: Option<(i64, i64, i64, String)> = tx
                .query_row(
                    "SELECT project_part_id, size, last_modified, results_digest FROM file_statuses WHERE source_id = ?1",
                    params![task.file_id.0],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let current = (part_row, status.size as i64, status.last_modified, digest.clone());
            if let Some(existing) = existing {
                if existing == current {
                    return Ok((ApplyOutcome::Unchanged, false));
                }
                if existing.0 == part_row && existing.3 == digest {
                    // Touched but identical content
                    write_status(tx, task.file_id, part_row, status, &digest)?;
                    return Ok((ApplyOutcome::Unchanged, true));
                }
            }

            tx.execute(
                "DELETE FROM locations WHERE symbol_id IN (SELECT symbol_id FROM symbols WHERE source_id = ?1)",
                params![task.file_id.0],
            )?;
            tx.execute("DELETE FROM symbols WHERE source_id = ?1", params![task.file_id.0])?;

            let mut symbol_ids = Vec::with_capacity(results.symbols.len());
            {
                let mut insert = tx.prepare_cached(
                    "INSERT INTO symbols (usr, name, kind, source_id, project_part_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for symbol in &results.symbols {
                    insert.execute(params![
                        symbol.usr,
                        symbol.name,
                        symbol.kind.as_str(),
                        task.file_id.0,
                        part_row,
                    ])?;
                    symbol_ids.push(tx.last_insert_rowid());
                }
            }
            {
                let mut insert = tx.prepare_cached(
                    "INSERT INTO locations (symbol_id, source_id, line, col, role) VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for location in &results.locations {
                    let symbol_id = symbol_ids.get(location.symbol).ok_or_else(|| {
                        Error::Collector(format!(
                            "location {}:{} refers to unknown symbol index {}",
                            location.line, location.column, location.symbol
                        ))
                    })?;
                    insert.execute(params![
                        symbol_id,
                        task.file_id.0,
                        location.line,
                        location.column,
                        location.role.as_str(),
                    ])?;
                }
            }

            write_status(tx, task.file_id, part_row, status, &digest)?;
            Ok((
                ApplyOutcome::Applied {
                    symbols: results.symbols.len(),
                    locations: results.locations.len(),
                },
                true,
            ))
        })?;
        self.record_write(wrote);
        Ok(outcome)
    }

    /// Delete every record owned by a file, including its part membership
    pub fn remove_file(&self, file: FileId) -> Result<()> {
        self.delete_file_records(file, true)
    }

    /// Delete the symbols, locations and status of a file but keep it a
    /// member of its project part
    pub fn clear_file(&self, file: FileId) -> Result<()> {
        self.delete_file_records(file, false)
    }

    fn delete_file_records(&self, file: FileId, membership: bool) -> Result<()> {
        let changes = self.database.write(|tx| {
            let mut changes = tx.execute(
                "DELETE FROM locations WHERE symbol_id IN (SELECT symbol_id FROM symbols WHERE source_id = ?1)",
                params![file.0],
            )?;
            changes += tx.execute("DELETE FROM locations WHERE source_id = ?1", params![file.0])?;
            changes += tx.execute("DELETE FROM symbols WHERE source_id = ?1", params![file.0])?;
            changes += tx.execute("DELETE FROM file_statuses WHERE source_id = ?1", params![file.0])?;
            if membership {
                changes += tx.execute("DELETE FROM project_part_sources WHERE source_id = ?1", params![file.0])?;
            }
            Ok(changes)
        })?;
        self.record_write(changes > 0);
        Ok(())
    }

    // ========== Queries ==========

    /// Find all symbols contained in a file
    pub fn symbols_in_file(&self, file: FileId) -> Result<Vec<SymbolRecord>> {
        self.query_symbols("WHERE s.source_id = ?1 ORDER BY s.symbol_id", params![file.0])
    }

    /// Find symbols by display name across all files
    pub fn find_symbols_by_name(&self, name: &str) -> Result<Vec<SymbolRecord>> {
        self.query_symbols("WHERE s.name = ?1 ORDER BY s.source_id, s.symbol_id", params![name])
    }

    /// Get a symbol by id
    pub fn get_symbol(&self, id: SymbolId) -> Result<Option<SymbolRecord>> {
        Ok(self
            .query_symbols("WHERE s.symbol_id = ?1", params![id.0])?
            .into_iter()
            .next())
    }

    /// Find all locations of a symbol
    pub fn locations_for_symbol(&self, id: SymbolId) -> Result<Vec<LocationRecord>> {
        self.database.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT symbol_id, source_id, line, col, role FROM locations WHERE symbol_id = ?1 ORDER BY source_id, line, col",
            )?;
            let locations = stmt
                .query_map(params![id.0], row_to_location)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(locations)
        })
    }

    fn query_symbols(&self, filter: &str, params: impl rusqlite::Params) -> Result<Vec<SymbolRecord>> {
        let sql = format!(
            r#"
            SELECT s.symbol_id, s.usr, s.kind, s.name, s.source_id, pp.name
            FROM symbols s
            JOIN project_parts pp ON pp.project_part_id = s.project_part_id
            {}
            "#,
            filter
        );
        self.database.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let symbols = stmt
                .query_map(params, row_to_symbol)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(symbols)
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        self.database.read(|conn| {
            Ok(DbStats {
                sources: count(conn, "sources")?,
                project_parts: count(conn, "project_parts")?,
                indexed_files: count(conn, "file_statuses")?,
                symbols: count(conn, "symbols")?,
                locations: count(conn, "locations")?,
            })
        })
    }
}

fn part_row(tx: &Transaction<'_>, id: &ProjectPartId) -> Result<Option<i64>> {
    tx.query_row(
        "SELECT project_part_id FROM project_parts WHERE name = ?1",
        params![id.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

fn write_status(tx: &Transaction<'_>, file: FileId, part_row: i64, status: FileStatus, digest: &str) -> Result<()> {
    tx.execute(
        r#"
        INSERT OR REPLACE INTO file_statuses (source_id, project_part_id, size, last_modified, results_digest)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![file.0, part_row, status.size as i64, status.last_modified, digest],
    )?;
    Ok(())
}

fn count(conn: &Connection, table: &str) -> Result<usize> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Helper to convert a row to a SymbolRecord
fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<SymbolRecord> {
    let kind_str: String = row.get(2)?;
    let kind: SymbolKind = kind_str.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SymbolRecord {
        id: SymbolId(row.get(0)?),
        usr: row.get(1)?,
        kind,
        name: row.get(3)?,
        file: FileId(row.get(4)?),
        project_part: ProjectPartId(row.get(5)?),
    })
}

/// Helper to convert a row to a LocationRecord
fn row_to_location(row: &rusqlite::Row) -> rusqlite::Result<LocationRecord> {
    let role_str: String = row.get(4)?;
    let role: LocationRole = role_str.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(LocationRecord {
        symbol_id: SymbolId(row.get(0)?),
        file: FileId(row.get(1)?),
        line: row.get(2)?,
        column: row.get(3)?,
        role,
    })
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStats {
    pub sources: usize,
    pub project_parts: usize,
    pub indexed_files: usize,
    pub symbols: usize,
    pub locations: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Sources: {}", self.sources)?;
        writeln!(f, "  Project parts: {}", self.project_parts)?;
        writeln!(f, "  Indexed files: {}", self.indexed_files)?;
        writeln!(f, "  Symbols: {}", self.symbols)?;
        writeln!(f, "  Locations: {}", self.locations)
    }
}
