//! File path interning
//!
//! Every component refers to files by a [`FileId`]. Ids are issued by the
//! `sources` table of the index database, so they stay stable across runs and
//! every stored record can be traced back to its path.

use crate::storage::Database;
use crate::{Error, Result};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Interned identifier of a source file path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub i64);

impl FileId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Path interning service
///
/// `intern` must return the same id for the same (normalized) path for the
/// lifetime of the index; `resolve` is its inverse.
pub trait FilePathCaching: Send + Sync {
    /// Get or create the id of a path
    fn intern(&self, path: &Path) -> Result<FileId>;

    /// Get the path of an id issued by `intern`
    fn resolve(&self, id: FileId) -> Result<PathBuf>;

    /// Intern several paths, preserving order
    fn intern_all(&self, paths: &[PathBuf]) -> Result<Vec<FileId>> {
        paths.iter().map(|p| self.intern(p)).collect()
    }
}

#[derive(Default)]
struct Entries {
    ids: HashMap<PathBuf, FileId>,
    paths: HashMap<FileId, PathBuf>,
}

impl Entries {
    fn insert(&mut self, path: PathBuf, id: FileId) {
        self.paths.insert(id, path.clone());
        self.ids.insert(path, id);
    }
}

/// SQLite-backed path cache sharing the index database
pub struct FilePathCache {
    database: Arc<Database>,
    entries: RwLock<Entries>,
}

impl FilePathCache {
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Id of a path that was interned before, without issuing a new one
    pub fn find(&self, path: &Path) -> Result<Option<FileId>> {
        let path = normalize(path);
        if let Some(id) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .get(&path)
        {
            return Ok(Some(*id));
        }

        let path_str = path.to_string_lossy().to_string();
        self.database.read(|conn| {
            conn.query_row(
                "SELECT source_id FROM sources WHERE path = ?1",
                params![path_str],
                |row| Ok(FileId(row.get(0)?)),
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Number of paths held in memory
    pub fn cached_len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .len()
    }
}

impl FilePathCaching for FilePathCache {
    fn intern(&self, path: &Path) -> Result<FileId> {
        let path = normalize(path);
        if let Some(id) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .get(&path)
        {
            return Ok(*id);
        }

        let path_str = path.to_string_lossy().to_string();
        let id = self.database.write(|tx| {
            tx.execute(
                "INSERT OR IGNORE INTO sources (path) VALUES (?1)",
                params![path_str],
            )?;
            let id: i64 = tx.query_row(
                "SELECT source_id FROM sources WHERE path = ?1",
                params![path_str],
                |row| row.get(0),
            )?;
            Ok(FileId(id))
        })?;

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, id);
        Ok(id)
    }

    fn resolve(&self, id: FileId) -> Result<PathBuf> {
        if let Some(path) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .paths
            .get(&id)
        {
            return Ok(path.clone());
        }

        let path: Option<String> = self.database.read(|conn| {
            conn.query_row(
                "SELECT path FROM sources WHERE source_id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })?;

        let path = PathBuf::from(path.ok_or(Error::UnknownFile(id))?);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone(), id);
        Ok(path)
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` where possible.
///
/// The file does not need to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> (Arc<Database>, FilePathCache) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let cache = FilePathCache::new(db.clone());
        (db, cache)
    }

    #[test]
    fn test_intern_is_stable() {
        let (_db, cache) = cache();
        let a = cache.intern(Path::new("/src/a.cpp")).unwrap();
        let b = cache.intern(Path::new("/src/b.cpp")).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.intern(Path::new("/src/a.cpp")).unwrap(), a);
        assert_eq!(cache.resolve(b).unwrap(), PathBuf::from("/src/b.cpp"));
    }

    #[test]
    fn test_intern_normalizes() {
        let (_db, cache) = cache();
        let a = cache.intern(Path::new("/src/./lib/../a.cpp")).unwrap();
        assert_eq!(cache.intern(Path::new("/src/a.cpp")).unwrap(), a);
    }

    #[test]
    fn test_ids_survive_new_cache() {
        let (db, cache) = cache();
        let a = cache.intern(Path::new("/src/a.cpp")).unwrap();

        let fresh = FilePathCache::new(db);
        assert_eq!(fresh.cached_len(), 0);
        assert_eq!(fresh.resolve(a).unwrap(), PathBuf::from("/src/a.cpp"));
        assert_eq!(fresh.intern(Path::new("/src/a.cpp")).unwrap(), a);
    }

    #[test]
    fn test_find_does_not_intern() {
        let (db, cache) = cache();
        assert_eq!(cache.find(Path::new("/src/a.cpp")).unwrap(), None);
        let a = cache.intern(Path::new("/src/a.cpp")).unwrap();

        let fresh = FilePathCache::new(db);
        assert_eq!(fresh.find(Path::new("/src/./a.cpp")).unwrap(), Some(a));
    }

    #[test]
    fn test_resolve_unknown() {
        let (_db, cache) = cache();
        assert!(matches!(cache.resolve(FileId(42)), Err(Error::UnknownFile(FileId(42)))));
    }
}
