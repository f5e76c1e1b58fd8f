//! File status cache
//!
//! Remembers the last seen size and modification time of each file. Lookups
//! always consult the file system, so a stale entry never hides an edit.

use crate::collector::GeneratedFiles;
use crate::filepath::{FileId, FilePathCaching};
use crate::Result;
use std::collections::HashMap;
use std::fs::Metadata;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::UNIX_EPOCH;

/// Size and modification time of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileStatus {
    pub size: u64,
    /// Nanoseconds since the Unix epoch
    pub last_modified: i64,
}

impl FileStatus {
    pub fn new(size: u64, last_modified: i64) -> Self {
        Self { size, last_modified }
    }

    pub fn from_metadata(metadata: &Metadata) -> Self {
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_nanos() as i64);
        Self {
            size: metadata.len(),
            last_modified,
        }
    }

    /// Read the current status of a file from disk
    pub fn stat(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::from_metadata(&metadata))
    }

    /// Status of the generated content of a file, else of the file on disk
    pub fn current(path: &Path, generated: &GeneratedFiles) -> Result<Self> {
        match generated.status(path) {
            Some(status) => Ok(status),
            None => Self::stat(path),
        }
    }
}

/// Per-file status cache keyed by [`FileId`]
pub struct FileStatusCache {
    paths: Arc<dyn FilePathCaching>,
    generated: GeneratedFiles,
    entries: Mutex<HashMap<FileId, FileStatus>>,
}

impl FileStatusCache {
    pub fn new(paths: Arc<dyn FilePathCaching>) -> Self {
        Self::with_generated_files(paths, GeneratedFiles::new())
    }

    pub fn with_generated_files(paths: Arc<dyn FilePathCaching>, generated: GeneratedFiles) -> Self {
        Self {
            paths,
            generated,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Current status of a file. The file is stat'ed on every call and the
    /// cached entry is replaced when the two disagree.
    ///
    /// Returns `None` when the file cannot be stat'ed.
    pub fn find(&self, id: FileId) -> Option<FileStatus> {
        let Some(status) = self.read(id) else {
            self.lock().remove(&id);
            return None;
        };
        let previous = self.lock().insert(id, status);
        if previous.is_some_and(|cached| cached != status) {
            tracing::debug!(file = %id, "cached status was stale");
        }
        Some(status)
    }

    /// Last status seen for a file, without touching the disk
    pub fn cached(&self, id: FileId) -> Option<FileStatus> {
        self.lock().get(&id).copied()
    }

    /// Refresh the cached status of changed files
    pub fn update(&self, ids: &[FileId]) {
        for id in ids {
            match self.read(*id) {
                Some(status) => {
                    self.lock().insert(*id, status);
                }
                None => {
                    self.lock().remove(id);
                }
            }
        }
    }

    pub fn remove(&self, ids: &[FileId]) {
        let mut entries = self.lock();
        for id in ids {
            entries.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, id: FileId) -> Option<FileStatus> {
        let path = self.paths.resolve(id).ok()?;
        match FileStatus::current(&path, &self.generated) {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::debug!(file = %id, path = %path.display(), "stat failed: {}", e);
                None
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<FileId, FileStatus>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
