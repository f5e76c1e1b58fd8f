//! Generated files
//!
//! In-memory contents for files that are generated or not yet saved. Every
//! component that reads a source file (collectors, status checks) looks here
//! before touching the disk.

use crate::filepath::normalize;
use crate::status::FileStatus;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct GeneratedFile {
    content: Arc<str>,
    revision: u64,
}

#[derive(Default)]
struct Overlay {
    files: HashMap<PathBuf, GeneratedFile>,
    revision: u64,
}

/// Shared overlay of generated file contents keyed by normalized path.
/// Clones share the same contents.
#[derive(Clone, Default)]
pub struct GeneratedFiles {
    overlay: Arc<RwLock<Overlay>>,
}

impl GeneratedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content of a file; returns true when it differs from before
    pub fn insert(&self, path: &Path, content: impl Into<String>) -> bool {
        let content: Arc<str> = content.into().into();
        let mut overlay = self.write();
        let path = normalize(path);
        if overlay.files.get(&path).is_some_and(|file| file.content == content) {
            return false;
        }
        overlay.revision += 1;
        let revision = overlay.revision;
        overlay.files.insert(path, GeneratedFile { content, revision });
        true
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.write().files.remove(&normalize(path)).is_some()
    }

    pub fn content(&self, path: &Path) -> Option<Arc<str>> {
        self.read().files.get(&normalize(path)).map(|file| file.content.clone())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.read().files.contains_key(&normalize(path))
    }

    /// Status of a generated file: its length, with the overlay revision
    /// standing in for the modification time
    pub fn status(&self, path: &Path) -> Option<FileStatus> {
        self.read()
            .files
            .get(&normalize(path))
            .map(|file| FileStatus::new(file.content.len() as u64, file.revision as i64))
    }

    pub fn len(&self) -> usize {
        self.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Overlay> {
        self.overlay.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Overlay> {
        self.overlay.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_status() {
        let generated = GeneratedFiles::new();
        let path = Path::new("/build/gen/./config.h");
        assert!(generated.status(path).is_none());

        assert!(generated.insert(path, "#define A 1\n"));
        assert!(generated.contains(Path::new("/build/gen/config.h")));
        assert_eq!(&*generated.content(path).unwrap(), "#define A 1\n");
        let first = generated.status(path).unwrap();
        assert_eq!(first.size, 12);

        // Same content keeps the status; new content changes it
        assert!(!generated.insert(path, "#define A 1\n"));
        assert_eq!(generated.status(path), Some(first));
        assert!(generated.insert(path, "#define A 2\n"));
        assert_ne!(generated.status(path), Some(first));

        let shared = generated.clone();
        assert!(shared.remove(path));
        assert!(generated.is_empty());
    }
}
