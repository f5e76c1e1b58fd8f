//! # Symdex - Concurrent Symbol Indexing Engine
//!
//! Keeps a SQLite symbol index synchronized with a set of project parts and
//! with the files on disk.
//!
//! Symdex provides:
//! - Interned, persistent file identities shared by every component
//! - A pluggable collector capability (tree-sitter backed, or scripted for tests)
//! - A bounded task scheduler drawing deduplicated tasks from a queue
//! - Delta-updating SQLite storage for symbols and their locations
//! - A debounced path watcher feeding changes back into the indexer

pub mod filepath;
pub mod project;
pub mod symbol;
pub mod status;
pub mod storage;
pub mod collector;
pub mod indexer;
pub mod watcher;
pub mod config;
pub mod ui;

use std::path::PathBuf;

// Re-exports for convenient access
pub use filepath::{FileId, FilePathCache, FilePathCaching};
pub use project::{CompilerMacro, ProjectPartConfiguration, ProjectPartId};
pub use symbol::{LocationRecord, LocationRole, SymbolId, SymbolKind, SymbolRecord};
pub use storage::{Database, SymbolStorage};
pub use collector::{GeneratedFiles, SymbolsCollector, TreeSitterCollector};
pub use indexer::{SymbolIndexer, SymbolIndexing, UpdateReport};
pub use watcher::{PathChange, PathWatcher};
pub use config::IndexerConfig;

/// Result type alias for Symdex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Symdex operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid project part '{id}': {reason}")]
    InvalidProjectPart { id: String, reason: String },

    #[error("File {} is claimed by project parts '{first}' and '{second}'", path.display())]
    DuplicateFile {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Unknown file id: {0}")]
    UnknownFile(FileId),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Collector error: {0}")]
    Collector(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a parse error for a file
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
