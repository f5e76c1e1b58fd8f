//! Collector Framework
//!
//! A collector extracts symbol and location records from one file given its
//! compile arguments. Constructing one can be expensive, so instances are kept
//! in a [`CollectorPool`] and reused across files; a collector must therefore
//! give the same answer for a file regardless of what it parsed before.
//!
//! Two implementations ship with the crate:
//! - [`TreeSitterCollector`]: tree-sitter grammars for C, C++, Rust, Python,
//!   JavaScript and Go
//! - [`ScriptedCollector`]: deterministic records for tests
//!
//! Generated or unsaved contents are shared with collectors through
//! [`GeneratedFiles`].

pub mod generated;
pub mod languages;
pub mod pool;
pub mod scripted;
pub mod syntax;

pub use generated::GeneratedFiles;
pub use languages::SourceLanguage;
pub use pool::{CollectorPool, Pooled};
pub use scripted::{CollectorScript, ScriptedCollector};
pub use syntax::TreeSitterCollector;

use crate::Result;
use crate::symbol::CollectedSymbols;
use std::path::Path;
use std::sync::Arc;

/// Parsing backend capability
pub trait SymbolsCollector: Send {
    /// Extract symbols and their locations from the file at `path`
    fn collect(&mut self, path: &Path, arguments: &[String]) -> Result<CollectedSymbols>;
}

impl<T: SymbolsCollector + ?Sized> SymbolsCollector for Box<T> {
    fn collect(&mut self, path: &Path, arguments: &[String]) -> Result<CollectedSymbols> {
        (**self).collect(path, arguments)
    }
}

/// Type-erased collector as stored in the pool
pub type BoxedCollector = Box<dyn SymbolsCollector>;

/// Constructor for pooled collectors
pub type CollectorFactory = Arc<dyn Fn() -> Result<BoxedCollector> + Send + Sync>;

/// Factory producing tree-sitter collectors that read `generated` before
/// the disk
pub fn tree_sitter_factory(generated: GeneratedFiles) -> CollectorFactory {
    Arc::new(move || Ok(Box::new(TreeSitterCollector::with_generated_files(generated.clone())) as BoxedCollector))
}
