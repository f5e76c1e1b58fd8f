//! Indexing pipeline
//!
//! - [`TaskQueue`]: pending tasks, one per file
//! - [`TaskScheduler`]: runs tasks on a bounded set of workers
//! - [`SymbolIndexer`]: diffs project parts and watcher notifications into tasks
//! - [`SymbolIndexing`]: owns every component and their threads

mod indexer;
mod indexing;
mod queue;
mod scheduler;
mod task;

pub use indexer::{SymbolIndexer, UpdateReport};
pub use indexing::SymbolIndexing;
pub use queue::TaskQueue;
pub use scheduler::{SchedulerStats, TaskOutcome, TaskReport, TaskScheduler, TaskSlot};
pub use task::IndexingTask;
