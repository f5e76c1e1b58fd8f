//! Pending indexing tasks, at most one per file

use super::IndexingTask;
use crate::filepath::FileId;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
pub struct TaskQueue {
    order: VecDeque<FileId>,
    tasks: HashMap<FileId, IndexingTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue tasks. A task for a file that is already pending replaces the
    /// pending one but keeps its place in line.
    pub fn add_or_update(&mut self, tasks: impl IntoIterator<Item = IndexingTask>) {
        for task in tasks {
            let file = task.file_id;
            if self.tasks.insert(file, task).is_none() {
                self.order.push_back(file);
            }
        }
    }

    /// Pop up to `n` tasks in arrival order
    pub fn take(&mut self, n: usize) -> Vec<IndexingTask> {
        let mut taken = Vec::with_capacity(n.min(self.tasks.len()));
        while taken.len() < n {
            let Some(file) = self.order.pop_front() else {
                break;
            };
            if let Some(task) = self.tasks.remove(&file) {
                taken.push(task);
            }
        }
        taken
    }

    /// Drop pending tasks of the given files, returning how many were dropped
    pub fn remove(&mut self, files: &[FileId]) -> usize {
        let before = self.tasks.len();
        for file in files {
            self.tasks.remove(file);
        }
        let removed = before - self.tasks.len();
        if removed > 0 {
            self.order.retain(|file| self.tasks.contains_key(file));
        }
        removed
    }

    pub fn contains(&self, file: FileId) -> bool {
        self.tasks.contains_key(&file)
    }

    pub fn get(&self, file: FileId) -> Option<&IndexingTask> {
        self.tasks.get(&file)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
