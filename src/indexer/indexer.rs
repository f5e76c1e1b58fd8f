//! Project part reconciliation
//!
//! [`SymbolIndexer`] turns project part snapshots and watcher notifications
//! into indexing tasks. It diffs every incoming part against the previous
//! snapshot of the same part (in memory, else as stored), retires files that
//! left it and enqueues the files whose stored records are out of date.

use super::{IndexingTask, TaskQueue, TaskScheduler};
use crate::collector::GeneratedFiles;
use crate::filepath::{FileId, FilePathCaching};
use crate::project::{ProjectPartConfiguration, ProjectPartId};
use crate::status::FileStatusCache;
use crate::storage::SymbolStorage;
use crate::watcher::{PathChange, PathWatcher};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Summary of an `update_project_parts` call
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Tasks added to the queue
    pub enqueued: usize,
    /// Files whose records were retired
    pub removed: usize,
    /// Parts that were not applied, with the reason
    pub rejected: Vec<Error>,
}

struct PartSnapshot {
    arguments: Arc<[String]>,
    files: Vec<FileId>,
}

#[derive(Default)]
struct IndexerState {
    parts: HashMap<ProjectPartId, PartSnapshot>,
    /// Owning part of every file of a known part
    owners: HashMap<FileId, ProjectPartId>,
}

/// A validated part with its interned files
struct PreparedPart {
    id: ProjectPartId,
    arguments: Arc<[String]>,
    files: Vec<FileId>,
}

pub struct SymbolIndexer {
    paths: Arc<dyn FilePathCaching>,
    storage: Arc<SymbolStorage>,
    statuses: Arc<FileStatusCache>,
    queue: Arc<Mutex<TaskQueue>>,
    scheduler: Arc<TaskScheduler>,
    watcher: Arc<PathWatcher>,
    generated: GeneratedFiles,
    state: Mutex<IndexerState>,
}

impl SymbolIndexer {
    pub fn new(
        paths: Arc<dyn FilePathCaching>,
        storage: Arc<SymbolStorage>,
        statuses: Arc<FileStatusCache>,
        queue: Arc<Mutex<TaskQueue>>,
        scheduler: Arc<TaskScheduler>,
        watcher: Arc<PathWatcher>,
        generated: GeneratedFiles,
    ) -> Self {
        Self {
            paths,
            storage,
            statuses,
            queue,
            scheduler,
            watcher,
            generated,
            state: Mutex::new(IndexerState::default()),
        }
    }

    /// Reconcile the index with new snapshots of project parts
    pub fn update_project_parts(&self, parts: Vec<ProjectPartConfiguration>) -> UpdateReport {
        let mut report = UpdateReport::default();
        let prepared = self.prepare(parts, &mut report);

        {
            let mut state = self.lock();
            for part in prepared {
                let id = part.id.clone();
                match self.apply_part(&mut state, part) {
                    Ok((enqueued, removed)) => {
                        report.enqueued += enqueued;
                        report.removed += removed;
                    }
                    Err(e) => {
                        tracing::error!(part = %id, "updating project part failed: {}", e);
                        report.rejected.push(e);
                    }
                }
            }
        }

        if report.enqueued > 0 {
            self.scheduler.dispatch();
        }
        tracing::info!(
            enqueued = report.enqueued,
            removed = report.removed,
            rejected = report.rejected.len(),
            "project parts updated"
        );
        report
    }

    /// Drop project parts and every record of their files; returns the
    /// number of files retired
    pub fn remove_project_parts(&self, ids: &[ProjectPartId]) -> Result<usize> {
        let mut state = self.lock();
        let mut retired = 0;
        for id in ids {
            let files = match state.parts.get(id) {
                Some(snapshot) => snapshot.files.clone(),
                None => self
                    .storage
                    .fetch_project_part(id)?
                    .map(|stored| stored.files)
                    .unwrap_or_default(),
            };
            let owned: Vec<FileId> = files
                .into_iter()
                .filter(|file| state.owners.get(file).is_none_or(|owner| owner == id))
                .collect();
            retired += self.retire_files(&mut state, &owned)?;
            state.parts.remove(id);
            if self.storage.remove_project_part(id)? {
                tracing::info!(part = %id, files = owned.len(), "removed project part");
            }
        }
        Ok(retired)
    }

    /// React to a watcher notification
    pub fn handle_change(&self, change: PathChange) -> Result<usize> {
        match change {
            PathChange::Changed(files) => {
                self.statuses.update(&files);
                let enqueued = {
                    let state = self.lock();
                    let candidates: Vec<FileId> = files
                        .into_iter()
                        .filter(|file| state.owners.contains_key(file))
                        .filter(|file| self.needs_reindex(&state, *file, false))
                        .collect();
                    self.reindex_files(&state, &candidates)
                };
                if enqueued > 0 {
                    self.scheduler.dispatch();
                }
                Ok(enqueued)
            }
            PathChange::Removed(files) => {
                let mut state = self.lock();
                let (unwatchable, removed): (Vec<FileId>, Vec<FileId>) = files
                    .into_iter()
                    .filter(|f| state.owners.contains_key(f))
                    .partition(|f| self.watcher.is_unwatchable(*f));
                self.detach_files(&unwatchable)?;
                self.retire_files(&mut state, &removed)
            }
        }
    }

    /// Set the in-memory content of files. Generated files are not watched;
    /// files of a known part whose content changed are reindexed. Returns
    /// the number of tasks enqueued.
    pub fn update_generated_files(&self, files: Vec<(PathBuf, String)>) -> Result<usize> {
        let mut changed = Vec::new();
        for (path, content) in files {
            let id = self.paths.intern(&path)?;
            if self.generated.insert(&path, content) {
                changed.push(id);
            }
        }
        if changed.is_empty() {
            return Ok(0);
        }
        tracing::debug!(files = changed.len(), "generated files updated");
        self.watcher.remove_paths(&changed);
        self.handle_change(PathChange::Changed(changed))
    }

    /// Drop in-memory contents. Files of a known part fall back to the disk:
    /// they are watched and reindexed again, or retired when missing.
    /// Returns the number of files enqueued or retired.
    pub fn remove_generated_files(&self, paths: &[PathBuf]) -> Result<usize> {
        let mut on_disk = Vec::new();
        let mut missing = Vec::new();
        for path in paths {
            if !self.generated.remove(path) {
                continue;
            }
            let id = self.paths.intern(path)?;
            if path.exists() {
                on_disk.push((id, path.clone()));
            } else {
                missing.push(id);
            }
        }

        let watched: Vec<(FileId, PathBuf)> = {
            let state = self.lock();
            on_disk
                .iter()
                .filter(|(id, _)| state.owners.contains_key(id))
                .cloned()
                .collect()
        };
        self.watcher.add_paths(&watched);

        let mut affected = 0;
        if !on_disk.is_empty() {
            let ids = on_disk.into_iter().map(|(id, _)| id).collect();
            affected += self.handle_change(PathChange::Changed(ids))?;
        }
        if !missing.is_empty() {
            affected += self.handle_change(PathChange::Removed(missing))?;
        }
        Ok(affected)
    }

    /// Owning part of a file
    pub fn owner_of(&self, file: FileId) -> Option<ProjectPartId> {
        self.lock().owners.get(&file).cloned()
    }

    /// Ids of the parts known in memory
    pub fn project_part_ids(&self) -> Vec<ProjectPartId> {
        let mut ids: Vec<_> = self.lock().parts.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Validate and intern incoming parts. A file may be claimed by only one
    /// part per call; later claims reject their part.
    fn prepare(&self, parts: Vec<ProjectPartConfiguration>, report: &mut UpdateReport) -> Vec<PreparedPart> {
        let mut claimed: HashMap<FileId, ProjectPartId> = HashMap::new();
        let mut prepared = Vec::with_capacity(parts.len());

        for part in parts {
            if let Err(e) = part.validate() {
                tracing::warn!(part = %part.id, "rejected project part: {}", e);
                report.rejected.push(e);
                continue;
            }
            let mut files = match self.paths.intern_all(&part.files) {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(part = %part.id, "rejected project part: {}", e);
                    report.rejected.push(e);
                    continue;
                }
            };
            let conflict = files
                .iter()
                .zip(&part.files)
                .find_map(|(file, path)| claimed.get(file).map(|first| (path, first)));
            if let Some((path, first)) = conflict {
                let e = Error::DuplicateFile {
                    path: path.clone(),
                    first: first.to_string(),
                    second: part.id.to_string(),
                };
                tracing::warn!(part = %part.id, "rejected project part: {}", e);
                report.rejected.push(e);
                continue;
            }

            let mut seen = HashSet::new();
            files.retain(|file| seen.insert(*file));
            for file in &files {
                claimed.insert(*file, part.id.clone());
            }
            prepared.push(PreparedPart {
                arguments: part.command_line().into(),
                id: part.id,
                files,
            });
        }
        prepared
    }

    /// Diff one part against its previous snapshot; returns (enqueued, retired)
    fn apply_part(&self, state: &mut IndexerState, part: PreparedPart) -> Result<(usize, usize)> {
        let PreparedPart { id, arguments, files } = part;

        let previous = match state.parts.get(&id) {
            Some(snapshot) => Some((snapshot.arguments.to_vec(), snapshot.files.clone())),
            None => self
                .storage
                .fetch_project_part(&id)?
                .map(|stored| (stored.arguments, stored.files)),
        };
        let (previous_arguments, previous_files) = match previous {
            Some((arguments, files)) => (Some(arguments), files),
            None => (None, Vec::new()),
        };

        let current: HashSet<FileId> = files.iter().copied().collect();
        let left: Vec<FileId> = previous_files
            .iter()
            .copied()
            .filter(|file| !current.contains(file))
            .filter(|file| state.owners.get(file).is_none_or(|owner| *owner == id))
            .collect();
        let retired = self.retire_files(state, &left)?;

        // Files taken over from another part leave that part's snapshot
        for file in &files {
            if let Some(owner) = state.owners.get(file).filter(|owner| **owner != id).cloned() {
                tracing::debug!(file = %file, from = %owner, to = %id, "file moved between project parts");
                if let Some(snapshot) = state.parts.get_mut(&owner) {
                    snapshot.files.retain(|f| f != file);
                }
            }
        }

        let arguments_changed = previous_arguments.as_deref() != Some(&arguments[..]);
        let files_changed = previous_files.iter().copied().collect::<HashSet<_>>() != current;
        if arguments_changed || files_changed {
            self.storage.update_project_part(&id, &arguments, &files)?;
        }

        for file in &files {
            state.owners.insert(*file, id.clone());
        }
        state.parts.insert(
            id.clone(),
            PartSnapshot {
                arguments,
                files: files.clone(),
            },
        );

        let mut watched = Vec::with_capacity(files.len());
        for file in &files {
            let path = self.paths.resolve(*file)?;
            if !self.generated.contains(&path) {
                watched.push((*file, path));
            }
        }
        self.watcher.add_paths(&watched);

        let candidates: Vec<FileId> = files
            .iter()
            .copied()
            .filter(|file| self.needs_reindex(state, *file, arguments_changed))
            .collect();
        let enqueued = self.reindex_files(state, &candidates);
        tracing::debug!(part = %id, files = files.len(), enqueued, retired, "applied project part");
        Ok((enqueued, retired))
    }

    /// Whether the stored records of a file are out of date. Missing and
    /// unwatchable files are never reindexed.
    fn needs_reindex(&self, state: &IndexerState, file: FileId, arguments_changed: bool) -> bool {
        if self.watcher.is_unwatchable(file) {
            tracing::debug!(file = %file, "file cannot be watched, skipping");
            return false;
        }
        let Some(status) = self.statuses.find(file) else {
            let path = self.paths.resolve(file).unwrap_or_else(|_| PathBuf::from("?"));
            tracing::warn!(file = %file, path = %path.display(), "file not found, skipping");
            return false;
        };
        if arguments_changed {
            return true;
        }
        let Some(owner) = state.owners.get(&file) else {
            return false;
        };
        match self.storage.fetch_indexed_file(file) {
            Ok(Some(indexed)) => indexed.project_part != *owner || indexed.status != status,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(file = %file, "cannot read index state: {}", e);
                true
            }
        }
    }

    /// Enqueue tasks for files with the arguments of their owning part
    fn reindex_files(&self, state: &IndexerState, files: &[FileId]) -> usize {
        let tasks: Vec<IndexingTask> = files
            .iter()
            .filter_map(|file| {
                let owner = state.owners.get(file)?;
                let snapshot = state.parts.get(owner)?;
                Some(IndexingTask::with_shared_arguments(
                    *file,
                    owner.clone(),
                    snapshot.arguments.clone(),
                ))
            })
            .collect();
        let count = tasks.len();
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_or_update(tasks);
        count
    }

    /// Forget files: pending tasks, stored records, cached status, watch and
    /// part membership
    fn retire_files(&self, state: &mut IndexerState, files: &[FileId]) -> Result<usize> {
        if files.is_empty() {
            return Ok(0);
        }
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(files);
        for file in files {
            self.storage.remove_file(*file)?;
            if let Some(owner) = state.owners.remove(file) {
                if let Some(snapshot) = state.parts.get_mut(&owner) {
                    snapshot.files.retain(|f| f != file);
                }
            }
            tracing::debug!(file = %file, "retired file");
        }
        self.statuses.remove(files);
        self.watcher.remove_paths(files);
        Ok(files.len())
    }

    /// Drop the records of files that cannot be watched. They stay members
    /// of their part so resubmitting the part leaves them alone.
    fn detach_files(&self, files: &[FileId]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(files);
        for file in files {
            self.storage.clear_file(*file)?;
            tracing::debug!(file = %file, "detached unwatchable file");
        }
        self.statuses.remove(files);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, IndexerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
