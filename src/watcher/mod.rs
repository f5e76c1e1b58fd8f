//! Path watcher
//!
//! Watches individual source files and reports debounced changes as
//! [`PathChange`] notifications. Files are watched through their parent
//! directory so editors that save by writing a temporary file and renaming it
//! over the original are still observed.

use crate::filepath::FileId;
use crate::Result;
use crossbeam::channel::{self, Receiver, Sender};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(20);

/// Debounced change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathChange {
    /// The files exist and were modified or created
    Changed(Vec<FileId>),
    /// The files were deleted or can no longer be watched
    Removed(Vec<FileId>),
}

/// File system notification backend
pub trait WatchBackend: Send {
    fn watch_directory(&mut self, directory: &Path) -> Result<()>;
    fn unwatch_directory(&mut self, directory: &Path) -> Result<()>;
}

/// Backend on the platform's native notification API
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl NotifyBackend {
    /// Forward the path of every raw event to `events`
    pub fn new(events: Sender<PathBuf>) -> Result<Self> {
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_access() => {}
                Ok(event) => {
                    for path in event.paths {
                        // The receiver only goes away on shutdown
                        let _ = events.send(path);
                    }
                }
                Err(e) => tracing::warn!("watch error: {}", e),
            },
            Config::default(),
        )?;
        Ok(Self { watcher })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch_directory(&mut self, directory: &Path) -> Result<()> {
        self.watcher.watch(directory, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    fn unwatch_directory(&mut self, directory: &Path) -> Result<()> {
        self.watcher.unwatch(directory)?;
        Ok(())
    }
}

/// Backend that never produces events; raw events are injected by hand
struct ManualBackend;

impl WatchBackend for ManualBackend {
    fn watch_directory(&mut self, _directory: &Path) -> Result<()> {
        Ok(())
    }

    fn unwatch_directory(&mut self, _directory: &Path) -> Result<()> {
        Ok(())
    }
}

struct WatchState {
    backend: Box<dyn WatchBackend>,
    by_path: HashMap<PathBuf, FileId>,
    by_id: HashMap<FileId, PathBuf>,
    /// Number of watched files per directory
    directories: HashMap<PathBuf, usize>,
    /// Files whose watch failed; not retried until they are removed
    unwatchable: HashMap<FileId, PathBuf>,
}

impl WatchState {
    fn insert(&mut self, id: FileId, path: PathBuf) -> Result<()> {
        let directory = parent_directory(&path);
        let count = self.directories.get(&directory).copied().unwrap_or(0);
        if count == 0 {
            self.backend.watch_directory(&directory)?;
        }
        self.directories.insert(directory, count + 1);
        self.by_path.insert(path.clone(), id);
        self.by_id.insert(id, path);
        Ok(())
    }

    fn remove(&mut self, id: FileId) -> Option<PathBuf> {
        let path = self.by_id.remove(&id)?;
        self.by_path.remove(&path);

        let directory = parent_directory(&path);
        match self.directories.get_mut(&directory) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.directories.remove(&directory);
                if let Err(e) = self.backend.unwatch_directory(&directory) {
                    tracing::debug!(directory = %directory.display(), "unwatch failed: {}", e);
                }
            }
            None => {}
        }
        Some(path)
    }

    /// Watched files affected by a raw event on `path`
    fn affected(&self, path: &Path) -> Vec<FileId> {
        if let Some(id) = self.by_path.get(path) {
            return vec![*id];
        }
        if self.directories.contains_key(path) {
            return self
                .by_path
                .iter()
                .filter(|(file, _)| file.parent() == Some(path))
                .map(|(_, id)| *id)
                .collect();
        }
        Vec::new()
    }
}

fn parent_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

struct WatchShared {
    state: Mutex<WatchState>,
    changes: Sender<PathChange>,
}

impl WatchShared {
    fn lock(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, touched: &mut HashSet<PathBuf>) {
        let mut changed = Vec::new();
        let mut removed = Vec::new();
        {
            let mut state = self.lock();
            let mut ids: Vec<FileId> = touched.drain().flat_map(|path| state.affected(&path)).collect();
            ids.sort();
            ids.dedup();

            for id in ids {
                let exists = state.by_id.get(&id).is_some_and(|path| path.exists());
                if exists {
                    changed.push(id);
                } else {
                    state.remove(id);
                    removed.push(id);
                }
            }
        }

        if !changed.is_empty() {
            tracing::debug!(files = changed.len(), "files changed");
            let _ = self.changes.send(PathChange::Changed(changed));
        }
        if !removed.is_empty() {
            tracing::debug!(files = removed.len(), "files removed");
            let _ = self.changes.send(PathChange::Removed(removed));
        }
    }

    /// Collect raw events and flush them once `debounce` has passed since the
    /// first event of a batch
    fn run(&self, raw: Receiver<PathBuf>, shutdown: Receiver<()>, debounce: Duration) {
        let mut touched = HashSet::new();
        let mut deadline: Option<Instant> = None;
        loop {
            let timer = deadline.map_or_else(channel::never, channel::at);
            channel::select! {
                recv(raw) -> event => match event {
                    Ok(path) => {
                        touched.insert(path);
                        deadline.get_or_insert_with(|| Instant::now() + debounce);
                    }
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
                recv(timer) -> _ => {
                    self.flush(&mut touched);
                    deadline = None;
                }
            }
        }
        tracing::debug!("path watcher stopped");
    }
}

/// Watch set of source files with debounced change notifications
pub struct PathWatcher {
    shared: Arc<WatchShared>,
    notifications: Receiver<PathChange>,
    shutdown: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl PathWatcher {
    /// Watcher on the native notification backend
    pub fn new(debounce: Duration) -> Result<Self> {
        let (events, raw) = channel::unbounded();
        let backend = NotifyBackend::new(events)?;
        Self::with_backend(Box::new(backend), raw, debounce)
    }

    /// Watcher without a backend; raw events are sent through the returned
    /// sender as file or directory paths
    pub fn manual(debounce: Duration) -> Result<(Self, Sender<PathBuf>)> {
        let (events, raw) = channel::unbounded();
        let watcher = Self::with_backend(Box::new(ManualBackend), raw, debounce)?;
        Ok((watcher, events))
    }

    pub fn with_backend(backend: Box<dyn WatchBackend>, raw: Receiver<PathBuf>, debounce: Duration) -> Result<Self> {
        let (changes, notifications) = channel::unbounded();
        let shared = Arc::new(WatchShared {
            state: Mutex::new(WatchState {
                backend,
                by_path: HashMap::new(),
                by_id: HashMap::new(),
                directories: HashMap::new(),
                unwatchable: HashMap::new(),
            }),
            changes,
        });

        let (stop, shutdown) = channel::bounded(1);
        let thread = {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name("symdex-watcher".to_string())
                .spawn(move || shared.run(raw, shutdown, debounce))?
        };

        Ok(Self {
            shared,
            notifications,
            shutdown: Mutex::new(Some(stop)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Debounced notifications
    pub fn notifications(&self) -> Receiver<PathChange> {
        self.notifications.clone()
    }

    /// Start watching files. Files that cannot be watched are reported as
    /// removed once and remembered as unwatchable, so adding them again is a
    /// no-op until they are removed.
    pub fn add_paths(&self, files: &[(FileId, PathBuf)]) {
        let mut failed = Vec::new();
        {
            let mut state = self.shared.lock();
            for (id, path) in files {
                if state.by_id.get(id) == Some(path) || state.unwatchable.get(id) == Some(path) {
                    continue;
                }
                state.remove(*id);
                state.unwatchable.remove(id);
                if let Err(e) = state.insert(*id, path.clone()) {
                    tracing::warn!(file = %id, path = %path.display(), "cannot watch: {}", e);
                    state.unwatchable.insert(*id, path.clone());
                    failed.push(*id);
                }
            }
        }
        if !failed.is_empty() {
            let _ = self.shared.changes.send(PathChange::Removed(failed));
        }
    }

    pub fn remove_paths(&self, files: &[FileId]) {
        let mut state = self.shared.lock();
        for id in files {
            state.remove(*id);
            state.unwatchable.remove(id);
        }
    }

    /// Whether watching the file failed
    pub fn is_unwatchable(&self, file: FileId) -> bool {
        self.shared.lock().unwatchable.contains_key(&file)
    }

    pub fn is_watched(&self, file: FileId) -> bool {
        self.shared.lock().by_id.contains_key(&file)
    }

    pub fn watched_count(&self) -> usize {
        self.shared.lock().by_id.len()
    }

    /// Stop the debounce thread; pending raw events are dropped
    pub fn shutdown(&self) {
        self.shutdown.lock().unwrap_or_else(PoisonError::into_inner).take();
        let thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::warn!("path watcher thread panicked");
            }
        }
    }
}

impl Drop for PathWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
