//! Task scheduler
//!
//! Runs queued indexing tasks on a fixed set of worker threads, never more at
//! once than the collector pool holds. Every dispatched task owns a
//! [`TaskSlot`] that the worker marks finished; `free_slots` reclaims finished
//! slots and returns their collector to the pool.

use super::{IndexingTask, TaskQueue};
use crate::collector::{BoxedCollector, CollectorFactory, CollectorPool, GeneratedFiles, Pooled};
use crate::filepath::{FileId, FilePathCaching};
use crate::project::ProjectPartId;
use crate::status::FileStatus;
use crate::storage::{ApplyOutcome, SymbolStorage};
use crate::Result;
use crossbeam::channel::{self, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

/// Times a task is put back in the queue when no collector can be built
const COLLECTOR_RETRIES: u32 = 3;

/// How a single task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Indexed { symbols: usize, locations: usize },
    /// Stored records already matched
    Unchanged,
    /// The file left its project part while the task ran
    Stale,
    ParseFailed(String),
    StorageFailed(String),
    CollectorUnavailable(String),
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskOutcome::ParseFailed(_) | TaskOutcome::StorageFailed(_) | TaskOutcome::CollectorUnavailable(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub file: FileId,
    pub project_part: ProjectPartId,
    pub outcome: TaskOutcome,
}

/// Counters since the scheduler started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub dispatched: u64,
    pub indexed: u64,
    pub unchanged: u64,
    pub stale: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    indexed: AtomicU64,
    unchanged: AtomicU64,
    stale: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Indexed { .. } => &self.indexed,
            TaskOutcome::Unchanged => &self.unchanged,
            TaskOutcome::Stale => &self.stale,
            _ => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            dispatched: self.dispatched.load(Ordering::SeqCst),
            indexed: self.indexed.load(Ordering::SeqCst),
            unchanged: self.unchanged.load(Ordering::SeqCst),
            stale: self.stale.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

struct Completion {
    collector: Pooled<BoxedCollector>,
    /// The collector panicked and must not be reused
    poisoned: bool,
}

#[derive(Default)]
struct SlotState {
    finished: bool,
    completion: Option<Completion>,
}

/// Completion signal of one dispatched task
pub struct TaskSlot {
    file: FileId,
    state: Mutex<SlotState>,
    done: Condvar,
}

impl TaskSlot {
    fn new(file: FileId) -> Self {
        Self {
            file,
            state: Mutex::new(SlotState::default()),
            done: Condvar::new(),
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    fn finish(&self, completion: Completion) {
        let mut state = self.lock();
        state.finished = true;
        state.completion = Some(completion);
        drop(state);
        self.done.notify_all();
    }

    /// Block until the task has finished
    fn wait(&self) {
        let mut state = self.lock();
        while !state.finished {
            state = self.done.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Take the collector of a finished task; `None` while still running
    fn reclaim(&self) -> Option<Completion> {
        let mut state = self.lock();
        if state.finished { state.completion.take() } else { None }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Job {
    task: IndexingTask,
    collector: Pooled<BoxedCollector>,
    slot: Arc<TaskSlot>,
}

struct SchedulerState {
    enabled: bool,
    /// Number of `sync_tasks` calls in progress
    syncing: usize,
    slots: Vec<Arc<TaskSlot>>,
}

struct Shared {
    state: Mutex<SchedulerState>,
    queue: Arc<Mutex<TaskQueue>>,
    pool: Arc<CollectorPool<BoxedCollector>>,
    jobs: Mutex<Option<Sender<Job>>>,
    reports: Mutex<Option<Sender<TaskReport>>>,
    paths: Arc<dyn FilePathCaching>,
    storage: Arc<SymbolStorage>,
    generated: GeneratedFiles,
    counters: Counters,
    /// Failed collector constructions per file since its last dispatch
    retries: Mutex<HashMap<FileId, u32>>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> MutexGuard<'_, TaskQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self) -> usize {
        self.free_slots();

        let capacity = self.pool.capacity();
        let mut dispatched = 0;
        let mut state = self.lock_state();
        while state.enabled && state.syncing == 0 && state.slots.len() < capacity {
            let Some(task) = self.lock_queue().take(1).pop() else {
                break;
            };

            // Every slot holds one collector, so a free slot means a free collector
            let collector = match self.pool.acquire() {
                Ok(collector) => collector,
                Err(e) => {
                    if self.requeue(&task) {
                        tracing::warn!(file = %task.file_id, part = %task.project_part, "no collector available, task requeued: {}", e);
                    } else {
                        tracing::warn!(file = %task.file_id, part = %task.project_part, "no collector available, task dropped: {}", e);
                        self.counters.failed.fetch_add(1, Ordering::SeqCst);
                        self.report(&task, TaskOutcome::CollectorUnavailable(e.to_string()));
                    }
                    break;
                }
            };
            self.lock_retries().remove(&task.file_id);

            let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(sender) = jobs.as_ref() else {
                self.pool.release(collector);
                break;
            };
            let slot = Arc::new(TaskSlot::new(task.file_id));
            tracing::debug!(file = %task.file_id, part = %task.project_part, "dispatching task");
            let job = Job {
                task,
                collector,
                slot: slot.clone(),
            };
            if let Err(channel::SendError(job)) = sender.send(job) {
                self.pool.release(job.collector);
                break;
            }
            drop(jobs);

            state.slots.push(slot);
            self.counters.dispatched.fetch_add(1, Ordering::SeqCst);
            dispatched += 1;
        }
        dispatched
    }

    /// Put a task back after a failed collector construction, unless it ran
    /// out of retries or a newer task for the file is already queued
    fn requeue(&self, task: &IndexingTask) -> bool {
        {
            let mut retries = self.lock_retries();
            let attempts = retries.entry(task.file_id).or_insert(0);
            *attempts += 1;
            if *attempts > COLLECTOR_RETRIES {
                retries.remove(&task.file_id);
                return false;
            }
        }
        let mut queue = self.lock_queue();
        if !queue.contains(task.file_id) {
            queue.add_or_update([task.clone()]);
        }
        true
    }

    fn lock_retries(&self) -> MutexGuard<'_, HashMap<FileId, u32>> {
        self.retries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn free_slots(&self) -> usize {
        let mut state = self.lock_state();
        let before = state.slots.len();
        state.slots.retain(|slot| match slot.reclaim() {
            Some(Completion { collector, poisoned }) => {
                if poisoned {
                    self.pool.discard(collector);
                } else {
                    self.pool.release(collector);
                }
                false
            }
            None => !slot.is_finished(),
        });
        before - state.slots.len()
    }

    fn sync_tasks(&self) {
        let pending = {
            let mut state = self.lock_state();
            state.syncing += 1;
            state.slots.clone()
        };
        for slot in &pending {
            slot.wait();
        }
        let resume = {
            let mut state = self.lock_state();
            state.syncing -= 1;
            state.enabled && state.syncing == 0
        };
        self.free_slots();
        if resume {
            self.dispatch();
        }
    }

    fn report(&self, task: &IndexingTask, outcome: TaskOutcome) {
        let reports = self.reports.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = reports.as_ref() {
            // A dropped receiver only means nobody is listening
            let _ = sender.send(TaskReport {
                file: task.file_id,
                project_part: task.project_part.clone(),
                outcome,
            });
        }
    }

    /// Resolve, stat, collect and store one file. Returns the outcome and
    /// whether the collector panicked.
    fn run(&self, task: &IndexingTask, collector: &mut BoxedCollector) -> (TaskOutcome, bool) {
        let path = match self.paths.resolve(task.file_id) {
            Ok(path) => path,
            Err(e) => return (TaskOutcome::ParseFailed(e.to_string()), false),
        };
        let status = match FileStatus::current(&path, &self.generated) {
            Ok(status) => status,
            Err(e) => return (TaskOutcome::ParseFailed(format!("{}: {}", path.display(), e)), false),
        };

        let collected = panic::catch_unwind(AssertUnwindSafe(|| collector.collect(&path, &task.arguments)));
        let results = match collected {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => return (TaskOutcome::ParseFailed(e.to_string()), false),
            Err(_) => {
                let message = format!("collector panicked on {}", path.display());
                return (TaskOutcome::ParseFailed(message), true);
            }
        };

        let outcome = match self.storage.apply_results(task, status, &results) {
            Ok(ApplyOutcome::Applied { symbols, locations }) => TaskOutcome::Indexed { symbols, locations },
            Ok(ApplyOutcome::Unchanged) => TaskOutcome::Unchanged,
            Ok(ApplyOutcome::Stale) => TaskOutcome::Stale,
            Err(e) => TaskOutcome::StorageFailed(e.to_string()),
        };
        (outcome, false)
    }

    fn work(&self, jobs: Receiver<Job>) {
        for Job { task, mut collector, slot } in jobs.iter() {
            let (outcome, poisoned) = self.run(&task, &mut collector);
            match &outcome {
                TaskOutcome::Indexed { symbols, locations } => {
                    tracing::debug!(file = %task.file_id, part = %task.project_part, symbols, locations, "indexed")
                }
                TaskOutcome::Unchanged => tracing::debug!(file = %task.file_id, "results unchanged"),
                TaskOutcome::Stale => {
                    tracing::debug!(file = %task.file_id, part = %task.project_part, "discarded stale results")
                }
                TaskOutcome::StorageFailed(message) => {
                    tracing::error!(file = %task.file_id, part = %task.project_part, "storing results failed: {}", message)
                }
                TaskOutcome::ParseFailed(message) | TaskOutcome::CollectorUnavailable(message) => {
                    tracing::warn!(file = %task.file_id, part = %task.project_part, "indexing failed: {}", message)
                }
            }

            self.counters.record(&outcome);
            self.report(&task, outcome);
            slot.finish(Completion { collector, poisoned });
            self.dispatch();
        }
    }
}

/// Dispatches queued tasks onto a bounded set of workers
pub struct TaskScheduler {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskScheduler {
    /// Start one worker per collector slot
    pub fn new(
        concurrency: usize,
        factory: CollectorFactory,
        queue: Arc<Mutex<TaskQueue>>,
        paths: Arc<dyn FilePathCaching>,
        storage: Arc<SymbolStorage>,
        generated: GeneratedFiles,
    ) -> Result<Self> {
        let pool = Arc::new(CollectorPool::new(concurrency, move || factory()));
        let (sender, receiver) = channel::unbounded();
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState {
                enabled: true,
                syncing: 0,
                slots: Vec::new(),
            }),
            queue,
            pool: pool.clone(),
            jobs: Mutex::new(Some(sender)),
            reports: Mutex::new(None),
            paths,
            storage,
            generated,
            counters: Counters::default(),
            retries: Mutex::new(HashMap::new()),
        });

        let scheduler = Self {
            shared: shared.clone(),
            workers: Mutex::new(Vec::new()),
        };
        for index in 0..pool.capacity() {
            let shared = shared.clone();
            let receiver = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("symdex-worker-{}", index))
                .spawn(move || shared.work(receiver))?;
            scheduler.lock_workers().push(handle);
        }
        tracing::debug!(workers = pool.capacity(), "task scheduler started");
        Ok(scheduler)
    }

    /// Launch queued tasks into free slots; returns how many were launched
    pub fn dispatch(&self) -> usize {
        self.shared.dispatch()
    }

    /// Reclaim finished slots; returns how many were reclaimed
    pub fn free_slots(&self) -> usize {
        self.shared.free_slots()
    }

    /// Wait for every task running at call time. Nothing is dispatched while
    /// waiting.
    pub fn sync_tasks(&self) {
        self.shared.sync_tasks()
    }

    /// Stop dispatching; running tasks finish normally
    pub fn disable(&self) {
        self.shared.lock_state().enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.lock_state().enabled
    }

    /// Dispatched tasks whose slot has not been reclaimed yet
    pub fn pending_count(&self) -> usize {
        self.shared.lock_state().slots.len()
    }

    /// Nothing running and nothing that could still be dispatched
    pub fn is_idle(&self) -> bool {
        let state = self.shared.lock_state();
        state.slots.is_empty() && (!state.enabled || self.shared.lock_queue().is_empty())
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.counters.snapshot()
    }

    pub fn pool(&self) -> &Arc<CollectorPool<BoxedCollector>> {
        &self.shared.pool
    }

    /// Receive a report for every finished task from now on
    pub fn subscribe(&self) -> Receiver<TaskReport> {
        let (sender, receiver) = channel::unbounded();
        *self.shared.reports.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
        receiver
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.disable();
        while self.pending_count() > 0 {
            self.sync_tasks();
            self.free_slots();
        }
        self.shared.jobs.lock().unwrap_or_else(PoisonError::into_inner).take();
        for handle in self.lock_workers().drain(..) {
            if handle.join().is_err() {
                tracing::warn!("indexing worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{CollectorScript, ScriptedCollector};
    use crate::filepath::FilePathCache;
    use crate::storage::Database;
    use crate::symbol::{CollectedSymbols, LocationRole, SymbolKind};
    use crate::Error;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Factory that fails its first `failures` constructions
    fn flaky_factory(script: Arc<CollectorScript>, failures: usize) -> CollectorFactory {
        let attempts = AtomicUsize::new(0);
        Arc::new(move || {
            if attempts.fetch_add(1, Ordering::SeqCst) < failures {
                return Err(Error::Collector("collector runtime not ready".to_string()));
            }
            Ok(Box::new(ScriptedCollector::new(script.clone())) as BoxedCollector)
        })
    }

    struct Fixture {
        dir: tempfile::TempDir,
        script: Arc<CollectorScript>,
        paths: Arc<FilePathCache>,
        storage: Arc<SymbolStorage>,
        queue: Arc<Mutex<TaskQueue>>,
        scheduler: TaskScheduler,
    }

    impl Fixture {
        fn new(concurrency: usize) -> Self {
            Self::with_factory(concurrency, ScriptedCollector::factory)
        }

        fn with_factory(concurrency: usize, factory: impl FnOnce(Arc<CollectorScript>) -> CollectorFactory) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let database = Arc::new(Database::open_in_memory().unwrap());
            let paths = Arc::new(FilePathCache::new(database.clone()));
            let storage = Arc::new(SymbolStorage::new(database));
            let queue = Arc::new(Mutex::new(TaskQueue::new()));
            let script = CollectorScript::new();
            let scheduler = TaskScheduler::new(
                concurrency,
                factory(script.clone()),
                queue.clone(),
                paths.clone(),
                storage.clone(),
                GeneratedFiles::new(),
            )
            .unwrap();
            Self {
                dir,
                script,
                paths,
                storage,
                queue,
                scheduler,
            }
        }

        /// Create files, register them in one part and enqueue a task each
        fn enqueue(&self, names: &[&str]) -> Vec<FileId> {
            let files: Vec<PathBuf> = names
                .iter()
                .map(|name| {
                    let path = self.dir.path().join(name);
                    std::fs::write(&path, format!("{}\n", name)).unwrap();
                    path
                })
                .collect();
            let ids = self.paths.intern_all(&files).unwrap();
            let part = ProjectPartId::new("part");
            self.storage.update_project_part(&part, &[], &ids).unwrap();
            self.queue
                .lock()
                .unwrap()
                .add_or_update(ids.iter().map(|id| IndexingTask::new(*id, part.clone(), vec![])));
            ids
        }

        fn drain(&self) {
            while !self.scheduler.is_idle() {
                self.scheduler.sync_tasks();
                self.scheduler.free_slots();
                self.scheduler.dispatch();
            }
        }
    }

    #[test]
    fn test_runs_queued_tasks() {
        let fixture = Fixture::new(2);
        let reports = fixture.scheduler.subscribe();
        let ids = fixture.enqueue(&["a.c", "b.c"]);

        fixture.scheduler.dispatch();
        fixture.drain();

        let stats = fixture.scheduler.stats();
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.indexed, 2);
        assert_eq!(reports.try_iter().count(), 2);
        for id in ids {
            assert_eq!(fixture.storage.symbols_in_file(id).unwrap().len(), 1);
        }
        assert_eq!(fixture.scheduler.pool().available(), fixture.scheduler.pool().capacity());
        assert!(fixture.queue.lock().unwrap().is_empty());
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let fixture = Fixture::new(2);
        fixture.script.set_delay(Duration::from_millis(20));
        fixture.enqueue(&["a.c", "b.c", "c.c", "d.c", "e.c", "f.c"]);

        assert_eq!(fixture.scheduler.dispatch(), 2);
        assert!(fixture.scheduler.pending_count() <= 2);
        fixture.drain();

        assert_eq!(fixture.script.call_count(), 6);
        assert!(fixture.script.max_concurrency() <= 2);
        assert_eq!(fixture.scheduler.stats().indexed, 6);
        assert_eq!(fixture.scheduler.pool().available(), 2);
    }

    #[test]
    fn test_disable_stops_dispatch_but_finishes_running() {
        let fixture = Fixture::new(1);
        fixture.script.hold();
        fixture.enqueue(&["a.c", "b.c", "c.c"]);

        assert_eq!(fixture.scheduler.dispatch(), 1);
        assert!(fixture.script.wait_for_calls(1, Duration::from_secs(5)));
        fixture.scheduler.disable();
        fixture.script.release();
        fixture.scheduler.sync_tasks();
        fixture.scheduler.free_slots();

        assert_eq!(fixture.scheduler.dispatch(), 0);
        assert!(fixture.scheduler.is_idle());
        assert_eq!(fixture.script.call_count(), 1);
        assert_eq!(fixture.queue.lock().unwrap().len(), 2);
        assert_eq!(fixture.scheduler.stats().indexed, 1);
    }

    #[test]
    fn test_failures_are_isolated() {
        let fixture = Fixture::new(2);
        let reports = fixture.scheduler.subscribe();
        let dir = fixture.dir.path().to_path_buf();
        fixture.script.fail(dir.join("bad.c"));
        fixture.script.panic_on(dir.join("boom.c"));
        let ids = fixture.enqueue(&["bad.c", "boom.c", "good.c"]);

        fixture.scheduler.dispatch();
        fixture.drain();

        let outcomes: Vec<_> = reports.try_iter().collect();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|r| r.outcome.is_failure()).count(), 2);
        let stats = fixture.scheduler.stats();
        assert_eq!((stats.indexed, stats.failed), (1, 2));

        assert!(fixture.storage.fetch_indexed_file(ids[0]).unwrap().is_none());
        assert!(fixture.storage.fetch_indexed_file(ids[2]).unwrap().is_some());
        assert_eq!(fixture.scheduler.pool().available(), 2);
    }

    #[test]
    fn test_storage_failure_is_isolated() {
        let fixture = Fixture::new(2);
        let ids = fixture.enqueue(&["broken.c", "fine.c"]);
        fixture.scheduler.dispatch();
        fixture.drain();
        let indexed = fixture.storage.fetch_indexed_file(ids[0]).unwrap().unwrap();

        // A location pointing past the symbol list cannot be stored
        let broken = fixture.dir.path().join("broken.c");
        let mut results = CollectedSymbols::new();
        let symbol = results.add_symbol("line:changed", SymbolKind::Callable, "changed");
        results.add_location(symbol, 1, 1, LocationRole::Definition);
        results.add_location(symbol + 5, 2, 1, LocationRole::Reference);
        fixture.script.set_results(&broken, results);
        std::fs::write(&broken, "changed\nagain\n").unwrap();
        std::fs::write(fixture.dir.path().join("fine.c"), "fine\nstill\n").unwrap();
        let part = ProjectPartId::new("part");
        fixture.queue.lock().unwrap().add_or_update(
            ids.iter().map(|id| IndexingTask::new(*id, part.clone(), vec![])),
        );
        let reports = fixture.scheduler.subscribe();

        fixture.scheduler.dispatch();
        fixture.drain();

        let outcomes: Vec<TaskReport> = reports.try_iter().collect();
        let failed: Vec<&TaskReport> = outcomes.iter().filter(|r| r.outcome.is_failure()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file, ids[0]);
        assert_eq!(failed[0].project_part, part);
        assert!(matches!(failed[0].outcome, TaskOutcome::StorageFailed(_)));

        // The earlier records of the failed file are intact; its sibling was indexed
        let symbols = fixture.storage.symbols_in_file(ids[0]).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "broken.c");
        assert_eq!(fixture.storage.fetch_indexed_file(ids[0]).unwrap().unwrap(), indexed);
        assert_eq!(fixture.storage.symbols_in_file(ids[1]).unwrap().len(), 2);
        assert_eq!(fixture.scheduler.pool().available(), 2);
    }

    #[test]
    fn test_collector_construction_is_retried() {
        let fixture = Fixture::with_factory(1, |script| flaky_factory(script, 2));
        let reports = fixture.scheduler.subscribe();
        let ids = fixture.enqueue(&["a.c"]);

        fixture.scheduler.dispatch();
        fixture.drain();

        let stats = fixture.scheduler.stats();
        assert_eq!((stats.indexed, stats.failed), (1, 0));
        assert!(reports.try_iter().all(|r| !r.outcome.is_failure()));
        assert_eq!(fixture.storage.symbols_in_file(ids[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_collector_unavailable_gives_up() {
        let fixture = Fixture::with_factory(1, |script| flaky_factory(script, usize::MAX));
        let reports = fixture.scheduler.subscribe();
        let ids = fixture.enqueue(&["a.c", "b.c"]);

        fixture.scheduler.dispatch();
        fixture.drain();

        let outcomes: Vec<TaskReport> = reports.try_iter().collect();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|r| matches!(r.outcome, TaskOutcome::CollectorUnavailable(_))));
        let mut files: Vec<FileId> = outcomes.iter().map(|r| r.file).collect();
        files.sort();
        assert_eq!(files, ids);
        assert_eq!(fixture.scheduler.stats().failed, 2);
        assert_eq!(fixture.scheduler.stats().dispatched, 0);
        assert!(fixture.queue.lock().unwrap().is_empty());
        assert_eq!(fixture.scheduler.pool().available(), 1);
    }

    #[test]
    fn test_missing_file_and_stale_task() {
        let fixture = Fixture::new(1);
        let reports = fixture.scheduler.subscribe();
        let ids = fixture.enqueue(&["gone.c", "moved.c"]);
        std::fs::remove_file(fixture.dir.path().join("gone.c")).unwrap();
        // moved.c no longer belongs to the part its task was created for
        fixture
            .storage
            .update_project_part(&ProjectPartId::new("other"), &[], &[ids[1]])
            .unwrap();

        fixture.scheduler.dispatch();
        fixture.drain();

        let outcomes: Vec<_> = reports.try_iter().map(|r| r.outcome).collect();
        assert!(matches!(outcomes[0], TaskOutcome::ParseFailed(_)));
        assert_eq!(outcomes[1], TaskOutcome::Stale);
        assert!(fixture.storage.symbols_in_file(ids[1]).unwrap().is_empty());
    }

    #[test]
    fn test_drop_joins_workers() {
        let fixture = Fixture::new(2);
        fixture.script.set_delay(Duration::from_millis(10));
        fixture.enqueue(&["a.c", "b.c"]);
        fixture.scheduler.dispatch();

        let Fixture { scheduler, script, .. } = fixture;
        drop(scheduler);
        assert_eq!(script.active(), 0);
        assert_eq!(script.call_count(), 2);
    }
}
