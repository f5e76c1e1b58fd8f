use super::{SchedulerStats, SymbolIndexer, TaskQueue, TaskReport, TaskScheduler, UpdateReport};
use crate::collector::{CollectorFactory, GeneratedFiles, tree_sitter_factory};
use crate::config::{IndexerConfig, ensure_db_dir};
use crate::filepath::FilePathCache;
use crate::project::{ProjectPartConfiguration, ProjectPartId};
use crate::status::FileStatusCache;
use crate::storage::{Database, SymbolStorage};
use crate::watcher::PathWatcher;
use crate::Result;
use std::path::PathBuf;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Owns the indexing components and the thread that feeds watcher
/// notifications to the indexer
pub struct SymbolIndexing {
    paths: Arc<FilePathCache>,
    storage: Arc<SymbolStorage>,
    scheduler: Arc<TaskScheduler>,
    watcher: Arc<PathWatcher>,
    indexer: Arc<SymbolIndexer>,
    generated: GeneratedFiles,
    stop: Option<Sender<()>>,
    control: Option<JoinHandle<()>>,
}

impl SymbolIndexing {
    /// Open the configured database and watch with the native backend,
    /// collecting with tree-sitter
    pub fn open(config: &IndexerConfig) -> Result<Self> {
        ensure_db_dir(&config.database)?;
        let database = Arc::new(Database::open(&config.database)?);
        let watcher = PathWatcher::new(config.debounce())?;
        tracing::info!(database = %config.database.display(), concurrency = config.concurrency(), "opened index");
        let generated = GeneratedFiles::new();
        let factory = tree_sitter_factory(generated.clone());
        Self::with_collector(database, generated, factory, watcher, config.concurrency())
    }

    /// Wire the components around a collector factory. The factory's
    /// collectors should read `generated` before the disk.
    pub fn with_collector(
        database: Arc<Database>,
        generated: GeneratedFiles,
        factory: CollectorFactory,
        watcher: PathWatcher,
        concurrency: usize,
    ) -> Result<Self> {
        let paths = Arc::new(FilePathCache::new(database.clone()));
        let storage = Arc::new(SymbolStorage::new(database));
        let statuses = Arc::new(FileStatusCache::with_generated_files(paths.clone(), generated.clone()));
        let queue = Arc::new(Mutex::new(TaskQueue::new()));
        let scheduler = Arc::new(TaskScheduler::new(
            concurrency,
            factory,
            queue.clone(),
            paths.clone(),
            storage.clone(),
            generated.clone(),
        )?);
        let watcher = Arc::new(watcher);
        let indexer = Arc::new(SymbolIndexer::new(
            paths.clone(),
            storage.clone(),
            statuses,
            queue,
            scheduler.clone(),
            watcher.clone(),
            generated.clone(),
        ));

        let (stop, stopped) = channel::bounded::<()>(1);
        let control = {
            let indexer = indexer.clone();
            let notifications = watcher.notifications();
            std::thread::Builder::new()
                .name("symdex-control".to_string())
                .spawn(move || {
                    loop {
                        channel::select! {
                            recv(notifications) -> change => match change {
                                Ok(change) => {
                                    if let Err(e) = indexer.handle_change(change) {
                                        tracing::error!("handling file change failed: {}", e);
                                    }
                                }
                                Err(_) => break,
                            },
                            recv(stopped) -> _ => break,
                        }
                    }
                })?
        };

        Ok(Self {
            paths,
            storage,
            scheduler,
            watcher,
            indexer,
            generated,
            stop: Some(stop),
            control: Some(control),
        })
    }

    pub fn update_project_parts(&self, parts: Vec<ProjectPartConfiguration>) -> UpdateReport {
        self.indexer.update_project_parts(parts)
    }

    pub fn remove_project_parts(&self, ids: &[ProjectPartId]) -> Result<usize> {
        self.indexer.remove_project_parts(ids)
    }

    pub fn update_generated_files(&self, files: Vec<(PathBuf, String)>) -> Result<usize> {
        self.indexer.update_generated_files(files)
    }

    pub fn remove_generated_files(&self, paths: &[PathBuf]) -> Result<usize> {
        self.indexer.remove_generated_files(paths)
    }

    /// Block until no task is running or dispatchable
    pub fn wait_until_idle(&self) {
        loop {
            self.scheduler.sync_tasks();
            self.scheduler.free_slots();
            self.scheduler.dispatch();
            if self.scheduler.is_idle() {
                break;
            }
        }
    }

    /// Stop dispatching and wait for every running task. Queued tasks stay
    /// queued.
    pub fn sync_tasks(&self) {
        self.scheduler.disable();
        while self.scheduler.pending_count() > 0 {
            self.scheduler.sync_tasks();
            self.scheduler.free_slots();
        }
    }

    pub fn storage(&self) -> &Arc<SymbolStorage> {
        &self.storage
    }

    pub fn file_paths(&self) -> &Arc<FilePathCache> {
        &self.paths
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    pub fn watcher(&self) -> &Arc<PathWatcher> {
        &self.watcher
    }

    pub fn generated_files(&self) -> &GeneratedFiles {
        &self.generated
    }

    pub fn indexer(&self) -> &Arc<SymbolIndexer> {
        &self.indexer
    }

    pub fn subscribe(&self) -> Receiver<TaskReport> {
        self.scheduler.subscribe()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }
}

impl Drop for SymbolIndexing {
    fn drop(&mut self) {
        self.sync_tasks();
        self.watcher.shutdown();
        self.stop.take();
        if let Some(control) = self.control.take() {
            if control.join().is_err() {
                tracing::warn!("control thread panicked");
            }
        }
        tracing::debug!("indexing stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{CollectorScript, ScriptedCollector};
    use crate::filepath::{FileId, FilePathCaching};
    use crate::watcher::WatchBackend;
    use crate::Error;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    struct Fixture {
        dir: tempfile::TempDir,
        script: Arc<CollectorScript>,
        events: Sender<PathBuf>,
        indexing: SymbolIndexing,
    }

    impl Fixture {
        fn new(concurrency: usize) -> Self {
            let database = Arc::new(Database::open_in_memory().unwrap());
            Self::with_database(tempfile::tempdir().unwrap(), database, concurrency)
        }

        fn with_database(dir: tempfile::TempDir, database: Arc<Database>, concurrency: usize) -> Self {
            let (watcher, events) = PathWatcher::manual(Duration::from_millis(10)).unwrap();
            Self::with_watcher(dir, database, watcher, events, concurrency)
        }

        fn with_watcher(
            dir: tempfile::TempDir,
            database: Arc<Database>,
            watcher: PathWatcher,
            events: Sender<PathBuf>,
            concurrency: usize,
        ) -> Self {
            let script = CollectorScript::new();
            let indexing = SymbolIndexing::with_collector(
                database,
                GeneratedFiles::new(),
                ScriptedCollector::factory(script.clone()),
                watcher,
                concurrency,
            )
            .unwrap();
            Self {
                dir,
                script,
                events,
                indexing,
            }
        }

        fn file(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        fn id(&self, path: &Path) -> FileId {
            self.indexing.file_paths().intern(path).unwrap()
        }

        fn symbol_names(&self, path: &Path) -> Vec<String> {
            let id = self.id(path);
            self.indexing
                .storage()
                .symbols_in_file(id)
                .unwrap()
                .into_iter()
                .map(|s| s.name)
                .collect()
        }
    }

    /// Refuses to watch directories named `locked`
    struct LockedDirectories;

    impl WatchBackend for LockedDirectories {
        fn watch_directory(&mut self, directory: &Path) -> Result<()> {
            if directory.ends_with("locked") {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "permission denied",
                )));
            }
            Ok(())
        }

        fn unwatch_directory(&mut self, _directory: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn part(id: &str, files: &[&PathBuf]) -> ProjectPartConfiguration {
        ProjectPartConfiguration::new(id, files.iter().map(|f| (*f).clone()).collect())
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_initial_index() {
        let fixture = Fixture::new(2);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\ngamma\n");

        let report = fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        assert_eq!(report.enqueued, 2);
        assert!(report.rejected.is_empty());
        fixture.indexing.wait_until_idle();

        assert_eq!(fixture.symbol_names(&a), vec!["alpha"]);
        assert_eq!(fixture.symbol_names(&b), vec!["beta", "gamma"]);
        assert_eq!(fixture.indexing.stats().indexed, 2);
        assert!(fixture.indexing.watcher().is_watched(fixture.id(&a)));
    }

    #[test]
    fn test_repeated_update_does_nothing() {
        let fixture = Fixture::new(2);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        let parts = vec![part("P", &[&a, &b]).with_arguments(&["-O2"])];

        fixture.indexing.update_project_parts(parts.clone());
        fixture.indexing.wait_until_idle();
        let writes = fixture.indexing.storage().write_count();
        let calls = fixture.script.call_count();

        let report = fixture.indexing.update_project_parts(parts);
        fixture.indexing.wait_until_idle();
        assert_eq!(report.enqueued, 0);
        assert_eq!(report.removed, 0);
        assert_eq!(fixture.indexing.storage().write_count(), writes);
        assert_eq!(fixture.script.call_count(), calls);
    }

    #[test]
    fn test_pending_task_is_replaced() {
        let fixture = Fixture::new(1);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        let c = fixture.file("c.c", "gamma\n");
        fixture.script.hold();

        fixture
            .indexing
            .update_project_parts(vec![part("P", &[&a, &b, &c]).with_arguments(&["-O0"])]);
        assert!(fixture.script.wait_for_calls(1, Duration::from_secs(5)));
        let report = fixture
            .indexing
            .update_project_parts(vec![part("P", &[&a, &b, &c]).with_arguments(&["-O2"])]);
        assert_eq!(report.enqueued, 3);
        fixture.script.release();
        fixture.indexing.wait_until_idle();

        // The running task for a is not interrupted; the queued ones use the newest arguments
        assert_eq!(fixture.script.calls_for(&a), 2);
        assert_eq!(fixture.script.calls_for(&b), 1);
        assert_eq!(fixture.script.calls_for(&c), 1);
        let last = fixture.script.calls().pop().unwrap();
        assert_eq!(last, (a.clone(), vec!["-O2".to_string()]));
        assert!(fixture
            .script
            .calls()
            .iter()
            .filter(|(path, _)| *path == b)
            .all(|(_, args)| args == &vec!["-O2".to_string()]));
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let fixture = Fixture::new(2);
        fixture.script.set_delay(Duration::from_millis(10));
        let files: Vec<PathBuf> = (0..8)
            .map(|i| fixture.file(&format!("f{}.c", i), &format!("symbol{}\n", i)))
            .collect();
        let refs: Vec<&PathBuf> = files.iter().collect();

        fixture.indexing.update_project_parts(vec![part("P", &refs)]);
        fixture.indexing.wait_until_idle();

        assert_eq!(fixture.script.call_count(), 8);
        assert!(fixture.script.max_concurrency() <= 2);
        assert_eq!(fixture.indexing.stats().indexed, 8);
    }

    #[test]
    fn test_sync_tasks_drains_pool() {
        let fixture = Fixture::new(2);
        fixture.script.set_delay(Duration::from_millis(10));
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        let c = fixture.file("c.c", "gamma\n");

        fixture.indexing.update_project_parts(vec![part("P", &[&a, &b, &c])]);
        fixture.indexing.sync_tasks();

        let pool = fixture.indexing.scheduler().pool();
        assert_eq!(pool.available(), pool.capacity());
        assert_eq!(fixture.indexing.scheduler().pending_count(), 0);
        assert_eq!(fixture.script.active(), 0);
        assert!(!fixture.indexing.scheduler().is_enabled());
    }

    #[test]
    fn test_file_removed_from_part() {
        let fixture = Fixture::new(2);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        fixture.indexing.wait_until_idle();
        let calls = fixture.script.call_count();

        let report = fixture.indexing.update_project_parts(vec![part("P", &[&a])]);
        fixture.indexing.wait_until_idle();

        assert_eq!(report.removed, 1);
        assert_eq!(report.enqueued, 0);
        let b_id = fixture.id(&b);
        assert!(fixture.symbol_names(&b).is_empty());
        assert!(fixture.indexing.storage().fetch_indexed_file(b_id).unwrap().is_none());
        assert!(!fixture.indexing.watcher().is_watched(b_id));
        assert_eq!(fixture.symbol_names(&a), vec!["alpha"]);
        assert_eq!(fixture.script.call_count(), calls);
    }

    #[test]
    fn test_modified_file_is_reindexed_once() {
        let fixture = Fixture::new(2);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        fixture.indexing.wait_until_idle();
        let calls = fixture.script.call_count();

        std::fs::write(&a, "alpha\ndelta\n").unwrap();
        for _ in 0..3 {
            fixture.events.send(a.clone()).unwrap();
        }

        assert!(fixture.script.wait_for_calls(calls + 1, Duration::from_secs(5)));
        fixture.indexing.wait_until_idle();
        std::thread::sleep(Duration::from_millis(50));
        fixture.indexing.wait_until_idle();

        assert_eq!(fixture.script.call_count(), calls + 1);
        assert_eq!(fixture.script.calls_for(&b), 1);
        wait_for(|| fixture.symbol_names(&a) == vec!["alpha", "delta"]);
    }

    #[test]
    fn test_deleted_file_is_retired() {
        let fixture = Fixture::new(2);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        fixture.indexing.wait_until_idle();

        std::fs::remove_file(&b).unwrap();
        fixture.events.send(b.clone()).unwrap();

        let b_id = fixture.id(&b);
        wait_for(|| fixture.indexing.indexer().owner_of(b_id).is_none());
        assert!(fixture.symbol_names(&b).is_empty());
        assert!(fixture.indexing.storage().fetch_indexed_file(b_id).unwrap().is_none());
        assert_eq!(fixture.symbol_names(&a), vec!["alpha"]);

        // Restoring the file and resubmitting the part indexes it again
        std::fs::write(&b, "beta\n").unwrap();
        let report = fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        assert_eq!(report.enqueued, 1);
        fixture.indexing.wait_until_idle();
        assert_eq!(fixture.symbol_names(&b), vec!["beta"]);
    }

    #[test]
    fn test_failures_are_isolated() {
        let fixture = Fixture::new(2);
        let reports = fixture.indexing.subscribe();
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        let c = fixture.file("c.c", "gamma\n");
        fixture.script.fail(b.clone());

        fixture.indexing.update_project_parts(vec![part("P", &[&a, &b, &c])]);
        fixture.indexing.wait_until_idle();

        assert_eq!(fixture.symbol_names(&a), vec!["alpha"]);
        assert!(fixture.symbol_names(&b).is_empty());
        assert_eq!(fixture.symbol_names(&c), vec!["gamma"]);
        let failed: Vec<_> = reports.try_iter().filter(|r| r.outcome.is_failure()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file, fixture.id(&b));

        // A failed file stays a candidate for the next update
        fixture.script.clear_failure(&b);
        let report = fixture.indexing.update_project_parts(vec![part("P", &[&a, &b, &c])]);
        assert_eq!(report.enqueued, 1);
        fixture.indexing.wait_until_idle();
        assert_eq!(fixture.symbol_names(&b), vec!["beta"]);
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let fixture = Fixture::new(1);
        let a = fixture.file("a.c", "alpha\n");
        let missing = fixture.dir.path().join("later.c");

        let report = fixture.indexing.update_project_parts(vec![part("P", &[&a, &missing])]);
        assert_eq!(report.enqueued, 1);
        fixture.indexing.wait_until_idle();

        std::fs::write(&missing, "late\n").unwrap();
        fixture.events.send(missing.clone()).unwrap();
        wait_for(|| fixture.symbol_names(&missing) == vec!["late"]);
    }

    #[test]
    fn test_invalid_parts_are_rejected() {
        let fixture = Fixture::new(1);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");

        let report = fixture.indexing.update_project_parts(vec![
            part("first", &[&a]),
            part("second", &[&a, &b]),
            ProjectPartConfiguration::new("relative", vec![PathBuf::from("src/c.c")]),
            part("", &[&b]),
        ]);
        fixture.indexing.wait_until_idle();

        assert_eq!(report.enqueued, 1);
        assert_eq!(report.rejected.len(), 3);
        assert!(matches!(report.rejected[0], Error::DuplicateFile { .. }));
        assert!(matches!(report.rejected[1], Error::InvalidProjectPart { .. }));
        assert_eq!(fixture.indexing.indexer().project_part_ids(), vec![ProjectPartId::new("first")]);
        assert!(fixture.symbol_names(&b).is_empty());
    }

    #[test]
    fn test_file_moves_between_parts() {
        let fixture = Fixture::new(1);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        fixture
            .indexing
            .update_project_parts(vec![part("P", &[&a, &b]), part("Q", &[])]);
        fixture.indexing.wait_until_idle();

        let report = fixture
            .indexing
            .update_project_parts(vec![part("P", &[&a]), part("Q", &[&b])]);
        fixture.indexing.wait_until_idle();

        assert_eq!(report.enqueued, 1);
        let b_id = fixture.id(&b);
        assert_eq!(fixture.indexing.indexer().owner_of(b_id), Some(ProjectPartId::new("Q")));
        let symbols = fixture.indexing.storage().symbols_in_file(b_id).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].project_part, ProjectPartId::new("Q"));
    }

    #[test]
    fn test_remove_project_parts() {
        let fixture = Fixture::new(1);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        fixture
            .indexing
            .update_project_parts(vec![part("P", &[&a]), part("Q", &[&b])]);
        fixture.indexing.wait_until_idle();

        let retired = fixture.indexing.remove_project_parts(&[ProjectPartId::new("P")]).unwrap();
        assert_eq!(retired, 1);
        assert!(fixture.symbol_names(&a).is_empty());
        assert_eq!(fixture.symbol_names(&b), vec!["beta"]);
        assert_eq!(
            fixture.indexing.storage().fetch_project_part_ids().unwrap(),
            vec![ProjectPartId::new("Q")]
        );
    }

    #[test]
    fn test_restart_skips_unchanged_files() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("index.db");
        let a = dir.path().join("a.c");
        let b = dir.path().join("b.c");
        std::fs::write(&a, "alpha\n").unwrap();
        std::fs::write(&b, "beta\n").unwrap();

        let fixture = Fixture::with_database(dir, Arc::new(Database::open(&db_path).unwrap()), 2);
        fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        fixture.indexing.wait_until_idle();
        let Fixture { dir, indexing, .. } = fixture;
        drop(indexing);

        std::fs::write(&b, "beta\nepsilon\n").unwrap();
        let fixture = Fixture::with_database(dir, Arc::new(Database::open(&db_path).unwrap()), 2);
        let report = fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        fixture.indexing.wait_until_idle();

        assert_eq!(report.enqueued, 1);
        assert_eq!(fixture.script.calls_for(&a), 0);
        assert_eq!(fixture.symbol_names(&b), vec!["beta", "epsilon"]);
    }

    #[test]
    fn test_resubmit_notices_unreported_edit() {
        let fixture = Fixture::new(1);
        let a = fixture.file("a.c", "alpha\n");
        let b = fixture.file("b.c", "beta\n");
        fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        fixture.indexing.wait_until_idle();

        // No watcher event reaches the indexer for this edit
        std::fs::write(&a, "alpha\nomega\n").unwrap();
        let report = fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        assert_eq!(report.enqueued, 1);
        fixture.indexing.wait_until_idle();

        assert_eq!(fixture.symbol_names(&a), vec!["alpha", "omega"]);
        assert_eq!(fixture.script.calls_for(&a), 2);
        assert_eq!(fixture.script.calls_for(&b), 1);
    }

    #[test]
    fn test_unwatchable_file_converges() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("index.db");
        std::fs::create_dir(dir.path().join("locked")).unwrap();
        let a = dir.path().join("a.c");
        let b = dir.path().join("locked").join("b.c");
        std::fs::write(&a, "alpha\n").unwrap();
        std::fs::write(&b, "beta\n").unwrap();

        let fixture = Fixture::with_database(dir, Arc::new(Database::open(&db_path).unwrap()), 1);
        fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        fixture.indexing.wait_until_idle();
        assert_eq!(fixture.symbol_names(&b), vec!["beta"]);
        let Fixture { dir, indexing, .. } = fixture;
        drop(indexing);

        // Reopen with a backend that cannot watch b's directory
        let (events, raw) = channel::unbounded();
        let watcher = PathWatcher::with_backend(Box::new(LockedDirectories), raw, Duration::from_millis(10)).unwrap();
        let database = Arc::new(Database::open(&db_path).unwrap());
        let fixture = Fixture::with_watcher(dir, database, watcher, events, 1);
        let report = fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
        assert_eq!(report.enqueued, 0);

        let b_id = fixture.id(&b);
        wait_for(|| fixture.indexing.storage().fetch_indexed_file(b_id).unwrap().is_none());
        assert!(fixture.indexing.watcher().is_unwatchable(b_id));
        assert!(fixture.symbol_names(&b).is_empty());
        assert_eq!(fixture.indexing.indexer().owner_of(b_id), Some(ProjectPartId::new("P")));
        let stored = fixture
            .indexing
            .storage()
            .fetch_project_part(&ProjectPartId::new("P"))
            .unwrap()
            .unwrap();
        assert!(stored.files.contains(&b_id));

        // Resubmitting the same part neither enqueues nor writes
        let writes = fixture.indexing.storage().write_count();
        for _ in 0..3 {
            let report = fixture.indexing.update_project_parts(vec![part("P", &[&a, &b])]);
            assert_eq!(report.enqueued, 0);
            assert_eq!(report.removed, 0);
        }
        fixture.indexing.wait_until_idle();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(fixture.indexing.storage().write_count(), writes);
        assert_eq!(fixture.script.call_count(), 0);
        assert_eq!(fixture.symbol_names(&a), vec!["alpha"]);
    }

    #[test]
    fn test_generated_file_is_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let generated = GeneratedFiles::new();
        let (watcher, _events) = PathWatcher::manual(Duration::from_millis(10)).unwrap();
        let indexing = SymbolIndexing::with_collector(
            Arc::new(Database::open_in_memory().unwrap()),
            generated.clone(),
            tree_sitter_factory(generated),
            watcher,
            1,
        )
        .unwrap();
        let tables = dir.path().join("gen").join("tables.c");
        let names = |indexing: &SymbolIndexing| -> Vec<String> {
            let id = indexing.file_paths().intern(&tables).unwrap();
            indexing
                .storage()
                .symbols_in_file(id)
                .unwrap()
                .into_iter()
                .map(|s| s.name)
                .collect()
        };

        // Content for a file outside every part is only recorded
        let first = vec![(tables.clone(), "int table_size(void) { return 4; }\n".to_string())];
        assert_eq!(indexing.update_generated_files(first).unwrap(), 0);
        assert_eq!(indexing.generated_files().len(), 1);

        let report = indexing.update_project_parts(vec![part("gen", &[&tables])]);
        assert_eq!(report.enqueued, 1);
        indexing.wait_until_idle();
        let id = indexing.file_paths().intern(&tables).unwrap();
        assert!(!indexing.watcher().is_watched(id));
        assert!(names(&indexing).contains(&"table_size".to_string()));

        let second = vec![(tables.clone(), "int table_rows(void) { return 8; }\n".to_string())];
        assert_eq!(indexing.update_generated_files(second.clone()).unwrap(), 1);
        indexing.wait_until_idle();
        let current = names(&indexing);
        assert!(current.contains(&"table_rows".to_string()));
        assert!(!current.contains(&"table_size".to_string()));
        assert_eq!(indexing.update_generated_files(second).unwrap(), 0);

        // Without its content and with nothing on disk the file is retired
        assert_eq!(indexing.remove_generated_files(&[tables.clone()]).unwrap(), 1);
        assert!(indexing.indexer().owner_of(id).is_none());
        assert!(indexing.storage().fetch_indexed_file(id).unwrap().is_none());
        assert!(indexing.generated_files().is_empty());
    }
}
