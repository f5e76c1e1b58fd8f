//! Scripted collector
//!
//! A deterministic collector for exercising the indexing pipeline without
//! real grammars. Unless a path has scripted results, every non-empty line of
//! the file becomes one callable symbol defined at the start of that line, so
//! editing a file changes its results.
//!
//! All clones share one [`CollectorScript`], which records every call and can
//! hold collectors at a gate to observe concurrency.

use super::{BoxedCollector, CollectorFactory, SymbolsCollector};
use crate::symbol::{CollectedSymbols, LocationRole, SymbolKind};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct ScriptState {
    results: HashMap<PathBuf, CollectedSymbols>,
    failures: HashSet<PathBuf>,
    panics: HashSet<PathBuf>,
    calls: Vec<(PathBuf, Vec<String>)>,
    active: usize,
    max_active: usize,
    delay: Option<Duration>,
    held: bool,
}

/// Shared behaviour and call log of scripted collectors
#[derive(Default)]
pub struct CollectorScript {
    state: Mutex<ScriptState>,
    changed: Condvar,
}

impl CollectorScript {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Return `results` for `path` instead of reading the file
    pub fn set_results(&self, path: impl Into<PathBuf>, results: CollectedSymbols) {
        self.lock().results.insert(path.into(), results);
    }

    /// Make collection of `path` fail with a parse error
    pub fn fail(&self, path: impl Into<PathBuf>) {
        self.lock().failures.insert(path.into());
    }

    pub fn clear_failure(&self, path: &Path) {
        self.lock().failures.remove(path);
    }

    /// Make collection of `path` panic
    pub fn panic_on(&self, path: impl Into<PathBuf>) {
        self.lock().panics.insert(path.into());
    }

    /// Sleep for `delay` inside every collection
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Block collectors once they have logged their call
    pub fn hold(&self) {
        self.lock().held = true;
    }

    /// Let held collectors continue
    pub fn release(&self) {
        self.lock().held = false;
        self.changed.notify_all();
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of collections of one path
    pub fn calls_for(&self, path: &Path) -> usize {
        self.lock().calls.iter().filter(|(p, _)| p == path).count()
    }

    /// Collections in progress right now
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Highest number of simultaneous collections seen
    pub fn max_concurrency(&self) -> usize {
        self.lock().max_active
    }

    /// Wait until at least `count` calls were logged; false on timeout
    pub fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.calls.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the active count even when a collection panics
struct ActiveGuard<'a>(&'a CollectorScript);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().active -= 1;
        self.0.changed.notify_all();
    }
}

#[derive(Clone)]
pub struct ScriptedCollector {
    script: Arc<CollectorScript>,
}

impl ScriptedCollector {
    pub fn new(script: Arc<CollectorScript>) -> Self {
        Self { script }
    }

    /// Factory handing out collectors that share `script`
    pub fn factory(script: Arc<CollectorScript>) -> CollectorFactory {
        Arc::new(move || Ok(Box::new(ScriptedCollector::new(script.clone())) as BoxedCollector))
    }

    fn default_results(path: &Path) -> Result<CollectedSymbols> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::parse(path, e.to_string()))?;
        let mut results = CollectedSymbols::new();
        for (line, text) in source.lines().enumerate() {
            let name = text.trim();
            if name.is_empty() {
                continue;
            }
            let index = match results.symbol_index(&format!("line:{}", name)) {
                Some(index) => index,
                None => results.add_symbol(format!("line:{}", name), SymbolKind::Callable, name),
            };
            results.add_location(index, line as u32 + 1, 1, LocationRole::Definition);
        }
        Ok(results)
    }
}

impl SymbolsCollector for ScriptedCollector {
    fn collect(&mut self, path: &Path, arguments: &[String]) -> Result<CollectedSymbols> {
        let (scripted, fails, panics, delay) = {
            let mut state = self.script.lock();
            state.calls.push((path.to_path_buf(), arguments.to_vec()));
            state.active += 1;
            state.max_active = state.max_active.max(state.active);
            self.script.changed.notify_all();
            while state.held {
                state = self
                    .script
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            (
                state.results.get(path).cloned(),
                state.failures.contains(path),
                state.panics.contains(path),
                state.delay,
            )
        };
        let _active = ActiveGuard(&self.script);

        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if panics {
            panic!("scripted panic for {}", path.display());
        }
        if fails {
            return Err(Error::parse(path, "scripted failure"));
        }
        match scripted {
            Some(results) => Ok(results),
            None => Self::default_results(path),
        }
    }
}
