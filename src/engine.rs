//! The public search façade.
//!
//! [`SearchEngine`] owns the storage backend, the index builder, and the two
//! background workers (debounced change batches, periodic persistence
//! flush). Hosts drive it through four operations: `initialize`, `search`,
//! `refresh`, `shutdown`, plus `notify_change` as the inbound seam for a
//! file watcher and `stats` for observability.
//!
//! Initialization is single-flight: concurrent callers block on the same
//! in-flight build and observe its outcome. `refresh` is a barrier —
//! searches issued during it wait for the rebuild to finish.

use crate::config::{SearchConfig, StorageKind, DATA_DIR, FLUSH_INTERVAL};
use crate::error::{Error, Result};
use crate::index::builder::{IndexBuilder, ProgressFn, SharedStore};
use crate::index::pending::ChangeKind;
use crate::index::providers::{SymbolProvider, WorkspaceEnumerator};
use crate::query::{QueryEngine, SearchHit};
use crate::store::{IndexStats, ItemStore, MemoryStore, SqliteStore};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::warn;

/// Poll interval of the background workers. Both workers check their stop
/// flag at this cadence, so shutdown never blocks long.
const WORKER_TICK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Initializing,
    Ready,
    Closed,
}

pub struct SearchEngine {
    store: SharedStore,
    builder: Arc<IndexBuilder>,
    config: SearchConfig,
    state: Arc<(Mutex<State>, Condvar)>,
    stop: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SearchEngine {
    /// Open an engine for `workspace_root`, choosing the backend from the
    /// configuration. The persistent database lives at
    /// `<root>/.navix/index.db`.
    pub fn open(workspace_root: &Path, config: SearchConfig) -> Result<Self> {
        let store: Box<dyn ItemStore> = match config.storage {
            StorageKind::Persistent => {
                let db_path = workspace_root.join(DATA_DIR).join("index.db");
                Box::new(SqliteStore::open(&db_path, config.batch_size)?)
            }
            StorageKind::Memory => Box::new(MemoryStore::new()),
        };
        Self::with_store(store, config)
    }

    /// Wrap an explicit backend. Initializes the store.
    pub fn with_store(mut store: Box<dyn ItemStore>, config: SearchConfig) -> Result<Self> {
        store.initialize()?;
        let shared: SharedStore = Arc::new(Mutex::new(store));
        let builder = Arc::new(IndexBuilder::new(shared.clone(), config.clone()));
        Ok(Self {
            store: shared,
            builder,
            config,
            state: Arc::new((Mutex::new(State::Created), Condvar::new())),
            stop: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.0.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Build the index if the store is empty and start the background
    /// workers. Returns the number of items indexed.
    ///
    /// Only one initialization runs at a time; a caller arriving while one
    /// is in flight blocks until it finishes and returns `Ok(0)`.
    pub fn initialize(
        &self,
        enumerator: &dyn WorkspaceEnumerator,
        symbols: &dyn SymbolProvider,
        progress: Option<&ProgressFn>,
    ) -> Result<usize> {
        {
            let cvar = &self.state.1;
            let mut state = self.lock_state();
            loop {
                match *state {
                    State::Created => {
                        *state = State::Initializing;
                        break;
                    }
                    State::Initializing => {
                        state = cvar.wait(state).unwrap_or_else(|p| p.into_inner());
                    }
                    State::Ready => return Ok(0),
                    State::Closed => {
                        return Err(Error::InvalidState("engine is shut down".to_string()))
                    }
                }
            }
        }

        let result = self.builder.build_initial(enumerator, symbols, progress);

        {
            let cvar = &self.state.1;
            let mut state = self.lock_state();
            *state = if result.is_ok() {
                State::Ready
            } else {
                // A failed or cancelled build may be retried.
                State::Created
            };
            cvar.notify_all();
        }

        if result.is_ok() {
            self.start_workers();
        }
        result
    }

    fn await_ready(&self) -> Result<()> {
        let cvar = &self.state.1;
        let mut state = self.lock_state();
        loop {
            match *state {
                State::Ready => return Ok(()),
                State::Initializing => {
                    state = cvar.wait(state).unwrap_or_else(|p| p.into_inner());
                }
                State::Created => {
                    return Err(Error::InvalidState("engine not initialized".to_string()))
                }
                State::Closed => {
                    return Err(Error::InvalidState("engine is shut down".to_string()))
                }
            }
        }
    }

    /// Ranked search. Blocks while an initialization or refresh is in
    /// flight; an empty result list is a valid outcome.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.await_ready()?;
        let store = self.store.lock().unwrap_or_else(|poison| poison.into_inner());
        QueryEngine::new(store.as_ref(), &self.config).search(query, limit)
    }

    /// Record one filesystem change; it is applied by the debounced
    /// background batch, or synchronously via [`flush_changes`].
    ///
    /// [`flush_changes`]: SearchEngine::flush_changes
    pub fn notify_change(&self, path: String, kind: ChangeKind) {
        self.builder.note_change(path, kind);
    }

    /// Apply every pending change now, without waiting for the debounce
    /// window. Returns the number of changes applied.
    pub fn flush_changes(&self) -> Result<usize> {
        self.builder.process_pending()
    }

    /// Clear and rebuild. A barrier: searches issued during the refresh
    /// block until it completes.
    pub fn refresh(
        &self,
        enumerator: &dyn WorkspaceEnumerator,
        symbols: &dyn SymbolProvider,
    ) -> Result<usize> {
        {
            let cvar = &self.state.1;
            let mut state = self.lock_state();
            loop {
                match *state {
                    State::Ready | State::Created => {
                        *state = State::Initializing;
                        break;
                    }
                    State::Initializing => {
                        state = cvar.wait(state).unwrap_or_else(|p| p.into_inner());
                    }
                    State::Closed => {
                        return Err(Error::InvalidState("engine is shut down".to_string()))
                    }
                }
            }
        }

        let result = self.builder.refresh(enumerator, symbols, None);

        {
            let cvar = &self.state.1;
            let mut state = self.lock_state();
            *state = if result.is_ok() {
                State::Ready
            } else {
                State::Created
            };
            cvar.notify_all();
        }

        if result.is_ok() {
            self.start_workers();
        }
        result
    }

    /// Index totals.
    pub fn stats(&self) -> Result<IndexStats> {
        if *self.lock_state() == State::Closed {
            return Err(Error::InvalidState("engine is shut down".to_string()));
        }
        let store = self.store.lock().unwrap_or_else(|poison| poison.into_inner());
        store.stats()
    }

    /// Stop the background workers, flush, and close. Further operations
    /// fail with `InvalidState`; repeated shutdown is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        {
            let cvar = &self.state.1;
            let mut state = self.lock_state();
            loop {
                match *state {
                    State::Initializing => {
                        // Ask the running build to stop, then wait it out.
                        self.builder.request_cancel();
                        state = cvar.wait(state).unwrap_or_else(|p| p.into_inner());
                    }
                    State::Closed => return Ok(()),
                    _ => {
                        *state = State::Closed;
                        cvar.notify_all();
                        break;
                    }
                }
            }
        }

        self.stop.store(true, Ordering::SeqCst);
        let workers = {
            let mut guard = self.workers.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };
        for worker in workers {
            let _ = worker.join();
        }

        let mut store = self.store.lock().unwrap_or_else(|poison| poison.into_inner());
        store.flush()?;
        Ok(())
    }

    fn start_workers(&self) {
        let mut workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
        if !workers.is_empty() {
            return;
        }

        // Periodic persistence flush. A failed flush is logged and retried
        // on the next interval.
        let stop = self.stop.clone();
        let store = self.store.clone();
        workers.push(std::thread::spawn(move || {
            let mut last_flush = Instant::now();
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(WORKER_TICK);
                if last_flush.elapsed() < FLUSH_INTERVAL {
                    continue;
                }
                last_flush = Instant::now();
                let mut guard = store.lock().unwrap_or_else(|poison| poison.into_inner());
                if let Err(e) = guard.flush() {
                    warn!("periodic flush failed, will retry: {}", e);
                }
            }
        }));

        // Debounced change batches.
        let stop = self.stop.clone();
        let builder = self.builder.clone();
        workers.push(std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(WORKER_TICK);
                if builder.has_ready_batch() {
                    if let Err(e) = builder.process_pending() {
                        warn!("change batch failed: {}", e);
                    }
                }
            }
        }));
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("shutdown on drop failed: {}", e);
        }
    }
}
