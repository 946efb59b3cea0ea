//! Process-wide snapshot cache with single-flight loading.
//!
//! Each key moves `Empty -> Loading -> Ready | Failed`. The first caller for a
//! key starts the load on the blocking pool; every later caller awaits the same
//! shared future and observes the same outcome. Failures stay cached until the
//! key is invalidated or reloaded. The map lock is only held while an entry is
//! looked up or replaced, never across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use kbase_core::error::{Error, Result};
use kbase_core::traits::CorpusSource;
use kbase_core::types::CacheKey;

use crate::indexer::CorpusIndexer;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// Produces a snapshot for a key. Runs on the blocking pool.
pub trait SnapshotLoader: Send + Sync + 'static {
    fn load(&self, key: &CacheKey) -> Result<Snapshot>;
}

/// Reads persisted snapshots: `key.path` is the store base directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreLoader;

impl SnapshotLoader for StoreLoader {
    fn load(&self, key: &CacheKey) -> Result<Snapshot> {
        SnapshotStore::new(&key.path).load(&key.version)
    }
}

/// Reads persisted snapshots, and when the version does not exist yet fits
/// one from the corpus, saves it under the requested version and returns it.
pub struct BuildOnMissLoader {
    corpus: Box<dyn CorpusSource>,
    indexer: CorpusIndexer,
}

impl BuildOnMissLoader {
    pub fn new(corpus: impl CorpusSource + 'static, indexer: CorpusIndexer) -> Self {
        Self { corpus: Box::new(corpus), indexer }
    }
}

impl SnapshotLoader for BuildOnMissLoader {
    fn load(&self, key: &CacheKey) -> Result<Snapshot> {
        let store = SnapshotStore::new(&key.path);
        match store.load(&key.version) {
            Err(Error::NotFound(reason)) => {
                info!(key = %key, %reason, "no persisted snapshot, building from corpus");
                let index = self.indexer.fit_raw(self.corpus.load_corpus()?)?;
                store.save(&index, &key.version)?;
                Ok(index.into_snapshot(key.version.clone()))
            }
            other => other,
        }
    }
}

/// Observable state of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    /// The loader is still running.
    Loading,
    Ready { loaded_at: DateTime<Utc> },
    Failed { error: String },
}

#[derive(Clone)]
struct Loaded {
    snapshot: Arc<Snapshot>,
    loaded_at: DateTime<Utc>,
}

type LoadOutcome = std::result::Result<Loaded, Arc<Error>>;
type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

struct CacheEntry {
    load: SharedLoad,
    /// Filled by the loader task itself, so the outcome is visible before any
    /// waiter polls `load`.
    settled: Arc<OnceLock<LoadOutcome>>,
}

impl CacheEntry {
    fn outcome(&self) -> Option<LoadOutcome> {
        self.settled.get().cloned().or_else(|| self.load.peek().cloned())
    }
}

pub struct SnapshotCache {
    loader: Arc<dyn SnapshotLoader>,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl SnapshotCache {
    pub fn new(loader: impl SnapshotLoader) -> Self {
        Self::with_loader(Arc::new(loader))
    }

    pub fn with_loader(loader: Arc<dyn SnapshotLoader>) -> Self {
        Self { loader, entries: Mutex::new(HashMap::new()) }
    }

    /// Return the snapshot for `key`, starting a load only if no entry exists.
    /// Concurrent callers share one load. A cached failure is returned as
    /// [`Error::CacheLoad`] without retrying.
    pub async fn get_or_load(&self, key: &CacheKey) -> Result<Arc<Snapshot>> {
        let load = self.entry(key);
        settle(key, load.await)
    }

    /// Like [`SnapshotCache::get_or_load`] but stop waiting after `limit`. The
    /// load keeps running and later callers still see its outcome.
    pub async fn get_or_load_timeout(&self, key: &CacheKey, limit: Duration) -> Result<Arc<Snapshot>> {
        let load = self.entry(key);
        match tokio::time::timeout(limit, load).await {
            Ok(outcome) => settle(key, outcome),
            Err(_) => {
                warn!(key = %key, waited = ?limit, "gave up waiting for snapshot load");
                Err(Error::Timeout { key: key.to_string(), waited: limit })
            }
        }
    }

    /// Forget `key` so the next request loads it again. Callers already holding
    /// the old snapshot keep it. Returns whether an entry existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.lock().remove(key).is_some();
        if removed {
            debug!(key = %key, "invalidated snapshot");
        }
        removed
    }

    /// Replace a settled entry for `key` with a fresh load and wait for it. If a
    /// load for `key` is still running, wait for that one instead of starting
    /// a second.
    pub async fn reload(&self, key: &CacheKey) -> Result<Arc<Snapshot>> {
        let load = {
            let mut entries = self.lock();
            match entries.get(key) {
                Some(entry) if entry.outcome().is_none() => {
                    debug!(key = %key, "reload joined the running load");
                    entry.load.clone()
                }
                _ => {
                    let entry = self.start_load(key);
                    let load = entry.load.clone();
                    entries.insert(key.clone(), entry);
                    load
                }
            }
        };
        settle(key, load.await)
    }

    pub fn state(&self, key: &CacheKey) -> CacheState {
        let entries = self.lock();
        let Some(entry) = entries.get(key) else {
            return CacheState::Empty;
        };
        match entry.outcome() {
            None => CacheState::Loading,
            Some(Ok(loaded)) => CacheState::Ready { loaded_at: loaded.loaded_at },
            Some(Err(error)) => CacheState::Failed { error: error.to_string() },
        }
    }

    pub fn len(&self) -> usize { self.lock().len() }
    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    fn entry(&self, key: &CacheKey) -> SharedLoad {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            return entry.load.clone();
        }
        let entry = self.start_load(key);
        let load = entry.load.clone();
        entries.insert(key.clone(), entry);
        load
    }

    /// Spawn the loader now so the load completes even if every waiter gives
    /// up.
    fn start_load(&self, key: &CacheKey) -> CacheEntry {
        debug!(key = %key, "starting snapshot load");
        let loader = Arc::clone(&self.loader);
        let settled = Arc::new(OnceLock::new());
        let slot = Arc::clone(&settled);
        let owned = key.clone();
        let task = tokio::task::spawn_blocking(move || {
            let outcome = match loader.load(&owned) {
                Ok(snapshot) => {
                    info!(key = %owned, documents = snapshot.len(), "snapshot ready");
                    Ok(Loaded { snapshot: Arc::new(snapshot), loaded_at: Utc::now() })
                }
                Err(e) => {
                    warn!(key = %owned, error = %e, "snapshot load failed");
                    Err(Arc::new(e))
                }
            };
            let _ = slot.set(outcome.clone());
            outcome
        });
        let label = key.to_string();
        let load = async move {
            task.await.unwrap_or_else(|join| {
                Err(Arc::new(Error::Operation(format!("snapshot loader for {label} did not finish: {join}"))))
            })
        }
        .boxed()
        .shared();
        CacheEntry { load, settled }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn settle(key: &CacheKey, outcome: LoadOutcome) -> Result<Arc<Snapshot>> {
    outcome
        .map(|loaded| loaded.snapshot)
        .map_err(|source| Error::CacheLoad { key: key.to_string(), source })
}
