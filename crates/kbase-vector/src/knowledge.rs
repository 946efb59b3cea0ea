use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use kbase_core::config::Config;
use kbase_core::data_processor::{DataProcessor, DirectoryCorpus};
use kbase_core::error::{Error, Result};
use kbase_core::types::{CacheKey, SearchHit};

use crate::cache::{BuildOnMissLoader, SnapshotCache, StoreLoader};
use crate::indexer::CorpusIndexer;
use crate::search::{self, SearchOptions};
use crate::snapshot::Snapshot;

/// Query entry point: one snapshot key served through a shared cache.
pub struct KnowledgeBase {
    cache: Arc<SnapshotCache>,
    key: CacheKey,
    options: SearchOptions,
    load_timeout: Option<Duration>,
}

impl KnowledgeBase {
    pub fn new(cache: Arc<SnapshotCache>, key: CacheKey) -> Self {
        Self { cache, key, options: SearchOptions::default(), load_timeout: None }
    }

    /// Wire a knowledge base from configuration. With `index.build_on_miss`
    /// the snapshot is fitted from `data.raw_txt_dir` when it is not on disk.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings()?;
        let key = CacheKey::new(config.resolve_path(&settings.index.snapshot_dir), settings.index.version.clone());
        let cache = if settings.index.build_on_miss {
            let processor = DataProcessor::with_extensions(settings.data.extensions.iter().map(String::as_str));
            let corpus = DirectoryCorpus::new(config.resolve_path(&settings.data.raw_txt_dir))
                .with_processor(processor)
                .with_limit(settings.data.file_limit);
            SnapshotCache::new(BuildOnMissLoader::new(corpus, CorpusIndexer::from_settings(&settings)))
        } else {
            SnapshotCache::new(StoreLoader)
        };
        let timeout = (settings.index.load_timeout_secs > 0).then(|| Duration::from_secs(settings.index.load_timeout_secs));
        Ok(Self::new(Arc::new(cache), key)
            .with_options(SearchOptions::from(&settings.retrieval))
            .with_load_timeout(timeout))
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Serve a different snapshot version from the same directory.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.key.version = version.into();
        self
    }

    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn key(&self) -> &CacheKey { &self.key }
    pub fn options(&self) -> &SearchOptions { &self.options }
    pub fn cache(&self) -> &Arc<SnapshotCache> { &self.cache }

    pub async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        match self.load_timeout {
            Some(limit) => self.cache.get_or_load_timeout(&self.key, limit).await,
            None => self.cache.get_or_load(&self.key).await,
        }
    }

    /// Top matches for `query`. `top_k` overrides the configured count. An
    /// empty query is rejected before any snapshot is loaded.
    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        let snapshot = self.snapshot().await?;
        let options = top_k.map_or(self.options, |k| self.options.with_top_k(k));
        debug!(key = %self.key, top_k = options.top_k, "retrieving");
        search::retrieve(query, &snapshot, &options)
    }
}
