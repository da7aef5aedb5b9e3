// ── Store facade ──
//
// One handle owning the cache, the gateway and the storage adapter that
// every sync engine of an application shares.

use std::sync::Arc;

use storng_api::{Fetch, HttpFetch, RemoteGateway};
use tracing::debug;

use crate::cache::EntryCache;
use crate::config::StoreConfig;
use crate::error::CoreError;
use crate::persist::Persistence;
use crate::sync::{SyncEngine, SyncEngineBuilder};

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<StoreInner>`.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,
    cache: EntryCache,
    gateway: Arc<RemoteGateway>,
    persistence: Option<Arc<dyn Persistence>>,
}

impl Store {
    /// Create a store that performs remote calls through `fetcher`.
    pub fn new(config: StoreConfig, fetcher: Arc<dyn Fetch>) -> Self {
        let gateway = Arc::new(config.gateway(fetcher));
        let cache = EntryCache::new(config.name.clone());
        Self {
            inner: Arc::new(StoreInner {
                config,
                cache,
                gateway,
                persistence: None,
            }),
        }
    }

    /// Create a store backed by the default reqwest transport.
    pub fn connect(config: StoreConfig) -> Result<Self, CoreError> {
        let fetcher = HttpFetch::new(&config.transport())?;
        debug!(store = %config.name, prefix = config.prefix(), "store created");
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    /// Use `persistence` for entries that opt into it.
    pub fn with_persistence(self, persistence: Arc<dyn Persistence>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config: self.inner.config.clone(),
                cache: self.inner.cache.clone(),
                gateway: Arc::clone(&self.inner.gateway),
                persistence: Some(persistence),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &EntryCache {
        &self.inner.cache
    }

    pub fn gateway(&self) -> &Arc<RemoteGateway> {
        &self.inner.gateway
    }

    pub fn persistence(&self) -> Option<&Arc<dyn Persistence>> {
        self.inner.persistence.as_ref()
    }

    /// Start building a sync engine for entry `name` on this store.
    pub fn sync(&self, name: impl Into<String>) -> SyncEngineBuilder {
        let builder = SyncEngine::builder(
            name,
            self.inner.cache.clone(),
            Arc::clone(&self.inner.gateway),
        );
        match self.inner.persistence {
            Some(ref persistence) => builder.persistence(Arc::clone(persistence)),
            None => builder,
        }
    }
}
