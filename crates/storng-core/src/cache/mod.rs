// ── Entry cache ──
//
// Declared entries, their live values and subscribers. An entry is live
// while it has subscribers or was installed with `set_data`; when the
// last subscriber leaves, its value
// moves to a weak shadow table that only resolves while someone else
// still holds the `Arc<Entry>`.
//
// No map guard is held while a subscriber runs or across an `.await`, so
// callbacks may call back into the cache.

mod subscriber;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::entry::Entry;
use crate::error::{CoreError, ReducerError};
use crate::persist::Persistence;
use crate::stream::EntryStream;

pub use subscriber::{RestoreFn, Subscriber, Subscription, default_restore};

/// Declaration of an entry: its name and seed value.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDecl {
    pub name: String,
    pub init_data: Entry,
}

/// A live entry: current value and subscribers in subscription order.
#[derive(Debug, Clone)]
pub struct EntryContainer {
    pub data: Arc<Entry>,
    pub subscribers: Vec<Subscriber>,
    revision: u64,
}

/// Options for [`EntryCache::subscribe`].
#[derive(Clone, Default)]
pub struct SubscribeOptions {
    /// Load the persisted value after the first subscriber attaches.
    pub persistence: Option<Arc<dyn Persistence>>,
    /// Applied to the loaded value; defaults to [`default_restore`].
    pub restore: Option<RestoreFn>,
    /// Seed used instead of the declaration's.
    pub init_data: Option<Value>,
}

/// Subscription-based cache of named entries.
///
/// Cheaply cloneable; clones share the same entries.
#[derive(Clone)]
pub struct EntryCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    name: String,
    structure: DashMap<String, EntryDecl>,
    live: DashMap<String, EntryContainer>,
    shadow: DashMap<String, Weak<Entry>>,
    revision: AtomicU64,
}

impl EntryCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name: name.into(),
                structure: DashMap::new(),
                live: DashMap::new(),
                shadow: DashMap::new(),
                revision: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    // ── Declarations ─────────────────────────────────────────────────

    /// Declare `name` with `init_data` (or `{}`). Re-declaring keeps the
    /// first declaration.
    pub fn add_item(&self, name: &str, init_data: Option<Value>) {
        self.inner
            .structure
            .entry(name.to_owned())
            .or_insert_with(|| EntryDecl {
                name: name.to_owned(),
                init_data: Entry::declared(init_data),
            });
    }

    pub fn get_data_key(&self, name: &str) -> Option<EntryDecl> {
        self.inner.structure.get(name).map(|d| d.value().clone())
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// The live container, or `None` when nobody is subscribed.
    pub fn get_data(&self, name: &str) -> Option<EntryContainer> {
        self.inner.live.get(name).map(|c| c.value().clone())
    }

    /// Resolve the current value of a declared entry: live value, then the
    /// shadow copy, then `persistence`, then the declaration.
    pub async fn get_data_async(
        &self,
        name: &str,
        persistence: Option<&dyn Persistence>,
    ) -> Result<Arc<Entry>, CoreError> {
        let Some(decl) = self.get_data_key(name) else {
            return Err(CoreError::UnknownEntry {
                name: name.to_owned(),
            });
        };

        if let Some(entry) = self.current(name) {
            return Ok(entry);
        }

        if let Some(persistence) = persistence {
            if let Some(entry) = load_persisted(persistence, name).await {
                return Ok(Arc::new(entry));
            }
        }

        Ok(Arc::new(decl.init_data))
    }

    /// Live or shadow value, without touching persistence.
    pub fn current(&self, name: &str) -> Option<Arc<Entry>> {
        if let Some(container) = self.inner.live.get(name) {
            return Some(Arc::clone(&container.data));
        }
        self.inner.shadow.get(name).and_then(|w| w.upgrade())
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Attach `subscriber` to `name`, declaring the entry if needed.
    ///
    /// The subscriber is called with the current value before this returns.
    /// For the first subscriber with a persistence adapter, the persisted
    /// value is then loaded, passed through the restore step and published
    /// to every subscriber, unless the entry was updated in the meantime.
    pub async fn subscribe(
        &self,
        name: &str,
        subscriber: Subscriber,
        options: SubscribeOptions,
    ) -> Subscription {
        self.add_item(name, options.init_data.clone());

        let (first, seed, revision) = match self.inner.live.entry(name.to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                let container = occupied.get_mut();
                if !container.subscribers.iter().any(|s| s.same(&subscriber)) {
                    container.subscribers.push(subscriber.clone());
                }
                if container.data.loading_status.initial {
                    container.data = Arc::new((*container.data).clone().with_initial(false));
                }
                (false, Arc::clone(&container.data), container.revision)
            }
            MapEntry::Vacant(vacant) => {
                let seed = match options.init_data.clone() {
                    Some(init) => Entry::declared(Some(init)),
                    None => self
                        .get_data_key(name)
                        .map(|d| d.init_data)
                        .unwrap_or_default(),
                };
                let data = Arc::new(seed);
                let revision = self.next_revision();
                vacant.insert(EntryContainer {
                    data: Arc::clone(&data),
                    subscribers: vec![subscriber.clone()],
                    revision,
                });
                (true, data, revision)
            }
        };

        trace!(entry = name, first, "subscriber attached");
        subscriber.notify(&seed);

        if first {
            if let Some(ref persistence) = options.persistence {
                self.restore(name, &seed, revision, persistence.as_ref(), options.restore)
                    .await;
            }
        }

        Subscription::new(self.clone(), name.to_owned(), subscriber)
    }

    async fn restore(
        &self,
        name: &str,
        seed: &Entry,
        revision: u64,
        persistence: &dyn Persistence,
        restore: Option<RestoreFn>,
    ) {
        let loaded = load_persisted(persistence, name)
            .await
            .unwrap_or_else(|| seed.clone());
        let restored = match restore {
            Some(f) => f(loaded),
            None => default_restore(loaded),
        };

        let published = {
            let Some(mut container) = self.inner.live.get_mut(name) else {
                debug!(entry = name, "all subscribers left before restore finished");
                return;
            };
            if container.revision != revision {
                debug!(entry = name, "entry updated during restore; keeping newer value");
                return;
            }
            container.data = Arc::new(restored);
            container.revision = self.next_revision();
            (Arc::clone(&container.data), container.subscribers.clone())
        };

        notify_all(&published.0, &published.1);
    }

    /// Detach `subscriber` from `name`. The last one out takes the entry
    /// off the live map.
    pub fn unsubscribe(&self, name: &str, subscriber: &Subscriber) {
        let removed = self.inner.live.remove_if_mut(name, |_, container| {
            container.subscribers.retain(|s| !s.same(subscriber));
            container.subscribers.is_empty()
        });

        if let Some((key, container)) = removed {
            trace!(entry = name, "last subscriber left");
            self.inner
                .shadow
                .insert(key, Arc::downgrade(&container.data));
        }
        self.inner.shadow.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Subscribe through a `watch` channel.
    pub async fn watch(&self, name: &str, options: SubscribeOptions) -> EntryStream {
        EntryStream::attach(self, name, options).await
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Compute the next value of `name` with `updater`, notify subscribers
    /// in subscription order, then persist.
    ///
    /// A failing updater leaves everything untouched. An entry nobody is
    /// subscribed to is computed from its resolved value and persisted, but
    /// no one is notified.
    pub async fn update_data<F>(
        &self,
        name: &str,
        updater: F,
        persistence: Option<&dyn Persistence>,
    ) -> Result<Arc<Entry>, CoreError>
    where
        F: FnOnce(&Entry) -> Result<Entry, ReducerError>,
    {
        let next = if let Some(mut container) = self.inner.live.get_mut(name) {
            let next = Arc::new(updater(&container.data)?);
            container.data = Arc::clone(&next);
            container.revision = self.next_revision();
            let subscribers = container.subscribers.clone();
            drop(container);
            notify_all(&next, &subscribers);
            next
        } else {
            let current = self.get_data_async(name, persistence).await?;
            let next = Arc::new(updater(&current)?);
            self.inner
                .shadow
                .insert(name.to_owned(), Arc::downgrade(&next));
            trace!(entry = name, "updated entry without subscribers");
            next
        };

        if let Some(persistence) = persistence {
            persist(persistence, name, &next).await;
        }
        Ok(next)
    }

    /// Install `entry` as the live value of `name` with `subscribers`,
    /// declaring the entry if needed. Nobody is notified and nothing is
    /// persisted.
    pub fn set_data(&self, name: &str, entry: Entry, subscribers: Vec<Subscriber>) {
        self.add_item(name, None);
        let revision = self.next_revision();
        self.inner.shadow.remove(name);
        self.inner.live.insert(
            name.to_owned(),
            EntryContainer {
                data: Arc::new(entry),
                subscribers,
                revision,
            },
        );
    }

    /// Drop the live value, subscribers and shadow copy of `name`. The
    /// declaration stays. Returns whether anything was live.
    pub fn delete_data(&self, name: &str) -> bool {
        self.inner.shadow.remove(name);
        self.inner.live.remove(name).is_some()
    }

    fn next_revision(&self) -> u64 {
        self.inner.revision.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn notify_all(entry: &Arc<Entry>, subscribers: &[Subscriber]) {
    for subscriber in subscribers {
        subscriber.notify(entry);
    }
}

async fn load_persisted(persistence: &dyn Persistence, name: &str) -> Option<Entry> {
    match persistence.get(name).await {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(entry = name, error = %e, "ignoring unreadable persisted entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(entry = name, error = %e, "failed to read persisted entry");
            None
        }
    }
}

async fn persist(persistence: &dyn Persistence, name: &str, entry: &Entry) {
    let value = match serde_json::to_value(entry) {
        Ok(v) => v,
        Err(e) => {
            warn!(entry = name, error = %e, "failed to serialize entry for persistence");
            return;
        }
    };
    if let Err(e) = persistence.set(name, value).await {
        warn!(entry = name, error = %e, "failed to persist entry");
    }
}
