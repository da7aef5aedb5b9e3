use std::fmt;
use std::sync::Arc;

use crate::entry::{Entry, LoadingStatus};

use super::EntryCache;

type Callback = dyn Fn(&Arc<Entry>) + Send + Sync;

/// An observer of one entry.
///
/// Identity is the callback allocation: clones of a `Subscriber` are the
/// same subscriber, two `Subscriber::new` calls never are.
#[derive(Clone)]
pub struct Subscriber(Arc<Callback>);

impl Subscriber {
    pub fn new(callback: impl Fn(&Arc<Entry>) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub(crate) fn notify(&self, entry: &Arc<Entry>) {
        (self.0)(entry);
    }

    /// Whether `self` and `other` are the same subscriber.
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscriber")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// Handle returned by [`EntryCache::subscribe`].
///
/// Dropping it does not unsubscribe; call [`unsubscribe`](Self::unsubscribe).
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    cache: EntryCache,
    name: String,
    subscriber: Subscriber,
}

impl Subscription {
    pub(crate) fn new(cache: EntryCache, name: String, subscriber: Subscriber) -> Self {
        Self {
            cache,
            name,
            subscriber,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscriber(&self) -> &Subscriber {
        &self.subscriber
    }

    /// Detach the subscriber. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        self.cache.unsubscribe(&self.name, &self.subscriber);
    }
}

/// Transforms a freshly loaded persisted entry before it is published.
pub type RestoreFn = Arc<dyn Fn(Entry) -> Entry + Send + Sync>;

/// Default restore step: a value read back from storage is not loading.
pub fn default_restore(mut entry: Entry) -> Entry {
    entry.loading_status = LoadingStatus {
        is_loading: false,
        ..entry.loading_status
    };
    entry
}
