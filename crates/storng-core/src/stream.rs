// ── Reactive entry streams ──
//
// A `watch`-channel view of one entry, for consumers that prefer polling
// or `Stream` combinators over callbacks.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::cache::{EntryCache, SubscribeOptions, Subscriber, Subscription};
use crate::entry::Entry;

/// Unsubscribes when the last stream handle goes away.
struct Detach(Subscription);

impl Drop for Detach {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}

/// A subscription to one entry.
///
/// Provides both point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct EntryStream {
    current: Arc<Entry>,
    receiver: watch::Receiver<Arc<Entry>>,
    detach: Detach,
}

impl EntryStream {
    pub(crate) async fn attach(cache: &EntryCache, name: &str, options: SubscribeOptions) -> Self {
        let seed = cache
            .get_data_key(name)
            .map(|d| Arc::new(d.init_data))
            .unwrap_or_default();
        let (sender, mut receiver) = watch::channel(seed);
        let subscriber = Subscriber::new(move |entry| {
            sender.send_replace(Arc::clone(entry));
        });

        let subscription = cache.subscribe(name, subscriber, options).await;
        let current = receiver.borrow_and_update().clone();

        Self {
            current,
            receiver,
            detach: Detach(subscription),
        }
    }

    pub fn name(&self) -> &str {
        self.detach.0.name()
    }

    /// The value seen at creation or by the last [`changed`](Self::changed).
    pub fn current(&self) -> &Arc<Entry> {
        &self.current
    }

    /// The latest value (may have changed since creation).
    pub fn latest(&self) -> Arc<Entry> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new value.
    /// Returns `None` once no further values can arrive.
    pub async fn changed(&mut self) -> Option<Arc<Entry>> {
        self.receiver.changed().await.ok()?;
        let entry = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&entry);
        Some(entry)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators. The
    /// first item is the current value.
    pub fn into_stream(self) -> EntryWatchStream {
        EntryWatchStream {
            inner: WatchStream::new(self.receiver),
            _detach: self.detach,
        }
    }
}

/// `Stream` adapter over an [`EntryStream`].
pub struct EntryWatchStream {
    inner: WatchStream<Arc<Entry>>,
    _detach: Detach,
}

impl Stream for EntryWatchStream {
    type Item = Arc<Entry>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
