// storng-core: reactive entry cache and reducer-driven sync on top of storng-api.

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod persist;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{
    EntryCache, EntryContainer, EntryDecl, RestoreFn, SubscribeOptions, Subscriber, Subscription,
};
pub use config::StoreConfig;
pub use entry::{Entry, ErrorInfo, LoadingStatus, RemoteData};
pub use error::{CoreError, ReducerError};
pub use persist::{MemoryPersistence, Persistence};
pub use store::Store;
pub use stream::{EntryStream, EntryWatchStream};
pub use sync::{Operation, Strategy, SyncEngine, SyncEngineBuilder};

// Re-export the remote-side types callers need to declare operations.
pub use storng_api::{
    Fetch, HttpFetch, Method, RequestInit, Response, Route, StaticToken, TlsMode, TokenProvider,
};
