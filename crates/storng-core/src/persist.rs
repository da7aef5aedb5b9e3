// ── Persistence contract ──
//
// The cache writes whole serialized entries under the entry name. Real
// backends (files, browser storage, databases) live outside this crate;
// `MemoryPersistence` is the in-process reference used by tests and the CLI.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::CoreError;

/// Key/value storage for entries that outlive their subscribers.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), CoreError>;
}

/// Non-durable [`Persistence`] backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    items: DashMap<String, Value>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key, as if a previous session had written it.
    pub fn seeded(items: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Synchronous read for inspection.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.items.get(key).map(|v| v.value().clone())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn get(&self, key: &str) -> Result<Option<Value>, CoreError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CoreError> {
        self.items.insert(key.to_owned(), value);
        Ok(())
    }
}
