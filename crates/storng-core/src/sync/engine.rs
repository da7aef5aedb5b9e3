// ── Sync engine ──
//
// Binds one cache entry to a set of named operations. A call applies the
// operation's request reducer, performs the remote call (if any) through
// the gateway, then applies success or failure. Calls on one engine run
// one at a time, in the order they were issued.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use storng_api::{RemoteGateway, Response, Route, StaticToken, TokenProvider};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{EntryCache, RestoreFn, SubscribeOptions, Subscriber, Subscription};
use crate::entry::Entry;
use crate::error::{CoreError, ReducerError};
use crate::persist::Persistence;
use crate::stream::EntryStream;

use super::strategy::{Remote, Strategy};

/// A named operation: an optional route and the strategy folding its
/// result into the entry. Operations without a route are local.
#[derive(Debug, Clone)]
pub struct Operation {
    pub route: Option<Route>,
    pub strategy: Strategy,
}

impl Operation {
    pub fn remote(route: Route, strategy: Strategy) -> Self {
        Self {
            route: Some(route),
            strategy,
        }
    }

    pub fn local(strategy: Strategy) -> Self {
        Self {
            route: None,
            strategy,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.route.is_some()
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    name: String,
    cache: EntryCache,
    gateway: Arc<RemoteGateway>,
    adapter: Option<Arc<dyn Persistence>>,
    persist: Option<bool>,
    init_data: Option<Value>,
    operations: IndexMap<String, Operation>,
    auth_entry: Option<String>,
    restore: Option<RestoreFn>,
}

impl SyncEngineBuilder {
    /// Storage used for this entry (and for reading the auth entry).
    pub fn persistence(mut self, adapter: Arc<dyn Persistence>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Force persistence on or off. By default the entry is persisted when
    /// it has at least one remote operation and a storage adapter is set.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn init_data(mut self, data: Value) -> Self {
        self.init_data = Some(data);
        self
    }

    pub fn operation(mut self, name: impl Into<String>, operation: Operation) -> Self {
        self.operations.insert(name.into(), operation);
        self
    }

    pub fn remote(self, name: impl Into<String>, route: Route, strategy: Strategy) -> Self {
        self.operation(name, Operation::remote(route, strategy))
    }

    pub fn local(self, name: impl Into<String>, strategy: Strategy) -> Self {
        self.operation(name, Operation::local(strategy))
    }

    /// Entry whose `accessToken` / `refreshToken` authenticate private
    /// routes. Refreshed tokens are merged back into it.
    pub fn auth_entry(mut self, name: impl Into<String>) -> Self {
        self.auth_entry = Some(name.into());
        self
    }

    /// Applied to the persisted value when the first subscriber attaches.
    pub fn restore(mut self, f: impl Fn(Entry) -> Entry + Send + Sync + 'static) -> Self {
        self.restore = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> SyncEngine {
        self.cache.add_item(&self.name, self.init_data.clone());

        let remote = self.operations.values().any(Operation::is_remote);
        let persist = self.persist.unwrap_or(remote);

        SyncEngine {
            name: self.name,
            cache: self.cache,
            gateway: self.gateway,
            persistence: self.adapter.clone().filter(|_| persist),
            auth_persistence: self.adapter,
            init_data: self.init_data,
            operations: self.operations,
            auth_entry: self.auth_entry,
            restore: self.restore,
            turn: Mutex::new(()),
        }
    }
}

// ── SyncEngine ───────────────────────────────────────────────────────

/// Reducer pipeline for one entry.
pub struct SyncEngine {
    name: String,
    cache: EntryCache,
    gateway: Arc<RemoteGateway>,
    persistence: Option<Arc<dyn Persistence>>,
    auth_persistence: Option<Arc<dyn Persistence>>,
    init_data: Option<Value>,
    operations: IndexMap<String, Operation>,
    auth_entry: Option<String>,
    restore: Option<RestoreFn>,
    turn: Mutex<()>,
}

impl SyncEngine {
    pub fn builder(
        name: impl Into<String>,
        cache: EntryCache,
        gateway: Arc<RemoteGateway>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder {
            name: name.into(),
            cache,
            gateway,
            adapter: None,
            persist: None,
            init_data: None,
            operations: IndexMap::new(),
            auth_entry: None,
            restore: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operation names in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn is_persisted(&self) -> bool {
        self.persistence.is_some()
    }

    /// The live value, if anyone is subscribed or holds it.
    pub fn current(&self) -> Option<Arc<Entry>> {
        self.cache.current(&self.name)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub async fn subscribe(&self, subscriber: Subscriber) -> Subscription {
        self.cache
            .subscribe(&self.name, subscriber, self.subscribe_options())
            .await
    }

    pub async fn watch(&self) -> EntryStream {
        self.cache.watch(&self.name, self.subscribe_options()).await
    }

    fn subscribe_options(&self) -> SubscribeOptions {
        SubscribeOptions {
            persistence: self.persistence.clone(),
            restore: self.restore.clone(),
            init_data: self.init_data.clone(),
        }
    }

    // ── Calls ────────────────────────────────────────────────────────

    /// Run operation `op` with `input`.
    ///
    /// Remote failures, and success reducers that cannot fold the result,
    /// end up as a recorded error on the entry and an `{ok: false}`
    /// response. `Err` is only returned for an unknown operation.
    pub async fn call(&self, op: &str, input: Value) -> Result<Response, CoreError> {
        let operation = self
            .operations
            .get(op)
            .ok_or_else(|| CoreError::UnknownOperation {
                entry: self.name.clone(),
                operation: op.to_owned(),
            })?;
        let strategy = &operation.strategy;

        let _turn = self.turn.lock().await;
        debug!(entry = %self.name, op, strategy = strategy.name(), "sync call");

        // Local operations go straight to the success reducer.
        let res = match operation.route {
            Some(ref route) => {
                self.apply(|state| Ok(strategy.request(state, &input))).await?;
                self.fetch(route, &input).await
            }
            None => Response::success(Some(input.clone())),
        };
        let remote = Remote {
            res: &res,
            route: operation.route.as_ref(),
        };

        if !res.ok {
            self.apply(|state| Ok(strategy.failure(state, &input, &remote)))
                .await?;
            return Ok(res);
        }

        match self
            .apply(|state| strategy.success(state, &input, &remote))
            .await
        {
            Ok(_) => Ok(res),
            Err(CoreError::Reducer(err)) => {
                warn!(entry = %self.name, op, error = %err, "success reducer failed");
                let synthesized = Response::failure(format!("{op} failed: {err}"));
                let remote = Remote {
                    res: &synthesized,
                    route: operation.route.as_ref(),
                };
                self.apply(|state| Ok(strategy.failure(state, &input, &remote)))
                    .await?;
                Ok(synthesized)
            }
            Err(other) => Err(other),
        }
    }

    /// Update the entry; every reducer output leaves `initial` behind.
    async fn apply<F>(&self, reducer: F) -> Result<Arc<Entry>, CoreError>
    where
        F: FnOnce(&Entry) -> Result<Entry, ReducerError>,
    {
        self.cache
            .update_data(
                &self.name,
                |state| reducer(state).map(|next| next.with_initial(false)),
                self.persistence.as_deref(),
            )
            .await
    }

    async fn fetch(&self, route: &Route, input: &Value) -> Response {
        let data = (!input.is_null()).then_some(input);
        match self.auth_entry {
            Some(ref auth) => {
                let tokens = AuthEntryTokens {
                    cache: &self.cache,
                    name: auth,
                    persistence: self.auth_persistence.as_deref(),
                };
                self.gateway.fetch(&tokens, route, data).await
            }
            None => {
                self.gateway
                    .fetch(&StaticToken::anonymous(), route, data)
                    .await
            }
        }
    }
}

// ── Auth entry as token source ───────────────────────────────────────

/// Reads tokens from a cache entry shaped `{accessToken, refreshToken}`.
struct AuthEntryTokens<'a> {
    cache: &'a EntryCache,
    name: &'a str,
    persistence: Option<&'a dyn Persistence>,
}

impl AuthEntryTokens<'_> {
    async fn field(&self, key: &str) -> Option<String> {
        let entry = self
            .cache
            .get_data_async(self.name, self.persistence)
            .await
            .ok()?;
        entry
            .data
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }
}

#[async_trait]
impl TokenProvider for AuthEntryTokens<'_> {
    async fn access_token(&self) -> Option<SecretString> {
        self.field("accessToken").await.map(SecretString::from)
    }

    async fn refresh_payload(&self) -> Option<Value> {
        let token = self.field("refreshToken").await?;
        Some(json!({ "refreshToken": token }))
    }

    async fn on_refreshed(&self, response: &Response) {
        let Some(Value::Object(fresh)) = response.data.clone() else {
            warn!(entry = self.name, "token refresh returned no data to store");
            return;
        };

        let result = self
            .cache
            .update_data(
                self.name,
                |state| {
                    let mut data = state.data.as_object().cloned().unwrap_or_else(Map::new);
                    data.extend(fresh);
                    Ok(state.with_data(Value::Object(data)))
                },
                self.persistence,
            )
            .await;
        if let Err(e) = result {
            warn!(entry = self.name, error = %e, "failed to store refreshed tokens");
        }
    }
}
