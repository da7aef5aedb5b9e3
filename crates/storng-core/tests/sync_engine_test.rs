#![allow(clippy::unwrap_used)]
// End-to-end SyncEngine scenarios over a scripted transport.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use url::Url;

use storng_core::{
    Entry, Fetch, LoadingStatus, MemoryPersistence, RequestInit, Response, Route, Store,
    StoreConfig, Strategy, Subscriber,
};

// ── Scripted transport ──────────────────────────────────────────────

/// JWT whose `exp` is 1970-01-01T00:00:01Z.
const EXPIRED_JWT: &str = "h.eyJleHAiOjF9.s";

#[derive(Debug, Clone)]
struct Call {
    path: String,
    auth: Option<String>,
    body: Option<Value>,
}

#[derive(Default)]
struct Scripted {
    replies: Mutex<HashMap<String, VecDeque<Value>>>,
    slow: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<Call>>,
}

impl Scripted {
    fn reply(&self, path: &str, body: Value) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(path.to_owned())
            .or_default()
            .push_back(body);
        self
    }

    fn slow(&self, path: &str, delay: Duration) -> &Self {
        self.slow.lock().unwrap().insert(path.to_owned(), delay);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for Scripted {
    async fn fetch(
        &self,
        url: &str,
        init: RequestInit,
    ) -> Result<Value, storng_api::Error> {
        let path = Url::parse(url)?.path().to_owned();
        self.calls.lock().unwrap().push(Call {
            path: path.clone(),
            auth: init.header_value("authorization").map(str::to_owned),
            body: init.body.clone(),
        });

        let delay = self.slow.lock().unwrap().get(&path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(VecDeque::pop_front);
        reply.ok_or_else(|| storng_api::Error::InvalidRequest {
            message: format!("no scripted reply for {path}"),
        })
    }
}

fn store(fetch: &Arc<Scripted>) -> Store {
    let config = StoreConfig::new("storng", Url::parse("http://api.test/").unwrap())
        .with_refresh_route(Route::post("/auth/refresh").authenticated());
    Store::new(config, fetch.clone())
}

type Log = Arc<Mutex<Vec<(usize, Arc<Entry>)>>>;

fn observer(id: usize, log: &Log) -> Subscriber {
    let log = Arc::clone(log);
    Subscriber::new(move |entry| log.lock().unwrap().push((id, Arc::clone(entry))))
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn auth_update_round_trip() {
    let fetch = Arc::new(Scripted::default());
    fetch.reply(
        "/auth/register-confirm",
        json!({"ok": true, "data": {"accessToken": "t1"}}),
    );
    let store = store(&fetch);
    store.cache().add_item("auth", Some(json!({})));
    let auth = store
        .sync("auth")
        .remote(
            "update",
            Route::post("/auth/register-confirm"),
            Strategy::Update,
        )
        .build();
    let log: Log = Arc::default();

    let _a = auth.subscribe(observer(1, &log)).await;
    assert_eq!(
        *log.lock().unwrap()[0].1,
        Entry {
            data: json!({}),
            loading_status: LoadingStatus {
                is_loading: true,
                is_loaded: false,
                initial: true,
                error: None,
            },
        }
    );

    let res = auth
        .call("update", json!({"accessToken": "t1"}))
        .await
        .unwrap();

    assert!(res.ok);
    let last = log.lock().unwrap().last().unwrap().1.clone();
    assert_eq!(
        *last,
        Entry {
            data: json!({"accessToken": "t1"}),
            loading_status: LoadingStatus {
                is_loading: false,
                is_loaded: true,
                initial: false,
                error: None,
            },
        }
    );
    assert_eq!(fetch.calls()[0].body, Some(json!({"accessToken": "t1"})));
}

#[tokio::test]
async fn remove_clears_and_unloads() {
    let fetch = Arc::new(Scripted::default());
    fetch.reply("/auth/logout", json!({"ok": true}));
    let store = store(&fetch);
    let auth = store
        .sync("auth")
        .init_data(json!({"accessToken": "t1"}))
        .remote("logout", Route::post("/auth/logout"), Strategy::Remove)
        .build();
    let _s = auth.subscribe(Subscriber::new(|_| {})).await;

    auth.call("logout", json!({})).await.unwrap();

    let current = auth.current().unwrap();
    assert_eq!(current.data, json!({}));
    assert!(!current.loading_status.is_loaded);
    assert!(!current.loading_status.is_loading);
}

#[tokio::test]
async fn many_subscribers_see_loading_nothing_correct() {
    let fetch = Arc::new(Scripted::default());
    fetch.reply(
        "/auth/register-confirm",
        json!({"ok": true, "data": {"accessToken": "accessToken"}}),
    );
    let store = store(&fetch).with_persistence(Arc::new(MemoryPersistence::new()));
    let auth = store
        .sync("auth_public")
        .remote(
            "registerConfirm",
            Route::post("/auth/register-confirm"),
            Strategy::Update,
        )
        .build();
    let log: Log = Arc::default();

    let _subs = [
        auth.subscribe(observer(1, &log)).await,
        auth.subscribe(observer(2, &log)).await,
        auth.subscribe(observer(3, &log)).await,
    ];

    // The first subscriber sees the seed, then the restored value; later
    // subscribers join after the restore.
    let labels: Vec<(usize, &str)> = log
        .lock()
        .unwrap()
        .iter()
        .map(|(id, e)| (*id, e.remote().label()))
        .collect();
    assert_eq!(
        labels,
        [(1, "loading"), (1, "nothing"), (2, "nothing"), (3, "nothing")]
    );

    log.lock().unwrap().clear();
    auth.call("registerConfirm", json!({"accessToken": "accessToken"}))
        .await
        .unwrap();

    let tail: Vec<(usize, &str)> = log
        .lock()
        .unwrap()
        .iter()
        .map(|(id, e)| (*id, e.remote().label()))
        .collect();
    assert_eq!(
        tail,
        [
            (1, "loading"),
            (2, "loading"),
            (3, "loading"),
            (1, "correct"),
            (2, "correct"),
            (3, "correct"),
        ]
    );
}

#[tokio::test]
async fn malformed_success_becomes_a_recorded_failure() {
    let fetch = Arc::new(Scripted::default());
    fetch.reply("/profile", json!({"ok": true, "data": [1, 2, 3]}));
    let store = store(&fetch);
    let profile = store
        .sync("profile")
        .remote("load", Route::get("/profile"), Strategy::Update)
        .build();
    let _s = profile.subscribe(Subscriber::new(|_| {})).await;

    let res = profile.call("load", Value::Null).await.unwrap();

    assert!(!res.ok);
    assert!(res.message_or_default().contains("expected an object"));
    let current = profile.current().unwrap();
    assert!(!current.loading_status.is_loading);
    assert_eq!(current.data, json!({}));
    let error = current.loading_status.error.clone().unwrap();
    assert_eq!(Some(error.message), res.message);
}

#[tokio::test]
async fn private_call_without_credentials_is_rejected_locally() {
    let fetch = Arc::new(Scripted::default());
    let store = store(&fetch);
    store.cache().add_item("auth", None);
    let profile = store
        .sync("profile")
        .auth_entry("auth")
        .remote("load", Route::get("/profile").authenticated(), Strategy::Replace)
        .build();
    let _s = profile.subscribe(Subscriber::new(|_| {})).await;

    let res = profile.call("load", Value::Null).await.unwrap();

    assert_eq!(res, Response::failure("user is not authenticated"));
    assert!(fetch.calls().is_empty());
    let error = profile.current().unwrap().loading_status.error.clone();
    assert_eq!(error.unwrap().message, "user is not authenticated");
}

#[tokio::test]
async fn expiring_auth_entry_is_refreshed_and_updated() {
    let fetch = Arc::new(Scripted::default());
    fetch
        .reply(
            "/auth/refresh",
            json!({"ok": true, "data": {"accessToken": "fresh-token"}}),
        )
        .reply("/profile", json!({"ok": true, "data": {"image": "me.png"}}));
    let store = store(&fetch);
    let auth = store
        .sync("auth")
        .init_data(json!({"accessToken": EXPIRED_JWT, "refreshToken": "r1"}))
        .local("set", Strategy::Replace)
        .build();
    let auth_log: Log = Arc::default();
    let _auth_sub = auth.subscribe(observer(0, &auth_log)).await;

    let profile = store
        .sync("profile")
        .auth_entry("auth")
        .remote("load", Route::get("/profile").authenticated(), Strategy::Replace)
        .build();
    let _s = profile.subscribe(Subscriber::new(|_| {})).await;

    let res = profile.call("load", Value::Null).await.unwrap();
    assert!(res.ok);

    let calls = fetch.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].path, "/auth/refresh");
    assert_eq!(calls[0].auth.as_deref(), Some(format!("Bearer {EXPIRED_JWT}").as_str()));
    assert_eq!(calls[0].body, Some(json!({"refreshToken": "r1"})));
    assert_eq!(calls[1].path, "/profile");
    assert_eq!(calls[1].auth.as_deref(), Some("Bearer fresh-token"));

    let auth_now = auth.current().unwrap();
    assert_eq!(
        auth_now.data,
        json!({"accessToken": "fresh-token", "refreshToken": "r1"})
    );
    assert_eq!(auth_log.lock().unwrap().len(), 2);
    assert_eq!(profile.current().unwrap().data, json!({"image": "me.png"}));
}

#[tokio::test]
async fn calls_on_one_engine_apply_in_issue_order() {
    let fetch = Arc::new(Scripted::default());
    fetch
        .slow("/slow", Duration::from_millis(30))
        .reply("/slow", json!({"ok": true, "data": {"step": "slow"}}))
        .reply("/fast", json!({"ok": true, "data": {"step": "fast"}}));
    let store = store(&fetch);
    let entry = store
        .sync("steps")
        .remote("slow", Route::get("/slow"), Strategy::Replace)
        .remote("fast", Route::get("/fast"), Strategy::Replace)
        .build();
    let log: Log = Arc::default();
    let _s = entry.subscribe(observer(1, &log)).await;
    log.lock().unwrap().clear();

    let (a, b) = futures_util::future::join(
        entry.call("slow", Value::Null),
        entry.call("fast", Value::Null),
    )
    .await;
    assert!(a.unwrap().ok && b.unwrap().ok);

    let seen: Vec<(bool, Value)> = log
        .lock()
        .unwrap()
        .iter()
        .map(|(_, e)| (e.loading_status.is_loading, e.data.clone()))
        .collect();
    assert_eq!(
        seen,
        [
            (true, json!({})),
            (false, json!({"step": "slow"})),
            (true, json!({"step": "slow"})),
            (false, json!({"step": "fast"})),
        ]
    );
}

#[tokio::test]
async fn unsubscribed_entry_still_receives_result() {
    let fetch = Arc::new(Scripted::default());
    fetch.reply("/profile", json!({"ok": true, "data": {"image": "x"}}));
    let storage = Arc::new(MemoryPersistence::new());
    let store = store(&fetch).with_persistence(storage.clone());
    let profile = store
        .sync("profile")
        .remote("load", Route::get("/profile"), Strategy::Replace)
        .build();

    let sub = profile.subscribe(Subscriber::new(|_| {})).await;
    sub.unsubscribe();

    let res = profile.call("load", Value::Null).await.unwrap();
    assert!(res.ok);

    let stored: Entry = serde_json::from_value(storage.peek("profile").unwrap()).unwrap();
    assert_eq!(stored.data, json!({"image": "x"}));
    assert!(stored.loading_status.is_loaded);
}
