// ── Remote gateway ──
//
// Authenticated fetch with a token-refresh coordinator. At most one
// refresh is in flight per gateway; private calls that need a fresh token
// while it runs wait in a FIFO queue and are replayed, in order, by the
// task that started the refresh.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::response::Response;
use crate::route::{RequestInit, Route};
use crate::token::{TokenProvider, secret_expires_within};
use crate::transport::Fetch;

/// How far ahead of expiry an access token is refreshed.
pub const DEFAULT_REFRESH_LOOKAHEAD: Duration = Duration::from_secs(30);

/// Coordinator state, observable for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// A private call parked until the in-flight refresh settles.
struct PendingRequest {
    route: Route,
    data: Option<Value>,
    reply: oneshot::Sender<Response>,
}

struct Coordinator {
    state: RefreshState,
    queue: VecDeque<PendingRequest>,
}

/// Entry point for all remote calls.
///
/// `fetch` never returns an error: every failure is answered with a
/// `{ok: false, message}` [`Response`].
pub struct RemoteGateway {
    fetcher: Arc<dyn Fetch>,
    prefix: String,
    refresh_route: Option<Route>,
    lookahead: Duration,
    coordinator: Mutex<Coordinator>,
}

impl RemoteGateway {
    /// Create a gateway that resolves route paths against `prefix`
    /// (e.g. `https://api.example.com/v1`).
    pub fn new(fetcher: Arc<dyn Fetch>, prefix: impl Into<String>) -> Self {
        Self {
            fetcher,
            prefix: prefix.into(),
            refresh_route: None,
            lookahead: DEFAULT_REFRESH_LOOKAHEAD,
            coordinator: Mutex::new(Coordinator {
                state: RefreshState::Idle,
                queue: VecDeque::new(),
            }),
        }
    }

    /// Route called to obtain a new access token.
    pub fn with_refresh_route(mut self, route: Route) -> Self {
        self.refresh_route = Some(route);
        self
    }

    /// Override the refresh lookahead window.
    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn refresh_route(&self) -> Option<&Route> {
        self.refresh_route.as_ref()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.lock().state
    }

    /// Number of calls waiting on the in-flight refresh.
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    // ── Fetch ───────────────────────────────────────────────────────

    /// Call `route` with `data`, authenticating through `tokens` when the
    /// route is private.
    ///
    /// - public route: sent as is;
    /// - private route without a token: answered locally with a
    ///   "not authenticated" failure, nothing is sent;
    /// - private route with a token outside the lookahead window: sent with
    ///   the token attached;
    /// - private route with an expiring token: queued behind a token refresh
    ///   (started here if none is running) and replayed once it settles.
    pub async fn fetch(
        &self,
        tokens: &dyn TokenProvider,
        route: &Route,
        data: Option<&Value>,
    ) -> Response {
        if !route.private {
            return self.make_request(tokens, route, data).await;
        }

        let Some(token) = tokens.access_token().await else {
            debug!(path = %route.path, "private route requested without an access token");
            return Error::NotAuthenticated.into();
        };

        if !secret_expires_within(&token, self.lookahead) {
            return self.make_request(tokens, route, data).await;
        }

        let (reply, receiver) = oneshot::channel();
        let leads_refresh = {
            let mut coordinator = self.lock();
            coordinator.queue.push_back(PendingRequest {
                route: route.clone(),
                data: data.cloned(),
                reply,
            });
            match coordinator.state {
                RefreshState::Refreshing => false,
                RefreshState::Idle => {
                    coordinator.state = RefreshState::Refreshing;
                    true
                }
            }
        };

        if leads_refresh {
            self.refresh_and_drain(tokens).await;
        } else {
            trace!(path = %route.path, "queued behind in-flight token refresh");
        }

        receiver.await.unwrap_or_else(|_| {
            Response::failure("request was dropped before the token refresh completed")
        })
    }

    // ── Refresh coordination ────────────────────────────────────────

    async fn refresh_and_drain(&self, tokens: &dyn TokenProvider) {
        let guard = RefreshGuard {
            gateway: self,
            armed: true,
        };

        match self.refresh(tokens).await {
            Ok(()) => {
                let pending = self.settle();
                guard.disarm();
                self.drain(tokens, pending).await;
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; rejecting queued requests");
                self.reject_pending(&err);
                guard.disarm();
            }
        }
    }

    async fn refresh(&self, tokens: &dyn TokenProvider) -> Result<(), Error> {
        let route = self
            .refresh_route
            .as_ref()
            .ok_or(Error::MissingRefreshRoute)?;

        debug!(path = %route.path, "access token expiring, refreshing");
        let payload = tokens.refresh_payload().await;
        let res = self.make_request(tokens, route, payload.as_ref()).await;
        if !res.ok {
            return Err(Error::RefreshFailed {
                message: res.message_or_default(),
            });
        }

        tokens.on_refreshed(&res).await;
        debug!("access token refreshed");
        Ok(())
    }

    /// Back to `Idle`, handing over everything queued so far.
    fn settle(&self) -> VecDeque<PendingRequest> {
        let mut coordinator = self.lock();
        coordinator.state = RefreshState::Idle;
        std::mem::take(&mut coordinator.queue)
    }

    /// Replay queued requests strictly in arrival order.
    async fn drain(&self, tokens: &dyn TokenProvider, pending: VecDeque<PendingRequest>) {
        debug!(count = pending.len(), "replaying requests queued during token refresh");
        for request in pending {
            let res = self
                .make_request(tokens, &request.route, request.data.as_ref())
                .await;
            if request.reply.send(res).is_err() {
                trace!(path = %request.route.path, "queued caller went away before its reply");
            }
        }
    }

    fn reject_pending(&self, err: &Error) {
        let message = match err {
            Error::RefreshFailed { .. } => err.to_string(),
            other => format!("token refresh failed: {other}"),
        };
        for request in self.settle() {
            let _ = request.reply.send(Response::failure(message.clone()));
        }
    }

    // ── Single request ──────────────────────────────────────────────

    async fn make_request(
        &self,
        tokens: &dyn TokenProvider,
        route: &Route,
        data: Option<&Value>,
    ) -> Response {
        match self.try_request(tokens, route, data).await {
            Ok(body) => Response::from_body(body),
            Err(err) => {
                warn!(error = %err, path = %route.path, "remote call failed");
                err.into()
            }
        }
    }

    async fn try_request(
        &self,
        tokens: &dyn TokenProvider,
        route: &Route,
        data: Option<&Value>,
    ) -> Result<Value, Error> {
        let mut init = RequestInit::default();
        if route.private {
            if let Some(token) = tokens.access_token().await {
                init = init.bearer(&token);
            }
        }

        let (url, init) = route.fetch_params(data, &self.prefix, init)?;
        self.fetcher.fetch(&url, init).await
    }

    fn lock(&self) -> MutexGuard<'_, Coordinator> {
        self.coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rejects the queue if the refreshing task is dropped mid-refresh, so
/// queued callers never wait forever.
struct RefreshGuard<'a> {
    gateway: &'a RemoteGateway,
    armed: bool,
}

impl RefreshGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gateway.reject_pending(&Error::RefreshFailed {
                message: "refresh was cancelled".into(),
            });
        }
    }
}
