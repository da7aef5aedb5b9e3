// ── Runtime store configuration ──
//
// Describes where the remote service lives and how to talk to it. Never
// touches disk: the CLI (or an embedding app) builds a `StoreConfig` and
// hands it to `Store`.

use std::sync::Arc;
use std::time::Duration;

use storng_api::{DEFAULT_REFRESH_LOOKAHEAD, Fetch, RemoteGateway, Route, TlsMode, TransportConfig};
use url::Url;

/// Configuration for one store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store name; also the cache name.
    pub name: String,
    /// Base URL prepended to every route path.
    pub api_prefix: Url,
    /// Route used to refresh expiring access tokens.
    pub refresh_route: Option<Route>,
    /// Refresh tokens that expire within this window.
    pub refresh_lookahead: Duration,
    /// Request timeout.
    pub timeout: Duration,
    pub tls: TlsMode,
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, api_prefix: Url) -> Self {
        Self {
            name: name.into(),
            api_prefix,
            refresh_route: None,
            refresh_lookahead: DEFAULT_REFRESH_LOOKAHEAD,
            timeout: Duration::from_secs(30),
            tls: TlsMode::System,
        }
    }

    pub fn with_refresh_route(mut self, route: Route) -> Self {
        self.refresh_route = Some(route);
        self
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }

    /// Prefix as handed to the gateway, without a trailing slash.
    pub fn prefix(&self) -> &str {
        self.api_prefix.as_str().trim_end_matches('/')
    }

    pub(crate) fn gateway(&self, fetcher: Arc<dyn Fetch>) -> RemoteGateway {
        let gateway =
            RemoteGateway::new(fetcher, self.prefix()).with_lookahead(self.refresh_lookahead);
        match self.refresh_route {
            Some(ref route) => gateway.with_refresh_route(route.clone()),
            None => gateway,
        }
    }
}
