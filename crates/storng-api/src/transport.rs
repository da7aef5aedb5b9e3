// Fetch capability and the reqwest-backed default transport.
//
// The gateway talks to the network only through `Fetch`. `HttpFetch`
// builds its `reqwest::Client` from a `TransportConfig` so TLS, timeout,
// and user-agent settings live in one place.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::route::RequestInit;

/// Injected transport: `(url, init) -> JSON body`.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, init: RequestInit) -> Result<Value, Error>;
}

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (local development servers).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            user_agent: concat!("storng/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// [`Fetch`] over a `reqwest::Client`.
///
/// The body is decoded as JSON whatever the HTTP status: services report
/// failures inside the `{ok: false, message}` envelope, often with 4xx codes.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    http: reqwest::Client,
}

impl HttpFetch {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, url: &str, init: RequestInit) -> Result<Value, Error> {
        let url = Url::parse(url)?;
        debug!("{} {}", init.method, url);

        let mut builder = self.http.request(init.method.into(), url);
        for (name, value) in &init.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::InvalidRequest {
                    message: format!("invalid header name {name:?}: {e}"),
                }
            })?;
            let mut value = HeaderValue::from_str(value).map_err(|e| Error::InvalidRequest {
                message: format!("invalid value for header {name}: {e}"),
            })?;
            if name == AUTHORIZATION {
                value.set_sensitive(true);
            }
            builder = builder.header(name, value);
        }
        if let Some(ref body) = init.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (HTTP {status}, body preview: {preview:?})"),
                body,
            }
        })
    }
}
