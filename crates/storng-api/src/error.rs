use thiserror::Error;

/// Top-level error type for the `storng-api` crate.
///
/// The gateway never surfaces these to its callers directly: every failure
/// is folded into a `{ok: false, message}` [`Response`](crate::Response).
/// They stay typed up to that boundary so transports and tests can match on
/// them.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// A private route was requested without an access token.
    #[error("user is not authenticated")]
    NotAuthenticated,

    /// The access token needs a refresh but no refresh route is configured.
    #[error("route requires authentication but no token refresh route is configured")]
    MissingRefreshRoute,

    /// The refresh route answered with a failure (or could not be reached).
    #[error("token refresh failed: {message}")]
    RefreshFailed { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Request building ────────────────────────────────────────────
    /// The route could not be turned into a request from the given data.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Response body was not JSON, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the caller has no usable credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::MissingRefreshRoute | Self::RefreshFailed { .. }
        )
    }
}
