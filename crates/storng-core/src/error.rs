// ── Core error types ──
//
// Errors surfaced by the cache and the sync engine. Remote failures are
// not errors here: they arrive as `{ok: false}` responses and flow through
// the failure reducer. The `From<storng_api::Error>` impl covers the few
// places (client construction, URL validation) where transport errors
// escape as values.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Cache errors ─────────────────────────────────────────────────
    #[error("Unknown entry: {name}")]
    UnknownEntry { name: String },

    #[error("Unknown operation `{operation}` on entry `{entry}`")]
    UnknownOperation { entry: String, operation: String },

    #[error(transparent)]
    Reducer(#[from] ReducerError),

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("API error: {message}")]
    Api { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// A reducer could not produce the next entry state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReducerError {
    #[error("expected an object to merge, found {found}")]
    NotAnObject { found: &'static str },

    #[error("{0}")]
    Custom(String),
}

impl ReducerError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<storng_api::Error> for CoreError {
    fn from(err: storng_api::Error) -> Self {
        match err {
            e if e.is_auth_error() => CoreError::AuthenticationFailed {
                message: e.to_string(),
            },
            storng_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            storng_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            other => CoreError::Api {
                message: other.to_string(),
            },
        }
    }
}
