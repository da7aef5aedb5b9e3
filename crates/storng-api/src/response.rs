// ── Uniform remote result ──
//
// Every remote call resolves to a `{ok, data?, message?}` body. Transport
// and parse failures are folded into the same shape so callers only ever
// branch on `ok`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Result of a remote call, as returned by the service or synthesized locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    /// A successful result carrying `data`.
    pub fn success(data: Option<Value>) -> Self {
        Self {
            ok: true,
            data,
            message: None,
        }
    }

    /// A failed result with a human-readable message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Interpret a decoded JSON body as a `Response`.
    ///
    /// Bodies that don't carry a boolean `ok` field become failures that
    /// quote the offending body.
    pub fn from_body(body: Value) -> Self {
        match serde_json::from_value::<Self>(body.clone()) {
            Ok(res) => res,
            Err(e) => {
                let preview: String = body.to_string().chars().take(200).collect();
                Self::failure(format!("unexpected response shape ({e}): {preview}"))
            }
        }
    }

    /// The failure message, or a generic one when the service sent none.
    pub fn message_or_default(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "request failed".into())
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Self::failure(err.to_string())
    }
}
