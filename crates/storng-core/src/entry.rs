// ── Entry model ──
//
// An entry is a named JSON value plus the loading status of its last
// remote round trip. This is the shape every subscriber receives and the
// shape written to persistence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storng_api::Response;

/// Failure recorded on an entry by a failure reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    /// The error carried by a failed remote response.
    pub fn from_response(res: &Response) -> Self {
        Self {
            message: res.message_or_default(),
            data: res.data.clone().filter(|d| !d.is_null()),
        }
    }
}

/// Where an entry is in its request lifecycle.
///
/// `is_loading` and `is_loaded` are never both set. `initial` is set only
/// until the entry is first resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingStatus {
    pub is_loading: bool,
    pub is_loaded: bool,
    pub initial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl Default for LoadingStatus {
    /// Status of a freshly declared entry.
    fn default() -> Self {
        Self {
            is_loading: true,
            is_loaded: false,
            initial: true,
            error: None,
        }
    }
}

/// A cached value with its loading status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub data: Value,
    pub loading_status: LoadingStatus,
}

impl Default for Entry {
    fn default() -> Self {
        Self::declared(None)
    }
}

impl Entry {
    /// The seed value of a declared entry: `init` (or `{}`) still loading.
    pub fn declared(init: Option<Value>) -> Self {
        Self {
            data: init.unwrap_or_else(|| Value::Object(Map::new())),
            loading_status: LoadingStatus::default(),
        }
    }

    /// Same status, different data.
    pub fn with_data(&self, data: Value) -> Self {
        Self {
            data,
            loading_status: self.loading_status.clone(),
        }
    }

    /// Copy with `initial` set to `initial`.
    pub fn with_initial(mut self, initial: bool) -> Self {
        self.loading_status.initial = initial;
        self
    }

    /// Classify the entry for rendering.
    pub fn remote(&self) -> RemoteData<'_> {
        let status = &self.loading_status;
        if status.is_loading {
            RemoteData::Loading
        } else if let Some(ref error) = status.error {
            RemoteData::Failure(error)
        } else if status.is_loaded {
            RemoteData::Correct(&self.data)
        } else {
            RemoteData::Nothing
        }
    }
}

/// The four states a view distinguishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteData<'a> {
    Loading,
    Failure(&'a ErrorInfo),
    Correct(&'a Value),
    Nothing,
}

impl RemoteData<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Failure(_) => "failure",
            Self::Correct(_) => "correct",
            Self::Nothing => "nothing",
        }
    }
}
