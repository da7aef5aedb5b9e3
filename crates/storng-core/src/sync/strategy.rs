// ── Reducer strategies ──
//
// Each strategy is a request/success/failure triple over `Entry`. They are
// pure: the engine feeds them the previous value, the call input and the
// remote outcome, and stores what they return.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use storng_api::{Response, Route};

use crate::entry::{Entry, ErrorInfo, LoadingStatus};
use crate::error::ReducerError;

use super::merge::{deep_merge, shallow_merge};

/// `fn(previous data, incoming data) -> new data`.
pub type CustomFn = Arc<dyn Fn(&Value, &Value) -> Result<Value, ReducerError> + Send + Sync>;

/// The outcome handed to `success` and `failure`.
#[derive(Debug, Clone, Copy)]
pub struct Remote<'a> {
    pub res: &'a Response,
    /// `None` for local operations.
    pub route: Option<&'a Route>,
}

/// How an operation folds its result into the entry.
#[derive(Clone)]
pub enum Strategy {
    /// Shallow-merge the incoming object into the data.
    Update,
    /// Replace the data with the incoming value.
    Replace,
    /// Reset the data to the call input (or `{}`) and mark it not loaded.
    Remove,
    /// Recursively merge the incoming value into the data.
    DeepMerge,
    /// Keep the data; only track loading and errors.
    Nothing,
    /// Compute the data with a user function; status is left alone.
    Custom(CustomFn),
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Strategy {
    pub fn custom(
        f: impl Fn(&Value, &Value) -> Result<Value, ReducerError> + Send + Sync + 'static,
    ) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Remove => "remove",
            Self::DeepMerge => "deep-merge",
            Self::Nothing => "nothing",
            Self::Custom(_) => "custom",
        }
    }

    /// State while the call is in flight.
    pub fn request(&self, state: &Entry, _input: &Value) -> Entry {
        match self {
            Self::Custom(_) => state.clone(),
            _ => Entry {
                data: state.data.clone(),
                loading_status: LoadingStatus {
                    is_loading: true,
                    is_loaded: false,
                    ..state.loading_status.clone()
                },
            },
        }
    }

    /// State after a successful call.
    pub fn success(
        &self,
        state: &Entry,
        input: &Value,
        remote: &Remote<'_>,
    ) -> Result<Entry, ReducerError> {
        let incoming = incoming(input, remote.res);
        let (data, is_loaded) = match self {
            Self::Update => (shallow_merge(&state.data, &incoming)?, true),
            Self::Replace => (incoming, true),
            Self::Remove => (non_null(input).unwrap_or_else(empty), false),
            Self::DeepMerge => (deep_merge(&state.data, &incoming), true),
            Self::Nothing => (state.data.clone(), true),
            Self::Custom(f) => return Ok(state.with_data(f(&state.data, &incoming)?)),
        };

        Ok(Entry {
            data,
            loading_status: LoadingStatus {
                is_loading: false,
                is_loaded,
                initial: state.loading_status.initial,
                error: None,
            },
        })
    }

    /// State after a failed call.
    pub fn failure(&self, state: &Entry, _input: &Value, remote: &Remote<'_>) -> Entry {
        let is_loaded = match self {
            Self::Custom(_) => return state.clone(),
            Self::Nothing => false,
            _ => state.loading_status.is_loaded,
        };

        Entry {
            data: state.data.clone(),
            loading_status: LoadingStatus {
                is_loading: false,
                is_loaded,
                initial: state.loading_status.initial,
                error: Some(ErrorInfo::from_response(remote.res)),
            },
        }
    }
}

/// Remote data if present, else the call input, else `{}`.
fn incoming(input: &Value, res: &Response) -> Value {
    res.data
        .as_ref()
        .and_then(non_null)
        .or_else(|| non_null(input))
        .unwrap_or_else(empty)
}

fn non_null(value: &Value) -> Option<Value> {
    (!value.is_null()).then(|| value.clone())
}

fn empty() -> Value {
    Value::Object(Map::new())
}
