//! Helpers shared by the request commands.

use std::path::Path;

use serde_json::Value;
use storng_core::{Method, Response, Route, Strategy};

use crate::cli::{HttpMethod, RequestArgs, StrategyArg};
use crate::config::Resolved;
use crate::error::CliError;

/// Parse a JSON argument; `@path` reads the document from a file.
pub fn parse_json(field: &str, raw: &str) -> Result<Value, CliError> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))?,
        None => raw.to_owned(),
    };
    serde_json::from_str(&text).map_err(|e| CliError::json(field, e))
}

/// Request data from `--data`, `null` when absent.
pub fn request_data(args: &RequestArgs) -> Result<Value, CliError> {
    args.data
        .as_deref()
        .map_or(Ok(Value::Null), |raw| parse_json("--data", raw))
}

pub fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::Get,
        HttpMethod::Post => Method::Post,
        HttpMethod::Put => Method::Put,
        HttpMethod::Patch => Method::Patch,
        HttpMethod::Delete => Method::Delete,
    }
}

pub fn strategy(strategy: StrategyArg) -> Strategy {
    match strategy {
        StrategyArg::Update => Strategy::Update,
        StrategyArg::Replace => Strategy::Replace,
        StrategyArg::Remove => Strategy::Remove,
        StrategyArg::DeepMerge => Strategy::DeepMerge,
        StrategyArg::Nothing => Strategy::Nothing,
    }
}

/// The route described by the request arguments.
///
/// Private routes are checked against the resolved token up front so a
/// missing token is reported with setup help instead of a bare failure.
pub fn route(args: &RequestArgs, resolved: &Resolved) -> Result<Route, CliError> {
    let route = Route::new(method(args.method), args.path.clone());
    if !args.private {
        return Ok(route);
    }
    if resolved.token.is_none() {
        return Err(CliError::NoToken {
            profile: resolved.profile_name.clone(),
        });
    }
    Ok(route.authenticated())
}

/// Error for a failed remote response.
pub fn remote_failure(route: &Route, res: &Response) -> CliError {
    CliError::Remote {
        method: route.method.to_string(),
        path: route.path.clone(),
        message: res.message_or_default(),
    }
}
