//! `storng fetch`: one request through the gateway, no entry involved.

use serde_json::Value;
use storng_core::{StaticToken, Store};
use tracing::debug;

use crate::cli::{FetchArgs, GlobalOpts};
use crate::commands::util;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

pub async fn handle(
    store: &Store,
    resolved: &Resolved,
    args: FetchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = args.request;
    let route = util::route(&request, resolved)?;
    let data = util::request_data(&request)?;

    let tokens = match resolved.token {
        Some(ref token) => StaticToken::new(token.clone()),
        None => StaticToken::anonymous(),
    };

    debug!(method = %route.method, path = %route.path, private = route.private, "fetch");
    let res = store
        .gateway()
        .fetch(&tokens, &route, (!data.is_null()).then_some(&data))
        .await;
    if !res.ok {
        return Err(util::remote_failure(&route, &res));
    }

    let out = output::render_value(global.output, res.data.as_ref().unwrap_or(&Value::Null))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
