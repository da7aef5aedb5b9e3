//! `storng call`: run one sync operation on a named entry.
//!
//! The entry gets a single remote operation built from the arguments. When
//! an access token is available it is seeded into an `auth` entry that the
//! engine reads, and refreshes, through the usual auth-entry path.

use secrecy::ExposeSecret;
use serde_json::json;
use storng_core::{Store, Subscriber};
use tracing::debug;

use crate::cli::{CallArgs, GlobalOpts};
use crate::commands::util;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

const OPERATION: &str = "call";
const AUTH_ENTRY: &str = "auth";

pub async fn handle(
    store: &Store,
    resolved: &Resolved,
    args: CallArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let route = util::route(&args.request, resolved)?;
    let input = util::request_data(&args.request)?;

    let mut builder =
        store
            .sync(args.entry.clone())
            .remote(OPERATION, route.clone(), util::strategy(args.strategy));
    if let Some(ref raw) = args.init {
        builder = builder.init_data(util::parse_json("--init", raw)?);
    }
    if let Some(ref token) = resolved.token {
        store.cache().add_item(
            AUTH_ENTRY,
            Some(json!({ "accessToken": token.expose_secret() })),
        );
        builder = builder.auth_entry(AUTH_ENTRY);
    }
    let engine = builder.build();

    let name = args.entry.clone();
    let _subscription = engine
        .subscribe(Subscriber::new(move |entry| {
            debug!(entry = %name, state = entry.remote().label(), "entry changed");
        }))
        .await;

    let res = engine.call(OPERATION, input).await?;
    let entry = engine.current().ok_or_else(|| CliError::Core {
        message: format!("entry '{}' is no longer live", args.entry),
    })?;

    let out = output::render_entry(global.output, &entry)?;
    output::print_output(&out, global.quiet);

    if res.ok {
        Ok(())
    } else {
        Err(util::remote_failure(&route, &res))
    }
}
