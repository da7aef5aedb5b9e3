//! Clap derive structures for the `storng` CLI.
//!
//! Also compiled into `build.rs` for man page generation, so this module
//! must only depend on `clap` and `clap_complete`.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// storng -- talk to a remote API through a synchronized entry store
#[derive(Debug, Parser)]
#[command(
    name = "storng",
    version,
    about = "Call remote APIs through a synchronized entry store",
    long_about = "Issue requests against a configured API prefix with automatic\n\
        access-token refresh, or run a single sync operation on a named entry\n\
        and print the entry it leaves behind.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "STORNG_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API prefix URL (overrides profile)
    #[arg(long, short = 'u', env = "STORNG_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Access token (overrides profile and keyring)
    #[arg(long, env = "STORNG_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "STORNG_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "STORNG_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "STORNG_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Shared enums ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Field/value table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// How a successful result is folded into the entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Shallow-merge the result object into the entry
    #[default]
    Update,
    /// Replace the entry data with the result
    Replace,
    /// Clear the entry and mark it unloaded
    Remove,
    /// Recursively merge the result into the entry
    DeepMerge,
    /// Keep the entry data, only track loading and errors
    Nothing,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one request and print the response data
    #[command(alias = "f")]
    Fetch(FetchArgs),

    /// Run one sync operation on an entry and print the resulting entry
    #[command(alias = "c")]
    Call(CallArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Request arguments ────────────────────────────────────────────────

/// Route and payload shared by `fetch` and `call`.
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Route path relative to the API prefix, e.g. /users/{id}
    pub path: String,

    /// HTTP method
    #[arg(long, short = 'X', value_enum, default_value_t = HttpMethod::Get, ignore_case = true)]
    pub method: HttpMethod,

    /// Send the access token with the request
    #[arg(long)]
    pub private: bool,

    /// Request data as JSON, or @file to read it from a file
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Entry name
    pub entry: String,

    #[command(flatten)]
    pub request: RequestArgs,

    /// Strategy applied to the result
    #[arg(long, short = 's', value_enum, default_value_t = StrategyArg::Update)]
    pub strategy: StrategyArg,

    /// Initial entry data as JSON
    #[arg(long)]
    pub init: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the effective configuration (tokens redacted)
    Show,

    /// Interactive configuration wizard
    Init,

    /// Store an access token in the system keyring
    SetToken {
        /// Profile to store the token for (defaults to the active profile)
        #[arg(long = "for")]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
