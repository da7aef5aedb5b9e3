//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use storng_config::ConfigError;
use storng_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const REMOTE: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────

    #[error("No access token configured for profile '{profile}'")]
    #[diagnostic(
        code(storng::no_token),
        help(
            "Private routes need an access token.\n\
             Pass --token, set STORNG_TOKEN, or run: storng config set-token --for {profile}"
        )
    )]
    NoToken { profile: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(storng::auth_failed),
        help("The access token was rejected or could not be refreshed.")
    )]
    AuthFailed { message: String },

    // ── Remote ───────────────────────────────────────────────────────

    #[error("{method} {path} failed: {message}")]
    #[diagnostic(code(storng::remote))]
    Remote {
        method: String,
        path: String,
        message: String,
    },

    #[error("{message}")]
    #[diagnostic(code(storng::core))]
    Core { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(storng::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid JSON for {field}: {source}")]
    #[diagnostic(
        code(storng::json),
        help("Pass a JSON document, or @path to read one from a file.")
    )]
    Json {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(storng::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: storng config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No API URL configured")]
    #[diagnostic(
        code(storng::no_config),
        help(
            "Pass --api-url, or create a profile with: storng config init\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(storng::config))]
    Config(ConfigError),

    // ── IO / Rendering ───────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {reason}")]
    #[diagnostic(code(storng::render))]
    Render { reason: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoToken { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Remote { .. } => exit_code::REMOTE,
            Self::Validation { .. } | Self::Json { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Wrap a JSON parse failure for the named argument.
    pub fn json(field: &str, source: serde_json::Error) -> Self {
        Self::Json {
            field: field.into(),
            source,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Config { message } => Self::Validation {
                field: "transport".into(),
                reason: message,
            },
            other => Self::Core {
                message: other.to_string(),
            },
        }
    }
}
