//! Shared configuration for storng tools.
//!
//! TOML profiles, access-token resolution (env + keyring + plaintext),
//! and translation to `storng_core::StoreConfig`. The CLI adds
//! flag-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use storng_core::{Method, Route, StoreConfig, TlsMode};
use thiserror::Error;
use tracing::debug;

/// Keyring service name for stored access tokens.
pub const KEYRING_SERVICE: &str = "storng";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named service profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: `requested`, else the configured
    /// default, else `"default"`.
    pub fn profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds before expiry at which access tokens are refreshed.
    #[serde(default = "default_refresh_lookahead")]
    pub refresh_lookahead: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            refresh_lookahead: default_refresh_lookahead(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_refresh_lookahead() -> u64 {
    30
}

/// A named service profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Base URL of the API (e.g., "https://api.example.com/v1").
    pub api_url: String,

    /// Store (cache) name.
    pub store_name: Option<String>,

    /// Path of the token refresh route, relative to `api_url`.
    pub refresh_path: Option<String>,

    /// HTTP method of the refresh route (default POST).
    pub refresh_method: Option<String>,

    /// Access token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the access token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "storng", "storng").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("storng");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path`, then `STORNG_*` environment variables.
///
/// Nested keys use a double underscore: `STORNG_DEFAULTS__TIMEOUT=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("STORNG_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/token"),
    )?)
}

/// Resolve the access token: `token_env`, then the system keyring, then
/// the plaintext `token`. `None` means the profile is used anonymously.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile
        .token
        .as_ref()
        .map(|t| SecretString::from(t.clone()))
}

/// Store `token` in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token.expose_secret())?;
    Ok(())
}

// ── Translation to StoreConfig ──────────────────────────────────────

/// Build a `StoreConfig` from a profile and the global defaults.
pub fn profile_to_store_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<StoreConfig, ConfigError> {
    let api_prefix: url::Url = profile
        .api_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {}", profile.api_url),
        })?;

    let name = profile
        .store_name
        .clone()
        .unwrap_or_else(|| profile_name.to_owned());
    let mut config = StoreConfig::new(name, api_prefix);

    if let Some(ref path) = profile.refresh_path {
        let method = match profile.refresh_method.as_deref() {
            Some(raw) => raw.parse::<Method>().map_err(|_| ConfigError::Validation {
                field: "refresh_method".into(),
                reason: format!("expected GET, POST, PUT, PATCH or DELETE, got '{raw}'"),
            })?,
            None => Method::Post,
        };
        config.refresh_route = Some(Route::new(method, path.clone()).authenticated());
    }

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.refresh_lookahead = Duration::from_secs(defaults.refresh_lookahead);

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    fn profile(api_url: &str) -> Profile {
        Profile {
            api_url: api_url.into(),
            ..Profile::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.output, "table");
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "prod".into(),
            Profile {
                refresh_path: Some("/auth/refresh".into()),
                ..profile("https://api.example.com/v1")
            },
        );
        save_config_to(&path, &cfg).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let prod = loaded.profile("prod").unwrap();
        assert_eq!(prod.api_url, "https://api.example.com/v1");
        assert_eq!(prod.refresh_path.as_deref(), Some("/auth/refresh"));
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "dev"

                [defaults]
                timeout = 10

                [profiles.dev]
                api_url = "http://localhost:8080"
                "#,
            )?;
            jail.set_env("STORNG_DEFAULTS__TIMEOUT", "5");

            let config = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(config.default_profile.as_deref(), Some("dev"));
            assert_eq!(config.defaults.timeout, 5);
            assert_eq!(config.profile_name(None), "dev");
            assert_eq!(config.profile_name(Some("prod")), "prod");
            Ok(())
        });
    }

    #[test]
    fn unknown_profile_is_reported() {
        let err = Config::default().profile("nope").unwrap_err();
        assert_eq!(err.to_string(), "profile 'nope' not found");
    }

    #[test]
    fn plaintext_token_is_last_resort() {
        let p = Profile {
            token: Some("plain".into()),
            token_env: Some("STORNG_TEST_TOKEN_THAT_IS_NEVER_SET".into()),
            ..profile("https://api.test")
        };
        // No keyring entry exists for this throwaway profile name.
        let token = resolve_token(&p, "storng-config-unit-test-profile").unwrap();
        assert_eq!(token.expose_secret(), "plain");
    }

    #[test]
    fn profile_translates_to_store_config() {
        let p = Profile {
            store_name: Some("app".into()),
            refresh_path: Some("/auth/refresh".into()),
            refresh_method: Some("put".into()),
            timeout: Some(7),
            ..profile("https://api.example.com/v1/")
        };
        let config = profile_to_store_config(&p, "prod", &Defaults::default()).unwrap();

        assert_eq!(config.name, "app");
        assert_eq!(config.prefix(), "https://api.example.com/v1");
        assert_eq!(
            config.refresh_route,
            Some(Route::put("/auth/refresh").authenticated())
        );
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.refresh_lookahead, Duration::from_secs(30));
        assert!(matches!(config.tls, TlsMode::System));
    }

    #[test]
    fn insecure_default_applies_without_override() {
        let defaults = Defaults {
            insecure: true,
            ..Defaults::default()
        };
        let config = profile_to_store_config(&profile("https://a.test"), "p", &defaults).unwrap();
        assert!(matches!(config.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(config.name, "p");
    }

    #[test]
    fn invalid_url_and_method_are_rejected() {
        let err = profile_to_store_config(&profile("not a url"), "p", &Defaults::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "api_url"));

        let p = Profile {
            refresh_path: Some("/r".into()),
            refresh_method: Some("FETCH".into()),
            ..profile("https://a.test")
        };
        let err = profile_to_store_config(&p, "p", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "refresh_method"));
    }
}
