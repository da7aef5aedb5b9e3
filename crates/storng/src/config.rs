//! Flag-aware wrappers around `storng_config`.
//!
//! Global flags override the active profile; with `--api-url` the CLI works
//! without any config file at all.

use secrecy::SecretString;
use storng_config::{Config, Profile};
use storng_core::{Store, StoreConfig, TlsMode};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a command needs to reach the remote service.
pub struct Resolved {
    pub profile_name: String,
    pub store: StoreConfig,
    pub token: Option<SecretString>,
}

impl Resolved {
    /// A store for this invocation. Entries live only as long as the
    /// process, so no persistence is attached.
    pub fn open_store(&self) -> Result<Store, CliError> {
        Ok(Store::connect(self.store.clone())?)
    }
}

/// Active profile name: `--profile`, then the config's default.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// Build the store configuration and access token from the config file,
/// the active profile and CLI overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let config = storng_config::load_config()?;
    resolve_with(global, &config)
}

pub(crate) fn resolve_with(global: &GlobalOpts, config: &Config) -> Result<Resolved, CliError> {
    let profile_name = active_profile_name(global, config);

    let mut profile = match (config.profiles.get(&profile_name), &global.api_url) {
        (Some(profile), _) => profile.clone(),
        // No profile: flags alone are enough.
        (None, Some(_)) => Profile::default(),
        (None, None) if global.profile.is_some() => {
            return Err(profile_not_found(&profile_name, config));
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: storng_config::config_path().display().to_string(),
            });
        }
    };

    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }

    let store = storng_config::profile_to_store_config(&profile, &profile_name, &config.defaults)?;
    let token = match global.token {
        Some(ref token) => Some(SecretString::from(token.clone())),
        None => storng_config::resolve_token(&profile, &profile_name),
    };

    tracing::debug!(
        profile = %profile_name,
        prefix = store.prefix(),
        insecure = matches!(store.tls, TlsMode::DangerAcceptInvalid),
        timeout_secs = store.timeout.as_secs(),
        has_token = token.is_some(),
        "resolved store configuration"
    );

    Ok(Resolved {
        profile_name,
        store,
        token,
    })
}

pub(crate) fn profile_not_found(name: &str, config: &Config) -> CliError {
    let mut available: Vec<_> = config.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name: name.into(),
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}
