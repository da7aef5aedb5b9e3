//! Config subcommand handlers.

use dialoguer::{Input, Select};
use secrecy::SecretString;
use serde_json::Value;
use storng_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// The config as a JSON tree with plaintext tokens masked and unset
/// fields dropped (TOML has no null).
fn redacted(cfg: &Config) -> Result<Value, CliError> {
    let mut tree = serde_json::to_value(cfg).map_err(|e| CliError::Render {
        reason: e.to_string(),
    })?;
    strip_nulls(&mut tree);
    if let Some(profiles) = tree.get_mut("profiles").and_then(Value::as_object_mut) {
        for profile in profiles.values_mut() {
            if let Some(token) = profile.get_mut("token") {
                *token = Value::String(REDACTED.into());
            }
        }
    }
    Ok(tree)
}

fn strip_nulls(value: &mut Value) {
    if let Value::Object(map) = value {
        map.retain(|_, v| !v.is_null());
        map.values_mut().for_each(strip_nulls);
    }
}

fn optional(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(
                &storng_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = storng_config::load_config()?;
            let tree = redacted(&cfg)?;
            let out = output::render(global.output, &tree, |tree| {
                toml::to_string_pretty(tree).map_err(|e| CliError::Render {
                    reason: e.to_string(),
                })
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init => init(),

        ConfigCommand::SetToken { profile } => {
            let cfg = storng_config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(config::profile_not_found(&profile_name, &cfg));
            }

            let token = rpassword::prompt_password("Access token: ").map_err(prompt_err)?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "value cannot be empty".into(),
                });
            }

            storng_config::store_token(&profile_name, &SecretString::from(token))?;
            eprintln!("✓ Token stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init() -> Result<(), CliError> {
    let config_path = storng_config::config_path();
    eprintln!("storng configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let api_url: String = Input::new()
        .with_prompt("API URL")
        .default("http://localhost:3000/api".into())
        .interact_text()
        .map_err(prompt_err)?;

    let refresh_path: String = Input::new()
        .with_prompt("Token refresh path (empty for none)")
        .allow_empty(true)
        .default("/auth/refresh".into())
        .interact_text()
        .map_err(prompt_err)?;

    let token_choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
        "No token for now",
    ];
    let token_selection = Select::new()
        .with_prompt("Access token")
        .items(token_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let token = if token_selection == 2 {
        None
    } else {
        let token = rpassword::prompt_password("Access token: ").map_err(prompt_err)?;
        optional(&token)
    };

    let mut profile = Profile {
        api_url,
        refresh_path: optional(&refresh_path),
        ..Profile::default()
    };
    match (token, token_selection) {
        (Some(token), 0) => {
            storng_config::store_token(&profile_name, &SecretString::from(token))?;
            eprintln!("   ✓ Token stored in system keyring");
        }
        (Some(token), _) => profile.token = Some(token),
        (None, _) => {}
    }

    // Validate before writing anything.
    let mut cfg = storng_config::load_config_or_default();
    storng_config::profile_to_store_config(&profile, &profile_name, &cfg.defaults)?;

    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    let path = storng_config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: storng fetch /health");
    Ok(())
}
