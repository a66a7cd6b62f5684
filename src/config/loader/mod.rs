use crate::config::Config;
use crate::utils::get_rocketlink_home;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variables that override config fields when set and non-empty.
pub const ENV_OVERRIDES: &[&str] = &[
    "ROCKETLINK_SERVER_URL",
    "ROCKETLINK_AUTH_TOKEN",
    "ROCKETLINK_USER_ID",
    "ROCKETLINK_AGENT_WEBHOOK_URL",
    "ROCKETLINK_AGENT_AUTH_TOKEN",
];

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_rocketlink_home()?.join("config.json"))
}

pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    let mut config = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        check_file_permissions(path);
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON from {}", path.display()))?
    } else {
        debug!("no config at {}, using defaults", path.display());
        Config::default()
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    config
        .validate()
        .with_context(|| "Configuration validation failed")?;
    Ok(config)
}

/// Apply environment overrides. Any variable that is set and non-empty overwrites
/// the corresponding field, so secrets can be injected without touching the file.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    for name in ENV_OVERRIDES {
        let Some(val) = lookup(name).filter(|v| !v.is_empty()) else {
            continue;
        };
        let shorthand = &mut config.channels.rocketchat.base;
        match *name {
            "ROCKETLINK_SERVER_URL" => shorthand.server_url = Some(val),
            "ROCKETLINK_AUTH_TOKEN" => shorthand.auth_token = Some(val),
            "ROCKETLINK_USER_ID" => shorthand.user_id = Some(val),
            "ROCKETLINK_AGENT_WEBHOOK_URL" => config.agent.webhook_url = val,
            "ROCKETLINK_AGENT_AUTH_TOKEN" => config.agent.auth_token = val,
            _ => {}
        }
    }
}

/// Warn if the config file is readable by group or others; it holds auth tokens.
#[cfg(unix)]
fn check_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o077 != 0 {
            warn!(
                "config file {} has permissions {:o}, recommend 0600",
                path.display(),
                mode & 0o777
            );
        }
    }
}

#[cfg(not(unix))]
fn check_file_permissions(_path: &Path) {}
