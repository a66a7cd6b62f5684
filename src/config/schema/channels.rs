use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Account id used for the single-account shorthand form.
pub const DEFAULT_ACCOUNT_ID: &str = "default";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_THREAD_TTL_HOURS: u64 = 24;
pub const DEFAULT_THREAD_CONTEXT_CHARS: usize = 16_000;

/// One Rocket.Chat account. Every field is optional so named accounts can
/// inherit from the top-level shorthand.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RocketChatAccountConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, rename = "serverUrl", skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(default, rename = "authToken", skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Bot display username; cosmetic only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        default,
        rename = "pollIntervalSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub poll_interval_secs: Option<u64>,
    #[serde(
        default,
        rename = "threadTtlHours",
        skip_serializing_if = "Option::is_none"
    )]
    pub thread_ttl_hours: Option<u64>,
    #[serde(
        default,
        rename = "threadContextChars",
        skip_serializing_if = "Option::is_none"
    )]
    pub thread_context_chars: Option<usize>,
}

redact_debug!(
    RocketChatAccountConfig,
    enabled,
    server_url,
    redact_option(auth_token),
    user_id,
    channel,
    username,
    poll_interval_secs,
    thread_ttl_hours,
    thread_context_chars,
);

impl RocketChatAccountConfig {
    fn has_connection_fields(&self) -> bool {
        self.server_url.is_some()
            || self.auth_token.is_some()
            || self.user_id.is_some()
            || self.channel.is_some()
    }

    /// Fill unset fields from `base`.
    fn merged_over(&self, base: &Self) -> Self {
        Self {
            enabled: self.enabled.or(base.enabled),
            server_url: self.server_url.clone().or_else(|| base.server_url.clone()),
            auth_token: self.auth_token.clone().or_else(|| base.auth_token.clone()),
            user_id: self.user_id.clone().or_else(|| base.user_id.clone()),
            channel: self.channel.clone().or_else(|| base.channel.clone()),
            username: self.username.clone().or_else(|| base.username.clone()),
            poll_interval_secs: self.poll_interval_secs.or(base.poll_interval_secs),
            thread_ttl_hours: self.thread_ttl_hours.or(base.thread_ttl_hours),
            thread_context_chars: self.thread_context_chars.or(base.thread_context_chars),
        }
    }
}

/// `channels.rocketchat`: either a single account written inline, or an
/// `accounts` map whose entries inherit the inline fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RocketChatConfig {
    #[serde(flatten)]
    pub base: RocketChatAccountConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accounts: BTreeMap<String, RocketChatAccountConfig>,
}

impl RocketChatConfig {
    /// Configured account ids, sorted.
    pub fn account_ids(&self) -> Vec<String> {
        if !self.accounts.is_empty() {
            return self.accounts.keys().cloned().collect();
        }
        if self.base.has_connection_fields() {
            return vec![DEFAULT_ACCOUNT_ID.to_string()];
        }
        Vec::new()
    }

    pub fn resolve(&self, account_id: &str) -> Option<ResolvedAccount> {
        let merged = if self.accounts.is_empty() {
            if account_id != DEFAULT_ACCOUNT_ID || !self.base.has_connection_fields() {
                return None;
            }
            self.base.clone()
        } else {
            self.accounts.get(account_id)?.merged_over(&self.base)
        };
        Some(ResolvedAccount::from_config(account_id, &merged))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub rocketchat: RocketChatConfig,
}

/// Fully defaulted account settings ready to drive a polling engine.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    pub account_id: String,
    pub enabled: bool,
    pub server_url: String,
    pub auth_token: String,
    pub user_id: String,
    pub channel: String,
    pub username: Option<String>,
    pub poll_interval: Duration,
    pub thread_ttl: Duration,
    pub thread_context_chars: usize,
}

redact_debug!(
    ResolvedAccount,
    account_id,
    enabled,
    server_url,
    redact(auth_token),
    user_id,
    channel,
    username,
    poll_interval,
    thread_ttl,
    thread_context_chars,
);

impl ResolvedAccount {
    fn from_config(account_id: &str, cfg: &RocketChatAccountConfig) -> Self {
        let trimmed = |v: &Option<String>| v.as_deref().unwrap_or("").trim().to_string();
        Self {
            account_id: account_id.to_string(),
            enabled: cfg.enabled.unwrap_or(true),
            server_url: trimmed(&cfg.server_url).trim_end_matches('/').to_string(),
            auth_token: trimmed(&cfg.auth_token),
            user_id: trimmed(&cfg.user_id),
            channel: trimmed(&cfg.channel).trim_start_matches('#').to_string(),
            username: cfg
                .username
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(ToString::to_string),
            poll_interval: Duration::from_secs(
                cfg.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            thread_ttl: Duration::from_secs(
                cfg.thread_ttl_hours
                    .unwrap_or(DEFAULT_THREAD_TTL_HOURS)
                    .saturating_mul(3600),
            ),
            thread_context_chars: cfg
                .thread_context_chars
                .unwrap_or(DEFAULT_THREAD_CONTEXT_CHARS),
        }
    }

    /// Has the fields needed to talk to the server at all.
    pub fn is_configured(&self) -> bool {
        !self.server_url.is_empty() && !self.auth_token.is_empty() && !self.user_id.is_empty()
    }

    /// Has everything needed to start polling.
    pub fn can_poll(&self) -> bool {
        self.is_configured() && !self.channel.is_empty()
    }
}
