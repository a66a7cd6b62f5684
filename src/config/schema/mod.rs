use rocketlink_core::errors::BridgeError;
use serde::{Deserialize, Serialize};

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name`: printed normally via `&self.field_name`
/// - `redact(field_name)`: `String` field: shows `[empty]` or `[REDACTED]`
/// - `redact_option(field_name)`: `Option<String>` field: shows `None` or `Some("[REDACTED]")`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, redact_option($field:ident)) => {
        $builder.field(
            stringify!($field),
            &$self.$field.as_ref().map(|_| "[REDACTED]"),
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, redact_option($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact_option($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

// Declared after the macro so they can use `redact_debug!`
mod channels;

pub use channels::*;

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

fn default_agent_timeout() -> u64 {
    120
}

/// Where inbound messages are handed off when running the webhook agent.
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default, rename = "webhookUrl")]
    pub webhook_url: String,
    #[serde(default, rename = "authToken")]
    pub auth_token: String,
    #[serde(default = "default_agent_timeout", rename = "timeoutSeconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_agent_id", rename = "agentId")]
    pub agent_id: String,
}

fn default_agent_id() -> String {
    "main".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            auth_token: String::new(),
            timeout_seconds: default_agent_timeout(),
            agent_id: default_agent_id(),
        }
    }
}

redact_debug!(
    AgentConfig,
    webhook_url,
    redact(auth_token),
    timeout_seconds,
    agent_id,
);

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), BridgeError> {
        self.validate_channels()?;
        self.validate_agent()?;
        Ok(())
    }

    fn validate_channels(&self) -> Result<(), BridgeError> {
        let rc = &self.channels.rocketchat;
        for id in rc.account_ids() {
            let Some(account) = rc.resolve(&id) else {
                continue;
            };
            let prefix = if rc.accounts.is_empty() {
                "channels.rocketchat".to_string()
            } else {
                format!("channels.rocketchat.accounts.{id}")
            };
            if account.poll_interval.is_zero() {
                return Err(BridgeError::Config(format!(
                    "{prefix}.pollIntervalSeconds must be > 0"
                )));
            }
            if account.thread_ttl.is_zero() {
                return Err(BridgeError::Config(format!(
                    "{prefix}.threadTtlHours must be > 0"
                )));
            }
            if !account.server_url.is_empty() && !is_http_url(&account.server_url) {
                return Err(BridgeError::Config(format!(
                    "{prefix}.serverUrl must start with http:// or https://"
                )));
            }
        }
        Ok(())
    }

    fn validate_agent(&self) -> Result<(), BridgeError> {
        let a = &self.agent;
        if !a.webhook_url.is_empty() && !is_http_url(&a.webhook_url) {
            return Err(BridgeError::Config(
                "agent.webhookUrl must start with http:// or https://".into(),
            ));
        }
        if a.timeout_seconds == 0 {
            return Err(BridgeError::Config(
                "agent.timeoutSeconds must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
