//! Rocket.Chat channel: REST polling of one channel per account, reaction
//! feedback, and threaded replies.

pub mod client;
pub mod dispatch;
pub mod filter;
pub mod poller;
pub mod reactions;
pub mod threads;

#[cfg(test)]
pub(crate) mod test_support;

use crate::channels::base::{
    ChannelCapabilities, ChannelMeta, ChannelPlugin, Destination, OutboundTarget, ProbeResult,
};
use crate::config::{Config, ResolvedAccount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use client::{PostMessage, RocketChatClient};
use poller::PollingEngine;
use rocketlink_core::{AgentRuntime, BridgeError, PeerKind};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const CHANNEL_ID: &str = "rocketchat";

pub struct RocketChatPlugin {
    runtime: Arc<dyn AgentRuntime>,
}

impl RocketChatPlugin {
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl ChannelPlugin for RocketChatPlugin {
    fn meta(&self) -> ChannelMeta {
        ChannelMeta {
            id: CHANNEL_ID,
            label: "Rocket.Chat",
            description: "Polls a Rocket.Chat channel and answers in threads",
            capabilities: ChannelCapabilities {
                chat_types: vec![PeerKind::Group],
                reactions: true,
                threads: true,
            },
        }
    }

    fn list_account_ids(&self, config: &Config) -> Vec<String> {
        config.channels.rocketchat.account_ids()
    }

    fn resolve_account(&self, config: &Config, account_id: &str) -> Option<ResolvedAccount> {
        config.channels.rocketchat.resolve(account_id)
    }

    fn is_configured(&self, account: &ResolvedAccount) -> bool {
        account.is_configured()
    }

    fn describe_account(&self, account: &ResolvedAccount) -> String {
        if !account.is_configured() {
            return format!("{}: not configured", account.account_id);
        }
        let identity = account.username.as_deref().unwrap_or(&account.user_id);
        let channel = if account.channel.is_empty() {
            "(no channel)".to_string()
        } else {
            format!("#{}", account.channel)
        };
        format!(
            "{}: {} {} as {}, every {}s{}",
            account.account_id,
            account.server_url,
            channel,
            identity,
            account.poll_interval.as_secs(),
            if account.enabled { "" } else { " (disabled)" }
        )
    }

    async fn start_account(
        &self,
        config: &Config,
        account_id: &str,
        cancel: CancellationToken,
    ) -> Result<()> {
        let Some(account) = self.resolve_account(config, account_id) else {
            error!("rocketchat account {} is not configured, not starting", account_id);
            return Ok(());
        };
        if !account.enabled {
            info!("rocketchat account {} is disabled", account_id);
            return Ok(());
        }
        if !account.can_poll() {
            return Err(BridgeError::Config(format!(
                "rocketchat account {} needs serverUrl, authToken, userId and channel",
                account_id
            ))
            .into());
        }

        info!("starting rocketchat account {}", account_id);
        let mut engine = PollingEngine::new(account, self.runtime.clone());
        engine.run(cancel).await
    }

    async fn send_text(
        &self,
        account: &ResolvedAccount,
        target: &OutboundTarget,
    ) -> Result<String> {
        if !account.is_configured() {
            return Err(BridgeError::Config(format!(
                "rocketchat account {} needs serverUrl, authToken and userId",
                account.account_id
            ))
            .into());
        }
        let client = RocketChatClient::from_account(account);
        let room_id = match target.destination() {
            Destination::Room(room_id) => room_id,
            Destination::Channel(name) => {
                client
                    .resolve_channel(&name)
                    .await
                    .with_context(|| format!("failed to resolve channel #{}", name))?
                    .room_id
            }
        };
        let posted = client
            .post_message(PostMessage {
                room_id: &room_id,
                text: &target.text,
                thread_id: target.thread_id.as_deref(),
            })
            .await
            .with_context(|| format!("failed to post to room {}", room_id))?;
        Ok(posted.message_id)
    }

    async fn probe(&self, account: &ResolvedAccount) -> ProbeResult {
        if !account.is_configured() {
            return ProbeResult::failed("missing serverUrl, authToken or userId");
        }
        let identity = RocketChatClient::from_account(account)
            .probe_identity()
            .await;
        if identity.ok {
            ProbeResult::ok(format!(
                "authenticated as {} ({})",
                identity.username.as_deref().unwrap_or("unknown"),
                identity.user_id.as_deref().unwrap_or("?")
            ))
        } else {
            ProbeResult::failed(format!(
                "could not authenticate against {}",
                account.server_url
            ))
        }
    }
}
