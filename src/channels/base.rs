use crate::config::{Config, ResolvedAccount};
use async_trait::async_trait;
use rocketlink_core::PeerKind;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCapabilities {
    pub chat_types: Vec<PeerKind>,
    pub reactions: bool,
    pub threads: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMeta {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub capabilities: ChannelCapabilities,
}

/// Where an outbound message should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Already-resolved room id, written as `room:<id>`.
    Room(String),
    /// Channel name, with or without a leading `#`.
    Channel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTarget {
    pub to: String,
    pub text: String,
    pub thread_id: Option<String>,
}

impl OutboundTarget {
    pub fn destination(&self) -> Destination {
        let to = self.to.trim();
        match to.strip_prefix("room:") {
            Some(room_id) => Destination::Room(room_id.trim().to_string()),
            None => Destination::Channel(to.trim_start_matches('#').to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub ok: bool,
    pub detail: String,
}

impl ProbeResult {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// What a host runtime needs from a chat channel integration.
#[async_trait]
pub trait ChannelPlugin: Send + Sync {
    fn meta(&self) -> ChannelMeta;

    fn list_account_ids(&self, config: &Config) -> Vec<String>;

    fn resolve_account(&self, config: &Config, account_id: &str) -> Option<ResolvedAccount>;

    /// Has the minimum fields needed to talk to the chat service.
    fn is_configured(&self, account: &ResolvedAccount) -> bool;

    /// One-line summary for listings. Never includes secrets.
    fn describe_account(&self, account: &ResolvedAccount) -> String;

    /// Run the account until `cancel` fires. An unknown account id is logged and
    /// returns `Ok` without starting anything.
    async fn start_account(
        &self,
        config: &Config,
        account_id: &str,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>;

    /// Post `target.text` and return the new message id.
    async fn send_text(
        &self,
        account: &ResolvedAccount,
        target: &OutboundTarget,
    ) -> anyhow::Result<String>;

    async fn probe(&self, account: &ResolvedAccount) -> ProbeResult;
}
