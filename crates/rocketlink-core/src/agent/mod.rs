//! Contract with the external agent runtime that turns inbound messages into replies.
//!
//! The polling engine never knows how an agent works; it resolves a route, hands
//! over an [`InboundContext`] together with a [`ReplySink`], and judges the outcome
//! purely from what arrived at the sink.

use crate::history::InboundHistoryEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerKind {
    Direct,
    Group,
}

impl std::fmt::Display for PeerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Group => write!(f, "group"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub kind: PeerKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub channel: String,
    pub account_id: String,
    pub peer: Peer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRoute {
    pub session_key: String,
}

/// Everything the agent runtime receives about one inbound chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundContext {
    pub body: String,
    pub raw_body: String,
    pub from: String,
    pub sender_id: String,
    pub sender_username: String,
    pub sender_name: String,
    pub session_key: String,
    pub account_id: String,
    pub channel: String,
    pub chat_type: String,
    pub room_id: String,
    pub message_id: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_starter_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_history: Option<Vec<InboundHistoryEntry>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

impl ReplyPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            media_urls: Vec::new(),
        }
    }

    /// Single message body: text followed by one media URL per line.
    pub fn render(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(text) = self.text.as_deref()
            && !text.trim().is_empty()
        {
            parts.push(text);
        }
        parts.extend(self.media_urls.iter().map(String::as_str));
        parts.join("\n")
    }
}

/// Callbacks the agent runtime uses to hand back output for one message.
///
/// `deliver` may be called any number of times. `on_error` reports a failure the
/// runtime handled itself; any call to it marks the whole message as failed.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, payload: ReplyPayload) -> anyhow::Result<()>;
    fn on_error(&self, error: anyhow::Error);
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Deterministic for equal requests.
    fn resolve_agent_route(&self, request: &RouteRequest) -> anyhow::Result<AgentRoute>;

    /// Run the agent for `ctx`, pushing output through `sink`. Errors returned here
    /// (including ones bubbled up from `sink.deliver`) fail the message.
    async fn dispatch_reply(&self, ctx: InboundContext, sink: &dyn ReplySink)
    -> anyhow::Result<()>;
}
