//! Forwards inbound messages to an HTTP agent endpoint.
//!
//! Request: `POST {webhookUrl}` with `{"sessionKey": .., "context": InboundContext}`.
//! Response: `{"replies": [..]}`, `{"reply": ".."}` and/or `{"error": ".."}`.
//! Replies are either plain strings or `{"text": .., "mediaUrls": [..]}` objects.

use crate::config::AgentConfig;
use crate::utils::http::{MAX_ERROR_BODY_BYTES, http_client, limited_text};
use crate::utils::truncate_chars;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use rocketlink_core::{
    AgentRoute, AgentRuntime, InboundContext, ReplyPayload, ReplySink, RouteRequest,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Largest agent response accepted.
const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookRequest<'a> {
    session_key: &'a str,
    context: &'a InboundContext,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WebhookReply {
    Text(String),
    Payload(ReplyPayload),
}

impl From<WebhookReply> for ReplyPayload {
    fn from(reply: WebhookReply) -> Self {
        match reply {
            WebhookReply::Text(text) => ReplyPayload::text(text),
            WebhookReply::Payload(payload) => payload,
        }
    }
}

#[derive(Deserialize, Default)]
struct WebhookResponse {
    #[serde(default)]
    replies: Vec<WebhookReply>,
    #[serde(default)]
    reply: Option<WebhookReply>,
    #[serde(default)]
    error: Option<String>,
}

pub struct WebhookAgent {
    url: String,
    auth_token: String,
    agent_id: String,
    http: Client,
}

impl WebhookAgent {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        if config.webhook_url.is_empty() {
            bail!("agent.webhookUrl is not set");
        }
        let http = http_client(Duration::from_secs(config.timeout_seconds))
            .context("failed to build agent HTTP client")?;
        Ok(Self {
            url: config.webhook_url.clone(),
            auth_token: config.auth_token.clone(),
            agent_id: config.agent_id.clone(),
            http,
        })
    }
}

#[async_trait]
impl AgentRuntime for WebhookAgent {
    fn resolve_agent_route(&self, request: &RouteRequest) -> Result<AgentRoute> {
        if request.peer.id.is_empty() {
            bail!("cannot route a message without a sender");
        }
        Ok(AgentRoute {
            session_key: format!(
                "agent:{}:{}:{}:{}:{}",
                self.agent_id,
                request.channel,
                request.account_id,
                request.peer.kind,
                request.peer.id
            ),
        })
    }

    async fn dispatch_reply(&self, ctx: InboundContext, sink: &dyn ReplySink) -> Result<()> {
        let body = WebhookRequest {
            session_key: &ctx.session_key,
            context: &ctx,
        };
        let mut req = self.http.post(&self.url).json(&body);
        if !self.auth_token.is_empty() {
            req = req.bearer_auth(&self.auth_token);
        }
        let resp = req.send().await.context("agent webhook request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = limited_text(resp, MAX_ERROR_BODY_BYTES)
                .await
                .unwrap_or_default();
            bail!(
                "agent webhook returned HTTP {}: {}",
                status.as_u16(),
                truncate_chars(&text, 200)
            );
        }

        let text = limited_text(resp, MAX_RESPONSE_BYTES).await?;
        let parsed: WebhookResponse = if text.trim().is_empty() {
            WebhookResponse::default()
        } else {
            serde_json::from_str(&text).context("agent webhook returned invalid JSON")?
        };
        debug!(
            "agent webhook answered {} with {} reply(ies)",
            ctx.message_id,
            parsed.replies.len() + usize::from(parsed.reply.is_some())
        );

        for reply in parsed.replies.into_iter().chain(parsed.reply) {
            sink.deliver(reply.into()).await?;
        }
        if let Some(err) = parsed.error {
            sink.on_error(anyhow!(err));
        }
        Ok(())
    }
}
