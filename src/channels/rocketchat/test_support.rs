//! Fixtures shared by the Rocket.Chat unit tests.

use crate::config::ResolvedAccount;
use anyhow::anyhow;
use async_trait::async_trait;
use rocketlink_core::{
    AgentRoute, AgentRuntime, InboundContext, ReplyPayload, ReplySink, RouteRequest,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone)]
pub enum AgentBehavior {
    Reply(String),
    Silent,
    ReportError(String),
    ReplyThenError(String, String),
    Fail(String),
    FailRoute,
}

pub struct ScriptedAgent {
    behavior: AgentBehavior,
    contexts: Mutex<Vec<InboundContext>>,
}

impl ScriptedAgent {
    pub fn new(behavior: AgentBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(AgentBehavior::Reply(text.to_string()))
    }

    pub fn dispatched(&self) -> Vec<InboundContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedAgent {
    fn resolve_agent_route(&self, request: &RouteRequest) -> anyhow::Result<AgentRoute> {
        if matches!(self.behavior, AgentBehavior::FailRoute) {
            return Err(anyhow!("no route for {}", request.peer.id));
        }
        Ok(AgentRoute {
            session_key: format!("test:{}:{}", request.account_id, request.peer.id),
        })
    }

    async fn dispatch_reply(
        &self,
        ctx: InboundContext,
        sink: &dyn ReplySink,
    ) -> anyhow::Result<()> {
        self.contexts.lock().unwrap().push(ctx);
        match &self.behavior {
            AgentBehavior::Reply(text) => sink.deliver(ReplyPayload::text(text.clone())).await,
            AgentBehavior::Silent | AgentBehavior::FailRoute => Ok(()),
            AgentBehavior::ReportError(err) => {
                sink.on_error(anyhow!(err.clone()));
                Ok(())
            }
            AgentBehavior::ReplyThenError(text, err) => {
                sink.deliver(ReplyPayload::text(text.clone())).await?;
                sink.on_error(anyhow!(err.clone()));
                Ok(())
            }
            AgentBehavior::Fail(err) => Err(anyhow!(err.clone())),
        }
    }
}

pub fn account(server_url: &str) -> ResolvedAccount {
    ResolvedAccount {
        account_id: "default".into(),
        enabled: true,
        server_url: server_url.to_string(),
        auth_token: "tok".into(),
        user_id: "BOT".into(),
        channel: "general".into(),
        username: Some("bot".into()),
        poll_interval: Duration::from_millis(10),
        thread_ttl: Duration::from_secs(24 * 3600),
        thread_context_chars: 16_000,
    }
}

pub fn message_json(id: &str, sender_id: &str, text: &str) -> Value {
    json!({
        "_id": id,
        "rid": "R1",
        "msg": text,
        "u": {"_id": sender_id, "username": format!("user-{sender_id}")},
        "ts": "2024-05-01T10:00:00.000Z",
    })
}

/// Accept every write call (`chat.react`, `chat.postMessage`) with success.
pub async fn mount_writes(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/chat.react"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat.postMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"_id": "REPLY"},
            "success": true,
        })))
        .mount(server)
        .await;
}

async fn bodies(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == endpoint)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

/// `(message_id, emoji, should_react)` for every reaction call, in order.
pub async fn reaction_calls(server: &MockServer) -> Vec<(String, String, bool)> {
    bodies(server, "/api/v1/chat.react")
        .await
        .into_iter()
        .map(|b| {
            (
                b["messageId"].as_str().unwrap().to_string(),
                b["emoji"].as_str().unwrap().to_string(),
                b["shouldReact"].as_bool().unwrap(),
            )
        })
        .collect()
}

pub async fn posted_messages(server: &MockServer) -> Vec<Value> {
    bodies(server, "/api/v1/chat.postMessage").await
}

pub async fn request_count(server: &MockServer, endpoint: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == endpoint)
        .count()
}
