// Shared test helpers; not every test binary uses every item.
#![allow(unused)]

use anyhow::anyhow;
use async_trait::async_trait;
use rocketlink::config::ResolvedAccount;
use rocketlink_core::{
    AgentRoute, AgentRuntime, InboundContext, ReplyPayload, ReplySink, RouteRequest,
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BOT_ID: &str = "BOT";

/// What the mock agent does for one dispatch.
#[derive(Debug, Clone)]
pub enum AgentStep {
    Reply(String),
    Nothing,
    Error(String),
    Throw(String),
}

pub struct MockAgentRuntime {
    steps: Mutex<VecDeque<AgentStep>>,
    default_step: AgentStep,
    pub contexts: Arc<Mutex<Vec<InboundContext>>>,
}

impl MockAgentRuntime {
    pub fn replying(text: &str) -> Arc<Self> {
        Self::with_steps(Vec::new(), AgentStep::Reply(text.to_string()))
    }

    pub fn throwing(message: &str) -> Arc<Self> {
        Self::with_steps(Vec::new(), AgentStep::Throw(message.to_string()))
    }

    pub fn with_steps(steps: Vec<AgentStep>, default_step: AgentStep) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::from(steps)),
            default_step,
            contexts: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn dispatch_count(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    pub fn dispatched_ids(&self) -> Vec<String> {
        self.contexts
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.message_id.clone())
            .collect()
    }
}

#[async_trait]
impl AgentRuntime for MockAgentRuntime {
    fn resolve_agent_route(&self, request: &RouteRequest) -> anyhow::Result<AgentRoute> {
        Ok(AgentRoute {
            session_key: format!("mock:{}:{}", request.account_id, request.peer.id),
        })
    }

    async fn dispatch_reply(
        &self,
        ctx: InboundContext,
        sink: &dyn ReplySink,
    ) -> anyhow::Result<()> {
        self.contexts.lock().unwrap().push(ctx);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_step.clone());
        match step {
            AgentStep::Reply(text) => sink.deliver(ReplyPayload::text(text)).await,
            AgentStep::Nothing => Ok(()),
            AgentStep::Error(e) => {
                sink.on_error(anyhow!(e));
                Ok(())
            }
            AgentStep::Throw(e) => Err(anyhow!(e)),
        }
    }
}

pub fn account(server: &MockServer) -> ResolvedAccount {
    ResolvedAccount {
        account_id: "default".into(),
        enabled: true,
        server_url: server.uri(),
        auth_token: "tok".into(),
        user_id: BOT_ID.into(),
        channel: "general".into(),
        username: Some("bot".into()),
        poll_interval: Duration::from_millis(20),
        thread_ttl: Duration::from_secs(24 * 3600),
        thread_context_chars: 16_000,
    }
}

pub fn message(id: &str, sender_id: &str, text: &str) -> Value {
    json!({
        "_id": id,
        "rid": "R1",
        "msg": text,
        "u": {"_id": sender_id, "username": sender_id.to_lowercase(), "name": sender_id},
        "ts": {"$date": 1_714_557_600_000_i64},
    })
}

/// `emoji` placed by the bot account.
pub fn with_reaction(msg: Value, emoji: &str) -> Value {
    with_reaction_by(msg, emoji, "bot")
}

pub fn with_reaction_by(mut msg: Value, emoji: &str, username: &str) -> Value {
    let mut reactions = serde_json::Map::new();
    reactions.insert(emoji.to_string(), json!({"usernames": [username]}));
    msg["reactions"] = Value::Object(reactions);
    msg
}

/// A Rocket.Chat server with `#general` = `R1` and successful writes.
pub async fn rocketchat_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/channels.info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "channel": {"_id": "R1", "name": "general"},
            "success": true,
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat.react"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat.postMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"_id": "POSTED"},
            "success": true,
        })))
        .mount(&server)
        .await;
    server
}

/// Serve `newest_first` as the channel window on every poll.
pub async fn serve_history(server: &MockServer, newest_first: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/api/v1/channels.history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": newest_first,
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

/// `(message_id, emoji, applied)` per reaction call, in order.
pub async fn reactions(server: &MockServer) -> Vec<(String, String, bool)> {
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

pub fn react(id: &str, emoji: &str, applied: bool) -> (String, String, bool) {
    (id.to_string(), emoji.to_string(), applied)
}

pub async fn posts(server: &MockServer) -> Vec<Value> {
    bodies(server, "/api/v1/chat.postMessage").await
}

pub async fn count_requests(server: &MockServer, endpoint: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == endpoint)
        .count()
}
