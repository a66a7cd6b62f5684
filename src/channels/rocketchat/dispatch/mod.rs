//! Hands one eligible message to the agent runtime and turns what comes back
//! into the final reaction state.

use super::CHANNEL_ID;
use super::client::{ClientResult, PostMessage, RocketChatClient, ThreadQuery};
use super::reactions::ReactionMarker;
use crate::utils::safe_filename;
use anyhow::Context;
use async_trait::async_trait;
use rocketlink_core::{
    AgentRuntime, ChatMessage, InboundContext, Peer, PeerKind, ReplyPayload, ReplySink,
    RouteRequest, build_inbound_history,
};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tracing::{debug, error, warn};

/// Most thread replies fetched as context for one message.
pub const THREAD_CONTEXT_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At least one reply was delivered and no error was reported.
    Completed,
    /// The agent finished without delivering anything.
    NoOutput,
    /// The agent reported an error through the sink.
    Errored(String),
    /// Routing or the dispatch call itself failed.
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Posts agent output as replies in one thread and records what happened.
struct ThreadReplySink<'a> {
    client: &'a RocketChatClient,
    room_id: &'a str,
    thread_id: &'a str,
    delivered: AtomicUsize,
    error: Mutex<Option<String>>,
}

impl<'a> ThreadReplySink<'a> {
    fn new(client: &'a RocketChatClient, room_id: &'a str, thread_id: &'a str) -> Self {
        Self {
            client,
            room_id,
            thread_id,
            delivered: AtomicUsize::new(0),
            error: Mutex::new(None),
        }
    }

    fn outcome(&self, result: anyhow::Result<()>) -> DispatchOutcome {
        if let Err(e) = result {
            return DispatchOutcome::Failed(format!("{e:#}"));
        }
        let reported = self.error.lock().ok().and_then(|slot| slot.clone());
        if let Some(err) = reported {
            return DispatchOutcome::Errored(err);
        }
        if self.delivered.load(Ordering::SeqCst) == 0 {
            DispatchOutcome::NoOutput
        } else {
            DispatchOutcome::Completed
        }
    }
}

#[async_trait]
impl ReplySink for ThreadReplySink<'_> {
    async fn deliver(&self, payload: ReplyPayload) -> anyhow::Result<()> {
        let text = payload.render();
        if !text.is_empty() {
            self.client
                .post_message(PostMessage {
                    room_id: self.room_id,
                    text: &text,
                    thread_id: Some(self.thread_id),
                })
                .await
                .with_context(|| format!("failed to post reply in thread {}", self.thread_id))?;
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_error(&self, error: anyhow::Error) {
        if let Ok(mut slot) = self.error.lock() {
            slot.get_or_insert_with(|| format!("{error:#}"));
        }
    }
}

pub struct DispatchBridge {
    client: RocketChatClient,
    runtime: Arc<dyn AgentRuntime>,
    marker: ReactionMarker,
    account_id: String,
    thread_context_chars: usize,
}

impl DispatchBridge {
    pub fn new(
        client: RocketChatClient,
        runtime: Arc<dyn AgentRuntime>,
        account_id: &str,
        thread_context_chars: usize,
    ) -> Self {
        Self {
            marker: ReactionMarker::new(client.clone(), account_id),
            client,
            runtime,
            account_id: account_id.to_string(),
            thread_context_chars,
        }
    }

    /// Full lifecycle of one eligible message: reactions around a dispatch.
    pub async fn process(
        &mut self,
        msg: &ChatMessage,
        room_id: &str,
        stale_failure: bool,
    ) -> DispatchOutcome {
        if stale_failure {
            self.marker.clear_failed(&msg.id).await;
        }
        self.marker.mark_processing(&msg.id).await;

        let outcome = self.dispatch(msg, room_id).await;
        match &outcome {
            DispatchOutcome::Completed => {
                debug!(account = %self.account_id, "replied to {}", msg.id);
                self.marker.mark_complete(&msg.id).await;
            }
            DispatchOutcome::NoOutput => {
                warn!(
                    account = %self.account_id,
                    "agent produced no reply for {}", msg.id
                );
                self.marker.mark_failed(&msg.id).await;
            }
            DispatchOutcome::Errored(e) => {
                error!(
                    account = %self.account_id,
                    "agent reported an error for {}: {}", msg.id, e
                );
                self.marker.mark_failed(&msg.id).await;
            }
            DispatchOutcome::Failed(e) => {
                error!(account = %self.account_id, "dispatch failed for {}: {}", msg.id, e);
                self.marker.mark_failed(&msg.id).await;
            }
        }
        outcome
    }

    async fn dispatch(&self, msg: &ChatMessage, room_id: &str) -> DispatchOutcome {
        let request = RouteRequest {
            channel: CHANNEL_ID.to_string(),
            account_id: self.account_id.clone(),
            peer: Peer {
                kind: PeerKind::Direct,
                id: msg.sender.id.clone(),
            },
        };
        let route = match self.runtime.resolve_agent_route(&request) {
            Ok(route) => route,
            Err(e) => return DispatchOutcome::Failed(format!("route resolution failed: {e:#}")),
        };

        let room_id = msg.room_id.as_deref().unwrap_or(room_id);
        let mut ctx = build_context(msg, &self.account_id, room_id, route.session_key);
        if let Some(thread_id) = msg.thread_parent.as_deref() {
            self.attach_thread_context(&mut ctx, msg, thread_id).await;
        }
        // Removed on drop, after the agent is done with the files.
        let _media_dir = self.download_attachments(msg, &mut ctx).await;

        let sink = ThreadReplySink::new(&self.client, room_id, msg.reply_thread_id());
        let result = self.runtime.dispatch_reply(ctx, &sink).await;
        sink.outcome(result)
    }

    async fn attach_thread_context(
        &self,
        ctx: &mut InboundContext,
        msg: &ChatMessage,
        thread_id: &str,
    ) {
        ctx.thread_id = Some(thread_id.to_string());

        match self.fetch_thread_context(thread_id).await {
            Ok(replies) => {
                let history = build_inbound_history(&replies, &msg.id, self.thread_context_chars);
                if !history.is_empty() {
                    ctx.inbound_history = Some(history);
                }
            }
            Err(e) => warn!(
                account = %self.account_id,
                "failed to fetch thread context for {}: {}", thread_id, e
            ),
        }

        match self.client.fetch_message(thread_id).await {
            Ok(starter) => ctx.thread_starter_body = Some(starter.text),
            Err(e) => warn!(
                account = %self.account_id,
                "failed to fetch thread starter {}: {}", thread_id, e
            ),
        }
    }

    /// Newest replies of a thread, at most [`THREAD_CONTEXT_LIMIT`].
    async fn fetch_thread_context(&self, thread_id: &str) -> ClientResult<Vec<ChatMessage>> {
        let first = self
            .client
            .fetch_thread_replies(
                thread_id,
                ThreadQuery {
                    count: THREAD_CONTEXT_LIMIT,
                    offset: 0,
                },
            )
            .await?;
        match first.total {
            Some(total) if total > THREAD_CONTEXT_LIMIT => {
                let tail = self
                    .client
                    .fetch_thread_replies(
                        thread_id,
                        ThreadQuery {
                            count: THREAD_CONTEXT_LIMIT,
                            offset: total - THREAD_CONTEXT_LIMIT,
                        },
                    )
                    .await?;
                Ok(tail.messages)
            }
            _ => Ok(first.messages),
        }
    }

    async fn download_attachments(
        &self,
        msg: &ChatMessage,
        ctx: &mut InboundContext,
    ) -> Option<TempDir> {
        let files = msg.attachments();
        if files.is_empty() {
            return None;
        }
        let dir = match tempfile::Builder::new().prefix("rocketlink-media-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(
                    account = %self.account_id,
                    "cannot create media dir, sending text only: {}", e
                );
                return None;
            }
        };
        for (idx, file) in files.into_iter().enumerate() {
            let dest = dir.path().join(format!("{}-{}", idx, safe_filename(&file.name)));
            let url = self.client.attachment_url(file);
            match self.client.download_attachment(&url, &dest).await {
                Ok(()) => {
                    ctx.media_paths.push(dest);
                    ctx.media_types.push(
                        file.mime_type
                            .clone()
                            .unwrap_or_else(|| "application/octet-stream".to_string()),
                    );
                }
                Err(e) => warn!(
                    account = %self.account_id,
                    "failed to download attachment {} on {}: {}", file.name, msg.id, e
                ),
            }
        }
        Some(dir)
    }
}

fn build_context(
    msg: &ChatMessage,
    account_id: &str,
    room_id: &str,
    session_key: String,
) -> InboundContext {
    InboundContext {
        body: msg.text.clone(),
        raw_body: msg.text.clone(),
        from: format!("{}:{}", CHANNEL_ID, msg.sender.id),
        sender_id: msg.sender.id.clone(),
        sender_username: msg.sender.username.clone(),
        sender_name: msg.sender.display_name().to_string(),
        session_key,
        account_id: account_id.to_string(),
        channel: CHANNEL_ID.to_string(),
        chat_type: "group".to_string(),
        room_id: room_id.to_string(),
        message_id: msg.id.clone(),
        timestamp: msg.timestamp_millis(),
        ..Default::default()
    }
}
