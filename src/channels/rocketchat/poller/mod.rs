//! The reconciliation loop for one account: sample the channel window, push
//! eligible messages through the dispatch bridge, then walk tracked threads.
//!
//! Messages are handled one at a time in chronological order. Cancellation is
//! checked before the batch, between messages and between threads; an in-flight
//! request is always allowed to finish.

use super::client::{RocketChatClient, ThreadQuery};
use super::dispatch::DispatchBridge;
use super::filter::{Admission, MessageFilter, ProcessedSet, SkipReason};
use super::threads::ThreadTracker;
use crate::config::ResolvedAccount;
use anyhow::{Result, bail};
use chrono::Utc;
use rocketlink_core::{AgentRuntime, BridgeError, ChatMessage};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Channel messages sampled per cycle.
pub const HISTORY_WINDOW: u32 = 50;
/// Thread replies fetched per thread per cycle.
pub const THREAD_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Starting,
    Running,
    Stopped,
}

/// What one poll cycle saw and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollCycleReport {
    pub fetched: usize,
    pub eligible: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub completed: usize,
    pub failed: usize,
    pub threads_polled: usize,
    pub threads_pruned: usize,
    pub cancelled: bool,
}

impl PollCycleReport {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

impl std::fmt::Display for PollCycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched={} eligible={} skipped={} completed={} failed={} threads={} pruned={}",
            self.fetched,
            self.eligible,
            self.skipped_total(),
            self.completed,
            self.failed,
            self.threads_polled,
            self.threads_pruned
        )
    }
}

pub struct PollingEngine {
    account: ResolvedAccount,
    client: RocketChatClient,
    filter: MessageFilter,
    threads: ThreadTracker,
    bridge: DispatchBridge,
    state: EngineState,
    room_id: Option<String>,
}

impl PollingEngine {
    pub fn new(account: ResolvedAccount, runtime: Arc<dyn AgentRuntime>) -> Self {
        let client = RocketChatClient::from_account(&account);
        Self::with_client(account, client, runtime)
    }

    pub fn with_client(
        account: ResolvedAccount,
        client: RocketChatClient,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Self {
        let bridge = DispatchBridge::new(
            client.clone(),
            runtime,
            &account.account_id,
            account.thread_context_chars,
        );
        Self {
            filter: MessageFilter::new(account.user_id.clone())
                .with_bot_username(account.username.clone()),
            threads: ThreadTracker::new(),
            bridge,
            client,
            account,
            state: EngineState::Starting,
            room_id: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn processed(&self) -> &ProcessedSet {
        self.filter.processed()
    }

    pub fn threads(&self) -> &ThreadTracker {
        &self.threads
    }

    /// Resolve the configured channel. Failure here is fatal for the engine.
    pub async fn start(&mut self) -> Result<String> {
        if let Some(room_id) = &self.room_id {
            return Ok(room_id.clone());
        }
        let account_id = &self.account.account_id;
        let room = match self.client.resolve_channel(&self.account.channel).await {
            Ok(room) => room,
            Err(e) if matches!(e.status(), Some(401 | 403)) => {
                return Err(BridgeError::Auth(format!("account {account_id}: {e}")).into());
            }
            Err(e) => {
                return Err(BridgeError::Channel {
                    account: account_id.clone(),
                    message: format!("failed to resolve channel #{}: {e}", self.account.channel),
                }
                .into());
            }
        };
        info!(
            account = %self.account.account_id,
            "resolved #{} to room {}", self.account.channel, room.room_id
        );
        self.room_id = Some(room.room_id.clone());
        Ok(room.room_id)
    }

    /// Resolve the channel, then poll until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        self.state = EngineState::Starting;
        self.start().await?;
        self.state = EngineState::Running;
        info!(
            account = %self.account.account_id,
            "polling #{} every {:?}", self.account.channel, self.account.poll_interval
        );

        while !cancel.is_cancelled() {
            let report = self.poll_once(&cancel).await?;
            debug!(account = %self.account.account_id, "poll cycle: {}", report);
            if report.cancelled {
                break;
            }
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.account.poll_interval) => {}
            }
        }

        self.state = EngineState::Stopped;
        info!(account = %self.account.account_id, "rocketchat poller stopped");
        Ok(())
    }

    /// One full cycle. Fetch failures are logged and skipped, never returned.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<PollCycleReport> {
        let Some(room_id) = self.room_id.clone() else {
            bail!("poller for {} has not been started", self.account.account_id);
        };
        let mut report = PollCycleReport::default();

        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }
        match self
            .client
            .fetch_channel_history(&room_id, HISTORY_WINDOW)
            .await
        {
            Ok(mut messages) => {
                messages.reverse();
                report.fetched = messages.len();
                self.threads.observe_roots(&messages, Utc::now());
                for msg in &messages {
                    if cancel.is_cancelled() {
                        report.cancelled = true;
                        return Ok(report);
                    }
                    self.handle(msg, &room_id, &mut report).await;
                }
            }
            Err(e) => warn!(
                account = %self.account.account_id,
                "failed to fetch channel history: {}", e
            ),
        }

        report.threads_pruned = self
            .threads
            .prune(Utc::now(), self.account.thread_ttl)
            .len();

        for (thread_id, offset) in self.threads.active() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            report.threads_polled += 1;
            if !self
                .poll_thread(&thread_id, offset, &room_id, cancel, &mut report)
                .await
            {
                report.cancelled = true;
                return Ok(report);
            }
        }
        Ok(report)
    }

    /// Returns false when cancelled part way through the replies.
    async fn poll_thread(
        &mut self,
        thread_id: &str,
        offset: u32,
        room_id: &str,
        cancel: &CancellationToken,
        report: &mut PollCycleReport,
    ) -> bool {
        let query = ThreadQuery {
            count: THREAD_PAGE_SIZE,
            offset,
        };
        let page = match self.client.fetch_thread_replies(thread_id, query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    account = %self.account.account_id,
                    "failed to fetch replies for thread {}: {}", thread_id, e
                );
                return true;
            }
        };

        let mut consumed = 0u32;
        for mut reply in page.messages {
            if cancel.is_cancelled() {
                self.threads.advance(thread_id, consumed, Utc::now());
                return false;
            }
            if reply.thread_parent.is_none() {
                reply.thread_parent = Some(thread_id.to_string());
            }
            self.handle(&reply, room_id, report).await;
            consumed += 1;
        }
        self.threads.advance(thread_id, consumed, Utc::now());
        true
    }

    async fn handle(&mut self, msg: &ChatMessage, room_id: &str, report: &mut PollCycleReport) {
        match self.filter.admit(msg) {
            Admission::Skip(reason) => {
                debug!(
                    account = %self.account.account_id,
                    "skipping {}: {}", msg.id, reason
                );
                *report.skipped.entry(reason).or_default() += 1;
            }
            Admission::Eligible { stale_failure } => {
                report.eligible += 1;
                if self
                    .bridge
                    .process(msg, room_id, stale_failure)
                    .await
                    .is_completed()
                {
                    report.completed += 1;
                } else {
                    report.failed += 1;
                }
            }
        }
    }
}
