//! Processing / complete / failed emoji feedback on inbound messages.
//!
//! Every reaction call is best-effort: failures are logged at warn and swallowed.
//! The chat service only offers a toggle, so the marker remembers which messages
//! currently carry its hourglass and never emits a removal it cannot vouch for.

use super::client::RocketChatClient;
use rocketlink_core::{COMPLETE_EMOJI, FAILED_EMOJI, PROCESSING_EMOJI};
use std::collections::HashSet;
use tracing::{debug, warn};

pub struct ReactionMarker {
    client: RocketChatClient,
    account_id: String,
    /// Messages on which our hourglass is known to be present.
    processing: HashSet<String>,
}

impl ReactionMarker {
    pub fn new(client: RocketChatClient, account_id: impl Into<String>) -> Self {
        Self {
            client,
            account_id: account_id.into(),
            processing: HashSet::new(),
        }
    }

    pub fn is_processing(&self, message_id: &str) -> bool {
        self.processing.contains(message_id)
    }

    pub async fn mark_processing(&mut self, message_id: &str) {
        if self.apply(message_id, PROCESSING_EMOJI, true).await {
            self.processing.insert(message_id.to_string());
        }
    }

    pub async fn mark_complete(&mut self, message_id: &str) {
        self.clear_processing(message_id).await;
        self.apply(message_id, COMPLETE_EMOJI, true).await;
    }

    pub async fn mark_failed(&mut self, message_id: &str) {
        self.clear_processing(message_id).await;
        self.apply(message_id, FAILED_EMOJI, true).await;
    }

    /// Remove a failure mark the service reported on the message before a retry.
    pub async fn clear_failed(&mut self, message_id: &str) {
        self.apply(message_id, FAILED_EMOJI, false).await;
    }

    async fn clear_processing(&mut self, message_id: &str) {
        if self.processing.remove(message_id) {
            self.apply(message_id, PROCESSING_EMOJI, false).await;
        } else {
            debug!(
                account = %self.account_id,
                "hourglass not present on {}, skipping removal", message_id
            );
        }
    }

    async fn apply(&self, message_id: &str, emoji: &str, should_react: bool) -> bool {
        match self
            .client
            .set_reaction(message_id, emoji, should_react)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    account = %self.account_id,
                    "failed to {} {} on {}: {}",
                    if should_react { "add" } else { "remove" },
                    emoji,
                    message_id,
                    e
                );
                false
            }
        }
    }
}
