//! Eligibility rules and the bounded per-run dedup set.

use indexmap::IndexSet;
use rocketlink_core::{COMPLETE_EMOJI, ChatMessage, FAILED_EMOJI};

/// Maximum number of message ids remembered per run.
pub const PROCESSED_CAP: usize = 500;

/// Insertion-ordered id set that evicts its oldest entries past the cap.
///
/// Eviction is FIFO on first insertion; a repeated `contains` does not refresh an
/// entry, so this only approximates recency.
#[derive(Debug, Clone)]
pub struct ProcessedSet {
    ids: IndexSet<String>,
    cap: usize,
}

impl Default for ProcessedSet {
    fn default() -> Self {
        Self::with_cap(PROCESSED_CAP)
    }
}

impl ProcessedSet {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            ids: IndexSet::new(),
            cap: cap.max(1),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns false when the id was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        if self.ids.len() > self.cap {
            let excess = self.ids.len() - self.cap;
            self.ids.drain(..excess);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    SelfAuthored,
    SystemEvent,
    BotAuthored,
    AlreadyCompleted,
    AlreadySeen,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::SelfAuthored => "self-authored",
            Self::SystemEvent => "system event",
            Self::BotAuthored => "bot-authored",
            Self::AlreadyCompleted => "already completed",
            Self::AlreadySeen => "already seen",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Hand the message on. `stale_failure` is set when the service still shows our
    /// failure mark from an earlier attempt.
    Eligible { stale_failure: bool },
    Skip(SkipReason),
}

#[derive(Debug)]
pub struct MessageFilter {
    bot_user_id: String,
    bot_username: Option<String>,
    processed: ProcessedSet,
}

impl MessageFilter {
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        Self::with_processed(bot_user_id, ProcessedSet::default())
    }

    pub fn with_processed(bot_user_id: impl Into<String>, processed: ProcessedSet) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            bot_username: None,
            processed,
        }
    }

    /// Only treat `:x:` as our own stale mark when this user placed it.
    /// Without a username any `:x:` counts.
    #[must_use]
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// First exclusion rule that matches, checked in a fixed order.
    pub fn skip_reason(&self, msg: &ChatMessage) -> Option<SkipReason> {
        if msg.sender.id == self.bot_user_id {
            Some(SkipReason::SelfAuthored)
        } else if msg.is_system_event() {
            Some(SkipReason::SystemEvent)
        } else if msg.is_bot_authored() {
            Some(SkipReason::BotAuthored)
        } else if msg.has_reaction(COMPLETE_EMOJI) {
            Some(SkipReason::AlreadyCompleted)
        } else if self.processed.contains(&msg.id) {
            Some(SkipReason::AlreadySeen)
        } else {
            None
        }
    }

    /// Decide on `msg`, recording it as processed when eligible.
    ///
    /// The id stays recorded whatever the dispatch outcome, so a failed message
    /// is retried only once it has been evicted from the set or after a restart.
    pub fn admit(&mut self, msg: &ChatMessage) -> Admission {
        if let Some(reason) = self.skip_reason(msg) {
            return Admission::Skip(reason);
        }
        self.processed.insert(&msg.id);
        let stale_failure = match &self.bot_username {
            Some(name) => msg.reacted_by(FAILED_EMOJI, name),
            None => msg.has_reaction(FAILED_EMOJI),
        };
        Admission::Eligible { stale_failure }
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }
}

#[cfg(test)]
mod tests;
