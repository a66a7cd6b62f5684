//! Read-only view of a chat message as returned by the Rocket.Chat REST API.
//!
//! The chat service owns these records; the engine only ever decodes snapshots
//! of them, so nothing here is mutable after deserialization.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Reaction shown while a message is being handled.
pub const PROCESSING_EMOJI: &str = ":hourglass_flowing_sand:";
/// Reaction left on a message whose reply was delivered. Suppresses reprocessing.
pub const COMPLETE_EMOJI: &str = ":white_check_mark:";
/// Reaction left on a message whose processing failed. Does not suppress reprocessing.
pub const FAILED_EMOJI: &str = ":x:";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Sender {
    /// Human label: display name when set, otherwise the username.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(default)]
    pub usernames: Vec<String>,
}

/// An uploaded file referenced by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "rid", default)]
    pub room_id: Option<String>,
    #[serde(rename = "msg", default)]
    pub text: String,
    #[serde(rename = "u", default)]
    pub sender: Sender,
    #[serde(rename = "ts", deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "tmid", default)]
    pub thread_parent: Option<String>,
    #[serde(rename = "tcount", default)]
    pub reply_count: Option<u32>,
    #[serde(default)]
    pub reactions: HashMap<String, Reaction>,
    /// System event type (`uj`, `ul`, `room_changed_topic`, ...). Absent for user messages.
    #[serde(rename = "t", default)]
    pub system_event: Option<String>,
    #[serde(default)]
    pub bot: Option<serde_json::Value>,
    #[serde(default)]
    pub file: Option<FileRef>,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

impl ChatMessage {
    pub fn is_system_event(&self) -> bool {
        self.system_event.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Integrations and apps mark their posts with a `bot` object; `false`/`null` do not count.
    pub fn is_bot_authored(&self) -> bool {
        match &self.bot {
            None | Some(serde_json::Value::Null | serde_json::Value::Bool(false)) => false,
            Some(_) => true,
        }
    }

    pub fn has_reaction(&self, emoji: &str) -> bool {
        self.reactions.contains_key(emoji)
    }

    /// `username` is among the reactors for `emoji`.
    pub fn reacted_by(&self, emoji: &str, username: &str) -> bool {
        self.reactions
            .get(emoji)
            .is_some_and(|r| r.usernames.iter().any(|u| u == username))
    }

    /// A root message that already has replies hanging off it.
    pub fn is_thread_root(&self) -> bool {
        self.thread_parent.is_none() && self.reply_count.is_some_and(|n| n > 0)
    }

    /// Thread a reply to this message should land in: the parent thread for replies,
    /// the message itself otherwise (starting a new thread).
    pub fn reply_thread_id(&self) -> &str {
        self.thread_parent.as_deref().unwrap_or(&self.id)
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    /// All attached files. `files` wins when both forms are present since newer
    /// servers mirror the first entry into `file`.
    pub fn attachments(&self) -> Vec<&FileRef> {
        if !self.files.is_empty() {
            return self.files.iter().collect();
        }
        self.file.iter().collect()
    }
}

/// Page of replies returned for a thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadReplies {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub total: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Iso(DateTime<Utc>),
    Mongo {
        #[serde(rename = "$date")]
        date: i64,
    },
    Millis(i64),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Iso(ts) => return Ok(ts),
        RawTimestamp::Mongo { date } | RawTimestamp::Millis(date) => date,
    };
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", millis)))
}
