//! Bounded transcript of prior thread messages handed to the agent as context.

use crate::message::ChatMessage;
use serde::{Deserialize, Serialize};

/// Appended to the one entry cut short by the budget.
pub const TRUNCATION_MARKER: char = '\u{2026}';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundHistoryEntry {
    pub sender: String,
    pub body: String,
    pub timestamp: i64,
}

/// Assemble prior thread messages under `char_budget` characters, oldest first.
///
/// The current message is excluded. Messages are consumed newest to oldest so the
/// most recent context always survives whole; the message that exhausts the budget
/// is cut to what remains and marked with [`TRUNCATION_MARKER`], and nothing older
/// is included after it. Budget is counted in characters, not bytes.
pub fn build_inbound_history(
    messages: &[ChatMessage],
    current_id: &str,
    char_budget: usize,
) -> Vec<InboundHistoryEntry> {
    let mut prior: Vec<&ChatMessage> = messages.iter().filter(|m| m.id != current_id).collect();
    // Stable sort keeps service order for equal timestamps.
    prior.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut remaining = char_budget;
    let mut entries = Vec::new();
    for msg in prior {
        if remaining == 0 {
            break;
        }
        let len = msg.text.chars().count();
        let body = if len <= remaining {
            remaining -= len;
            msg.text.clone()
        } else {
            let mut cut: String = msg.text.chars().take(remaining).collect();
            cut.push(TRUNCATION_MARKER);
            remaining = 0;
            cut
        };
        entries.push(InboundHistoryEntry {
            sender: msg.sender.username.clone(),
            body,
            timestamp: msg.timestamp_millis(),
        });
    }
    entries.reverse();
    entries
}
