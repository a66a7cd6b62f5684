use super::*;
use chrono::Utc;
use proptest::prelude::*;
use rocketlink_core::{Reaction, Sender};

fn msg(id: &str, sender_id: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        room_id: Some("R1".into()),
        text: "hello".into(),
        sender: Sender {
            id: sender_id.to_string(),
            username: "alice".into(),
            name: None,
        },
        created_at: Utc::now(),
        thread_parent: None,
        reply_count: None,
        reactions: Default::default(),
        system_event: None,
        bot: None,
        file: None,
        files: Vec::new(),
    }
}

fn with_reaction(mut m: ChatMessage, emoji: &str) -> ChatMessage {
    m.reactions.insert(
        emoji.to_string(),
        Reaction {
            usernames: vec!["bot".into()],
        },
    );
    m
}

#[test]
fn test_processed_set_dedups() {
    let mut set = ProcessedSet::default();
    assert!(set.insert("a"));
    assert!(!set.insert("a"));
    assert_eq!(set.len(), 1);
}

#[test]
fn test_processed_set_evicts_oldest_first() {
    let mut set = ProcessedSet::with_cap(3);
    for id in ["a", "b", "c", "d"] {
        set.insert(id);
    }
    assert_eq!(set.len(), 3);
    assert!(!set.contains("a"));
    assert!(set.contains("b"));
    assert!(set.contains("d"));
}

#[test]
fn test_processed_set_lookup_does_not_refresh() {
    let mut set = ProcessedSet::with_cap(2);
    set.insert("a");
    set.insert("b");
    assert!(set.contains("a"));
    set.insert("c");
    assert!(!set.contains("a"));
}

#[test]
fn test_self_authored_first() {
    let filter = MessageFilter::new("BOT");
    let mut m = msg("M1", "BOT");
    m.system_event = Some("uj".into());
    assert_eq!(filter.skip_reason(&m), Some(SkipReason::SelfAuthored));
}

#[test]
fn test_system_event_and_bot_skipped() {
    let mut filter = MessageFilter::new("BOT");
    let mut sys = msg("M1", "U1");
    sys.system_event = Some("room_changed_topic".into());
    assert_eq!(filter.admit(&sys), Admission::Skip(SkipReason::SystemEvent));

    let mut bot = msg("M2", "U2");
    bot.bot = Some(serde_json::json!({"i": "integration"}));
    assert_eq!(filter.admit(&bot), Admission::Skip(SkipReason::BotAuthored));
    assert!(filter.processed().is_empty());
}

#[test]
fn test_completed_skipped_even_if_unseen() {
    let mut filter = MessageFilter::new("BOT");
    let m = with_reaction(msg("M1", "U1"), COMPLETE_EMOJI);
    assert_eq!(
        filter.admit(&m),
        Admission::Skip(SkipReason::AlreadyCompleted)
    );
}

#[test]
fn test_failed_message_is_eligible_with_stale_flag() {
    let mut filter = MessageFilter::new("BOT");
    let m = with_reaction(msg("M1", "U1"), FAILED_EMOJI);
    assert_eq!(
        filter.admit(&m),
        Admission::Eligible {
            stale_failure: true
        }
    );
}

#[test]
fn test_foreign_failure_mark_is_not_stale_when_username_known() {
    let mut filter = MessageFilter::new("BOT").with_bot_username(Some("bot".into()));
    let mut m = msg("M1", "U1");
    m.reactions.insert(
        FAILED_EMOJI.to_string(),
        Reaction {
            usernames: vec!["alice".into()],
        },
    );
    assert_eq!(
        filter.admit(&m),
        Admission::Eligible {
            stale_failure: false
        }
    );
}

#[test]
fn test_own_failure_mark_is_stale_when_username_known() {
    let mut filter = MessageFilter::new("BOT").with_bot_username(Some("bot".into()));
    let m = with_reaction(msg("M1", "U1"), FAILED_EMOJI);
    assert_eq!(
        filter.admit(&m),
        Admission::Eligible {
            stale_failure: true
        }
    );
}

#[test]
fn test_failed_message_stays_recorded() {
    let mut filter = MessageFilter::new("BOT");
    let m = with_reaction(msg("M1", "U1"), FAILED_EMOJI);
    assert!(matches!(filter.admit(&m), Admission::Eligible { .. }));
    assert_eq!(filter.admit(&m), Admission::Skip(SkipReason::AlreadySeen));
}

#[test]
fn test_second_admit_is_already_seen() {
    let mut filter = MessageFilter::new("BOT");
    let m = msg("M1", "U1");
    assert_eq!(
        filter.admit(&m),
        Admission::Eligible {
            stale_failure: false
        }
    );
    assert_eq!(filter.admit(&m), Admission::Skip(SkipReason::AlreadySeen));
}

#[test]
fn test_six_hundred_admitted_set_capped() {
    let mut filter = MessageFilter::new("BOT");
    let admitted = (0..600)
        .filter(|i| {
            matches!(
                filter.admit(&msg(&format!("M{i}"), "U1")),
                Admission::Eligible { .. }
            )
        })
        .count();
    assert_eq!(admitted, 600);
    assert_eq!(filter.processed().len(), PROCESSED_CAP);
    assert!(!filter.processed().contains("M0"));
    assert!(filter.processed().contains("M599"));
}

proptest! {
    #[test]
    fn prop_processed_set_never_exceeds_cap(
        ids in proptest::collection::vec("[a-z]{1,4}", 0..200),
        cap in 1usize..50,
    ) {
        let mut set = ProcessedSet::with_cap(cap);
        for id in &ids {
            set.insert(id);
            prop_assert!(set.len() <= cap);
        }
        if let Some(last) = ids.last() {
            prop_assert!(set.contains(last));
        }
    }
}
