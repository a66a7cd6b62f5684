#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod errors;
pub mod history;
pub mod message;

pub use agent::{
    AgentRoute, AgentRuntime, InboundContext, Peer, PeerKind, ReplyPayload, ReplySink,
    RouteRequest,
};
pub use errors::{BridgeError, BridgeResult};
pub use history::{InboundHistoryEntry, build_inbound_history};
pub use message::{
    COMPLETE_EMOJI, ChatMessage, FAILED_EMOJI, FileRef, PROCESSING_EMOJI, Reaction, Sender,
    ThreadReplies,
};
