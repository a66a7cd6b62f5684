#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
// Content-Length (u64) is compared against usize limits
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod channels;
pub mod cli;
pub mod config;
pub(crate) mod utils;

pub use channels::base::{ChannelPlugin, OutboundTarget, ProbeResult};
pub use channels::manager::ChannelManager;
pub use channels::rocketchat::RocketChatPlugin;
pub use channels::rocketchat::poller::{EngineState, PollCycleReport, PollingEngine};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
