//! Agent runtimes the CLI can plug into the polling engine.

pub mod echo;
pub mod webhook;

pub use echo::EchoAgent;
pub use webhook::WebhookAgent;
